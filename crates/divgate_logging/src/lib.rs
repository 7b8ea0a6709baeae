//! Shared logging utilities for Divgate binaries.
//!
//! Logs go to a size-capped file under `<home>/logs/` and to stderr.
//! Stdout is never written to: the stdio transport owns it.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "divgate=info,divgate_mcp=info";
const VERBOSE_LOG_FILTER: &str = "divgate=debug,divgate_mcp=debug";
const LOG_GENERATIONS: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration shared by Divgate binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a size-capped file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let file_log =
        SizeCappedLog::open(log_dir, config.app_name, LOG_GENERATIONS, MAX_LOG_FILE_SIZE)
            .with_context(|| format!("Failed to open log file for {}", config.app_name))?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file_log))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Get the Divgate home directory.
///
/// Priority:
/// 1) DIVGATE_HOME
/// 2) ~/.divgate
/// 3) ./.divgate
pub fn divgate_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("DIVGATE_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".divgate")
}

/// Get the logs directory: ~/.divgate/logs
pub fn logs_dir() -> PathBuf {
    divgate_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// Path of the active log file for an app.
pub fn log_file_path(app_name: &str) -> PathBuf {
    logs_dir().join(format!("{}.log", file_stem(app_name)))
}

/// Read the last `lines` lines of a file.
///
/// Returns an empty list when nothing has been logged yet.
pub fn tail_file(path: &Path, lines: usize) -> Result<Vec<String>> {
    if lines == 0 || !path.exists() {
        return Ok(Vec::new());
    }

    let file =
        File::open(path).with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let mut window = VecDeque::with_capacity(lines.min(4096));
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Failed to read log file: {}", path.display()))?;
        if window.len() == lines {
            window.pop_front();
        }
        window.push_back(line);
    }

    Ok(window.into_iter().collect())
}

/// Append-only log file that rolls over once it reaches `limit` bytes.
///
/// Generation 0 is `<stem>.log`; older generations are `<stem>.log.1`,
/// `<stem>.log.2`, ... and at most `generations` files exist at once.
struct SizeCappedLog {
    dir: PathBuf,
    stem: String,
    generations: usize,
    limit: u64,
    active: Option<File>,
    written: u64,
}

impl SizeCappedLog {
    fn open(dir: PathBuf, app_name: &str, generations: usize, limit: u64) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let mut log = Self {
            dir,
            stem: file_stem(app_name),
            generations: generations.max(1),
            limit,
            active: None,
            written: 0,
        };
        log.reopen()?;
        if log.written > log.limit {
            log.roll()?;
        }
        Ok(log)
    }

    fn generation(&self, n: usize) -> PathBuf {
        match n {
            0 => self.dir.join(format!("{}.log", self.stem)),
            n => self.dir.join(format!("{}.log.{}", self.stem, n)),
        }
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.generation(0))?;
        self.written = file.metadata()?.len();
        self.active = Some(file);
        Ok(())
    }

    /// Shift every generation up by one and start an empty active file.
    fn roll(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.active.take() {
            file.flush()?;
        }

        let oldest = self.generations - 1;
        if oldest == 0 {
            File::create(self.generation(0))?;
            return self.reopen();
        }

        match fs::remove_file(self.generation(oldest)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        for n in (0..oldest).rev() {
            let from = self.generation(n);
            if from.exists() {
                fs::rename(&from, self.generation(n + 1))?;
            }
        }

        self.reopen()
    }
}

impl Write for SizeCappedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.limit {
            self.roll()?;
        }
        if self.active.is_none() {
            self.reopen()?;
        }

        let file = self
            .active
            .as_mut()
            .ok_or_else(|| io::Error::other("log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.active.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn file_stem(app_name: &str) -> String {
    app_name.replace(
        |c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'),
        "_",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(path: PathBuf) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_tail_file_returns_last_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("engine.log");
        fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();

        let tail = tail_file(&path, 2).unwrap();
        assert_eq!(tail, vec!["three".to_string(), "four".to_string()]);
    }

    #[test]
    fn test_tail_file_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let tail = tail_file(&temp.path().join("nope.log"), 10).unwrap();
        assert!(tail.is_empty());
    }

    #[test]
    fn test_roll_moves_active_file() {
        let temp = TempDir::new().unwrap();
        let mut log =
            SizeCappedLog::open(temp.path().to_path_buf(), "divgate mcp", 3, 8).unwrap();

        log.write_all(b"12345678").unwrap();
        log.write_all(b"abc").unwrap();
        log.flush().unwrap();

        assert_eq!(read(temp.path().join("divgate_mcp.log.1")), "12345678");
        assert_eq!(read(temp.path().join("divgate_mcp.log")), "abc");
    }

    #[test]
    fn test_oldest_generation_dropped() {
        let temp = TempDir::new().unwrap();
        let mut log = SizeCappedLog::open(temp.path().to_path_buf(), "engine", 3, 4).unwrap();

        for chunk in [b"aaaa", b"bbbb", b"cccc", b"dddd"] {
            log.write_all(chunk).unwrap();
        }
        log.flush().unwrap();

        assert_eq!(read(temp.path().join("engine.log")), "dddd");
        assert_eq!(read(temp.path().join("engine.log.1")), "cccc");
        assert_eq!(read(temp.path().join("engine.log.2")), "bbbb");
        assert!(!temp.path().join("engine.log.3").exists());
    }

    #[test]
    fn test_single_generation_truncates() {
        let temp = TempDir::new().unwrap();
        let mut log = SizeCappedLog::open(temp.path().to_path_buf(), "engine", 1, 4).unwrap();

        log.write_all(b"aaaa").unwrap();
        log.write_all(b"bb").unwrap();
        log.flush().unwrap();

        assert_eq!(read(temp.path().join("engine.log")), "bb");
        assert!(!temp.path().join("engine.log.1").exists());
    }

    #[test]
    fn test_oversized_existing_file_rolls_on_open() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("engine.log"), "0123456789").unwrap();

        SizeCappedLog::open(temp.path().to_path_buf(), "engine", 2, 4).unwrap();

        assert_eq!(read(temp.path().join("engine.log.1")), "0123456789");
        assert_eq!(read(temp.path().join("engine.log")), "");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("divgate/mcp server"), "divgate_mcp_server");
        assert_eq!(file_stem("divgate-mcp"), "divgate-mcp");
    }
}
