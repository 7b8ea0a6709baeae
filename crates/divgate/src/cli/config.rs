//! `divgate config`: resolved paths

use super::ServerArgs;
use clap::Args;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Show resolved paths in JSON format
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let config = args.server.server_config()?;
    let home = divgate_logging::divgate_home();
    let queue = config.queue_dir();
    let backups = config.backup_dir();

    if args.json {
        let value = serde_json::json!({
            "home": home.to_string_lossy(),
            "root": config.working_root.to_string_lossy(),
            "data_dir": config.data_dir.to_string_lossy(),
            "queue": {
                "path": queue.to_string_lossy(),
                "exists": queue.exists(),
            },
            "backups": {
                "path": backups.to_string_lossy(),
                "exists": backups.exists(),
            },
            "audit_log": config.audit_log_path().map(|p| p.to_string_lossy().into_owned()),
            "log_file": config.log_path.to_string_lossy(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("DIVGATE CONFIGURATION");
        println!("=====================");
        println!();
        println!("Home:      {}", home.display());
        println!("Root:      {}", config.working_root.display());
        println!("Data:      {}", config.data_dir.display());
        println!("Queue:     {}{}", queue.display(), missing_marker(queue.exists()));
        println!("Backups:   {}{}", backups.display(), missing_marker(backups.exists()));
        match config.audit_log_path() {
            Some(path) => println!("Audit log: {}", path.display()),
            None => println!("Audit log: disabled"),
        }
        println!("Log file:  {}", config.log_path.display());
    }

    Ok(())
}

fn missing_marker(exists: bool) -> &'static str {
    if exists {
        ""
    } else {
        " (not created)"
    }
}
