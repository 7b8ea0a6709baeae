//! Static role → path-pattern table and the pattern matcher.

use crate::packets::Role;

/// Allow/deny patterns for one role
#[derive(Debug, Clone, Copy)]
pub struct RolePolicy {
    pub allow: &'static [&'static str],
    pub deny: &'static [&'static str],
}

const ADDON_DEV: RolePolicy = RolePolicy {
    allow: &["addons/**", "public/**"],
    deny: &["src/**"],
};

// config_mgr owns data/config.json
const CORE_FIX: RolePolicy = RolePolicy {
    allow: &["src/**", "public/**"],
    deny: &[".env", "data/config.json"],
};

const CONFIG_MGR: RolePolicy = RolePolicy {
    allow: &["data/config.json"],
    deny: &[],
};

const QA_ONLY: RolePolicy = RolePolicy {
    allow: &[],
    deny: &["**"],
};

pub fn policy_for(role: Role) -> RolePolicy {
    match role {
        Role::AddonDev => ADDON_DEV,
        Role::CoreFix => CORE_FIX,
        Role::ConfigMgr => CONFIG_MGR,
        Role::QaOnly => QA_ONLY,
    }
}

/// Match a packet path against a policy pattern.
///
/// - `**` matches everything
/// - `dir/**` matches any path starting with `dir` (literal prefix test, so
///   `src/**` also covers `src2/x.ts` and `srcfoo.ts`)
/// - anything else must be equal
pub fn matches(path: &str, pattern: &str) -> bool {
    if pattern == "**" {
        return true;
    }

    match pattern.strip_suffix("/**") {
        Some(prefix) => path.starts_with(prefix),
        None => path == pattern,
    }
}
