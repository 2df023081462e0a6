//! Dump artifact naming and local path helpers.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::DumpError;

/// Extension of a PostgreSQL custom-format dump.
pub const DUMP_EXT: &str = "pg";
/// Extension appended to an encrypted dump.
pub const GPG_EXT: &str = "gpg";

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Name of a dump produced locally: `{user}_{project}-{YYYYmmdd-HHMMSS}.pg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpName {
    pub user: String,
    pub project: String,
    pub taken_at: NaiveDateTime,
}

impl DumpName {
    pub fn new(user: &str, project: &str, taken_at: NaiveDateTime) -> Self {
        Self {
            user: user.to_string(),
            project: project.to_string(),
            taken_at,
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}-{}.{}",
            self.user,
            self.project,
            self.taken_at.format(TIMESTAMP_FORMAT),
            DUMP_EXT
        )
    }
}

/// `dump.pg` → `dump.pg.gpg`.
pub fn encrypted_path(dump: &Path) -> PathBuf {
    let mut name = dump.as_os_str().to_os_string();
    name.push(".");
    name.push(GPG_EXT);
    PathBuf::from(name)
}

/// `dump.pg.gpg` → `dump.pg`. Names without the `.gpg` suffix are returned as is.
pub fn decrypted_name(name: &str) -> &str {
    name.strip_suffix(".gpg").unwrap_or(name)
}

/// Last path segment of an object key or path.
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Expand a leading `~` to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = home_dir() {
            return home.join(path.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(PathBuf::from)
}

/// Login name of the operator; it names dumps and the personal bag folder.
pub fn current_user() -> Result<String, DumpError> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| DumpError::Config("cannot determine username (USER is not set)".to_string()))
}
