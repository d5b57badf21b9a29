//! The frozen configuration record consumed by the archiving engine.
//!
//! Discovery and merging across multiple files is the CLI collaborator's
//! business; the engine receives one immutable [`Config`] per command.

use std::path::Path;

use serde::Deserialize;

use bkp_utils::{Error, ErrorKind, Result};

mod status;

pub use status::StatusCodes;

/// Environment variables recognized as overrides.
pub const ENV_ARCHIVE_DIR: &str = "BKPDIR_ARCHIVE_DIR";
pub const ENV_BACKUP_DIR: &str = "BKPDIR_BACKUP_DIR";
pub const ENV_INCLUDE_GIT: &str = "BKPDIR_INCLUDE_GIT";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where archives are written, resolved against the working directory.
    pub archive_dir_path: String,
    /// Where single-file backups are written.
    pub backup_dir_path: String,
    /// Nest archives under `<archive_dir>/<basename(cwd)>` instead of
    /// prefixing the archive name with it.
    pub use_current_dir_name: bool,
    /// Analogous nesting for single-file backups.
    pub use_current_dir_name_for_files: bool,
    pub exclude_patterns: Vec<String>,
    pub include_git_info: bool,
    pub show_git_dirty_status: bool,
    pub skip_broken_symlinks: bool,
    pub verification: VerificationConfig,
    #[serde(flatten)]
    pub status_codes: StatusCodes,
    /// Mode for directories the tool creates.
    pub dir_permissions: u32,
    /// Mode for files the tool creates.
    pub file_permissions: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_dir_path: "../.bkpr".to_string(),
            backup_dir_path: "../.bkpr/files".to_string(),
            use_current_dir_name: true,
            use_current_dir_name_for_files: false,
            exclude_patterns: vec![".git/".to_string(), "vendor/".to_string()],
            include_git_info: true,
            show_git_dirty_status: false,
            skip_broken_symlinks: false,
            verification: VerificationConfig::default(),
            status_codes: StatusCodes::default(),
            dir_permissions: 0o755,
            file_permissions: 0o644,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Verify every archive right after creation.
    pub verify_on_create: bool,
    /// Only `sha256` is supported; anything else is rejected at validation.
    pub checksum_algorithm: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            verify_on_create: false,
            checksum_algorithm: "sha256".to_string(),
        }
    }
}

impl Config {
    /// Parse a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            bkp_utils::error::classify_io(e, "unable to read configuration", path)
        })?;
        let cfg: Config = serde_yaml::from_str(&raw).map_err(|e| {
            Error::config(format!("invalid configuration {}: {e}", path.display()))
        })?;
        Ok(cfg)
    }

    /// Apply `BKPDIR_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_ARCHIVE_DIR) {
            if !dir.is_empty() {
                self.archive_dir_path = dir;
            }
        }
        if let Some(dir) = lookup(ENV_BACKUP_DIR) {
            if !dir.is_empty() {
                self.backup_dir_path = dir;
            }
        }
        if let Some(flag) = lookup(ENV_INCLUDE_GIT) {
            if let Some(value) = parse_bool(&flag) {
                self.include_git_info = value;
            }
        }
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.verification.checksum_algorithm != "sha256" {
            return Err(Error::new(
                ErrorKind::Config,
                format!(
                    "unsupported checksum algorithm `{}` (only sha256)",
                    self.verification.checksum_algorithm
                ),
            ));
        }
        if self.archive_dir_path.is_empty() {
            return Err(Error::config("archive_dir_path must not be empty"));
        }
        if self.backup_dir_path.is_empty() {
            return Err(Error::config("backup_dir_path must not be empty"));
        }
        Ok(())
    }
}

/// Boolean parsing for environment overrides: `1/true/yes/on` and
/// `0/false/no/off`, case-insensitive. Anything else is ignored.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = Config::default();
        assert_eq!(cfg.archive_dir_path, "../.bkpr");
        assert!(cfg.use_current_dir_name);
        assert_eq!(cfg.verification.checksum_algorithm, "sha256");
        assert_eq!(cfg.status_codes.status_created_archive, 0);
        assert_eq!(cfg.dir_permissions, 0o755);
        cfg.validate().unwrap();
    }

    #[test]
    fn yaml_overrides_defaults() {
        let yaml = r#"
archive_dir_path: /srv/archives
use_current_dir_name: false
exclude_patterns:
  - ".git/"
  - "*.log"
verification:
  verify_on_create: true
status_file_not_found: 20
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.archive_dir_path, "/srv/archives");
        assert!(!cfg.use_current_dir_name);
        assert_eq!(cfg.exclude_patterns, vec![".git/", "*.log"]);
        assert!(cfg.verification.verify_on_create);
        assert_eq!(cfg.verification.checksum_algorithm, "sha256");
        assert_eq!(cfg.status_codes.status_file_not_found, 20);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.backup_dir_path, "../.bkpr/files");
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bkpr.yml");
        std::fs::write(&path, "archive_dir_path: archives\n").unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.archive_dir_path, "archives");
    }

    #[test]
    fn load_missing_file_is_classified() {
        let err = Config::load(Path::new("/no/such/bkpr.yml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bkpr.yml");
        std::fs::write(&path, "archive_dir_path: [unterminated\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        cfg.apply_env_from(|key| match key {
            ENV_ARCHIVE_DIR => Some("/mnt/archives".to_string()),
            ENV_INCLUDE_GIT => Some("off".to_string()),
            _ => None,
        });
        assert_eq!(cfg.archive_dir_path, "/mnt/archives");
        assert_eq!(cfg.backup_dir_path, "../.bkpr/files");
        assert!(!cfg.include_git_info);
    }

    #[test]
    fn unparsable_env_bool_is_ignored() {
        let mut cfg = Config::default();
        cfg.apply_env_from(|key| {
            (key == ENV_INCLUDE_GIT).then(|| "maybe".to_string())
        });
        assert!(cfg.include_git_info);
    }

    #[test]
    fn validate_rejects_unknown_algorithm() {
        let mut cfg = Config::default();
        cfg.verification.checksum_algorithm = "md5".to_string();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
