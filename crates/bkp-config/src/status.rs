use serde::Deserialize;

use bkp_utils::ErrorKind;

/// Configurable process exit codes.
///
/// Every non-zero code the engine emits comes from this table, keyed by the
/// classified error kind, or from the dedicated identical-backup sentinel.
/// Kinds without a configurable slot (`Io`, `VerificationFailed`,
/// `Cancelled`) exit with the generic failure code.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusCodes {
    pub status_file_not_found: i32,
    pub status_permission_denied: i32,
    pub status_invalid_file_type: i32,
    pub status_disk_full: i32,
    pub status_directory_not_found: i32,
    pub status_config_error: i32,
    pub status_file_is_identical_to_existing_backup: i32,
    pub status_created_archive: i32,
}

const GENERIC_FAILURE: i32 = 1;

impl Default for StatusCodes {
    fn default() -> Self {
        Self {
            status_file_not_found: 1,
            status_permission_denied: 1,
            status_invalid_file_type: 1,
            status_disk_full: 1,
            status_directory_not_found: 1,
            status_config_error: 1,
            status_file_is_identical_to_existing_backup: 1,
            status_created_archive: 0,
        }
    }
}

impl StatusCodes {
    pub fn code_for(&self, kind: ErrorKind) -> i32 {
        match kind {
            ErrorKind::FileNotFound => self.status_file_not_found,
            ErrorKind::Permission => self.status_permission_denied,
            ErrorKind::InvalidFileType => self.status_invalid_file_type,
            ErrorKind::DiskFull => self.status_disk_full,
            ErrorKind::DirectoryNotFound | ErrorKind::InvalidDirectory => {
                self.status_directory_not_found
            }
            ErrorKind::Config => self.status_config_error,
            ErrorKind::IdenticalToExisting => self.status_file_is_identical_to_existing_backup,
            ErrorKind::VerificationFailed | ErrorKind::Io | ErrorKind::Cancelled => {
                GENERIC_FAILURE
            }
        }
    }
}
