use std::io;
use std::path::{Path, PathBuf};

/// Closed set of failure categories.
///
/// Classification happens exactly once, at the boundary where the OS error
/// is observed; everything above that propagates the typed error unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FileNotFound,
    Permission,
    InvalidFileType,
    DirectoryNotFound,
    InvalidDirectory,
    DiskFull,
    Config,
    VerificationFailed,
    /// Sentinel for the single-file-backup identity exit. Not a failure;
    /// carries the path of the existing identical backup.
    IdenticalToExisting,
    Io,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "file not found",
            ErrorKind::Permission => "permission denied",
            ErrorKind::InvalidFileType => "invalid file type",
            ErrorKind::DirectoryNotFound => "directory not found",
            ErrorKind::InvalidDirectory => "invalid directory",
            ErrorKind::DiskFull => "disk full",
            ErrorKind::Config => "configuration error",
            ErrorKind::VerificationFailed => "verification failed",
            ErrorKind::IdenticalToExisting => "identical to existing backup",
            ErrorKind::Io => "I/O error",
            ErrorKind::Cancelled => "operation cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type used throughout the archiving core.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    path: Option<PathBuf>,
    #[source]
    source: Option<io::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
            source: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    pub fn verification_failed(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(
            ErrorKind::VerificationFailed,
            format!("verification failed: {detail}"),
        )
    }

    pub fn identical_to_existing(existing: impl Into<PathBuf>) -> Self {
        let existing = existing.into();
        Self::new(
            ErrorKind::IdenticalToExisting,
            format!("identical to existing backup: {}", existing.display()),
        )
        .with_path(existing)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Message fragments that indicate an out-of-space condition across the
/// platforms we care about.
const DISK_FULL_MARKERS: &[&str] = &[
    "no space left on device",
    "disk full",
    "not enough space",
    "quota exceeded",
];

const PERMISSION_MARKERS: &[&str] = &[
    "permission denied",
    "access denied",
    "operation not permitted",
];

const NOT_FOUND_MARKERS: &[&str] = &["no such file or directory"];

/// Classify an OS error observed while touching `path`.
///
/// Matches first on `io::ErrorKind`, then on the raw OS code (ENOSPC), and
/// finally on case-insensitive message substrings so that portable error
/// texts are recognized regardless of origin.
pub fn classify_io(err: io::Error, context: impl Into<String>, path: impl Into<PathBuf>) -> Error {
    let kind = classify_kind(&err);
    let context = context.into();
    let path = path.into();
    Error {
        kind,
        message: format!("{context}: {}", path.display()),
        path: Some(path),
        source: Some(err),
    }
}

fn classify_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => return ErrorKind::FileNotFound,
        io::ErrorKind::PermissionDenied => return ErrorKind::Permission,
        _ => {}
    }

    // ENOSPC on Linux and macOS
    if err.raw_os_error() == Some(28) {
        return ErrorKind::DiskFull;
    }

    let message = err.to_string().to_ascii_lowercase();
    if DISK_FULL_MARKERS.iter().any(|m| message.contains(m)) {
        return ErrorKind::DiskFull;
    }
    if PERMISSION_MARKERS.iter().any(|m| message.contains(m)) {
        return ErrorKind::Permission;
    }
    if NOT_FOUND_MARKERS.iter().any(|m| message.contains(m)) {
        return ErrorKind::FileNotFound;
    }

    ErrorKind::Io
}
