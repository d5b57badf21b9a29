use std::path::PathBuf;
use std::sync::Mutex;

use bkp_archive::Archive;
use bkp_utils::ErrorKind;

/// Structured outcome events. The engine emits these; a formatter decides
/// how they read. No user-facing strings are baked in here.
#[derive(Debug, Clone)]
pub enum Event {
    CreatedArchive {
        path: PathBuf,
        git: Option<(String, String)>,
        note: Option<String>,
    },
    CreatedIncrementalArchive {
        path: PathBuf,
        base: String,
    },
    /// The tree already matches the most recent full archive.
    IdenticalArchive {
        existing: PathBuf,
    },
    CreatedBackup {
        path: PathBuf,
    },
    /// The file already matches its most recent backup.
    IdenticalBackup {
        existing: PathBuf,
    },
    DryRunList {
        files: Vec<String>,
        target: PathBuf,
    },
    NoFilesModified,
    Verified {
        archive: PathBuf,
    },
    VerificationFailed {
        archive: PathBuf,
        errors: Vec<String>,
    },
    ListArchives {
        archives: Vec<Archive>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

pub trait EventSink {
    fn emit(&self, event: Event);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Records events for inspection in tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
