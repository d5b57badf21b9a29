use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Mutex;

/// Owns transient resources for one operation and guarantees their release
/// on every exit path, including panic.
///
/// Registration is O(1) and may happen from multiple threads of the same
/// operation. Cleaners run in reverse insertion order; one failing cleaner
/// never stops the others. A handle that has been [`release`](Scope::release)d
/// (because a rename published the artifact) is skipped.
#[derive(Debug, Default)]
pub struct Scope {
    slots: Mutex<Vec<Option<Cleaner>>>,
}

/// Identifies one registered resource within its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupHandle(usize);

enum Cleaner {
    TempFile(PathBuf),
    TempDir(PathBuf),
    Custom {
        description: String,
        run: Box<dyn FnOnce() -> io::Result<()> + Send>,
    },
}

impl std::fmt::Debug for Cleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cleaner::TempFile(p) => f.debug_tuple("TempFile").field(p).finish(),
            Cleaner::TempDir(p) => f.debug_tuple("TempDir").field(p).finish(),
            Cleaner::Custom { description, .. } => {
                f.debug_tuple("Custom").field(description).finish()
            }
        }
    }
}

/// One cleaner that failed during close. Recorded, never fatal.
#[derive(Debug)]
pub struct CleanupFailure {
    pub description: String,
    pub error: io::Error,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a temp file; removed on close unless released.
    pub fn register_file(&self, path: impl Into<PathBuf>) -> CleanupHandle {
        self.push(Cleaner::TempFile(path.into()))
    }

    /// Track a temp directory; removed recursively on close unless released.
    pub fn register_dir(&self, path: impl Into<PathBuf>) -> CleanupHandle {
        self.push(Cleaner::TempDir(path.into()))
    }

    /// Track an arbitrary cleanup action.
    pub fn register_fn(
        &self,
        description: impl Into<String>,
        run: impl FnOnce() -> io::Result<()> + Send + 'static,
    ) -> CleanupHandle {
        self.push(Cleaner::Custom {
            description: description.into(),
            run: Box::new(run),
        })
    }

    /// Forget a handle so a successfully published artifact is not deleted.
    pub fn release(&self, handle: CleanupHandle) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(handle.0) {
            *slot = None;
        }
    }

    /// Run all remaining cleaners in reverse insertion order, collecting
    /// failures.
    pub fn close(self) -> Vec<CleanupFailure> {
        let slots = {
            let mut guard = self.slots.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        run_cleaners(slots)
    }

    /// Run `body` against a fresh scope; on unwind the cleaners still run
    /// before the panic resumes.
    pub fn run_guarded<T>(body: impl FnOnce(&Scope) -> T) -> T {
        let scope = Scope::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&scope)));
        scope.close();
        match outcome {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn push(&self, cleaner: Cleaner) -> CleanupHandle {
        let mut slots = self.slots.lock().unwrap();
        slots.push(Some(cleaner));
        CleanupHandle(slots.len() - 1)
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let slots = {
            let mut guard = self.slots.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        // Failures at drop time have nowhere to go.
        let _ = run_cleaners(slots);
    }
}

fn run_cleaners(mut slots: Vec<Option<Cleaner>>) -> Vec<CleanupFailure> {
    let mut failures = Vec::new();
    while let Some(slot) = slots.pop() {
        let Some(cleaner) = slot else { continue };
        let (description, result) = match cleaner {
            Cleaner::TempFile(path) => {
                let result = match fs::remove_file(&path) {
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                    other => other,
                };
                (format!("remove temp file {}", path.display()), result)
            }
            Cleaner::TempDir(path) => {
                let result = match fs::remove_dir_all(&path) {
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                    other => other,
                };
                (format!("remove temp dir {}", path.display()), result)
            }
            Cleaner::Custom { description, run } => (description, run()),
        };
        if let Err(error) = result {
            failures.push(CleanupFailure { description, error });
        }
    }
    failures
}
