use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{classify_io, Error, ErrorKind};
use crate::scope::{CleanupHandle, Scope};
use crate::Result;

/// Atomic file publication: write to `<target>.tmp`, fsync, rename.
///
/// The temp path is registered with the scope on creation and released only
/// after a successful rename, so an interrupted operation never leaves a
/// partial artifact under the final name.
#[derive(Debug)]
pub struct AtomicFile<'s> {
    scope: &'s Scope,
    handle: CleanupHandle,
    target: PathBuf,
    tmp: PathBuf,
    file: Option<File>,
}

impl<'s> AtomicFile<'s> {
    pub fn create(target: impl Into<PathBuf>, scope: &'s Scope) -> Result<Self> {
        let target = target.into();
        let tmp = tmp_path(&target);
        let file = File::create(&tmp)
            .map_err(|e| classify_io(e, "unable to create temp file", &tmp))?;
        let handle = scope.register_file(&tmp);
        Ok(Self {
            scope,
            handle,
            target,
            tmp,
            file: Some(file),
        })
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let tmp = self.tmp.clone();
        self.file_mut()?
            .write_all(bytes)
            .map_err(|e| classify_io(e, "unable to write temp file", tmp))
    }

    pub fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::Io, "temp file handle already taken"))
    }

    /// Hand the handle to a streaming encoder. Must be returned with
    /// [`restore_file`](AtomicFile::restore_file) before publication.
    pub fn take_file(&mut self) -> Result<File> {
        self.file
            .take()
            .ok_or_else(|| Error::new(ErrorKind::Io, "temp file handle already taken"))
    }

    pub fn restore_file(&mut self, file: File) {
        self.file = Some(file);
    }

    /// Flush, fsync, rename to the target, and release the scope
    /// registration. Returns the published path.
    pub fn publish(mut self) -> Result<PathBuf> {
        let file = self
            .file
            .take()
            .ok_or_else(|| Error::new(ErrorKind::Io, "temp file handle already taken"))?;
        file.sync_all()
            .map_err(|e| classify_io(e, "unable to sync temp file", &self.tmp))?;
        drop(file);

        fs::rename(&self.tmp, &self.target)
            .map_err(|e| classify_io(e, "unable to publish", &self.target))?;
        self.scope.release(self.handle);
        Ok(std::mem::take(&mut self.target))
    }
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write a small payload atomically in one call.
pub fn write_atomic(target: impl Into<PathBuf>, bytes: &[u8], scope: &Scope) -> Result<PathBuf> {
    let mut file = AtomicFile::create(target, scope)?;
    file.write_all(bytes)?;
    file.publish()
}
