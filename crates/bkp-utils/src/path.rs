use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{classify_io, Error, ErrorKind};
use crate::Result;

/// Relative path of `path` under `root` as a forward-slash string.
///
/// Snapshot and archive entries are UTF-8 forward-slash relatives with no
/// leading `/`; a path that is not valid UTF-8 cannot be represented.
pub fn rel_string(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        Error::new(
            ErrorKind::InvalidDirectory,
            format!("{} is outside {}", path.display(), root.display()),
        )
    })?;
    let rel = rel.to_str().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidFileType,
            format!("non-UTF-8 path: {}", rel.display()),
        )
    })?;
    if std::path::MAIN_SEPARATOR == '/' {
        Ok(rel.to_string())
    } else {
        Ok(rel.replace(std::path::MAIN_SEPARATOR, "/"))
    }
}

/// Create `dir` (and parents) if needed, applying `mode` to directories
/// created here. An existing non-directory at the path is rejected.
pub fn ensure_dir(dir: &Path, mode: u32) -> Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(Error::new(
                ErrorKind::InvalidDirectory,
                format!("not a directory: {}", dir.display()),
            )
            .with_path(dir));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(classify_io(e, "unable to stat directory", dir)),
    }

    fs::create_dir_all(dir).map_err(|e| classify_io(e, "unable to create directory", dir))?;
    set_mode(dir, mode)
}

/// Apply a unix permission mode. A no-op elsewhere.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| classify_io(e, "unable to set permissions", path))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

/// File name of `path` as a string, or an `InvalidFileType` error.
pub fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidFileType,
                format!("path has no usable file name: {}", path.display()),
            )
        })
}

/// Base name of the current directory, used as archive prefix or subdir.
pub fn dir_basename(dir: &Path) -> Option<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

/// Resolve `raw` against `base` unless it is already absolute.
pub fn resolve_from(base: &Path, raw: &str) -> PathBuf {
    let p = Path::new(raw);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}
