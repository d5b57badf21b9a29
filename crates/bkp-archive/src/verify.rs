use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bkp_hash::Sha256Hasher;
use bkp_utils::atomic::write_atomic;
use bkp_utils::error::classify_io;
use bkp_utils::path::ensure_dir;
use bkp_utils::{CancelToken, Result, Scope, IO_CHUNK_SIZE};

use crate::manifest::{ChecksumManifest, CHECKSUM_ENTRY_NAME};

/// Directory under the archive directory holding verification sidecars.
pub const METADATA_DIR: &str = ".metadata";

/// Outcome of one verification run. Pure data; persisting it is the
/// caller's choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStatus {
    /// RFC 3339 timestamp of the run.
    pub verified_at: String,
    pub is_verified: bool,
    pub has_checksums: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl VerificationStatus {
    fn failed(verified_at: String, has_checksums: bool, errors: Vec<String>) -> Self {
        Self {
            verified_at,
            is_verified: false,
            has_checksums,
            errors,
        }
    }
}

/// Re-hash every entry of the archive at `path` against its embedded
/// manifest and check that every entry is readable.
///
/// An archive without a `.checksums` entry yields a soft
/// `{is_verified: false, has_checksums: false}` result rather than an
/// error. Only opening the archive file itself can fail the call.
pub fn verify_archive(
    path: &Path,
    verified_at: String,
    cancel: &CancelToken,
) -> Result<VerificationStatus> {
    let file = File::open(path).map_err(|e| classify_io(e, "unable to open archive", path))?;
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(e) => {
            return Ok(VerificationStatus::failed(
                verified_at,
                false,
                vec![format!("unreadable archive: {e}")],
            ));
        }
    };

    let mut errors = Vec::new();
    let manifest = match read_manifest(&mut archive, cancel)? {
        ManifestLookup::Missing => {
            return Ok(VerificationStatus::failed(
                verified_at,
                false,
                vec!["no checksums".to_string()],
            ));
        }
        ManifestLookup::Invalid(detail) => {
            errors.push(detail);
            None
        }
        ManifestLookup::Found(manifest) => Some(manifest),
    };

    let mut seen = BTreeSet::new();
    for index in 0..archive.len() {
        cancel.check()?;
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                errors.push(format!("unreadable entry #{index}: {e}"));
                continue;
            }
        };
        let entry_name = entry.name().to_string();
        if entry_name == CHECKSUM_ENTRY_NAME || entry.is_dir() {
            continue;
        }
        seen.insert(entry_name.clone());

        // Readability pass and re-hash share one stream.
        let mut hasher = Sha256Hasher::new();
        let mut chunk = vec![0u8; IO_CHUNK_SIZE];
        let mut readable = true;
        loop {
            cancel.check()?;
            match entry.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => hasher.update(&chunk[..n]),
                Err(e) => {
                    errors.push(format!("unreadable entry {entry_name}: {e}"));
                    readable = false;
                    break;
                }
            }
        }
        if !readable {
            continue;
        }

        if let Some(manifest) = &manifest {
            let actual = hasher.finalize_hex();
            match manifest.get(&entry_name) {
                Some(expected) if expected == actual => {}
                Some(_) => errors.push(format!("checksum mismatch for {entry_name}")),
                None => errors.push(format!("missing from manifest: {entry_name}")),
            }
        }
    }

    if let Some(manifest) = &manifest {
        for (name, _) in manifest.iter() {
            if !seen.contains(name) {
                errors.push(format!("listed in manifest but absent from archive: {name}"));
            }
        }
    }

    Ok(VerificationStatus {
        verified_at,
        is_verified: errors.is_empty(),
        has_checksums: true,
        errors,
    })
}

enum ManifestLookup {
    Found(ChecksumManifest),
    Invalid(String),
    Missing,
}

fn read_manifest(
    archive: &mut zip::ZipArchive<File>,
    cancel: &CancelToken,
) -> Result<ManifestLookup> {
    let mut entry = match archive.by_name(CHECKSUM_ENTRY_NAME) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(ManifestLookup::Missing),
        Err(e) => {
            return Ok(ManifestLookup::Invalid(format!(
                "unreadable checksum manifest: {e}"
            )));
        }
    };

    let mut raw = Vec::new();
    let mut chunk = vec![0u8; IO_CHUNK_SIZE];
    loop {
        cancel.check()?;
        match entry.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => raw.extend_from_slice(&chunk[..n]),
            Err(e) => {
                return Ok(ManifestLookup::Invalid(format!(
                    "unreadable checksum manifest: {e}"
                )));
            }
        }
    }

    match ChecksumManifest::from_json_bytes(&raw) {
        Ok(manifest) => Ok(ManifestLookup::Found(manifest)),
        Err(e) => Ok(ManifestLookup::Invalid(format!(
            "invalid checksum manifest: {e}"
        ))),
    }
}

/// `<archive_dir>/.metadata/<archive_name>.json`
pub fn sidecar_path(archive_dir: &Path, archive_name: &str) -> PathBuf {
    archive_dir
        .join(METADATA_DIR)
        .join(format!("{archive_name}.json"))
}

/// Atomically persist a verification result next to its archive.
pub fn persist_status(
    archive_dir: &Path,
    archive_name: &str,
    status: &VerificationStatus,
    dir_mode: u32,
    scope: &Scope,
) -> Result<PathBuf> {
    ensure_dir(&archive_dir.join(METADATA_DIR), dir_mode)?;
    let json = serde_json::to_vec_pretty(status)
        .map_err(|e| bkp_utils::Error::new(bkp_utils::ErrorKind::Io, e.to_string()))?;
    write_atomic(sidecar_path(archive_dir, archive_name), &json, scope)
}

/// Load a previously persisted verification result, if any.
pub fn load_status(archive_dir: &Path, archive_name: &str) -> Option<VerificationStatus> {
    let raw = std::fs::read(sidecar_path(archive_dir, archive_name)).ok()?;
    serde_json::from_slice(&raw).ok()
}
