//! Archive and backup name construction. Naming is pure: no clock reads,
//! no filesystem access.

use crate::{ARCHIVE_EXT, UPDATE_MARKER};

/// Inputs for one name. The timestamp is preformatted (`YYYY-MM-DD-HH-MM`)
/// and identical for every name built in one invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameParts<'a> {
    /// Basename of the working directory, present only when archives are
    /// not nested under a per-directory subdirectory.
    pub prefix: Option<&'a str>,
    pub timestamp: &'a str,
    pub branch: Option<&'a str>,
    pub hash: Option<&'a str>,
    pub note: Option<&'a str>,
}

impl<'a> NameParts<'a> {
    fn git_tokens(&self) -> Option<(&'a str, &'a str)> {
        match (self.branch, self.hash) {
            (Some(branch), Some(hash)) if !branch.is_empty() && !hash.is_empty() => {
                Some((branch, hash))
            }
            _ => None,
        }
    }
}

/// `[prefix-]T[=branch=hash][=note].zip`
pub fn full_archive_name(parts: &NameParts) -> String {
    let mut name = String::new();
    if let Some(prefix) = parts.prefix {
        if !prefix.is_empty() {
            name.push_str(prefix);
            name.push('-');
        }
    }
    name.push_str(parts.timestamp);
    push_suffix(&mut name, parts);
    name.push_str(ARCHIVE_EXT);
    name
}

/// `<base-sans-.zip>_update=T[=branch=hash][=note].zip`
pub fn incremental_archive_name(base: &str, parts: &NameParts) -> String {
    let stem = base.strip_suffix(ARCHIVE_EXT).unwrap_or(base);
    let mut name = String::with_capacity(stem.len() + UPDATE_MARKER.len() + 24);
    name.push_str(stem);
    name.push_str(UPDATE_MARKER);
    name.push_str(parts.timestamp);
    push_suffix(&mut name, parts);
    name.push_str(ARCHIVE_EXT);
    name
}

/// `<source-file-name>-T[=note]`; single-file backups carry no extension
/// of their own.
pub fn backup_name(source_name: &str, timestamp: &str, note: Option<&str>) -> String {
    let mut name = format!("{source_name}-{timestamp}");
    if let Some(note) = note {
        if !note.is_empty() {
            name.push('=');
            name.push_str(note);
        }
    }
    name
}

fn push_suffix(name: &mut String, parts: &NameParts) {
    if let Some((branch, hash)) = parts.git_tokens() {
        name.push('=');
        name.push_str(branch);
        name.push('=');
        name.push_str(hash);
    }
    if let Some(note) = parts.note {
        if !note.is_empty() {
            name.push('=');
            name.push_str(note);
        }
    }
}

/// What an archive name reveals about the archive. Parsing is best-effort
/// and never fails: tokens that cannot be attributed become part of the
/// note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedName {
    pub is_incremental: bool,
    /// Name of the base archive, present iff incremental.
    pub base_archive: Option<String>,
    pub branch: Option<String>,
    pub hash: Option<String>,
    pub note: Option<String>,
}

pub fn parse_archive_name(name: &str) -> ParsedName {
    let stem = name.strip_suffix(ARCHIVE_EXT).unwrap_or(name);

    let (is_incremental, base_archive, tail) = match stem.find(UPDATE_MARKER) {
        Some(idx) => (
            true,
            Some(format!("{}{ARCHIVE_EXT}", &stem[..idx])),
            &stem[idx + UPDATE_MARKER.len()..],
        ),
        None => (false, None, stem),
    };

    // tail is `T[=branch=hash][=note]`; the leading token is the timestamp
    // (with an optional `prefix-` glued on) and carries no `=`.
    let mut tokens = tail.split('=');
    let _timestamp = tokens.next();
    let rest: Vec<&str> = tokens.collect();
    let (branch, hash, note) = match rest.as_slice() {
        [] => (None, None, None),
        [note] => (None, None, Some(note.to_string())),
        [branch, hash] => (Some(branch.to_string()), Some(hash.to_string()), None),
        [branch, hash, note @ ..] => (
            Some(branch.to_string()),
            Some(hash.to_string()),
            Some(note.join("=")),
        ),
    };

    ParsedName {
        is_incremental,
        base_archive,
        branch,
        hash,
        note,
    }
}
