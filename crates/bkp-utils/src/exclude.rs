use crate::error::Error;
use crate::Result;

/// A compiled set of exclusion patterns.
///
/// Paths presented for matching are forward-slash relatives: never a leading
/// `/`, never `.`. Three pattern classes are recognized:
///
/// - `vendor/`: directory-rooted exclusion at any depth; matches everything
///   under a directory whose path matches the stem.
/// - `foo/bar/*`, `**/cache`: anchored path globs; `*` and `?` do not cross
///   `/`, `**` does.
/// - `*.log`, `.DS_Store`: bare filename globs; match any path segment.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

#[derive(Debug, Clone)]
enum Pattern {
    /// Trailing-`/` pattern. `deep_stem` is the stem with `**/` prepended so
    /// a single-segment stem matches at any depth.
    Directory { stem: String, deep_stem: String },
    /// Pattern containing `/`: matched against the whole relative path.
    Anchored { glob: String },
    /// Bare pattern: matched against each path segment.
    Segment { glob: String },
}

impl PatternSet {
    /// Compile a pattern list. Fails with a configuration error when a
    /// pattern is empty or carries an unclosed character class.
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            compiled.push(Pattern::compile(raw)?);
        }
        Ok(Self { patterns: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Does any pattern exclude this file path?
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path, false))
    }

    /// Does any pattern exclude this directory path?
    ///
    /// Directory-rooted patterns match the directory itself here, which lets
    /// a walker prune the whole subtree instead of filtering per file.
    pub fn matches_dir(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path, true))
    }
}

impl Pattern {
    fn compile(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::config("empty exclusion pattern"));
        }
        validate_glob(raw)?;

        if let Some(stem) = raw.strip_suffix('/') {
            if stem.is_empty() {
                return Err(Error::config("exclusion pattern `/` has no stem"));
            }
            return Ok(Pattern::Directory {
                deep_stem: format!("**/{stem}"),
                stem: stem.to_string(),
            });
        }
        if raw.contains('/') {
            return Ok(Pattern::Anchored {
                glob: raw.to_string(),
            });
        }
        Ok(Pattern::Segment {
            glob: raw.to_string(),
        })
    }

    fn matches(&self, path: &str, is_dir: bool) -> bool {
        match self {
            Pattern::Directory { stem, deep_stem } => {
                let stem_hits = |candidate: &str| {
                    glob_match(stem.as_bytes(), candidate.as_bytes())
                        || glob_match(deep_stem.as_bytes(), candidate.as_bytes())
                };
                if proper_prefixes(path).any(|p| stem_hits(p)) {
                    return true;
                }
                // The directory itself is excluded, files inside it are
                // covered by the prefix check above.
                is_dir && stem_hits(path)
            }
            Pattern::Anchored { glob } => glob_match(glob.as_bytes(), path.as_bytes()),
            Pattern::Segment { glob } => path
                .split('/')
                .any(|seg| glob_match(glob.as_bytes(), seg.as_bytes())),
        }
    }
}

/// Proper prefixes of `path` at `/` boundaries: `a/b/c` yields `a`, `a/b`.
fn proper_prefixes(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

/// Reject patterns the matcher cannot interpret (currently: an unclosed
/// `[...]` class).
fn validate_glob(pattern: &str) -> Result<()> {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            match scan_class_end(&bytes[i..]) {
                Some(len) => i += len,
                None => {
                    return Err(Error::config(format!(
                        "unclosed character class in exclusion pattern `{pattern}`"
                    )));
                }
            }
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Length of a `[...]` class starting at the slice head, or None when
/// unclosed. A `]` directly after `[` (or after negation) is a literal.
fn scan_class_end(class: &[u8]) -> Option<usize> {
    let mut i = 1;
    if i < class.len() && (class[i] == b'!' || class[i] == b'^') {
        i += 1;
    }
    let mut first = true;
    while i < class.len() {
        if class[i] == b']' && !first {
            return Some(i + 1);
        }
        first = false;
        i += 1;
    }
    None
}

/// Shell-glob matching over bytes. `*` and `?` never cross `/`; a `**`
/// component crosses directory boundaries; `[...]` supports ranges and
/// `!`/`^` negation.
fn glob_match(pat: &[u8], text: &[u8]) -> bool {
    if pat.is_empty() {
        return text.is_empty();
    }
    match pat[0] {
        b'*' => {
            if pat.len() > 1 && pat[1] == b'*' {
                let mut rest = 2;
                while rest < pat.len() && pat[rest] == b'*' {
                    rest += 1;
                }
                if rest == pat.len() {
                    // Trailing `**` swallows the remainder.
                    return true;
                }
                if pat[rest] == b'/' {
                    let tail = &pat[rest + 1..];
                    // Zero directories...
                    if glob_match(tail, text) {
                        return true;
                    }
                    // ...or skip whole leading components.
                    for (i, &b) in text.iter().enumerate() {
                        if b == b'/' && glob_match(tail, &text[i + 1..]) {
                            return true;
                        }
                    }
                    return false;
                }
                // `**` glued to other characters spans slashes.
                let tail = &pat[rest..];
                return (0..=text.len()).any(|i| glob_match(tail, &text[i..]));
            }
            let tail = &pat[1..];
            let mut i = 0;
            loop {
                if glob_match(tail, &text[i..]) {
                    return true;
                }
                if i >= text.len() || text[i] == b'/' {
                    return false;
                }
                i += 1;
            }
        }
        b'?' => !text.is_empty() && text[0] != b'/' && glob_match(&pat[1..], &text[1..]),
        b'[' => {
            if text.is_empty() || text[0] == b'/' {
                return false;
            }
            match match_class(pat, text[0]) {
                Some((matched, next)) => matched && glob_match(&pat[next..], &text[1..]),
                None => false,
            }
        }
        literal => {
            !text.is_empty() && text[0] == literal && glob_match(&pat[1..], &text[1..])
        }
    }
}

/// Match one character against the `[...]` class at the head of `pat`.
/// Returns `(matched, bytes consumed)`, or None when the class is unclosed.
fn match_class(pat: &[u8], ch: u8) -> Option<(bool, usize)> {
    let mut i = 1;
    let mut negated = false;
    if i < pat.len() && (pat[i] == b'!' || pat[i] == b'^') {
        negated = true;
        i += 1;
    }
    let mut matched = false;
    let mut first = true;
    while i < pat.len() {
        let c = pat[i];
        if c == b']' && !first {
            return Some((matched != negated, i + 1));
        }
        first = false;
        if i + 2 < pat.len() && pat[i + 1] == b'-' && pat[i + 2] != b']' {
            if c <= ch && ch <= pat[i + 2] {
                matched = true;
            }
            i += 3;
        } else {
            if c == ch {
                matched = true;
            }
            i += 1;
        }
    }
    None
}
