//! In-place byte patching of symbol text.
//!
//! Two independent passes with deliberately different safety rules:
//!
//! - **Prefix pass**: package-name prefixes (`main.`, `runtime.`) inside the
//!   metadata window. Neighbor bytes are checked strictly: the byte before
//!   a match must be a separator (never a letter, digit, `_`, `-`, `.`, or
//!   `/`, which would mean the match is the tail of a longer symbol), and
//!   the byte after the prefix must start a plausible identifier or be a
//!   NUL. Replacements must be exactly equal in byte length; anything else
//!   is skipped, never truncated or padded here.
//!
//! - **Path pass**: full project import paths anywhere in the file, guarded
//!   by a denylist of system path fragments. Digits are permitted before a
//!   match (compiler-inserted path markers may be digit-prefixed), and a
//!   shorter replacement is allowed with the remainder zero-padded.
//!
//! The asymmetry between the two digit rules is intentional and recorded in
//! DESIGN.md; do not unify.

use super::pclntab::SearchWindow;
use tracing::{debug, trace};

/// One `old -> new` text substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementSpec {
    /// Text to search for
    pub from: String,
    /// Text to write in its place
    pub to: String,
}

impl ReplacementSpec {
    /// Creates a replacement spec
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Counters for one patch pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    /// Occurrences patched
    pub applied: usize,
    /// Occurrences or specs skipped by a safety rule
    pub skipped: usize,
}

/// Context fragments that mark a match as part of a system or runtime path
pub const SYSTEM_PATH_DENYLIST: &[&[u8]] = &[
    b"/System/Library/",
    b"/usr/lib/",
    b"/usr/local/",
    b"Library/Frameworks/",
    b".framework/",
    b".dylib",
    b"/Cryptexes/",
];

/// Patch package-name prefixes inside the metadata window.
pub fn patch_prefixes(data: &mut [u8], window: &SearchWindow, specs: &[ReplacementSpec]) -> PassStats {
    let mut stats = PassStats::default();
    for spec in specs {
        let from = spec.from.as_bytes();
        let to = spec.to.as_bytes();
        if from.is_empty() {
            continue;
        }
        if from.len() != to.len() {
            // Equal-length invariant: an unequal candidate never touches
            // the metadata block
            debug!(from = %spec.from, to = %spec.to, "skipping unequal-length prefix spec");
            stats.skipped += 1;
            continue;
        }
        let end = window.end.min(data.len()).saturating_sub(from.len());
        let mut pos = window.start;
        while pos <= end {
            if &data[pos..pos + from.len()] == from {
                if is_safe_prefix_site(data, pos, from.len()) {
                    data[pos..pos + to.len()].copy_from_slice(to);
                    stats.applied += 1;
                } else {
                    trace!(offset = pos, from = %spec.from, "unsafe prefix site skipped");
                    stats.skipped += 1;
                }
            }
            pos += 1;
        }
    }
    stats
}

/// Neighbor checks for a prefix match at `pos` of `len` bytes.
pub fn is_safe_prefix_site(data: &[u8], pos: usize, len: usize) -> bool {
    if pos > 0 {
        let prev = data[pos - 1];
        let separator = prev == 0 || (prev < 0x20 && prev != b' ');
        if !separator {
            // A letter, digit, or path punctuation means the match is part
            // of a longer identifier or path, not a true prefix boundary
            if prev.is_ascii_alphanumeric()
                || prev == b'.'
                || prev == b'/'
                || prev == b'_'
                || prev == b'-'
            {
                return false;
            }
        }
    }
    match data.get(pos + len) {
        None => true,
        Some(0) => true,
        Some(next) => next.is_ascii_alphabetic(),
    }
}

/// Patch full project import paths anywhere in the file.
pub fn patch_paths(data: &mut [u8], specs: &[ReplacementSpec]) -> PassStats {
    let mut stats = PassStats::default();
    for spec in specs {
        let from_text = spec.from.trim_end_matches('.');
        // Only multi-segment paths: single words are far too likely to
        // collide with unrelated symbol text
        if !from_text.contains('/') {
            continue;
        }
        let from = from_text.as_bytes();
        let to_text = spec.to.trim_end_matches('.');
        let to = to_text.as_bytes();
        if to.len() > from.len() {
            debug!(from = %from_text, to = %to_text, "skipping over-long path spec");
            stats.skipped += 1;
            continue;
        }
        if data.len() < from.len() {
            continue;
        }
        let mut pos = 0;
        while pos <= data.len() - from.len() {
            if &data[pos..pos + from.len()] == from {
                if is_safe_path_site(data, pos, from.len()) {
                    data[pos..pos + to.len()].copy_from_slice(to);
                    for byte in &mut data[pos + to.len()..pos + from.len()] {
                        *byte = 0;
                    }
                    stats.applied += 1;
                    pos += from.len();
                    continue;
                }
                trace!(offset = pos, from = %from_text, "unsafe path site skipped");
                stats.skipped += 1;
            }
            pos += 1;
        }
    }
    stats
}

/// Neighbor and context checks for a path match at `pos` of `len` bytes.
///
/// Looser than the prefix rule: a digit before the match is fine, and a
/// hyphen after it is fine (version suffixes).
pub fn is_safe_path_site(data: &[u8], pos: usize, len: usize) -> bool {
    if pos > 0 {
        let prev = data[pos - 1];
        if prev.is_ascii_alphabetic() || prev == b'_' {
            return false;
        }
    }
    if let Some(&next) = data.get(pos + len) {
        if next.is_ascii_alphanumeric() || next == b'_' {
            return false;
        }
    }

    // Context denylist: never touch bytes that sit inside a system path
    let before_start = pos.saturating_sub(100);
    let before = &data[before_start..pos];
    for fragment in SYSTEM_PATH_DENYLIST {
        if contains(before, fragment) {
            return false;
        }
    }
    let after_end = data.len().min(pos + len + 50);
    let after = &data[pos + len..after_end];
    if after.starts_with(b".framework") || after.starts_with(b".dylib") {
        return false;
    }
    true
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
