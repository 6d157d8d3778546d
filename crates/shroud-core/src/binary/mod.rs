//! Binary symbol obfuscation.
//!
//! Operates on an already-compiled executable, independent of the source
//! phases. The flow:
//!
//! 1. Sniff the container family from the leading bytes (ELF, PE, Mach-O).
//! 2. Enumerate format-appropriate candidate sections and find the runtime
//!    metadata block by its magic; fall back to a whole-file scan. The match
//!    bounds a [`SearchWindow`].
//! 3. Patch package-name prefixes inside the window (strict neighbor
//!    checks, equal-length only).
//! 4. Patch full project import paths anywhere in the file (denylist
//!    guarded, zero-padded).
//! 5. Write the patched buffer to the artifact path and keep the pre-patch
//!    bytes in a `.backup` file alongside it. The buffer handed in by the
//!    caller is never mutated in place.

pub mod namegen;
pub mod patch;
pub mod pclntab;

use crate::error::{Error, Result};
use object::{Object, ObjectSection};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use namegen::NaturalNameGenerator;
pub use patch::{patch_paths, patch_prefixes, PassStats, ReplacementSpec};
pub use pclntab::{SearchWindow, PCLNTAB_MAGICS};

/// Supported executable container families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    /// ELF (Linux and most Unix)
    Elf,
    /// PE (Windows)
    Pe,
    /// Mach-O (macOS)
    MachO,
}

impl std::fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryFormat::Elf => write!(f, "ELF"),
            BinaryFormat::Pe => write!(f, "PE"),
            BinaryFormat::MachO => write!(f, "Mach-O"),
        }
    }
}

/// Identify the container family from the leading bytes.
pub fn sniff_format(data: &[u8]) -> Option<BinaryFormat> {
    if data.len() < 4 {
        return None;
    }
    if data[0] == 0x7F && &data[1..4] == b"ELF" {
        return Some(BinaryFormat::Elf);
    }
    if &data[0..2] == b"MZ" {
        return Some(BinaryFormat::Pe);
    }
    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if matches!(magic, 0xfeed_face | 0xcefa_edfe | 0xfeed_facf | 0xcffa_edfe) {
        return Some(BinaryFormat::MachO);
    }
    None
}

/// Parsed view of a compiled artifact
#[derive(Debug)]
pub struct BinaryImage {
    /// The raw file contents
    pub data: Vec<u8>,
    /// Detected container family
    pub format: BinaryFormat,
    sections: Vec<(String, Range<usize>)>,
}

impl BinaryImage {
    /// Parse a binary buffer: sniff the format and read its section table.
    ///
    /// An unrecognized format is fatal; a section table that fails to parse
    /// merely degrades discovery to the whole-file scan.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let format = sniff_format(&data).ok_or_else(|| {
            let lead: Vec<String> = data.iter().take(4).map(|b| format!("{b:02x}")).collect();
            Error::unsupported_format(format!("leading bytes [{}]", lead.join(" ")))
        })?;

        let sections = match object::File::parse(&*data) {
            Ok(file) => file
                .sections()
                .filter_map(|section| {
                    let name = section.name().ok()?.to_string();
                    let (offset, size) = section.file_range()?;
                    Some((name, offset as usize..(offset + size) as usize))
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to parse section table, falling back to full scan");
                Vec::new()
            }
        };

        debug!(%format, sections = sections.len(), "parsed binary image");
        Ok(Self {
            data,
            format,
            sections,
        })
    }

    /// File-offset ranges of the sections that usually hold the metadata
    /// block for this format.
    pub fn candidate_sections(&self) -> Vec<Range<usize>> {
        let names: &[&str] = match self.format {
            BinaryFormat::Elf => &[".gopclntab", ".data.rel.ro"],
            BinaryFormat::Pe => &[".rdata", ".data"],
            BinaryFormat::MachO => &["__gopclntab", "__data"],
        };
        self.sections
            .iter()
            .filter(|(name, _)| names.contains(&name.as_str()))
            .map(|(_, range)| range.clone())
            .collect()
    }
}

/// Configuration for one binary patch invocation
#[derive(Debug, Clone)]
pub struct BinaryPatchConfig {
    /// Patch the metadata window (disable to leave pclntab bytes alone)
    pub patch_pclntab: bool,
    /// Package-name/path substitution table; empty selects a default table
    /// over the common runtime prefixes
    pub specs: Vec<ReplacementSpec>,
    /// Seed for replacement-name generation; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for BinaryPatchConfig {
    fn default() -> Self {
        Self {
            patch_pclntab: true,
            specs: Vec::new(),
            seed: None,
        }
    }
}

/// Outcome of one binary patch invocation
#[derive(Debug)]
pub struct PatchSummary {
    /// Detected container family
    pub format: BinaryFormat,
    /// Metadata window, when one was found
    pub window: Option<SearchWindow>,
    /// Prefix-pass counters
    pub prefixes: PassStats,
    /// Path-pass counters
    pub paths: PassStats,
    /// Whether the artifact was rewritten
    pub modified: bool,
    /// Path of the pre-patch backup, when one was written
    pub backup: Option<PathBuf>,
}

/// Default prefix table used when no replacement specs are supplied
const DEFAULT_PREFIXES: &[&str] = &[
    "main.", "runtime.", "sync.", "fmt.", "os.", "io.", "net.", "http.",
];

/// Patch one compiled artifact.
///
/// The patched bytes replace the file at `path` and the pre-patch bytes are
/// preserved next to it as `<name>.backup`; when nothing is patched the
/// file is left untouched.
pub fn obfuscate_binary(path: &Path, config: &BinaryPatchConfig) -> Result<PatchSummary> {
    let original = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    let image = BinaryImage::parse(original)?;

    let window = pclntab::locate(&image.data, &image.candidate_sections());
    let Some(window) = window else {
        warn!("no metadata block found; binary phase is a no-op");
        return Ok(PatchSummary {
            format: image.format,
            window: None,
            prefixes: PassStats::default(),
            paths: PassStats::default(),
            modified: false,
            backup: None,
        });
    };
    info!(offset = window.start, "found metadata block");

    let mut namegen = match config.seed {
        Some(seed) => NaturalNameGenerator::new(seed),
        None => NaturalNameGenerator::from_entropy(),
    };
    let prefix_specs = build_prefix_specs(&config.specs, &mut namegen);

    let mut patched = image.data.clone();
    let prefixes = if config.patch_pclntab {
        patch_prefixes(&mut patched, &window, &prefix_specs)
    } else {
        debug!("metadata-window pass disabled");
        PassStats::default()
    };
    let paths = patch_paths(&mut patched, &config.specs);

    info!(
        prefixes_applied = prefixes.applied,
        prefixes_skipped = prefixes.skipped,
        paths_applied = paths.applied,
        paths_skipped = paths.skipped,
        "patch passes complete"
    );

    let modified = prefixes.applied > 0 || paths.applied > 0;
    let mut backup = None;
    if modified {
        let backup_path = backup_path_for(path);
        std::fs::write(&backup_path, &image.data)
            .map_err(|e| Error::file_write(&backup_path, e))?;
        std::fs::write(path, &patched).map_err(|e| Error::file_write(path, e))?;
        info!(backup = %backup_path.display(), "wrote patched artifact");
        backup = Some(backup_path);
    }

    Ok(PatchSummary {
        format: image.format,
        window: Some(window),
        prefixes,
        paths,
        modified,
        backup,
    })
}

/// Normalize the substitution table into equal-length, dot-terminated
/// prefix specs; replacements of the wrong length are regenerated.
fn build_prefix_specs(
    specs: &[ReplacementSpec],
    namegen: &mut NaturalNameGenerator,
) -> Vec<ReplacementSpec> {
    if specs.is_empty() {
        return DEFAULT_PREFIXES
            .iter()
            .map(|prefix| ReplacementSpec::new(*prefix, namegen.package_name(prefix, prefix.len())))
            .collect();
    }
    specs
        .iter()
        .map(|spec| {
            let mut from = spec.from.clone();
            if !from.ends_with('.') {
                from.push('.');
            }
            let mut to = spec.to.clone();
            if !to.ends_with('.') {
                to.push('.');
            }
            if to.len() != from.len() {
                to = namegen.package_name(&from, from.len());
            }
            ReplacementSpec::new(from, to)
        })
        .collect()
}

fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".backup");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sniff_formats() {
        assert_eq!(sniff_format(b"\x7fELF\x02\x01\x01"), Some(BinaryFormat::Elf));
        assert_eq!(sniff_format(b"MZ\x90\x00"), Some(BinaryFormat::Pe));
        assert_eq!(
            sniff_format(&0xfeed_facfu32.to_le_bytes()),
            Some(BinaryFormat::MachO)
        );
        assert_eq!(sniff_format(b"#!/bin/sh"), None);
        assert_eq!(sniff_format(b"\x7fEL"), None);
    }

    #[test]
    fn test_image_degrades_without_section_table() {
        // A bare magic with garbage after it cannot yield a section table,
        // but parsing must still succeed for the full-scan fallback
        let mut data = b"\x7fELF".to_vec();
        data.extend_from_slice(&[0u8; 64]);
        let image = BinaryImage::parse(data).unwrap();
        assert_eq!(image.format, BinaryFormat::Elf);
        assert!(image.candidate_sections().is_empty());
    }

    #[test]
    fn test_unknown_format_is_fatal() {
        let err = BinaryImage::parse(b"GIF89a....".to_vec()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_build_prefix_specs_equalizes_length() {
        let mut namegen = NaturalNameGenerator::new(1);
        let specs = [ReplacementSpec::new("runtime", "a")];
        let built = build_prefix_specs(&specs, &mut namegen);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].from, "runtime.");
        assert_eq!(built[0].to.len(), "runtime.".len());
        assert!(built[0].to.ends_with('.'));
    }

    #[test]
    fn test_default_table_when_no_specs() {
        let mut namegen = NaturalNameGenerator::new(2);
        let built = build_prefix_specs(&[], &mut namegen);
        assert_eq!(built.len(), DEFAULT_PREFIXES.len());
        for (spec, original) in built.iter().zip(DEFAULT_PREFIXES) {
            assert_eq!(spec.from, *original);
            assert_eq!(spec.to.len(), original.len());
        }
    }

    fn fake_go_binary() -> Vec<u8> {
        let mut data = b"\x7fELF".to_vec();
        data.extend_from_slice(&[0u8; 60]);
        data.extend_from_slice(&PCLNTAB_MAGICS[2].to_le_bytes());
        data.extend_from_slice(b"\x00main.Run\x00main.process\x00runtime.go\x00");
        data.extend_from_slice(b"\x00example.com/app/util\x00");
        data.extend_from_slice(&[0u8; 32]);
        data
    }

    #[test]
    fn test_obfuscate_binary_end_to_end() {
        let dir = tempfile::TempDir::new().unwrap();
        let bin = dir.path().join("app");
        std::fs::write(&bin, fake_go_binary()).unwrap();

        let config = BinaryPatchConfig {
            patch_pclntab: true,
            specs: vec![
                ReplacementSpec::new("main.", "apib."),
                ReplacementSpec::new("example.com/app/util", "a"),
            ],
            seed: Some(7),
        };
        let summary = obfuscate_binary(&bin, &config).unwrap();

        assert!(summary.modified);
        assert_eq!(summary.prefixes.applied, 2);
        assert_eq!(summary.paths.applied, 1);

        let patched = std::fs::read(&bin).unwrap();
        let backup = std::fs::read(summary.backup.unwrap()).unwrap();
        assert_eq!(backup, fake_go_binary());
        assert!(!contains(&patched, b"main.Run"));
        assert!(contains(&patched, b"apib.Run"));
        assert!(!contains(&patched, b"example.com/app/util"));
        // equal-length invariant keeps the file size identical
        assert_eq!(patched.len(), backup.len());
    }

    #[test]
    fn test_no_metadata_block_is_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        let bin = dir.path().join("plain");
        let mut data = b"MZ\x90\x00".to_vec();
        data.extend_from_slice(&[0u8; 128]);
        std::fs::write(&bin, &data).unwrap();

        let summary = obfuscate_binary(&bin, &BinaryPatchConfig::default()).unwrap();
        assert!(!summary.modified);
        assert!(summary.window.is_none());
        assert!(!bin.with_file_name("plain.backup").exists());
        assert_eq!(std::fs::read(&bin).unwrap(), data);
    }

    #[test]
    fn test_pclntab_disabled_skips_window_pass() {
        let dir = tempfile::TempDir::new().unwrap();
        let bin = dir.path().join("app");
        std::fs::write(&bin, fake_go_binary()).unwrap();

        let config = BinaryPatchConfig {
            patch_pclntab: false,
            specs: vec![
                ReplacementSpec::new("main.", "apib."),
                ReplacementSpec::new("example.com/app/util", "a"),
            ],
            seed: Some(7),
        };
        let summary = obfuscate_binary(&bin, &config).unwrap();
        assert_eq!(summary.prefixes.applied, 0);
        assert_eq!(summary.paths.applied, 1);
        let patched = std::fs::read(&bin).unwrap();
        assert!(contains(&patched, b"main.Run"));
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }
}
