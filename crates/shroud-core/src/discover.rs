//! Package discovery for the binary phase.
//!
//! Reads the module path from `go.mod`, walks the project tree for
//! subpackages, and optionally extracts third-party module paths from the
//! require list. The result is a replacement table keyed longest-first so
//! that subpackage paths are patched before their parents.

use crate::binary::ReplacementSpec;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Standard-library package names whose symbol prefixes are safe to patch.
///
/// Reflection, unsafe, and crypto packages are deliberately absent: some of
/// their implementations observe their own names at runtime.
pub const STANDARD_PACKAGES: &[&str] = &[
    "main", "runtime", "sync", "syscall", "fmt", "io", "bufio", "os", "log", "net", "http",
    "strings", "bytes", "strconv", "unicode", "regexp", "encoding", "json", "xml", "base64",
    "hex", "time", "math", "sort", "container", "list", "heap", "path", "filepath", "errors",
    "context", "compress", "gzip", "zlib", "hash", "crc32", "crc64", "fnv",
];

/// Speculative subpackage directories commonly present in Go modules
const COMMON_SUBDIRS: &[&str] = &[
    "internal", "pkg", "cmd", "api", "lib", "core", "common", "util", "utils", "proto",
    "protobuf",
];

/// Read the module path from the project's `go.mod`.
pub fn module_path(project: &Path) -> Result<String> {
    let go_mod = project.join("go.mod");
    let text = std::fs::read_to_string(&go_mod).map_err(|_| Error::missing_module(project))?;
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("module "))
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .ok_or_else(|| Error::missing_module(project))
}

/// Walk the project tree for directories containing non-test Go files and
/// return their package paths, longest first.
pub fn project_packages(project: &Path, module: &str) -> Vec<String> {
    let mut packages = BTreeSet::new();
    packages.insert(module.to_string());

    for entry in WalkDir::new(project)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(name.starts_with('.') && e.depth() > 0)
                && name != "vendor"
                && name != "testdata"
                && name != "node_modules"
        })
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_dir() || entry.depth() == 0 {
            continue;
        }
        if !has_go_files(entry.path()) {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(project) {
            let rel = rel.to_string_lossy().replace('\\', "/");
            packages.insert(format!("{module}/{rel}"));
        }
    }

    let mut result: Vec<String> = packages.into_iter().collect();
    result.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    debug!(count = result.len(), "discovered project packages");
    result
}

fn has_go_files(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(|e| e.ok()).any(|e| {
        let name = e.file_name().to_string_lossy().to_string();
        name.ends_with(".go") && !name.ends_with("_test.go")
    })
}

/// Extract third-party module paths from the `go.mod` require list,
/// including parent paths and common speculative subpackages, longest
/// first.
pub fn third_party_packages(project: &Path, module: &str) -> Result<Vec<String>> {
    let go_mod = project.join("go.mod");
    let text = std::fs::read_to_string(&go_mod).map_err(|_| Error::missing_module(project))?;

    let mut packages = BTreeSet::new();
    for line in text.lines() {
        let line = line.trim();
        // `require path vX.Y.Z` or a line inside a require block
        let candidate = line.strip_prefix("require ").unwrap_or(line);
        let mut parts = candidate.split_whitespace();
        let (Some(path), Some(version)) = (parts.next(), parts.next()) else {
            continue;
        };
        if !version.starts_with('v') {
            continue;
        }
        if !path.contains('.') || !path.contains('/') {
            continue; // standard library or malformed
        }
        if path == module || path.starts_with(&format!("{module}/")) {
            continue;
        }
        add_with_parents(path, &mut packages);
    }

    let mut result: Vec<String> = packages.into_iter().collect();
    result.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    Ok(result)
}

fn add_with_parents(path: &str, packages: &mut BTreeSet<String>) {
    packages.insert(path.to_string());
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() > 3 {
        for i in 3..parts.len() {
            packages.insert(parts[..i].join("/"));
        }
    }
    for sub in COMMON_SUBDIRS {
        packages.insert(format!("{path}/{sub}"));
    }
}

/// Generate the replacement token for the package at `index`
/// (`a`..`z`, then `aa`, `ab`, ...).
pub fn short_name(index: usize) -> String {
    if index < 26 {
        return ((b'a' + index as u8) as char).to_string();
    }
    let first = (index / 26 - 1) as u8;
    let second = (index % 26) as u8;
    format!("{}{}", (b'a' + first) as char, (b'a' + second) as char)
}

/// Build the substitution table for a discovered package list.
pub fn build_replacement_table(packages: &[String]) -> Vec<ReplacementSpec> {
    packages
        .iter()
        .enumerate()
        .map(|(i, pkg)| ReplacementSpec::new(pkg.clone(), short_name(i)))
        .collect()
}

/// Discover the full replacement table for a project.
///
/// A missing or unreadable `go.mod` degrades to a minimal default table
/// (logged as a warning) rather than failing the phase.
pub fn discover(project: &Path, include_third_party: bool) -> Vec<ReplacementSpec> {
    let module = match module_path(project) {
        Ok(module) => module,
        Err(e) => {
            warn!(error = %e, "package discovery degraded to the default table");
            return build_replacement_table(&["main".to_string()]);
        }
    };

    let mut packages = project_packages(project, &module);
    packages.extend(STANDARD_PACKAGES.iter().map(|s| s.to_string()));
    if include_third_party {
        match third_party_packages(project, &module) {
            Ok(third_party) => packages.extend(third_party),
            Err(e) => warn!(error = %e, "third-party discovery failed"),
        }
    }
    build_replacement_table(&packages)
}
