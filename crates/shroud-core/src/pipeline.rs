//! Source-phase orchestration.
//!
//! A strictly ordered batch: collect and parse every file, classify
//! protected names, build per-file scope trees, freeze the global mapping,
//! then copy the project tree and rewrite each parsed file against the
//! frozen state. No phase starts before its predecessor completes; the
//! rewrite phase reads only immutable inputs.
//!
//! Failure policy (mirrored in [`crate::error`]): a file that fails to
//! parse is logged, excluded from the rename universe, and copied through
//! byte-identical; an I/O failure aborts the run.

use crate::classify::{is_standard_library, Classifier, ProtectedSet};
use crate::crypt::LiteralCipher;
use crate::discover;
use crate::error::{Error, Result};
use crate::mapping::{build_mapping, NameGenerator, ObfuscationMapping};
use crate::rewrite::{FileContext, RewriteOptions, Rewriter};
use crate::scope::ScopeTree;
use crate::syntax::ast::File;
use crate::syntax::token::{lex, significant, Tok};
use crate::syntax::parse_file;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Platform and architecture tokens recognized in file-name suffixes and
/// build directives; these gate conditional compilation and must survive
/// any renaming.
pub const PLATFORM_TOKENS: &[&str] = &[
    "linux", "windows", "darwin", "freebsd", "openbsd", "netbsd", "dragonfly", "solaris",
    "plan9", "aix", "android", "ios", "js", "wasm", "unix", "amd64", "386", "arm", "arm64",
    "ppc64", "ppc64le", "mips", "mipsle", "mips64", "mips64le", "s390x", "riscv64",
];

/// Source-phase configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Rename exported identifiers (breaking change, default off)
    pub rename_exported: bool,
    /// Rename Go source files (platform suffixes preserved)
    pub rename_files: bool,
    /// Allow renaming struct fields (see classifier rule 5)
    pub rename_fields: bool,
    /// Encrypt string literals
    pub encrypt_strings: bool,
    /// Inject opaque predicates
    pub opaque_predicates: bool,
    /// Strip comments (default on, directives preserved)
    pub strip_comments: bool,
    /// Protect declarations in reflection-using units (default on)
    pub guard_reflection: bool,
    /// Skip auto-generated files (default on)
    pub skip_generated: bool,
    /// Exclude-by-pattern list
    pub exclude: Vec<String>,
    /// User-supplied protected names
    pub protected: Vec<String>,
    /// Name-generation seed; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rename_exported: false,
            rename_files: false,
            rename_fields: false,
            encrypt_strings: false,
            opaque_predicates: false,
            strip_comments: true,
            guard_reflection: true,
            skip_generated: true,
            exclude: Vec::new(),
            protected: Vec::new(),
            seed: None,
        }
    }
}

/// Counters reported after a run
#[derive(Debug, Default, Clone)]
pub struct Statistics {
    /// Go files seen
    pub total_files: usize,
    /// Files rewritten
    pub rewritten: usize,
    /// Files copied through unmodified (skipped or unparsable)
    pub skipped: usize,
    /// Names in the protected set
    pub protected_names: usize,
    /// Package-scope function groups renamed
    pub functions: usize,
    /// Package-scope variable/constant groups renamed
    pub variables: usize,
    /// String literals encrypted
    pub strings_encrypted: usize,
}

/// One parsed, renamable source file
struct SourceUnit {
    rel: PathBuf,
    text: String,
    tokens: Vec<Tok>,
    file: File,
}

impl SourceUnit {
    /// Package identity: directory plus package clause name
    fn package_key(&self) -> (PathBuf, String) {
        let dir = self.rel.parent().unwrap_or(Path::new("")).to_path_buf();
        (dir, self.file.package.name.clone())
    }

    /// Whether the unit is restricted to a platform or architecture target
    fn has_platform_build_tag(&self) -> bool {
        for tok in &self.tokens {
            if !tok.kind.is_comment() {
                continue;
            }
            let text = tok.text(&self.text);
            if text.starts_with("//go:build")
                || text.starts_with("// +build")
                || text.starts_with("//+build")
            {
                let lower = text.to_ascii_lowercase();
                if PLATFORM_TOKENS.iter().any(|t| lower.contains(t)) {
                    return true;
                }
            }
        }
        false
    }
}

/// The source obfuscation pipeline
pub struct Pipeline {
    root: PathBuf,
    output: PathBuf,
    config: Config,
}

impl Pipeline {
    /// Creates a pipeline from a project root and an output directory
    pub fn new(root: impl Into<PathBuf>, output: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            output: output.into(),
            config,
        }
    }

    /// Execute the full source phase.
    pub fn run(&self) -> Result<Statistics> {
        let mut stats = Statistics::default();
        let mut gen = match self.config.seed {
            Some(seed) => NameGenerator::new(seed),
            None => NameGenerator::from_entropy(),
        };
        let classifier = Classifier {
            rename_exported: self.config.rename_exported,
            rename_fields: self.config.rename_fields,
            guard_reflection: self.config.guard_reflection,
        };

        let module = match discover::module_path(&self.root) {
            Ok(module) => Some(module),
            Err(e) => {
                warn!(error = %e, "module path unavailable; selector protection widens");
                None
            }
        };

        // Phase 1: collect. Parse every renamable file; everything that
        // cannot join the rename universe is copied through untouched.
        info!("phase 1/5: collecting source files");
        let (units, skipped) = self.collect_units()?;
        stats.skipped = skipped.len();
        stats.total_files = units.len() + skipped.len();

        // Phase 2: protected names and import aliases
        info!("phase 2/5: classifying protected names");
        let mut protected = ProtectedSet::new();
        for name in &self.config.protected {
            protected.insert(name.clone());
        }
        for unit in &units {
            classifier.collect(&unit.file, module.as_deref(), &mut protected);
        }
        let mut aliases: HashMap<String, String> = HashMap::new();
        for unit in &units {
            for import in &unit.file.imports {
                let path = import.path_value().to_string();
                if import.local_name().is_some()
                    && is_standard_library(&path)
                    && !aliases.contains_key(&path)
                {
                    aliases.insert(path, gen.import_alias());
                }
            }
        }
        stats.protected_names = protected.len();

        // Phase 3: scope resolution and the frozen mapping
        info!("phase 3/5: building scopes and the obfuscation mapping");
        let trees: Vec<ScopeTree> = units
            .iter()
            .map(|u| ScopeTree::build(&u.file, u.text.len()))
            .collect();
        let mapping: ObfuscationMapping = build_mapping(&trees, &classifier, &protected, &mut gen);
        stats.functions = mapping.function_count();
        stats.variables = mapping.variable_count();

        // Phase 4: output-tree layout, with optional file renaming
        info!("phase 4/5: copying the project tree");
        let renames = self.file_renames(&units, &mut gen);
        self.copy_tree(&units)?;

        // Phase 5: rewrite each unit against the frozen state
        info!("phase 5/5: rewriting sources");
        let cipher = self
            .config
            .encrypt_strings
            .then(|| LiteralCipher::new(&mut gen));
        let helper_carriers = self.helper_carriers(&units);
        let options = RewriteOptions {
            strip_comments: self.config.strip_comments,
            encrypt_strings: self.config.encrypt_strings,
            opaque_predicates: self.config.opaque_predicates,
        };

        for (unit_id, unit) in units.iter().enumerate() {
            // A package whose every file is platform-tagged has nowhere
            // safe to carry the decrypt helper; leave its literals alone.
            let carrier = helper_carriers.get(&unit.package_key()).copied();
            let cipher_for_unit = match (&cipher, carrier) {
                (Some(cipher), Some(_)) => Some(cipher),
                _ => None,
            };
            let rewriter = Rewriter::new(
                &mapping,
                &protected,
                &classifier,
                &aliases,
                cipher_for_unit,
                options,
            );
            let ctx = FileContext {
                src: &unit.text,
                tokens: &unit.tokens,
                file: &unit.file,
                tree: &trees[unit_id],
                unit: unit_id as u32,
            };
            let inject_helper = carrier == Some(unit_id);
            let outcome = rewriter.rewrite_file(&ctx, &mut gen, inject_helper);
            stats.strings_encrypted += outcome.encrypted;
            stats.rewritten += 1;

            let out_rel = renames.get(&unit.rel).unwrap_or(&unit.rel);
            let out_path = self.output.join(out_rel);
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::directory_create(parent, e))?;
            }
            std::fs::write(&out_path, outcome.text)
                .map_err(|e| Error::file_write(&out_path, e))?;
            debug!(file = %out_rel.display(), renamed = outcome.renamed, "rewrote file");
        }

        info!(
            rewritten = stats.rewritten,
            skipped = stats.skipped,
            protected = stats.protected_names,
            "source phase complete"
        );
        Ok(stats)
    }

    /// Walk the project, parse what can be parsed, and record skips.
    fn collect_units(&self) -> Result<(Vec<SourceUnit>, BTreeMap<PathBuf, String>)> {
        let mut units = Vec::new();
        let mut skipped = BTreeMap::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !(name.starts_with('.') && e.depth() > 0) && name != "vendor"
            })
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("go") {
                continue;
            }
            let rel = path
                .strip_prefix(&self.root)
                .map_err(|_| Error::internal("walked path escaped project root"))?
                .to_path_buf();
            let name = rel
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            let bytes = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!(file = %rel.display(), "not valid UTF-8; copying through");
                    skipped.insert(rel, "not utf-8".to_string());
                    continue;
                }
            };

            if self.config.skip_generated && is_generated(&name, &text) {
                debug!(file = %rel.display(), "skipping generated file");
                skipped.insert(rel, "generated".to_string());
                continue;
            }
            if self.is_excluded(&rel, &name) {
                debug!(file = %rel.display(), "skipping excluded file");
                skipped.insert(rel, "excluded".to_string());
                continue;
            }

            let tokens = match lex(&text) {
                Ok(tokens) => tokens,
                Err(offset) => {
                    warn!(file = %rel.display(), offset, "lex failure; copying through");
                    skipped.insert(rel, "lex error".to_string());
                    continue;
                }
            };
            let sig = significant(&text, &tokens);
            match parse_file(&text, &sig) {
                Ok(file) => units.push(SourceUnit {
                    rel,
                    text,
                    tokens,
                    file,
                }),
                Err(e) => {
                    warn!(
                        file = %rel.display(),
                        offset = e.offset,
                        details = %e.details,
                        "parse failure; copying through"
                    );
                    skipped.insert(rel, format!("parse error: {}", e.details));
                }
            }
        }

        units.sort_by(|a, b| a.rel.cmp(&b.rel));
        Ok((units, skipped))
    }

    fn is_excluded(&self, rel: &Path, name: &str) -> bool {
        let rel_slash = rel.to_string_lossy().replace('\\', "/");
        self.config
            .exclude
            .iter()
            .any(|pattern| pattern_matches(pattern, &rel_slash, name))
    }

    /// Pick the unit that carries the decrypt helper for each package: the
    /// first (path-ordered) unit without a platform build tag.
    fn helper_carriers(&self, units: &[SourceUnit]) -> HashMap<(PathBuf, String), usize> {
        let mut carriers = HashMap::new();
        if !self.config.encrypt_strings {
            return carriers;
        }
        for (id, unit) in units.iter().enumerate() {
            if unit.has_platform_build_tag() {
                continue;
            }
            carriers.entry(unit.package_key()).or_insert(id);
        }
        carriers
    }

    /// Build the rename table for Go file names, when enabled.
    fn file_renames(
        &self,
        units: &[SourceUnit],
        gen: &mut NameGenerator,
    ) -> HashMap<PathBuf, PathBuf> {
        let mut renames = HashMap::new();
        if !self.config.rename_files {
            return renames;
        }
        for unit in units {
            let Some(name) = unit.rel.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(new_name) = rename_go_file(name, gen) {
                let new_rel = unit.rel.with_file_name(new_name);
                debug!(from = %unit.rel.display(), to = %new_rel.display(), "renaming file");
                renames.insert(unit.rel.clone(), new_rel);
            }
        }
        renames
    }

    /// Copy every non-unit file verbatim and create the directory layout.
    /// Unit files are written (possibly under a new name) by the rewrite
    /// phase.
    fn copy_tree(&self, units: &[SourceUnit]) -> Result<()> {
        let unit_paths: std::collections::HashSet<&Path> =
            units.iter().map(|u| u.rel.as_path()).collect();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
                _ => continue,
            };
            let target = self.output.join(&rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)
                    .map_err(|e| Error::directory_create(&target, e))?;
                continue;
            }
            if unit_paths.contains(rel.as_path()) {
                continue; // written by the rewrite phase
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| Error::file_write(&target, e))?;
        }
        Ok(())
    }
}

/// Detect auto-generated files by name suffix or header marker.
fn is_generated(name: &str, text: &str) -> bool {
    if name.ends_with(".pb.go") || name.ends_with(".gen.go") || name.ends_with("_generated.go") {
        return true;
    }
    text.lines()
        .take(5)
        .any(|line| line.starts_with("// Code generated"))
}

/// Replacement name for a Go file, or `None` when the name must survive.
///
/// `main.go` and platform-suffixed `main_*.go` files keep their names; any
/// recognized platform/architecture suffix is carried over so build
/// constraints keep selecting the same files.
fn rename_go_file(name: &str, gen: &mut NameGenerator) -> Option<String> {
    if name == "main.go" {
        return None;
    }
    if name.starts_with("main_") && name.ends_with(".go") {
        return None;
    }
    let stem = name.strip_suffix(".go")?;
    let suffix = PLATFORM_TOKENS
        .iter()
        .map(|t| format!("_{t}"))
        .find(|s| stem.ends_with(s.as_str()))
        .unwrap_or_default();
    Some(format!("{}{}.go", gen.file_stem(), suffix))
}

/// Exclude-pattern matching.
///
/// Supports `*`/`?` globs (a `*` does not cross `/`), bare-name matching,
/// and the directory forms `dir/*` (whole subtree) and `*/name` (any
/// directory level).
fn pattern_matches(pattern: &str, rel_path: &str, file_name: &str) -> bool {
    if glob_match(pattern, rel_path) || glob_match(pattern, file_name) {
        return true;
    }
    if let Some(dir) = pattern.strip_suffix("/*") {
        if rel_path == dir || rel_path.starts_with(&format!("{dir}/")) {
            return true;
        }
    }
    if let Some(sub) = pattern.strip_prefix("*/") {
        if let Some(dir) = sub.strip_suffix("/*") {
            if rel_path.split('/').any(|part| part == dir) {
                return true;
            }
        } else if rel_path.ends_with(&format!("/{sub}")) {
            return true;
        }
    }
    false
}

/// Minimal glob: `*` matches within a segment, `?` matches one character.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn segments_match(pattern: &[u8], text: &[u8]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                segments_match(&pattern[1..], text)
                    || (!text.is_empty()
                        && text[0] != b'/'
                        && segments_match(pattern, &text[1..]))
            }
            (Some(b'?'), Some(&t)) if t != b'/' => segments_match(&pattern[1..], &text[1..]),
            (Some(&p), Some(&t)) if p == t => segments_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }
    segments_match(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config_with_seed() -> Config {
        Config {
            seed: Some(42),
            ..Config::default()
        }
    }

    #[test]
    fn test_pattern_matching() {
        assert!(pattern_matches("*_test.go", "pkg/conn_test.go", "conn_test.go"));
        assert!(pattern_matches("*.pb.go", "api/v1/api.pb.go", "api.pb.go"));
        assert!(pattern_matches("tools/*", "tools/gen/main.go", "main.go"));
        assert!(pattern_matches("*/certs/*", "deep/certs/ca.go", "ca.go"));
        assert!(!pattern_matches("tools/*", "src/tools.go", "tools.go"));
        assert!(!pattern_matches("*.pb.go", "api/handler.go", "handler.go"));
    }

    #[test]
    fn test_rename_go_file_rules() {
        let mut gen = NameGenerator::new(1);
        assert_eq!(rename_go_file("main.go", &mut gen), None);
        assert_eq!(rename_go_file("main_windows.go", &mut gen), None);

        let renamed = rename_go_file("conn_linux.go", &mut gen).unwrap();
        assert!(renamed.starts_with('f'));
        assert!(renamed.ends_with("_linux.go"));

        let plain = rename_go_file("server.go", &mut gen).unwrap();
        assert!(plain.starts_with('f'));
        assert!(plain.ends_with(".go"));
        assert!(!plain.contains('_'));
    }

    #[test]
    fn test_is_generated() {
        assert!(is_generated("api.pb.go", ""));
        assert!(is_generated("x.go", "// Code generated by protoc. DO NOT EDIT.\npackage x\n"));
        assert!(!is_generated("x.go", "package x\n"));
    }

    #[test]
    fn test_run_renames_across_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        let out = dir.path().join("out");
        write(&root, "go.mod", "module example.com/app\n");
        write(
            &root,
            "main.go",
            "package main\n\nfunc main() {\n\thelper()\n}\n",
        );
        write(
            &root,
            "helper.go",
            "package main\n\nfunc helper() {\n}\n",
        );

        let stats = Pipeline::new(&root, &out, config_with_seed()).run().unwrap();
        assert_eq!(stats.rewritten, 2);
        assert_eq!(stats.functions, 1);

        let main_out = fs::read_to_string(out.join("main.go")).unwrap();
        let helper_out = fs::read_to_string(out.join("helper.go")).unwrap();
        assert!(!main_out.contains("helper"));
        assert!(!helper_out.contains("helper"));

        // cross-file consistency: the call site and the declaration agree
        let decl_name: String = helper_out
            .lines()
            .find(|l| l.starts_with("func fn"))
            .unwrap()
            .trim_start_matches("func ")
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        assert!(main_out.contains(&format!("{decl_name}()")));
    }

    #[test]
    fn test_build_variant_consistency() {
        // mutually exclusive build-variant files declaring `connect` must
        // end up with one shared replacement
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        let out = dir.path().join("out");
        write(&root, "go.mod", "module example.com/app\n");
        write(
            &root,
            "net_linux.go",
            "//go:build linux\n\npackage main\n\nfunc connect() {\n}\n",
        );
        write(
            &root,
            "net_windows.go",
            "//go:build windows\n\npackage main\n\nfunc connect() {\n}\n",
        );
        write(&root, "main.go", "package main\n\nfunc main() {\n\tconnect()\n}\n");

        Pipeline::new(&root, &out, config_with_seed()).run().unwrap();

        let extract = |path: &Path| -> String {
            fs::read_to_string(path)
                .unwrap()
                .lines()
                .find(|l| l.starts_with("func fn"))
                .unwrap()
                .trim_start_matches("func ")
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect()
        };
        let linux_name = extract(&out.join("net_linux.go"));
        let windows_name = extract(&out.join("net_windows.go"));
        assert_eq!(linux_name, windows_name);
        assert_ne!(linux_name, "connect");
        // the build directives survive comment stripping
        assert!(fs::read_to_string(out.join("net_linux.go"))
            .unwrap()
            .contains("//go:build linux"));
    }

    #[test]
    fn test_skipped_files_copied_byte_identical() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        let out = dir.path().join("out");
        let generated = "// Code generated by protoc. DO NOT EDIT.\npackage api\n\nfunc Untouchable() {}\n";
        let excluded = "package fixture\n\nfunc keepMe() {}\n";
        write(&root, "go.mod", "module example.com/app\n");
        write(&root, "main.go", "package main\n\nfunc main() {}\n");
        write(&root, "api/api.pb.go", generated);
        write(&root, "fixtures/data.go", excluded);

        let config = Config {
            exclude: vec!["fixtures/*".to_string()],
            ..config_with_seed()
        };
        let stats = Pipeline::new(&root, &out, config).run().unwrap();

        assert_eq!(stats.skipped, 2);
        assert_eq!(fs::read_to_string(out.join("api/api.pb.go")).unwrap(), generated);
        assert_eq!(fs::read_to_string(out.join("fixtures/data.go")).unwrap(), excluded);
    }

    #[test]
    fn test_unparsable_file_copied_through() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        let out = dir.path().join("out");
        let broken = "package broken\n\nfunc ( {\n";
        write(&root, "go.mod", "module example.com/app\n");
        write(&root, "main.go", "package main\n\nfunc main() {}\n");
        write(&root, "broken.go", broken);

        let stats = Pipeline::new(&root, &out, config_with_seed()).run().unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(fs::read_to_string(out.join("broken.go")).unwrap(), broken);
    }

    #[test]
    fn test_file_renaming_preserves_platform_suffix() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        let out = dir.path().join("out");
        write(&root, "go.mod", "module example.com/app\n");
        write(&root, "main.go", "package main\n\nfunc main() {}\n");
        write(
            &root,
            "conn_linux.go",
            "//go:build linux\n\npackage main\n\nfunc dial() {\n}\n",
        );

        let config = Config {
            rename_files: true,
            ..config_with_seed()
        };
        Pipeline::new(&root, &out, config).run().unwrap();

        assert!(out.join("main.go").exists());
        assert!(!out.join("conn_linux.go").exists());
        let renamed: Vec<String> = fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with("_linux.go"))
            .collect();
        assert_eq!(renamed.len(), 1);
        assert!(renamed[0].starts_with('f'));
    }

    #[test]
    fn test_encryption_injects_one_helper_per_package() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        let out = dir.path().join("out");
        write(&root, "go.mod", "module example.com/app\n");
        write(
            &root,
            "a.go",
            "package main\n\nfunc a() string {\n\treturn \"first literal\"\n}\n",
        );
        write(
            &root,
            "b.go",
            "package main\n\nfunc b() string {\n\treturn \"second literal\"\n}\n",
        );
        write(&root, "main.go", "package main\n\nfunc main() {\n\ta()\n\tb()\n}\n");

        let config = Config {
            encrypt_strings: true,
            ..config_with_seed()
        };
        let stats = Pipeline::new(&root, &out, config).run().unwrap();
        assert_eq!(stats.strings_encrypted, 2);

        let combined = ["a.go", "b.go", "main.go"]
            .iter()
            .map(|f| fs::read_to_string(out.join(f)).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert!(!combined.contains("first literal"));
        assert!(!combined.contains("second literal"));
        assert_eq!(combined.matches("encoding/base64").count(), 1);
    }

    #[test]
    fn test_missing_output_parent_created() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        let out = dir.path().join("nested/deep/out");
        write(&root, "go.mod", "module example.com/app\n");
        write(&root, "main.go", "package main\n\nfunc main() {}\n");
        let stats = Pipeline::new(&root, &out, config_with_seed()).run().unwrap();
        assert_eq!(stats.rewritten, 1);
        assert!(out.join("go.mod").exists());
    }
}
