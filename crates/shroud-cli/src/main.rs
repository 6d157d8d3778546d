//! shroud - Obfuscate Go projects at the source and binary level
//!
//! The `obfuscate` subcommand rewrites a project tree into a new directory
//! with identifiers renamed, comments stripped, and optional literal
//! encryption and inert-branch injection. The `patch-binary` subcommand
//! rewrites package-name text inside an already-compiled executable.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use shroud_core::{discover, obfuscate_binary, BinaryPatchConfig, Config, Pipeline, ReplacementSpec};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Obfuscate Go projects at the source and binary level
#[derive(Parser, Debug)]
#[command(name = "shroud")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite a project tree with obfuscated sources
    Obfuscate(ObfuscateArgs),
    /// Patch package-name text inside a compiled executable
    PatchBinary(PatchBinaryArgs),
}

#[derive(Args, Debug)]
struct ObfuscateArgs {
    /// Project root directory
    project: PathBuf,

    /// Output directory for the obfuscated tree
    #[arg(short, long, help = "Output directory (default: <project>_obfuscated)")]
    output: Option<PathBuf>,

    /// Rename exported identifiers (breaks external importers!)
    #[arg(long)]
    rename_exported: bool,

    /// Rename Go source files (platform suffixes preserved)
    #[arg(long)]
    rename_files: bool,

    /// Allow renaming struct fields with serialized-name tags
    #[arg(long)]
    rename_fields: bool,

    /// Encrypt string literals, decrypting at runtime
    #[arg(long)]
    encrypt_strings: bool,

    /// Inject always-true/always-false predicates into function bodies
    #[arg(long)]
    opaque_predicates: bool,

    /// Keep comments instead of stripping them
    #[arg(long)]
    keep_comments: bool,

    /// Do not protect declarations in reflection-using files
    #[arg(long)]
    no_reflection_guard: bool,

    /// Also rewrite auto-generated files
    #[arg(long)]
    include_generated: bool,

    /// File patterns to exclude (e.g. '*_test.go,*.pb.go')
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Additional identifier names to protect
    #[arg(long, value_delimiter = ',')]
    protect: Vec<String>,

    /// Overwrite an existing output directory
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct PatchBinaryArgs {
    /// Path to the compiled executable
    binary: PathBuf,

    /// Module directory used for package auto-discovery
    #[arg(long, default_value = ".")]
    module_dir: PathBuf,

    /// Explicit replacements ('old=new', comma separated)
    #[arg(long, value_delimiter = ',')]
    replace: Vec<String>,

    /// Auto-discover package replacements from go.mod and the project tree
    #[arg(long)]
    auto_discover: bool,

    /// Include third-party modules in auto-discovery
    #[arg(long)]
    third_party: bool,

    /// Skip the metadata-window pass (path replacement still runs)
    #[arg(long)]
    no_pclntab: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match cli.command {
        Command::Obfuscate(args) => run_obfuscate(args),
        Command::PatchBinary(args) => run_patch_binary(args),
    }
}

fn run_obfuscate(args: ObfuscateArgs) -> Result<()> {
    if !args.project.is_dir() {
        bail!(
            "project root is not a directory: {}",
            args.project.display()
        );
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.project));
    if output.exists() {
        if !args.force {
            bail!(
                "output directory already exists: {} (use --force to overwrite)",
                output.display()
            );
        }
        warn!(path = %output.display(), "removing existing output directory");
        std::fs::remove_dir_all(&output)
            .with_context(|| format!("failed to remove {}", output.display()))?;
    }

    let config = Config {
        rename_exported: args.rename_exported,
        rename_files: args.rename_files,
        rename_fields: args.rename_fields,
        encrypt_strings: args.encrypt_strings,
        opaque_predicates: args.opaque_predicates,
        strip_comments: !args.keep_comments,
        guard_reflection: !args.no_reflection_guard,
        skip_generated: !args.include_generated,
        exclude: args.exclude,
        protected: args.protect,
        seed: None,
    };
    if config.rename_exported {
        warn!("renaming exported identifiers; external importers of this module will break");
    }

    let stats = Pipeline::new(&args.project, &output, config)
        .run()
        .with_context(|| format!("failed to obfuscate {}", args.project.display()))?;

    println!("Obfuscated {} -> {}", args.project.display(), output.display());
    println!("  files rewritten:   {}", stats.rewritten);
    println!("  files copied:      {}", stats.skipped);
    println!("  protected names:   {}", stats.protected_names);
    println!("  functions renamed: {}", stats.functions);
    println!("  variables renamed: {}", stats.variables);
    if stats.strings_encrypted > 0 {
        println!("  strings encrypted: {}", stats.strings_encrypted);
    }
    println!("Run 'go build' in the output directory to verify compilation.");
    Ok(())
}

fn run_patch_binary(args: PatchBinaryArgs) -> Result<()> {
    if !args.binary.is_file() {
        bail!("binary does not exist: {}", args.binary.display());
    }

    let mut specs = parse_replace_pairs(&args.replace)?;
    if specs.is_empty() && args.auto_discover {
        info!(dir = %args.module_dir.display(), "auto-discovering package replacements");
        specs = discover::discover(&args.module_dir, args.third_party);
        info!(count = specs.len(), "discovered replacement table");
    }

    let config = BinaryPatchConfig {
        patch_pclntab: !args.no_pclntab,
        specs,
        seed: None,
    };
    let summary = obfuscate_binary(&args.binary, &config)
        .with_context(|| format!("failed to patch {}", args.binary.display()))?;

    println!("Format: {}", summary.format);
    match summary.window {
        Some(window) => println!("Metadata block at 0x{:x}", window.start),
        None => println!("No metadata block found; nothing patched"),
    }
    println!(
        "  prefixes: {} patched, {} skipped",
        summary.prefixes.applied, summary.prefixes.skipped
    );
    println!(
        "  paths:    {} patched, {} skipped",
        summary.paths.applied, summary.paths.skipped
    );
    if let Some(backup) = summary.backup {
        println!("Backup written to {}", backup.display());
    }
    Ok(())
}

/// Default output directory: `<project>_obfuscated` as a sibling
fn default_output_dir(project: &Path) -> PathBuf {
    let mut name = project
        .file_name()
        .unwrap_or_default()
        .to_os_string();
    name.push("_obfuscated");
    project.with_file_name(name)
}

/// Parse 'old=new' pairs into replacement specs
fn parse_replace_pairs(pairs: &[String]) -> Result<Vec<ReplacementSpec>> {
    let mut specs = Vec::new();
    for pair in pairs {
        let Some((from, to)) = pair.split_once('=') else {
            bail!("invalid replacement '{pair}': expected 'old=new'");
        };
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() {
            bail!("invalid replacement '{pair}': empty side");
        }
        specs.push(ReplacementSpec::new(from, to));
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replace_pairs() {
        let specs = parse_replace_pairs(&[
            "main=app".to_string(),
            "example.com/app = x".to_string(),
        ])
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].from, "main");
        assert_eq!(specs[1].to, "x");

        assert!(parse_replace_pairs(&["nodelimiter".to_string()]).is_err());
        assert!(parse_replace_pairs(&["=empty".to_string()]).is_err());
    }

    #[test]
    fn test_default_output_dir() {
        assert_eq!(
            default_output_dir(Path::new("/work/myproj")),
            PathBuf::from("/work/myproj_obfuscated")
        );
    }

    #[test]
    fn test_obfuscate_end_to_end() {
        use tempfile::TempDir;
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("go.mod"), "module example.com/demo\n").unwrap();
        std::fs::write(
            root.join("main.go"),
            "package main\n\nfunc main() {\n\trun()\n}\n\nfunc run() {\n}\n",
        )
        .unwrap();

        let args = ObfuscateArgs {
            project: root.clone(),
            output: Some(dir.path().join("out")),
            rename_exported: false,
            rename_files: false,
            rename_fields: false,
            encrypt_strings: false,
            opaque_predicates: false,
            keep_comments: false,
            no_reflection_guard: false,
            include_generated: false,
            exclude: Vec::new(),
            protect: Vec::new(),
            force: false,
        };
        run_obfuscate(args).unwrap();

        let rewritten = std::fs::read_to_string(dir.path().join("out/main.go")).unwrap();
        assert!(!rewritten.contains("func run()"));
        assert!(rewritten.contains("func main()"));
    }
}
