//! # shroud-core
//!
//! A library for obfuscating Go projects at two independent layers: the
//! source syntax tree (scope-aware identifier renaming, literal encryption,
//! inert-branch injection) and the compiled artifact (in-place patching of
//! the runtime's function/line metadata and textual import paths).
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`syntax`]: Go lexing and subset parsing
//! - [`classify`]: the protected-name classifier
//! - [`scope`]: per-file scope trees and declaration objects
//! - [`mapping`]: the frozen, collision-free obfuscation mapping
//! - [`rewrite`]: span-edit source rewriting
//! - [`crypt`]: string literal encryption
//! - [`pipeline`]: source-phase orchestration
//! - [`binary`]: compiled-artifact symbol patching
//! - [`discover`]: package discovery for the binary phase
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use shroud_core::{Config, Pipeline};
//!
//! let config = Config {
//!     encrypt_strings: true,
//!     ..Config::default()
//! };
//! let stats = Pipeline::new("./my-project", "./my-project_obfuscated", config).run()?;
//! println!("renamed {} functions", stats.functions);
//! # Ok::<(), shroud_core::Error>(())
//! ```
//!
//! The binary phase is independent of the source phase and consumes only a
//! compiled artifact path plus a replacement table:
//!
//! ```no_run
//! use shroud_core::{discover, obfuscate_binary, BinaryPatchConfig};
//! use std::path::Path;
//!
//! let config = BinaryPatchConfig {
//!     specs: discover::discover(Path::new("./my-project"), false),
//!     ..BinaryPatchConfig::default()
//! };
//! let summary = obfuscate_binary(Path::new("./my-project/app"), &config)?;
//! println!("patched {} prefixes", summary.prefixes.applied);
//! # Ok::<(), shroud_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod binary;
pub mod classify;
pub mod crypt;
pub mod discover;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod rewrite;
pub mod scope;
pub mod syntax;

// Re-export primary types for convenience
pub use binary::{
    obfuscate_binary, BinaryFormat, BinaryImage, BinaryPatchConfig, PassStats, PatchSummary,
    ReplacementSpec,
};
pub use classify::{Classifier, ProtectedSet};
pub use error::{Error, Result};
pub use mapping::{build_mapping, NameGenerator, ObfuscationMapping};
pub use pipeline::{Config, Pipeline, Statistics};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
