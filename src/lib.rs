//! ism-collect - Collect the files an InstallShield project references
//!
//! Reads the XML form of an `.ism` project, resolves its path variables and
//! every file reference recorded in the project tables, then either lists
//! the files that exist or copies them into a clean output tree.
//!
//! # Features
//!
//! - Streaming table reader (no in-memory DOM)
//! - Path variables resolved from well-known folders, literals, environment
//!   variables and the registry
//! - On-disk case correction of referenced paths
//! - Copy mode with SHA-256 collision detection
//!
//! # Example
//!
//! ```no_run
//! use ism_collect::{Inventory, Project, ProjectOptions};
//!
//! let project = Project::load("Setup.ism", &ProjectOptions::default()).unwrap();
//! let inventory = Inventory::build(&project);
//!
//! for path in inventory.listing() {
//!     println!("{}", path.display());
//! }
//! ```

pub mod collect;
pub mod config;
pub mod project;
pub mod realize;
pub mod references;
pub mod system;
pub mod table;
pub mod variables;

pub use collect::{
    copy_project, file_digest, reset_output_root, CopyOptions, CopyOutcome, CopyReport, Inventory,
};
pub use config::Config;
pub use project::{Project, ProjectOptions};
pub use realize::{PathRealizer, ResolvedReference};
pub use references::{ColumnRule, ColumnRules};
pub use system::{Environment, Registry, RootKey, SystemEnvironment, SystemRegistry};
pub use table::{Table, TableEntry, TableReader};
pub use variables::{PathVariable, PathVariables, VariableKind, VariableResolver};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort processing of one project file
#[derive(Error, Debug)]
pub enum IsmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("ISPathVariable row must have 4 fields, found {found}: {fields:?}")]
    MalformedPathVariable { found: usize, fields: Vec<String> },

    #[error("Unknown path variable type '{kind}' for {name}")]
    UnknownVariableKind { name: String, kind: String },

    #[error("Path variable declared twice: {0}")]
    DuplicateVariable(String),

    #[error("Unsupported registry root key: {0}")]
    UnsupportedRootKey(String),

    #[error("A different file is already copied to {destination} (source {source_path}, digest {digest})")]
    Collision {
        source_path: PathBuf,
        destination: PathBuf,
        digest: String,
    },

    #[error("Failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, IsmError>;

/// Load one project and list or copy its referenced files
///
/// `copy` is `None` for list mode. The output root is not reset here; the
/// caller does that once before the first project with
/// [`reset_output_root`].
pub fn process_project<P: AsRef<std::path::Path>>(
    path: P,
    options: &ProjectOptions,
    copy: Option<&CopyOptions>,
) -> Result<(Project, Inventory, Option<CopyReport>)> {
    let project = Project::load(path, options)?;
    let inventory = Inventory::build(&project);
    let report = match copy {
        Some(copy) => Some(copy_project(&project, &inventory, copy)?),
        None => None,
    };
    Ok((project, inventory, report))
}
