//! Loading a project: path variables and raw references from one XML file

use crate::config::Config;
use crate::references::{collect_references, ColumnRules};
use crate::system::{Environment, Registry, SystemEnvironment, SystemRegistry};
use crate::table::TableReader;
use crate::variables::{
    PathVariables, VariableResolver, DEFAULT_PRODUCT_FOLDER, DEFAULT_REDIST_FOLDER,
    PATH_VARIABLE_TABLE, PROJECT_FOLDER,
};
use crate::Result;
use serde::Serialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Settings applied while loading projects
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    /// Columns treated as file references
    pub rules: ColumnRules,
    /// Default for `ISProductFolder`
    pub product_folder: String,
    /// Default for `ISRedistPlatformDependentFolder`
    pub redist_folder: String,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            rules: ColumnRules::default(),
            product_folder: DEFAULT_PRODUCT_FOLDER.to_string(),
            redist_folder: DEFAULT_REDIST_FOLDER.to_string(),
        }
    }
}

impl ProjectOptions {
    pub fn from_config(config: &Config) -> Self {
        let mut rules = ColumnRules::default();
        rules.extend(config.reference_columns.iter().cloned());

        Self {
            rules,
            product_folder: config.product_folder.clone(),
            redist_folder: config.redist_folder.clone(),
        }
    }
}

/// Path variables and raw references of one project file
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    source: PathBuf,
    variables: PathVariables,
    references: Vec<String>,
}

impl Project {
    /// Load a project, resolving variables against this host
    pub fn load<P: AsRef<Path>>(path: P, options: &ProjectOptions) -> Result<Self> {
        Self::load_with(path, options, &SystemEnvironment, &SystemRegistry)
    }

    /// Load a project with explicit environment and registry lookups
    pub fn load_with<P: AsRef<Path>>(
        path: P,
        options: &ProjectOptions,
        env: &dyn Environment,
        registry: &dyn Registry,
    ) -> Result<Self> {
        let source = path.as_ref();
        let reader = TableReader::from_file(source)?;
        Self::read(source, reader, options, env, registry)
    }

    /// Parse project XML from any reader; `source` locates the project
    /// folder for well-known variables and is made absolute against the
    /// current directory
    pub fn parse<R: BufRead>(
        source: &Path,
        input: R,
        options: &ProjectOptions,
        env: &dyn Environment,
        registry: &dyn Registry,
    ) -> Result<Self> {
        Self::read(source, TableReader::from_reader(input), options, env, registry)
    }

    fn read<R: BufRead>(
        source: &Path,
        mut reader: TableReader<R>,
        options: &ProjectOptions,
        env: &dyn Environment,
        registry: &dyn Registry,
    ) -> Result<Self> {
        // ISProjectFolder is the parent of this path, so it must not be relative
        let source = std::path::absolute(source)?;
        let resolver = VariableResolver::new(&source, env, registry)
            .with_install_folders(&options.product_folder, &options.redist_folder);

        let mut variables = PathVariables::new();
        let mut references = Vec::new();

        while let Some(mut table) = reader.next_table()? {
            log::debug!("Reading {}", table.name());
            if table.name() == PATH_VARIABLE_TABLE {
                resolver.read_table(&mut table, &mut variables)?;
            } else {
                references.extend(collect_references(&mut table, &options.rules)?);
            }
        }
        resolver.inject_defaults(&mut variables)?;

        log::info!(
            "{}: {} path variables, {} references",
            source.display(),
            variables.len(),
            references.len()
        );

        Ok(Self {
            source,
            variables,
            references,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Source file name without extension
    pub fn name(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn variables(&self) -> &PathVariables {
        &self.variables
    }

    /// Raw references in document order
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Resolved `ISProjectFolder`, if the project has one
    pub fn project_folder(&self) -> Option<&str> {
        self.variables.get(PROJECT_FOLDER)
    }
}
