//! Path variables from the `ISPathVariable` table
//!
//! Every row declares a symbolic folder name and how to resolve it:
//!
//! | Type | Meaning                                   |
//! |------|-------------------------------------------|
//! | 1    | InstallShield / OS well-known folder      |
//! | 2    | Literal path                              |
//! | 4    | Environment variable name                 |
//! | 8    | Registry value (`HKEY_...\key\...\Value`) |
//!
//! A variable that cannot be resolved maps to `<Name>` so references using
//! it stay recognizable in the missing-file report.

use crate::system::{Environment, KnownFolder, Registry, RootKey};
use crate::table::{Table, TableEntry};
use crate::{IsmError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Name of the table holding path variable declarations
pub const PATH_VARIABLE_TABLE: &str = "ISPathVariable";

pub const PRODUCT_FOLDER: &str = "ISProductFolder";
pub const REDIST_FOLDER: &str = "ISRedistPlatformDependentFolder";
pub const PROJECT_FOLDER: &str = "ISProjectFolder";

/// InstallShield 2022 install location
pub const DEFAULT_PRODUCT_FOLDER: &str = r"C:\Program Files (x86)\InstallShield\2022\";
pub const DEFAULT_REDIST_FOLDER: &str =
    r"C:\Program Files (x86)\InstallShield\2022\Redist\Language Independent\i386";

/// Resolution strategy, the `Type` column of `ISPathVariable`
///
/// Serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u32")]
pub enum VariableKind {
    WellKnown,
    Literal,
    Environment,
    Registry,
}

impl VariableKind {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(VariableKind::WellKnown),
            2 => Some(VariableKind::Literal),
            4 => Some(VariableKind::Environment),
            8 => Some(VariableKind::Registry),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            VariableKind::WellKnown => 1,
            VariableKind::Literal => 2,
            VariableKind::Environment => 4,
            VariableKind::Registry => 8,
        }
    }
}

impl From<VariableKind> for u32 {
    fn from(kind: VariableKind) -> Self {
        kind.code()
    }
}

/// A resolved path variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathVariable {
    pub name: String,
    /// Value column as declared (literal, env name or registry path)
    pub raw_value: String,
    pub kind: VariableKind,
    /// Resolved folder
    pub value: String,
}

/// Path variables of one project, in declaration order
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PathVariables {
    entries: Vec<PathVariable>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl PathVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable; names are unique within a project
    pub fn insert(&mut self, variable: PathVariable) -> Result<()> {
        if self.index.contains_key(&variable.name) {
            return Err(IsmError::DuplicateVariable(variable.name));
        }
        self.index.insert(variable.name.clone(), self.entries.len());
        self.entries.push(variable);
        Ok(())
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&i| self.entries[i].value.as_str())
    }

    /// Exact-name lookup, then the first case-insensitive match
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).or_else(|| {
            self.entries
                .iter()
                .find(|v| eq_ignore_case(&v.name, name))
                .map(|v| v.value.as_str())
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathVariable> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Resolves `ISPathVariable` rows for one project file
pub struct VariableResolver<'a> {
    project_folder: String,
    project_name: String,
    product_folder: String,
    redist_folder: String,
    env: &'a dyn Environment,
    registry: &'a dyn Registry,
}

impl<'a> VariableResolver<'a> {
    /// Resolver for the project stored at `source`
    pub fn new(source: &Path, env: &'a dyn Environment, registry: &'a dyn Registry) -> Self {
        let project_folder = source
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let project_name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            project_folder,
            project_name,
            product_folder: DEFAULT_PRODUCT_FOLDER.to_string(),
            redist_folder: DEFAULT_REDIST_FOLDER.to_string(),
            env,
            registry,
        }
    }

    /// Override the InstallShield product and redistributable folders
    pub fn with_install_folders(mut self, product_folder: &str, redist_folder: &str) -> Self {
        self.product_folder = product_folder.to_string();
        self.redist_folder = redist_folder.to_string();
        self
    }

    /// Resolve every row of an `ISPathVariable` table into `variables`
    pub fn read_table<R: BufRead>(
        &self,
        table: &mut Table<'_, R>,
        variables: &mut PathVariables,
    ) -> Result<()> {
        while let Some(entry) = table.next_entry()? {
            if let TableEntry::Row(cells) = entry {
                variables.insert(self.resolve_row(&cells)?)?;
            }
        }
        Ok(())
    }

    /// Resolve one `{name, value, test value, type}` row
    pub fn resolve_row(&self, cells: &[String]) -> Result<PathVariable> {
        let [name, raw_value, _, code] = cells else {
            return Err(IsmError::MalformedPathVariable {
                found: cells.len(),
                fields: cells.to_vec(),
            });
        };

        let kind = code
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(VariableKind::from_code)
            .ok_or_else(|| IsmError::UnknownVariableKind {
                name: name.clone(),
                kind: code.clone(),
            })?;

        let value = self.resolve(name, raw_value, kind)?;
        Ok(PathVariable {
            name: name.clone(),
            raw_value: raw_value.clone(),
            kind,
            value,
        })
    }

    /// Resolve a single declaration, falling back to `<name>`
    pub fn resolve(&self, name: &str, raw_value: &str, kind: VariableKind) -> Result<String> {
        let resolved = match kind {
            VariableKind::WellKnown => Some(self.well_known(name)),
            VariableKind::Literal => Some(raw_value.to_string()),
            VariableKind::Environment => self.env.var(raw_value),
            VariableKind::Registry => self.registry_value(raw_value)?,
        };

        match resolved {
            Some(value) => {
                log::debug!("{} ({:?}) = {}", name, kind, value);
                Ok(value)
            }
            None => {
                log::warn!("Unresolved path variable {} ({:?} '{}')", name, kind, raw_value);
                Ok(format!("<{}>", name))
            }
        }
    }

    /// Add the InstallShield folders when the project did not declare them
    pub fn inject_defaults(&self, variables: &mut PathVariables) -> Result<()> {
        for (name, value) in [
            (PRODUCT_FOLDER, &self.product_folder),
            (REDIST_FOLDER, &self.redist_folder),
        ] {
            if !variables.contains(name) {
                variables.insert(PathVariable {
                    name: name.to_string(),
                    raw_value: String::new(),
                    kind: VariableKind::WellKnown,
                    value: value.clone(),
                })?;
            }
        }
        Ok(())
    }

    fn well_known(&self, name: &str) -> String {
        match name {
            PRODUCT_FOLDER => self.product_folder.clone(),
            REDIST_FOLDER => self.redist_folder.clone(),
            PROJECT_FOLDER => self.project_folder.clone(),
            "ISProjectDataFolder" | "ISPROJECTDIR" => Path::new(&self.project_folder)
                .join(&self.project_name)
                .to_string_lossy()
                .into_owned(),
            "SystemFolder" => KnownFolder::System.resolve(self.env),
            "CommonFilesFolder" => KnownFolder::CommonFiles.resolve(self.env),
            "ProgramFilesFolder" => KnownFolder::ProgramFiles.resolve(self.env),
            "WindowsFolder" => KnownFolder::Windows.resolve(self.env),
            _ => String::new(),
        }
    }

    /// `ROOT\sub\...\ValueName`; fewer than three segments is unresolved
    fn registry_value(&self, path: &str) -> Result<Option<String>> {
        let segments: Vec<&str> = path.split('\\').collect();
        if segments.len() < 3 {
            return Ok(None);
        }

        let root: RootKey = segments[0].parse()?;
        let value_name = segments[segments.len() - 1];
        let subkeys = &segments[1..segments.len() - 1];

        Ok(self.registry.read_value(root, subkeys, value_name))
    }
}
