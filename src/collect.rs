//! Listing and copying the files a project references
//!
//! Every raw reference is realized and sorted into existing files, folders
//! (ignored) and missing paths. Existing files under `<ISProjectFolder>` can
//! be mirrored into an output tree; a destination that already holds
//! different content is a hard error, since two sources would silently
//! collapse into one file.

use crate::project::Project;
use crate::realize::{PathRealizer, ResolvedReference};
use crate::variables::PROJECT_FOLDER;
use crate::{IsmError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Realized references of one project, by outcome
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    /// References naming an existing file
    pub existing: Vec<ResolvedReference>,
    /// References naming a folder; neither listed nor copied
    pub directories: Vec<ResolvedReference>,
    /// References that name nothing on disk
    pub missing: Vec<ResolvedReference>,
}

impl Inventory {
    /// Realize every raw reference of `project`
    pub fn build(project: &Project) -> Self {
        let mut realizer = PathRealizer::new(project.variables());
        let mut inventory = Self::default();

        for raw in project.references() {
            let resolved = realizer.realize(raw);
            if resolved.is_file() {
                inventory.existing.push(resolved);
            } else if resolved.is_directory {
                inventory.directories.push(resolved);
            } else {
                log::debug!("Missing: {} ({})", resolved.real_path.display(), raw);
                inventory.missing.push(resolved);
            }
        }

        inventory
    }

    /// Existing files, sorted by path
    pub fn listing(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.existing.iter().map(|r| r.real_path.clone()).collect();
        paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        paths
    }

    /// Missing paths in reference order
    pub fn missing_paths(&self) -> Vec<&Path> {
        self.missing.iter().map(|r| r.real_path.as_path()).collect()
    }
}

/// Where and how to copy referenced files
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub output_root: PathBuf,
    /// Copy into a subfolder named after the project file
    pub separate: bool,
}

impl CopyOptions {
    pub fn new<P: Into<PathBuf>>(output_root: P) -> Self {
        Self {
            output_root: output_root.into(),
            separate: false,
        }
    }

    pub fn separate(mut self, separate: bool) -> Self {
        self.separate = separate;
        self
    }

    /// Folder receiving the copies of `project`
    pub fn output_folder(&self, project: &Project) -> PathBuf {
        if self.separate {
            self.output_root.join(project.name())
        } else {
            self.output_root.clone()
        }
    }
}

/// What happened to one copy candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyOutcome {
    /// Bytes copied to the destination
    Copied,
    /// Destination already held identical content
    AlreadyPresent,
    /// Not under `<ISProjectFolder>`; reported only
    Skipped,
}

/// One copy candidate
#[derive(Debug, Clone, Serialize)]
pub struct CopyEntry {
    pub raw: String,
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub outcome: CopyOutcome,
}

/// Result of copying one project
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyReport {
    pub output_folder: PathBuf,
    pub entries: Vec<CopyEntry>,
}

impl CopyReport {
    pub fn count(&self, outcome: CopyOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }
}

/// Delete the output root if present and recreate it empty
pub fn reset_output_root(path: &Path) -> Result<()> {
    if path.exists() {
        log::info!("Removing {}", path.display());
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// Copy the existing files of `project` below `<ISProjectFolder>`
///
/// Candidates are processed in order of their raw reference string.
pub fn copy_project(
    project: &Project,
    inventory: &Inventory,
    options: &CopyOptions,
) -> Result<CopyReport> {
    let output_folder = options.output_folder(project);
    fs::create_dir_all(&output_folder)?;

    let skip = project
        .project_folder()
        .map(|folder| folder.trim_end_matches(['\\', '/']).len() + 1)
        .unwrap_or(0);
    let token = format!("<{}>", PROJECT_FOLDER);

    let mut candidates: Vec<&ResolvedReference> = inventory.existing.iter().collect();
    candidates.sort_by(|a, b| a.raw.cmp(&b.raw));

    let mut report = CopyReport {
        output_folder: output_folder.clone(),
        entries: Vec::new(),
    };

    for candidate in candidates {
        let source = &candidate.real_path;
        let destination = if candidate.raw.contains(&token) {
            let destination = destination_path(&output_folder, source, skip);
            if destination.is_none() {
                log::warn!(
                    "Not copied (no relative path below {}): {}",
                    project.project_folder().unwrap_or_default(),
                    source.display()
                );
            }
            destination
        } else {
            log::warn!("Not copied (outside {}): {}", token, source.display());
            None
        };

        let outcome = match &destination {
            Some(destination) => copy_file(source, destination)?,
            None => CopyOutcome::Skipped,
        };

        report.entries.push(CopyEntry {
            raw: candidate.raw.clone(),
            source: source.clone(),
            destination,
            outcome,
        });
    }

    Ok(report)
}

/// `output_folder` joined with `source` minus its first `skip` characters
///
/// Root components left over are dropped so the result stays inside
/// `output_folder`.
fn destination_path(output_folder: &Path, source: &Path, skip: usize) -> Option<PathBuf> {
    let source = source.to_string_lossy();
    let relative: PathBuf = Path::new(source.get(skip..)?)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();

    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(output_folder.join(relative))
}

fn copy_file(source: &Path, destination: &Path) -> Result<CopyOutcome> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    log::info!("{} -> {}", source.display(), destination.display());

    if !destination.exists() {
        fs::copy(source, destination)?;
        return Ok(CopyOutcome::Copied);
    }

    let source_digest = file_digest(source)?;
    let destination_digest = file_digest(destination)?;
    if source_digest != destination_digest {
        log::error!(
            "{} differs from the file already copied to {}",
            source.display(),
            destination.display()
        );
        return Err(IsmError::Collision {
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
            digest: source_digest,
        });
    }

    Ok(CopyOutcome::AlreadyPresent)
}

/// SHA-256 of a file's content as lowercase hex
pub fn file_digest(path: &Path) -> Result<String> {
    sha256_file(path).map_err(|source| {
        log::error!("Failed to hash {}", path.display());
        IsmError::Hash {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
