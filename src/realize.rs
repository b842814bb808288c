//! Turning raw references into real filesystem paths
//!
//! A raw reference looks like `<VarName>\relative\path` or a plain path.
//! The variable prefix is substituted, separators are normalized for the
//! host, and paths that exist are rewritten with their on-disk casing,
//! because project files do not preserve the casing of the folders they
//! point at.

use crate::variables::{eq_ignore_case, PathVariables};
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// A raw reference after realization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    pub raw: String,
    pub real_path: PathBuf,
    pub exists: bool,
    pub is_directory: bool,
}

impl ResolvedReference {
    pub fn is_file(&self) -> bool {
        self.exists && !self.is_directory
    }

    pub fn is_missing(&self) -> bool {
        !self.exists
    }
}

/// Subdirectory and file names of one directory, sorted
#[derive(Debug, Default)]
struct Listing {
    dirs: Vec<OsString>,
    files: Vec<OsString>,
}

#[derive(Clone, Copy)]
enum EntryKind {
    Dir,
    File,
}

/// Realizes raw references against a finished variable map
///
/// Directory listings read during case correction are cached for the
/// lifetime of the realizer.
pub struct PathRealizer<'a> {
    variables: &'a PathVariables,
    listings: HashMap<PathBuf, Option<Listing>>,
}

impl<'a> PathRealizer<'a> {
    pub fn new(variables: &'a PathVariables) -> Self {
        Self {
            variables,
            listings: HashMap::new(),
        }
    }

    /// Resolve and classify a raw reference
    pub fn realize(&mut self, raw: &str) -> ResolvedReference {
        let real_path = self.resolve(raw);
        let metadata = fs::metadata(&real_path).ok();

        ResolvedReference {
            raw: raw.to_string(),
            exists: metadata.is_some(),
            is_directory: metadata.map_or(false, |m| m.is_dir()),
            real_path,
        }
    }

    /// Real path of a raw reference, case-corrected when it names a file
    pub fn resolve(&mut self, raw: &str) -> PathBuf {
        let joined = self.join(raw);
        if !joined.is_file() {
            return joined;
        }

        match self.correct_case(&joined) {
            Some(corrected) => corrected,
            None => {
                log::debug!("Could not re-case {}", joined.display());
                joined
            }
        }
    }

    /// Substitute the `<VarName>` prefix and join with the remainder
    pub fn join(&self, raw: &str) -> PathBuf {
        let (prefix, mut remainder) = match split_token(raw) {
            Some((name, rest)) => (self.variables.lookup(name).unwrap_or(""), rest),
            None => ("", raw),
        };

        if !prefix.is_empty() {
            if let Some(stripped) = remainder.strip_prefix(['\\', '/']) {
                remainder = stripped;
            }
        }

        let base = PathBuf::from(native_separators(prefix));
        if remainder.is_empty() {
            base
        } else {
            base.join(native_separators(remainder))
        }
    }

    /// Rebuild `path` from the root using the casing found on disk
    ///
    /// Each directory segment is matched case-insensitively against the
    /// subdirectories of the already corrected parent, then the file name
    /// against its files. An exact match wins over other candidates.
    pub fn correct_case(&mut self, path: &Path) -> Option<PathBuf> {
        let file_name = path.file_name()?;
        let parent = path.parent()?;
        let mut current = PathBuf::new();

        for component in parent.components() {
            match component {
                Component::Normal(segment) => {
                    let entry = self.find_entry(&current, segment, EntryKind::Dir)?;
                    current.push(entry);
                }
                Component::CurDir => {}
                other => current.push(other.as_os_str()),
            }
        }

        let file = self.find_entry(&current, file_name, EntryKind::File)?;
        current.push(file);
        Some(current)
    }

    fn find_entry(&mut self, dir: &Path, name: &OsStr, kind: EntryKind) -> Option<OsString> {
        let listing = self.listing(dir)?;
        let candidates = match kind {
            EntryKind::Dir => &listing.dirs,
            EntryKind::File => &listing.files,
        };

        if let Some(exact) = candidates.iter().find(|c| c.as_os_str() == name) {
            return Some(exact.clone());
        }

        let wanted = name.to_string_lossy();
        candidates
            .iter()
            .find(|c| eq_ignore_case(&c.to_string_lossy(), &wanted))
            .cloned()
    }

    fn listing(&mut self, dir: &Path) -> Option<&Listing> {
        self.listings
            .entry(dir.to_path_buf())
            .or_insert_with(|| read_listing(dir))
            .as_ref()
    }
}

fn read_listing(dir: &Path) -> Option<Listing> {
    let target = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let entries = match fs::read_dir(target) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot list {}: {}", target.display(), e);
            return None;
        }
    };

    let mut listing = Listing::default();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            listing.dirs.push(entry.file_name());
        } else if path.is_file() {
            listing.files.push(entry.file_name());
        }
    }
    listing.dirs.sort();
    listing.files.sort();
    Some(listing)
}

/// Split `<Name>rest` into `("Name", "rest")`
fn split_token(raw: &str) -> Option<(&str, &str)> {
    let inner = raw.strip_prefix('<')?;
    let close = inner.find('>')?;
    Some((&inner[..close], &inner[close + 1..]))
}

/// Project files always use `\`; accept both and emit the host separator
fn native_separators(path: &str) -> String {
    if cfg!(windows) {
        path.replace('/', "\\")
    } else {
        path.replace('\\', "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{PathVariable, VariableKind};
    use std::fs::File;
    use tempfile::tempdir;

    fn variables(pairs: &[(&str, &str)]) -> PathVariables {
        let mut vars = PathVariables::new();
        for (name, value) in pairs {
            vars.insert(PathVariable {
                name: name.to_string(),
                raw_value: value.to_string(),
                kind: VariableKind::Literal,
                value: value.to_string(),
            })
            .unwrap();
        }
        vars
    }

    fn native(path: &str) -> PathBuf {
        PathBuf::from(native_separators(path))
    }

    #[test]
    fn test_split_token() {
        assert_eq!(split_token("<A>\\b"), Some(("A", "\\b")));
        assert_eq!(split_token("<A>"), Some(("A", "")));
        assert_eq!(split_token("<A\\b"), None);
        assert_eq!(split_token("x<A>\\b"), None);
    }

    #[test]
    fn test_join_with_variable() {
        let vars = variables(&[("Foo", "/data")]);
        let realizer = PathRealizer::new(&vars);

        assert_eq!(realizer.join("<Foo>\\sub\\file.txt"), native("/data/sub/file.txt"));
        assert_eq!(realizer.join("<foo>\\sub\\file.txt"), native("/data/sub/file.txt"));
        assert_eq!(realizer.join("<Foo>"), native("/data"));
    }

    #[test]
    fn test_join_unknown_variable_keeps_remainder() {
        let vars = variables(&[]);
        let realizer = PathRealizer::new(&vars);

        assert_eq!(realizer.join("<Nope>sub\\a.txt"), native("sub/a.txt"));
    }

    #[test]
    fn test_join_plain_path() {
        let vars = variables(&[("Foo", "/data")]);
        let realizer = PathRealizer::new(&vars);

        assert_eq!(realizer.join("/abs/a.txt"), native("/abs/a.txt"));
        assert_eq!(realizer.join("rel\\a.txt"), native("rel/a.txt"));
        assert_eq!(realizer.join(""), PathBuf::new());
    }

    #[test]
    fn test_absolute_reference_unchanged() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        File::create(&file).unwrap();

        let vars = variables(&[]);
        let mut realizer = PathRealizer::new(&vars);
        let raw = file.to_string_lossy().into_owned();

        assert_eq!(realizer.resolve(&raw), file);
    }

    #[test]
    fn test_correct_case_walk() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Data").join("SUB")).unwrap();
        let actual = dir.path().join("Data").join("SUB").join("File.TXT");
        File::create(&actual).unwrap();

        let vars = variables(&[]);
        let mut realizer = PathRealizer::new(&vars);
        let nominal = dir.path().join("data").join("sub").join("file.txt");

        assert_eq!(realizer.correct_case(&nominal), Some(actual.clone()));
        // Served from cached listings the second time
        assert_eq!(realizer.correct_case(&nominal), Some(actual));
    }

    #[test]
    fn test_correct_case_prefers_exact_entry() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub").join("a.txt")).unwrap();
        // Only distinct on case-sensitive filesystems
        let _ = fs::create_dir_all(dir.path().join("SUB"));

        let vars = variables(&[]);
        let mut realizer = PathRealizer::new(&vars);
        let path = dir.path().join("sub").join("a.txt");

        assert_eq!(realizer.correct_case(&path), Some(path.clone()));
    }

    #[test]
    fn test_correct_case_unknown_segment() {
        let dir = tempdir().unwrap();
        let vars = variables(&[]);
        let mut realizer = PathRealizer::new(&vars);

        assert_eq!(realizer.correct_case(&dir.path().join("none").join("a.txt")), None);
    }

    #[test]
    fn test_resolve_keeps_joined_path_when_walk_fails() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("first.txt")).unwrap();

        let root = dir.path().to_string_lossy().into_owned();
        let vars = variables(&[("Root", root.as_str())]);
        let mut realizer = PathRealizer::new(&vars);

        // Caches the listing of `dir` without the file created below
        assert_eq!(realizer.resolve("<Root>\\first.txt"), dir.path().join("first.txt"));
        File::create(dir.path().join("later.txt")).unwrap();

        let joined = realizer.join("<Root>\\later.txt");
        assert_eq!(realizer.correct_case(&joined), None);
        assert_eq!(realizer.resolve("<Root>\\later.txt"), joined);
    }

    #[test]
    fn test_realize_classification() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("folder")).unwrap();
        File::create(dir.path().join("file.txt")).unwrap();

        let root = dir.path().to_string_lossy().into_owned();
        let vars = variables(&[("Root", root.as_str())]);
        let mut realizer = PathRealizer::new(&vars);

        let file = realizer.realize("<Root>\\file.txt");
        assert!(file.is_file());
        assert_eq!(file.real_path, dir.path().join("file.txt"));

        let folder = realizer.realize("<Root>\\folder");
        assert!(folder.exists && folder.is_directory);
        assert!(!folder.is_file());

        let missing = realizer.realize("<Root>\\nothing.txt");
        assert!(missing.is_missing());
        assert_eq!(missing.real_path, dir.path().join("nothing.txt"));
    }

    #[test]
    fn test_realize_is_idempotent() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("file.txt")).unwrap();

        let root = dir.path().to_string_lossy().into_owned();
        let vars = variables(&[("Root", root.as_str())]);
        let mut realizer = PathRealizer::new(&vars);

        let first = realizer.realize("<Root>\\file.txt");
        let second = realizer.realize("<Root>\\file.txt");
        assert_eq!(first, second);
    }

    #[cfg(any(windows, target_os = "macos"))]
    #[test]
    fn test_miscased_reference_takes_disk_casing() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Data").join("SUB")).unwrap();
        let actual = dir.path().join("Data").join("SUB").join("File.TXT");
        File::create(&actual).unwrap();

        let data = dir.path().join("Data").to_string_lossy().into_owned();
        let vars = variables(&[("Foo", data.as_str())]);
        let mut realizer = PathRealizer::new(&vars);

        let resolved = realizer.realize("<Foo>\\sub\\file.txt");
        assert!(resolved.is_file());
        assert_eq!(
            resolved.real_path.file_name().unwrap(),
            actual.file_name().unwrap()
        );
        assert!(resolved.real_path.to_string_lossy().contains("SUB"));
    }
}
