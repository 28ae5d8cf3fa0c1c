//! Source discovery
//!
//! Enumerates the files of one extension under a root, skipping anything
//! inside hidden directories (or hidden itself), in a stable order.

use crate::error::{BuildError, BuildResult};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// What a discovered file is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Compiled into the project
    Implementation,
    /// Fed to the codegen generator
    TypeDescriptor,
}

/// A discovered file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn implementation(path: impl Into<PathBuf>) -> Self {
        Self::new(path, SourceKind::Implementation)
    }
}

/// Discover every `*.<extension>` file under `root`
///
/// Files are returned sorted by their forward-slash path so repeated runs over
/// an unchanged tree agree. Only components below `root` count as hidden.
pub fn discover(root: &Path, extension: &str, kind: SourceKind) -> BuildResult<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(BuildError::SourceRootMissing {
            root: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BuildError::io(path, e.into())
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some(extension) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if is_hidden(relative) {
            continue;
        }

        files.push(SourceFile::new(path, kind));
    }

    files.sort_by_cached_key(|f| normalized(&f.path));
    Ok(files)
}

/// Discover compilable sources
pub fn discover_sources(root: &Path, extension: &str) -> BuildResult<Vec<SourceFile>> {
    discover(root, extension, SourceKind::Implementation)
}

/// Discover type-descriptor files for codegen
pub fn discover_descriptors(root: &Path, extension: &str) -> BuildResult<Vec<SourceFile>> {
    discover(root, extension, SourceKind::TypeDescriptor)
}

fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Forward-slash rendering used for ordering
pub fn normalized(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_components() {
        assert!(is_hidden(Path::new(".cache/x.cpp")));
        assert!(is_hidden(Path::new("core/.x.cpp")));
        assert!(!is_hidden(Path::new("core/x.cpp")));
    }

    #[test]
    fn test_missing_root() {
        let err = discover_sources(Path::new("/definitely/not/here"), "cpp").unwrap_err();
        assert!(matches!(err, BuildError::SourceRootMissing { .. }));
    }
}
