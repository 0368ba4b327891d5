use std::path::{Path, PathBuf};

/// Where assets come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// Load the archive into memory and serve from there
    Archive,
    /// Serve the unpacked directory next to the archive, straight from disk
    Directory,
}

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub mode: ServeMode,
    /// Archive path; in directory mode the directory is derived from it
    pub path: PathBuf,
}

impl ServeConfig {
    pub fn new(mode: ServeMode, path: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            path: path.into(),
        }
    }

    /// Directory holding the unpacked assets: the archive path with every
    /// extension removed (`assets/site.tar.gz` -> `assets/site`).
    pub fn directory(&self) -> PathBuf {
        strip_extensions(&self.path)
    }
}

fn strip_extensions(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    parent.join(stem)
}
