//! Archive ingestion.
//!
//! [`load`] reads an archive exactly once and materializes every member
//! into a [`ContentStore`]. The load is all-or-nothing: any error while
//! opening, decompressing or reading a member discards everything read so
//! far and no store is returned.

mod tarball;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use tracing::info;

use crate::io::LocalFileReader;
use crate::store::{ContentStore, Entry};
use crate::zip::ZipExtractor;

/// Supported archive containers, chosen by file-name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarBz2,
}

impl ArchiveFormat {
    /// Detect the format from a case-insensitive suffix of the file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") {
            Some(Self::TarBz2)
        } else {
            None
        }
    }
}

/// Load an archive into an immutable [`ContentStore`].
pub async fn load(path: &Path) -> Result<ContentStore> {
    let Some(format) = ArchiveFormat::from_path(path) else {
        bail!(
            "Unsupported archive type for {} (expected .zip, .tar.gz or .tar.bz2)",
            path.display()
        );
    };

    let entries = match format {
        ArchiveFormat::Zip => {
            let reader = Arc::new(LocalFileReader::new(path)?);
            ZipExtractor::new(reader).extract_all().await
        }
        ArchiveFormat::TarGz | ArchiveFormat::TarBz2 => {
            let owned: PathBuf = path.to_path_buf();
            tokio::task::spawn_blocking(move || load_tar(&owned, format))
                .await
                .context("Archive loader thread panicked")?
        }
    }
    .with_context(|| format!("Failed to load archive {}", path.display()))?;

    let store: ContentStore = entries.into_iter().collect();
    info!(
        archive = %path.display(),
        members = store.len(),
        bytes = store.total_bytes(),
        "archive loaded"
    );
    Ok(store)
}

fn load_tar(path: &Path, format: ArchiveFormat) -> Result<Vec<Entry>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    // Concatenated streams (pigz, pbzip2, `cat a.gz b.gz`) form one archive
    if format == ArchiveFormat::TarBz2 {
        tarball::read_entries(MultiBzDecoder::new(reader))
    } else {
        tarball::read_entries(MultiGzDecoder::new(reader))
    }
}
