use super::ReadAt;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Archive file on local disk, read with positional reads on the blocking pool
pub struct LocalFileReader {
    #[cfg(unix)]
    file: Arc<File>,
    #[cfg(not(unix))]
    file: Arc<std::sync::Mutex<File>>,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open archive {}", path.display()))?;
        let size = file.metadata()?.len();

        #[cfg(not(unix))]
        let file = std::sync::Mutex::new(file);

        Ok(Self {
            file: Arc::new(file),
            size,
        })
    }
}

#[cfg(unix)]
fn pread(file: &File, offset: u64, buf: &mut [u8]) -> Result<usize> {
    use std::os::unix::fs::FileExt;
    Ok(file.read_at(buf, offset)?)
}

#[cfg(not(unix))]
fn pread(file: &std::sync::Mutex<File>, offset: u64, buf: &mut [u8]) -> Result<usize> {
    use std::io::{Read, Seek, SeekFrom};
    // Seek and read must happen under the same lock
    let mut file = file
        .lock()
        .map_err(|_| anyhow::anyhow!("Archive file handle poisoned"))?;
    file.seek(SeekFrom::Start(offset))?;
    Ok(file.read(buf)?)
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let file = Arc::clone(&self.file);
        let len = buf.len();
        let (n, chunk) = tokio::task::spawn_blocking(move || {
            let mut chunk = vec![0u8; len];
            let n = pread(&file, offset, &mut chunk)?;
            anyhow::Ok((n, chunk))
        })
        .await
        .context("File read task panicked")??;

        buf[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
