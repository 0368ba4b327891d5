use std::io::Read;
use std::sync::Arc;

use crate::io::ReadAt;
use crate::store::Entry;
use anyhow::{Context, Result, bail};
use flate2::Crc;
use flate2::read::DeflateDecoder;
use tracing::debug;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Decompress one member into memory, verifying its size and CRC-32.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.get_data_offset(entry).await?;
        if data_offset.saturating_add(entry.compressed_size) > self.parser.size() {
            bail!("{}: member data extends past end of archive", entry.file_name);
        }

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut raw)
            .await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                // Declared size is untrusted; read at most one byte past it
                let mut out = Vec::new();
                DeflateDecoder::new(raw.as_slice())
                    .take(entry.uncompressed_size.saturating_add(1))
                    .read_to_end(&mut out)
                    .with_context(|| format!("{}: corrupt deflate stream", entry.file_name))?;
                out
            }
            CompressionMethod::Unknown(method) => {
                bail!(
                    "{}: unsupported compression method {} (only STORED and DEFLATE are supported)",
                    entry.file_name,
                    method
                );
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "{}: expected {} bytes, decompressed {}",
                entry.file_name,
                entry.uncompressed_size,
                data.len()
            );
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!("{}: checksum mismatch", entry.file_name);
        }

        Ok(data)
    }

    /// Materialize every member of the archive.
    ///
    /// The first failing member aborts the whole load.
    pub async fn extract_all(&self) -> Result<Vec<Entry>> {
        let listing = self.list_files().await?;
        let mut entries = Vec::with_capacity(listing.len());

        for file in listing {
            let content = self.extract_to_memory(&file).await?;
            debug!(name = %file.file_name, size = content.len(), "loaded zip member");
            entries.push(Entry::new(
                file.file_name.clone(),
                file.is_directory,
                file.modified(),
                content,
            ));
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::LocalFileReader;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &std::path::Path) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let mtime = zip::DateTime::from_date_and_time(2020, 1, 2, 3, 4, 6).unwrap();

        let stored = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .last_modified_time(mtime);
        zip.start_file("a.txt", stored).unwrap();
        zip.write_all(b"hello").unwrap();

        zip.add_directory("dir/", stored).unwrap();

        let deflated = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(mtime);
        zip.start_file("dir/b.bin", deflated).unwrap();
        zip.write_all(&[0u8; 4096]).unwrap();

        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn extracts_stored_and_deflated_members() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.zip");
        write_zip(&path);

        let reader = Arc::new(LocalFileReader::new(&path).unwrap());
        let entries = ZipExtractor::new(reader).extract_all().await.unwrap();
        assert_eq!(entries.len(), 3);

        let a = entries.iter().find(|e| e.name() == "a.txt").unwrap();
        assert_eq!(a.content().as_ref(), b"hello");
        assert!(!a.is_dir());
        assert_eq!(
            a.last_modified(),
            Some(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 6).unwrap())
        );

        let d = entries.iter().find(|e| e.name() == "dir/").unwrap();
        assert!(d.is_dir());

        let b = entries.iter().find(|e| e.name() == "dir/b.bin").unwrap();
        assert_eq!(b.content().as_ref(), &[0u8; 4096][..]);
    }

    #[tokio::test]
    async fn corrupted_member_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.zip");
        write_zip(&path);

        // "hello" is stored verbatim; flip it so the CRC no longer matches
        let mut bytes = std::fs::read(&path).unwrap();
        let at = bytes.windows(5).position(|w| w == b"hello").unwrap();
        bytes[at] = b'j';
        std::fs::write(&path, bytes).unwrap();

        let reader = Arc::new(LocalFileReader::new(&path).unwrap());
        let err = ZipExtractor::new(reader).extract_all().await.unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    /// Overwrite the uncompressed size recorded for `name` in the central directory.
    fn patch_uncompressed_size(path: &std::path::Path, name: &str, size: u32) {
        let mut bytes = std::fs::read(path).unwrap();
        let mut at = 0;
        loop {
            let offset = bytes[at..]
                .windows(4)
                .position(|w| w == [0x50, 0x4b, 0x01, 0x02])
                .unwrap();
            at += offset;
            let name_len = u16::from_le_bytes([bytes[at + 28], bytes[at + 29]]) as usize;
            if &bytes[at + 46..at + 46 + name_len] == name.as_bytes() {
                bytes[at + 24..at + 28].copy_from_slice(&size.to_le_bytes());
                break;
            }
            at += 4;
        }
        std::fs::write(path, bytes).unwrap();
    }

    #[tokio::test]
    async fn inflated_size_claim_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.zip");
        write_zip(&path);
        patch_uncompressed_size(&path, "dir/b.bin", 0xFFFF_FFF0);

        let reader = Arc::new(LocalFileReader::new(&path).unwrap());
        let err = ZipExtractor::new(reader).extract_all().await.unwrap_err();
        assert!(err.to_string().contains("expected 4294967280 bytes"), "{err}");
    }

    #[tokio::test]
    async fn understated_size_claim_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.zip");
        write_zip(&path);
        patch_uncompressed_size(&path, "dir/b.bin", 16);

        let reader = Arc::new(LocalFileReader::new(&path).unwrap());
        let err = ZipExtractor::new(reader).extract_all().await.unwrap_err();
        assert!(err.to_string().contains("expected 16 bytes, decompressed 17"), "{err}");
    }

    #[tokio::test]
    async fn not_a_zip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not a zip archive").unwrap();

        let reader = Arc::new(LocalFileReader::new(file.path()).unwrap());
        assert!(ZipExtractor::new(reader).list_files().await.is_err());
    }
}
