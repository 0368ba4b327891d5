//! ZIP archive parsing and in-memory extraction.
//!
//! - [`structures`]: records of the ZIP format (EOCD, ZIP64 records, entries)
//! - [`parser`]: reads those records from a [`ReadAt`](crate::io::ReadAt) source
//! - [`extractor`]: decompresses members into memory
//!
//! The End of Central Directory is located first, then the Central
//! Directory, so member metadata is known before any member data is read.
//!
//! Supported: standard ZIP and ZIP64, STORED and DEFLATE members,
//! extended-timestamp and NTFS modification times. Encryption and
//! multi-disk archives are rejected.

mod extractor;
mod parser;
mod structures;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
