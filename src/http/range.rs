//! `Range` request header parsing.

use thiserror::Error;

/// The header could not be turned into byte ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid range")]
pub struct RangeError;

/// Half-open byte interval `[start, start + length)` of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRange {
    pub start: u64,
    pub length: u64,
}

impl HttpRange {
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// `Content-Range` value for this range of a `size`-byte resource.
    pub fn content_range(&self, size: u64) -> String {
        match self.end().checked_sub(1) {
            Some(last) => format!("bytes {}-{}/{}", self.start, last, size),
            // Empty range at offset zero has no last byte to name
            None => format!("bytes */{size}"),
        }
    }
}

/// Parse a `Range` header against a resource of `size` bytes.
///
/// An empty header yields no ranges. Ranges come back in header order;
/// overlapping or repeated ranges are passed through untouched.
pub fn parse_range(header: &str, size: u64) -> Result<Vec<HttpRange>, RangeError> {
    if header.is_empty() {
        return Ok(Vec::new());
    }
    let specs = header.strip_prefix("bytes=").ok_or(RangeError)?;

    let mut ranges = Vec::new();
    for spec in specs.split(',') {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        let (start, end) = spec.split_once('-').ok_or(RangeError)?;
        let (start, end) = (start.trim(), end.trim());

        let range = if start.is_empty() {
            // Suffix form: the last N bytes
            let suffix = end.parse::<u64>().map_err(|_| RangeError)?.min(size);
            HttpRange::new(size - suffix, suffix)
        } else {
            let start = start.parse::<u64>().map_err(|_| RangeError)?;
            if start > size {
                return Err(RangeError);
            }
            if end.is_empty() {
                HttpRange::new(start, size - start)
            } else {
                let last = end.parse::<u64>().map_err(|_| RangeError)?;
                if start > last {
                    return Err(RangeError);
                }
                let end = last.saturating_add(1).min(size);
                HttpRange::new(start, end - start)
            }
        };
        ranges.push(range);
    }

    Ok(ranges)
}

/// Total number of bytes named by `ranges`, saturating on overflow.
pub fn sum_ranges_size(ranges: &[HttpRange]) -> u64 {
    ranges
        .iter()
        .fold(0u64, |total, range| total.saturating_add(range.length))
}
