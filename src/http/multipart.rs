//! `multipart/byteranges` encoding.
//!
//! Framing is written through [`std::io::Write`] so the same code feeds
//! both the byte-counting size estimate and the streamed body. Part layout:
//!
//! ```text
//! --BOUNDARY\r\n                      (first part)
//! \r\n--BOUNDARY\r\n                  (later parts)
//! Content-Range: bytes a-b/size\r\n
//! Content-Type: <type>\r\n
//! \r\n
//! <range bytes>
//! \r\n--BOUNDARY--\r\n                (after the last part)
//! ```

use std::io::{self, Write};

use bytes::Bytes;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::range::HttpRange;

/// Chunks buffered between the part producer and the response writer.
const PART_CHANNEL_CAPACITY: usize = 4;

/// Counts how many bytes have been written to it.
#[derive(Debug, Default)]
struct CountingWriter(u64);

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Encoder for one multi-range response.
#[derive(Debug, Clone)]
pub struct MultipartByteranges {
    boundary: String,
    content_type: String,
    size: u64,
    ranges: Vec<HttpRange>,
}

impl MultipartByteranges {
    /// New encoder with a freshly generated random boundary.
    pub fn new(ranges: Vec<HttpRange>, content_type: impl Into<String>, size: u64) -> Self {
        Self::with_boundary(random_boundary(), ranges, content_type, size)
    }

    pub fn with_boundary(
        boundary: impl Into<String>,
        ranges: Vec<HttpRange>,
        content_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            boundary: boundary.into(),
            content_type: content_type.into(),
            size,
            ranges,
        }
    }

    /// Value for the response `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/byteranges; boundary={}", self.boundary)
    }

    /// Exact encoded body length, computed without touching range bytes.
    pub fn encoded_len(&self) -> u64 {
        let mut counter = CountingWriter::default();
        let mut body = 0u64;
        for (index, range) in self.ranges.iter().enumerate() {
            // Writing to the counter cannot fail
            let _ = self.write_part_header(&mut counter, index, range);
            body += range.length;
        }
        let _ = self.write_closing(&mut counter);
        counter.0 + body
    }

    fn write_part_header<W: Write>(
        &self,
        w: &mut W,
        index: usize,
        range: &HttpRange,
    ) -> io::Result<()> {
        if index > 0 {
            w.write_all(b"\r\n")?;
        }
        write!(w, "--{}\r\n", self.boundary)?;
        write!(w, "Content-Range: {}\r\n", range.content_range(self.size))?;
        write!(w, "Content-Type: {}\r\n", self.content_type)?;
        w.write_all(b"\r\n")
    }

    fn write_closing<W: Write>(&self, w: &mut W) -> io::Result<()> {
        if !self.ranges.is_empty() {
            w.write_all(b"\r\n")?;
        }
        write!(w, "--{}--\r\n", self.boundary)
    }

    fn part_header(&self, index: usize, range: &HttpRange) -> Bytes {
        let mut buf = Vec::with_capacity(128 + self.boundary.len() + self.content_type.len());
        // Vec<u8> writes are infallible
        let _ = self.write_part_header(&mut buf, index, range);
        Bytes::from(buf)
    }

    fn closing(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.boundary.len() + 8);
        let _ = self.write_closing(&mut buf);
        Bytes::from(buf)
    }

    /// Stream the encoded body for `content`.
    ///
    /// A spawned producer pushes framing and range slices through a bounded
    /// channel, so early parts can be flushed while later ones are still
    /// being produced. A range that does not fit `content` ends the stream
    /// with an error; a dropped consumer stops the producer.
    pub fn into_stream(self, content: Bytes) -> ReceiverStream<io::Result<Bytes>> {
        let (tx, rx) = mpsc::channel(PART_CHANNEL_CAPACITY);
        tokio::spawn(self.produce(content, tx));
        ReceiverStream::new(rx)
    }

    /// Feed the encoded body into `tx`. Returns `true` once the closing
    /// delimiter has been handed over, `false` if the stream was cut short.
    async fn produce(self, content: Bytes, tx: mpsc::Sender<io::Result<Bytes>>) -> bool {
        for (index, range) in self.ranges.iter().enumerate() {
            if tx.send(Ok(self.part_header(index, range))).await.is_err() {
                debug!("multipart consumer went away");
                return false;
            }

            let start = range.start as usize;
            let end = range.end() as usize;
            if range.end() > content.len() as u64 {
                let err = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("range {start}-{end} exceeds content of {} bytes", content.len()),
                );
                let _ = tx.send(Err(err)).await;
                return false;
            }
            if tx.send(Ok(content.slice(start..end))).await.is_err() {
                debug!("multipart consumer went away");
                return false;
            }
        }
        tx.send(Ok(self.closing())).await.is_ok()
    }
}

/// 30 random bytes, hex encoded.
fn random_boundary() -> String {
    let mut bytes = [0u8; 30];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}
