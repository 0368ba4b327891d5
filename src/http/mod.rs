//! HTTP resource delivery: conditional requests, byte ranges and
//! `multipart/byteranges` bodies over an in-memory [`ContentStore`](crate::store::ContentStore).

mod date;
mod handler;
pub mod multipart;
pub mod range;
pub mod sniff;

pub use date::{format_http_date, parse_http_date};
pub use handler::AssetHandler;
pub use multipart::MultipartByteranges;
pub use range::{HttpRange, RangeError, parse_range};
pub use sniff::detect_content_type;
