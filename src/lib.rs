//! # packserve
//!
//! Serve static assets bundled in a single archive over HTTP, entirely from
//! memory.
//!
//! The archive is read once at startup into an immutable [`ContentStore`];
//! after that no disk access happens. Requests are answered with full
//! conditional-GET and byte-range semantics.
//!
//! ## Features
//!
//! - `.zip` (STORED and DEFLATE, ZIP64), `.tar.gz` and `.tar.bz2` archives
//! - `If-Modified-Since`, `If-None-Match` and `If-Range` validators
//! - Single and multi-range `Range` requests, with `multipart/byteranges`
//!   bodies whose length is known before streaming starts
//! - A directory mode that serves the unpacked tree from disk
//!
//! ## Example
//!
//! ```no_run
//! use packserve::{ServeConfig, ServeMode, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServeConfig::new(ServeMode::Archive, "site.zip");
//!     let app = server::router(&config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod http;
pub mod io;
pub mod server;
pub mod store;
pub mod zip;

pub use cli::Cli;
pub use config::{ServeConfig, ServeMode};
pub use http::AssetHandler;
pub use store::{ContentStore, Entry};
