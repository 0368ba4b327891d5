//! Router construction for both serving modes.

use std::path::Path;

use anyhow::Result;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use percent_encoding::percent_decode_str;
use tower_http::services::ServeDir;
use tracing::info;

use crate::archive;
use crate::config::{ServeConfig, ServeMode};
use crate::http::AssetHandler;

/// Build the router for `config`.
///
/// In archive mode the archive is loaded completely before this returns;
/// a load failure is returned to the caller, who decides on any fallback.
pub async fn router(config: &ServeConfig) -> Result<Router> {
    match config.mode {
        ServeMode::Directory => Ok(directory_router(&config.directory())),
        ServeMode::Archive => {
            let store = archive::load(&config.path).await?;
            Ok(archive_router(AssetHandler::new(store)))
        }
    }
}

/// Route every request path to the in-memory asset handler.
pub fn archive_router(handler: AssetHandler) -> Router {
    Router::new().fallback(serve_asset).with_state(handler)
}

/// Serve a plain directory from disk.
pub fn directory_router(dir: &Path) -> Router {
    info!(dir = %dir.display(), "serving directory");
    Router::new().fallback_service(ServeDir::new(dir))
}

async fn serve_asset(
    State(handler): State<AssetHandler>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = percent_decode_str(uri.path()).decode_utf8_lossy();
    handler.serve(&method, &path, &headers, HeaderMap::new())
}
