//! Static asset resolution from a directory on disk.
//!
//! `/` and `/index.html` are the same document. A miss serves `404.html`
//! when the root has one, otherwise a plain `Not Found`.

use std::io;
use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use thiserror::Error;

use crate::assets::content_type::content_type_header;
use crate::http::response::text;

pub const INDEX_DOCUMENT: &str = "index.html";
pub const NOT_FOUND_DOCUMENT: &str = "404.html";
pub const CACHE_CONTROL: &str = "public, max-age=31536000";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read asset '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct StaticAssets {
    root: PathBuf,
}

impl StaticAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path to a path relative to the root.
    ///
    /// Returns `None` for anything that could escape the root.
    pub fn normalize(path: &str) -> Option<String> {
        if path == "/" || path == "/index.html" {
            return Some(INDEX_DOCUMENT.to_string());
        }
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        let safe = Path::new(relative)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| relative.to_string())
    }

    /// Serve the asset for a request path.
    pub async fn serve(&self, path: &str) -> Result<Response, AssetError> {
        let Some(relative) = Self::normalize(path) else {
            tracing::debug!(path = %path, "Rejected asset path");
            return Ok(self.not_found().await);
        };

        tracing::debug!(asset = %relative, "Loading asset");
        match self.read(&relative).await? {
            Some(bytes) => Ok(found(&relative, bytes)),
            None => {
                tracing::info!(asset = %relative, "Asset not found");
                Ok(self.not_found().await)
            }
        }
    }

    /// `Ok(None)` when the file does not exist or is not a regular file.
    async fn read(&self, relative: &str) -> Result<Option<Vec<u8>>, AssetError> {
        let full = self.root.join(relative);
        let read_error = |source: io::Error| AssetError::Read {
            path: full.clone(),
            source,
        };

        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => tokio::fs::read(&full).await.map(Some).map_err(read_error),
            Ok(_) => Ok(None),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(read_error(e)),
        }
    }

    async fn not_found(&self) -> Response {
        match self.read(NOT_FOUND_DOCUMENT).await {
            Ok(Some(bytes)) => {
                let mut response = Response::new(Body::from(bytes));
                *response.status_mut() = StatusCode::NOT_FOUND;
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html;charset=UTF-8"),
                );
                response
            }
            Ok(None) => plain_not_found(),
            Err(e) => {
                tracing::error!(error = %e, "Error loading 404 page");
                plain_not_found()
            }
        }
    }
}

fn is_missing(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

fn found(relative: &str, bytes: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type_header(relative)) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    response
}

fn plain_not_found() -> Response {
    text(StatusCode::NOT_FOUND, "Not Found")
}
