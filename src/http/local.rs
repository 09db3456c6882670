//! Local static file serving for requests no proxy rule matches.
//!
//! # Design Decisions
//! - `/` and paths ending in `/` map to `index.html`
//! - Segments are percent-decoded first, then any `..` segment is refused
//!   outright, no normalization
//! - JavaScript passes through the define table on the way out

use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};

use crate::define::DefineTable;

/// Outcome of a local lookup, before it becomes a response.
#[derive(Debug)]
pub enum LocalFile {
    Found { path: PathBuf, contents: Vec<u8> },
    Forbidden,
    NotFound,
}

/// Map a request path to a file under `root`.
pub fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let mut path = root.to_path_buf();
    for raw in relative.split('/') {
        let segment = urlencoding::decode(raw).ok()?;
        match segment.as_ref() {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(['/', '\\', '\0']) => return None,
            s => path.push(s),
        }
    }
    if relative.is_empty() || request_path.ends_with('/') {
        path.push("index.html");
    }
    Some(path)
}

pub async fn load(root: &Path, request_path: &str) -> LocalFile {
    let Some(path) = resolve_path(root, request_path) else {
        return LocalFile::Forbidden;
    };
    match tokio::fs::read(&path).await {
        Ok(contents) => LocalFile::Found { path, contents },
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "Local file unavailable");
            LocalFile::NotFound
        }
    }
}

/// Serve `request_path` from `root`, or 404 when there is no root.
pub async fn serve(root: Option<&Path>, request_path: &str, defines: &DefineTable) -> Response<Body> {
    let Some(root) = root else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    match load(root, request_path).await {
        LocalFile::Found { path, contents } => {
            let content_type = content_type(&path);
            let body = if is_script(&path) {
                match String::from_utf8(contents) {
                    Ok(source) => Body::from(defines.apply(&source).into_owned()),
                    Err(e) => Body::from(e.into_bytes()),
                }
            } else {
                Body::from(contents)
            };

            let mut response = Response::new(body);
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            response
        }
        LocalFile::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
        LocalFile::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or_default()
}

fn is_script(path: &Path) -> bool {
    matches!(extension(path), "js" | "mjs" | "cjs")
}

fn content_type(path: &Path) -> &'static str {
    match extension(path) {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" | "cjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
