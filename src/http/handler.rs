//! Per-request resource delivery.
//!
//! [`AssetHandler::serve`] runs strictly in order: lookup, `If-Modified-Since`,
//! `If-Range` / `If-None-Match`, content type, `Range`, then emission. The
//! caller may pre-populate the outgoing headers (`ETag`, `Content-Type`,
//! `Content-Encoding`); the handler reads them but never computes an ETag.

use std::borrow::Cow;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
    IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, LAST_MODIFIED, RANGE, X_CONTENT_TYPE_OPTIONS,
};
use axum::http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use super::date::{format_http_date, parse_http_date};
use super::multipart::MultipartByteranges;
use super::range::{HttpRange, parse_range, sum_ranges_size};
use super::sniff::detect_content_type;
use crate::store::ContentStore;

/// Serves entries of a shared, immutable [`ContentStore`].
#[derive(Debug, Clone)]
pub struct AssetHandler {
    store: Arc<ContentStore>,
}

/// What the body of a successful response is made of.
enum Payload {
    Whole(Bytes),
    Multipart(MultipartByteranges, Bytes),
}

impl AssetHandler {
    pub fn new(store: ContentStore) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Answer one request.
    ///
    /// `path` is the decoded request path. `headers` is the outgoing header
    /// map as the caller prepared it; it becomes the response headers.
    pub fn serve(
        &self,
        method: &Method,
        path: &str,
        request: &HeaderMap,
        mut headers: HeaderMap,
    ) -> Response<Body> {
        let Some(entry) = self.store.get(path) else {
            debug!(path, "asset not found");
            return error_response(StatusCode::NOT_FOUND, "404 page not found", headers);
        };

        if check_last_modified(request, entry.last_modified(), &mut headers) {
            return empty_response(StatusCode::NOT_MODIFIED, headers);
        }

        let Some(range_header) = check_etag(method, request, &mut headers) else {
            return empty_response(StatusCode::NOT_MODIFIED, headers);
        };

        let content = entry.content();
        let content_type = resolve_content_type(path, content, &mut headers);

        let size = entry.size();
        let mut ranges = match parse_range(&range_header, size) {
            Ok(ranges) => ranges,
            Err(err) => {
                debug!(path, range = %range_header, "rejecting range request");
                return error_response(StatusCode::RANGE_NOT_SATISFIABLE, &err.to_string(), headers);
            }
        };
        if sum_ranges_size(&ranges) > size {
            // Ranges add up to more than the resource; send it whole
            ranges.clear();
        }

        let (status, send_size, payload) = match ranges.as_slice() {
            [] => (StatusCode::OK, size, Payload::Whole(content.clone())),
            [range] => {
                set_header(&mut headers, CONTENT_RANGE, &range.content_range(size));
                (
                    StatusCode::PARTIAL_CONTENT,
                    range.length,
                    Payload::Whole(slice(content, range)),
                )
            }
            _ => {
                let encoder = MultipartByteranges::new(ranges, content_type, size);
                set_header(&mut headers, CONTENT_TYPE, &encoder.content_type());
                (
                    StatusCode::PARTIAL_CONTENT,
                    encoder.encoded_len(),
                    Payload::Multipart(encoder, content.clone()),
                )
            }
        };

        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if !headers.contains_key(CONTENT_ENCODING) {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(send_size));
        }

        let body = if method == Method::HEAD {
            Body::empty()
        } else {
            match payload {
                Payload::Whole(bytes) => Body::from(bytes),
                Payload::Multipart(encoder, content) => {
                    Body::from_stream(encoder.into_stream(content))
                }
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// `If-Modified-Since` handling. Returns `true` when the request is answered
/// with 304; otherwise stamps `Last-Modified`.
fn check_last_modified(
    request: &HeaderMap,
    modified: Option<DateTime<Utc>>,
    headers: &mut HeaderMap,
) -> bool {
    let Some(modified) = modified else {
        return false;
    };

    let since = request
        .get(IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date);

    // Last-Modified has whole-second precision, so compare mtime < since + 1s
    if let Some(since) = since {
        if modified < since + TimeDelta::seconds(1) {
            headers.remove(CONTENT_TYPE);
            headers.remove(CONTENT_LENGTH);
            return true;
        }
    }

    set_header(headers, LAST_MODIFIED, &format_http_date(modified));
    false
}

/// `If-Range` and `If-None-Match` handling against the caller-supplied ETag.
///
/// Returns the effective `Range` header (empty when absent or invalidated
/// by `If-Range`), or `None` when the request is answered with 304.
fn check_etag(method: &Method, request: &HeaderMap, headers: &mut HeaderMap) -> Option<String> {
    let etag = headers
        .get(ETAG)
        .map(|value| value.as_bytes().to_vec())
        .unwrap_or_default();

    let mut range = request
        .get(RANGE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();

    // Only ETag validators are understood; a date in If-Range never matches
    if let Some(if_range) = request.get(IF_RANGE) {
        if !if_range.is_empty() && if_range.as_bytes() != etag.as_slice() {
            range.clear();
        }
    }

    let Some(if_none_match) = request.get(IF_NONE_MATCH) else {
        return Some(range);
    };
    if if_none_match.is_empty() || etag.is_empty() {
        return Some(range);
    }
    if method != Method::GET && method != Method::HEAD {
        return Some(range);
    }

    if if_none_match.as_bytes() == etag.as_slice() || if_none_match == "*" {
        headers.remove(CONTENT_TYPE);
        headers.remove(CONTENT_LENGTH);
        return None;
    }
    Some(range)
}

/// Pick the content type and record it on the response.
///
/// An explicit preset is kept verbatim; an explicit empty preset means "no
/// Content-Type, don't sniff" and is dropped from the response.
fn resolve_content_type(path: &str, content: &Bytes, headers: &mut HeaderMap) -> String {
    if let Some(preset) = headers.get(CONTENT_TYPE) {
        let preset = String::from_utf8_lossy(preset.as_bytes()).into_owned();
        if preset.is_empty() {
            headers.remove(CONTENT_TYPE);
        }
        return preset;
    }

    let content_type = type_by_extension(path)
        .unwrap_or_else(|| Cow::Borrowed(detect_content_type(content)))
        .into_owned();
    set_header(headers, CONTENT_TYPE, &content_type);
    content_type
}

/// Extension lookup; textual types are declared UTF-8.
fn type_by_extension(path: &str) -> Option<Cow<'static, str>> {
    let essence = mime_guess::from_path(path).first_raw()?;
    if essence.starts_with("text/") {
        Some(Cow::Owned(format!("{essence}; charset=utf-8")))
    } else {
        Some(Cow::Borrowed(essence))
    }
}

fn slice(content: &Bytes, range: &HttpRange) -> Bytes {
    content.slice(range.start as usize..range.end() as usize)
}

fn set_header(headers: &mut HeaderMap, name: axum::http::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => debug!(header = %name, "dropping unrepresentable header value"),
    }
}

fn empty_response(status: StatusCode, headers: HeaderMap) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Plain-text error page, keeping whatever headers were already set.
fn error_response(status: StatusCode, message: &str, mut headers: HeaderMap) -> Response<Body> {
    headers.remove(CONTENT_LENGTH);
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    let mut response = Response::new(Body::from(format!("{message}\n")));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
