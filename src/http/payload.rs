//! Response envelope
//!
//! Handlers return a [`Payload`]; [`Payload::into_response`] turns it into
//! the uniform response: CORS and content type first, handler headers after,
//! and `meta` injected into JSON object bodies.

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};

/// `max-age` of cacheable responses: one week
pub const CACHE_MAX_AGE: Duration = Duration::from_secs(604_800);

pub const CONTENT_TYPE_JSON: &str = "application/json";

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadBody {
    Json(Value),
    Binary(Bytes),
}

/// What a handler produced
#[derive(Debug, Clone)]
pub struct Payload {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: PayloadBody,
    /// Ask the dispatcher to block the calling client
    pub block_client: bool,
}

/// Request facts rendered into `meta`
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub path: String,
    pub search: String,
}

impl Payload {
    /// 200 JSON
    pub fn json(value: Value) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: CONTENT_TYPE_JSON,
            headers: Vec::new(),
            body: PayloadBody::Json(value),
            block_client: false,
        }
    }

    /// 200 binary with an explicit content type
    pub fn binary(bytes: impl Into<Bytes>, content_type: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            content_type,
            headers: Vec::new(),
            body: PayloadBody::Binary(bytes.into()),
            block_client: false,
        }
    }

    /// `{ "error": message }` with `status`
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::json(json!({ "error": message.into() })).with_status(status)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(HeaderName, HeaderValue)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn blocking_client(mut self) -> Self {
        self.block_client = true;
        self
    }

    pub fn into_response(self, meta: &RequestMeta, elapsed: Duration) -> Response {
        let status = self.status;
        let body = match self.body {
            PayloadBody::Binary(bytes) => Body::from(bytes),
            PayloadBody::Json(mut value) => {
                if let Value::Object(map) = &mut value {
                    map.insert(
                        "meta".to_string(),
                        json!({
                            "path": meta.path,
                            "search": meta.search,
                            "processingTime": format!("{}ms", elapsed.as_millis()),
                            "status": status.as_u16(),
                        }),
                    );
                }
                Body::from(value.to_string())
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;

        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        for (name, value) in cors_headers() {
            headers.insert(name, value);
        }
        for (name, value) in self.headers {
            headers.insert(name, value);
        }

        response
    }
}

/// Permissive CORS headers sent on every response
pub fn cors_headers() -> [(HeaderName, HeaderValue); 3] {
    [
        (
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ),
    ]
}

/// `Cache-Control`, `Expires` and `ETag` for cacheable endpoints
pub fn cache_headers(etag: &str) -> Vec<(HeaderName, HeaderValue)> {
    let max_age = CACHE_MAX_AGE.as_secs();
    let expires = Utc::now() + chrono::Duration::seconds(max_age as i64);

    let mut headers = vec![(
        header::CACHE_CONTROL,
        HeaderValue::from_str(&format!("public, max-age={}", max_age))
            .unwrap_or_else(|_| HeaderValue::from_static("public")),
    )];
    if let Ok(value) = HeaderValue::from_str(&expires.format(HTTP_DATE).to_string()) {
        headers.push((header::EXPIRES, value));
    }
    match HeaderValue::from_str(etag) {
        Ok(value) => headers.push((header::ETAG, value)),
        Err(_) => tracing::warn!(etag, "static ETag is not a valid header value"),
    }
    headers
}

/// Bare response with CORS headers and no body (204 pre-flight, 304)
pub fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    for (name, value) in cors_headers() {
        response.headers_mut().insert(name, value);
    }
    response
}
