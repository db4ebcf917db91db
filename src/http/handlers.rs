//! Route handlers
//!
//! Each handler turns a request into a [`Payload`]. None of them fails:
//! errors become 4xx/5xx payloads here, and store failures are logged and
//! worked around.

use std::io;

use axum::http::{StatusCode, Uri};
use axum::extract::Query;
use serde_json::json;

use super::payload::{cache_headers, Payload};
use super::routes::{templates, ParamValue, Params};
use super::AppState;
use crate::find_cache::canonical_key;
use crate::scripture::{FindFilters, LookupError, ReferenceMatch};

/// Most results a single find window may span, and most matches resolved per query
pub const MAX_RESULTS: usize = 50;

const DEFAULT_START: usize = 0;
const DEFAULT_END: usize = 5;

/// Decoded query string, repeated keys preserved
#[derive(Debug, Clone, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn from_uri(uri: &Uri) -> Self {
        match Query::<Vec<(String, String)>>::try_from_uri(uri) {
            Ok(Query(pairs)) => Self(pairs),
            Err(e) => {
                tracing::debug!(error = %e, "unparsable query string");
                Self::default()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .collect()
    }
}

pub fn home() -> Payload {
    Payload::json(json!({ "routes": templates() }))
}

fn window_bound(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

pub async fn find(state: &AppState, query: &QueryParams) -> Payload {
    let reference = match query.get("ref") {
        Some(reference) if !reference.is_empty() => reference.to_string(),
        _ => return Payload::json(json!({ "results": [], "input": "" })),
    };

    let books = query.get_all("book");
    let volumes = query.get_all("volume");

    let start = window_bound(query.get("start"), DEFAULT_START);
    let end = window_bound(query.get("end"), DEFAULT_END);

    if start > end {
        return Payload::error(
            StatusCode::BAD_REQUEST,
            format!(
                "start must be less than end. Received start {} and end {}.",
                start, end
            ),
        );
    }
    if end - start > MAX_RESULTS {
        return Payload::error(
            StatusCode::BAD_REQUEST,
            format!(
                "Max allowance is {} results. Received {}.",
                MAX_RESULTS,
                end - start
            ),
        );
    }

    let key = canonical_key(&reference, &books, &volumes);

    let cached = match state.cache.exists(&key).await {
        Ok(true) => match state.cache.read::<ReferenceMatch>(&key, start, end).await {
            Ok(results) => Some(results),
            Err(e) => {
                tracing::warn!(%key, error = %e, "failed to read cached find results");
                None
            }
        },
        Ok(false) => None,
        Err(e) => {
            tracing::warn!(%key, error = %e, "failed to check find cache");
            None
        }
    };

    let results = match cached {
        Some(results) => results,
        None => {
            let filters = FindFilters { books, volumes };
            let matches = state.scripture.find(&reference, &filters, MAX_RESULTS);

            let cache = state.cache.clone();
            let to_store = matches.clone();
            tokio::spawn(async move {
                if let Err(e) = cache.store(&key, &to_store).await {
                    tracing::warn!(%key, error = %e, "failed to cache find results");
                }
            });

            let from = start.min(matches.len());
            let to = end.min(matches.len());
            matches[from..to].to_vec()
        }
    };

    Payload::json(json!({ "results": results, "input": reference }))
        .with_headers(cache_headers(&state.static_etag))
}

pub fn parse(state: &AppState, query: &QueryParams) -> Payload {
    let headers = cache_headers(&state.static_etag);

    let reference = match query.get("ref") {
        Some(reference) if !reference.is_empty() => reference,
        _ => return Payload::json(json!({ "results": [], "input": "" })).with_headers(headers),
    };

    let with_content = query.get("content") == Some("true");
    let result = state.scripture.parse(reference, with_content);

    Payload::json(json!({ "result": result, "input": reference })).with_headers(headers)
}

/// HTTP status of a lookup failure
pub fn lookup_status(error: &LookupError) -> StatusCode {
    match error {
        LookupError::UnknownBook(_) => StatusCode::NOT_FOUND,
        LookupError::InvalidChapter(_)
        | LookupError::ChapterOutOfRange { .. }
        | LookupError::VerseOutOfRange { .. } => StatusCode::BAD_REQUEST,
        LookupError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn reference(state: &AppState, params: &Params) -> Payload {
    let slug = params.get("book").map(ToString::to_string).unwrap_or_default();
    let (chapter, raw_chapter) = match params.get("chapter") {
        Some(value) => (value.as_int(), value.to_string()),
        None => (None, String::new()),
    };
    let verses = params.get("verses").map(ParamValue::to_string);

    match state
        .scripture
        .lookup(&slug, chapter, &raw_chapter, verses.as_deref())
    {
        Ok(content) => Payload::json(json!({ "content": content })),
        Err(LookupError::Internal(detail)) => {
            tracing::error!(%slug, chapter = %raw_chapter, %detail, "reference lookup failed");
            Payload::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        Err(e) => Payload::error(lookup_status(&e), e.to_string()),
    }
}

pub async fn serve_static(state: &AppState, file: &str, content_type: &'static str) -> Payload {
    let path = state.static_dir.join(file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Payload::binary(bytes, content_type),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Payload::error(StatusCode::NOT_FOUND, "Not found")
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read static file");
            Payload::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Scanner bait: answer 404 and have the dispatcher block the caller
pub fn trap(client: &str) -> Payload {
    tracing::info!(client, "blocking client");
    Payload::json(json!({ "blocked": client }))
        .with_status(StatusCode::NOT_FOUND)
        .blocking_client()
}

/// Replaces routing for blocked clients: count the offense, stall, then 404
pub async fn blocked(state: &AppState, client: &str) -> Payload {
    if let Err(e) = state.blocklist.record_offense(client).await {
        tracing::warn!(client, error = %e, "failed to record offense");
    }

    tokio::select! {
        _ = tokio::time::sleep(state.blocked_stall) => {}
        _ = state.shutting_down() => {
            tracing::debug!(client, "stall cut short by shutdown");
        }
    }

    Payload::json(json!({ "blocked": client })).with_status(StatusCode::NOT_FOUND)
}
