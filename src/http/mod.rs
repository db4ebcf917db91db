//! HTTP Module
//!
//! The JSON API surface.
//!
//! ## Request Lifecycle
//! ```text
//! received ─┬─ OPTIONS ──────────────────────────► 204
//!           ├─ If-None-Match == static ETag ─────► 304
//!           ├─ client blocked ─► offense, stall ─► 404 {blocked}
//!           └─ routed ─► handler ─► envelope ────► response
//!                                                   │
//!                          request log (background) ◄┘
//! ```
//!
//! Every path goes through a single fallback handler so the declared route
//! order, not axum's router, decides which handler runs.

mod handlers;
mod payload;
mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::blocklist::{client_id, BlockList};
use crate::config::Config;
use crate::error::Result;
use crate::find_cache::FindCache;
use crate::request_log::{LogHandle, LogRecord};
use crate::scripture::ScriptureSource;

pub use handlers::{lookup_status, QueryParams, MAX_RESULTS};
pub use payload::{cache_headers, cors_headers, Payload, PayloadBody, RequestMeta, CACHE_MAX_AGE};
pub use routes::{match_route, templates, Handler, ParamValue, Params, Route, ROUTES};

/// Everything a request handler can reach
pub struct AppState {
    pub scripture: Arc<dyn ScriptureSource>,
    pub cache: FindCache,
    pub blocklist: Arc<BlockList>,
    pub log: LogHandle,
    pub static_etag: String,
    pub static_dir: PathBuf,
    pub blocked_stall: Duration,
    /// Flips to `true` once the server starts shutting down
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(
        config: &Config,
        scripture: Arc<dyn ScriptureSource>,
        cache: FindCache,
        blocklist: Arc<BlockList>,
        log: LogHandle,
    ) -> Self {
        Self {
            scripture,
            cache,
            blocklist,
            log,
            static_etag: config.static_etag.clone(),
            static_dir: config.static_dir.clone(),
            blocked_stall: config.effective_blocked_stall(),
            shutdown: watch::channel(false).0,
        }
    }

    /// Release every stalled blocked client so graceful shutdown is not held up
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once [`AppState::begin_shutdown`] has been called
    pub async fn shutting_down(&self) {
        let mut rx = self.shutdown.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// The service: one fallback dispatcher wrapped in request tracing
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves, then let in-flight requests finish
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    let stopping = Arc::clone(&state);
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        stopping.begin_shutdown();
    })
    .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn dispatch(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let started = Instant::now();
    let uri = req.uri().clone();

    let meta = RequestMeta {
        path: uri.path().to_string(),
        search: uri
            .query()
            .filter(|q| !q.is_empty())
            .map(|q| format!("?{}", q))
            .unwrap_or_default(),
    };

    let record = LogRecord::new(meta.path.clone(), meta.search.clone());
    let log_id = record.id.clone();
    state.log.begin(record);

    tracing::debug!(url = %uri, "request");

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(req.headers(), peer);
    tracing::trace!(%client, "client identified");

    if req.method() == Method::OPTIONS {
        return finish(&state, &log_id, started, payload::empty_response(StatusCode::NO_CONTENT));
    }

    let validator_hit = req
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value == state.static_etag);
    if validator_hit {
        return finish(&state, &log_id, started, payload::empty_response(StatusCode::NOT_MODIFIED));
    }

    let result = if state.blocklist.is_blocked(&client) {
        handlers::blocked(&state, &client).await
    } else {
        route(&state, &uri, &client).await
    };

    if result.block_client {
        block(&state, &client);
    }

    let response = result.into_response(&meta, started.elapsed());
    finish(&state, &log_id, started, response)
}

async fn route(state: &AppState, uri: &axum::http::Uri, client: &str) -> Payload {
    let Some((route, params)) = match_route(uri.path()) else {
        return Payload::error(StatusCode::NOT_FOUND, "Not Found");
    };

    match route.handler {
        Handler::Home => handlers::home(),
        Handler::Find => handlers::find(state, &QueryParams::from_uri(uri)).await,
        Handler::Parse => handlers::parse(state, &QueryParams::from_uri(uri)),
        Handler::Reference => handlers::reference(state, &params),
        Handler::Static { file, content_type } => {
            handlers::serve_static(state, file, content_type).await
        }
        Handler::Trap => handlers::trap(client),
    }
}

/// Block `client` in this process now, persist the offense in the background
fn block(state: &Arc<AppState>, client: &str) {
    state.blocklist.block(client);

    let blocklist = Arc::clone(&state.blocklist);
    let client = client.to_string();
    tokio::spawn(async move {
        if let Err(e) = blocklist.record_offense(&client).await {
            tracing::warn!(%client, error = %e, "failed to record offense");
        }
    });
}

fn finish(state: &AppState, log_id: &str, started: Instant, response: Response) -> Response {
    let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    state.log.finish(log_id, elapsed, response.status().as_u16());
    response
}
