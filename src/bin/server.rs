//! refgate Server Binary
//!
//! Opens the store, loads the corpus and block list, and serves the JSON API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use refgate::blocklist::BlockList;
use refgate::find_cache::FindCache;
use refgate::http::{self, AppState};
use refgate::request_log::{LogWriter, RequestLog};
use refgate::scripture::Corpus;
use refgate::{Config, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// refgate Server
#[derive(Parser, Debug)]
#[command(name = "refgate-server")]
#[command(about = "JSON API gateway for scripture references")]
#[command(version)]
struct Args {
    /// Listen port
    #[arg(short, long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Listen host
    #[arg(long, env = "HOSTNAME", default_value = "127.0.0.1")]
    host: String,

    /// Store directory
    #[arg(short, long, env = "KV_PATH", default_value = "./refgate_data")]
    data_dir: PathBuf,

    /// ETag sent with cacheable responses and matched against If-None-Match
    #[arg(long, env = "STATIC_E_TAG", default_value = "v1")]
    static_etag: String,

    /// Seconds a blocked client waits for its 404 (capped at 30 minutes)
    #[arg(long, env = "BLOCKED_STALL_SECS", default_value = "600")]
    blocked_stall_secs: u64,

    /// Seconds between block list reloads from the store (0 = load once at startup)
    #[arg(long, env = "BLOCKLIST_REFRESH_SECS", default_value = "0")]
    blocklist_refresh_secs: u64,

    /// Directory holding favicon.ico and apple-touch-icon.png
    #[arg(long, env = "STATIC_DIR", default_value = "./static")]
    static_dir: PathBuf,

    /// Scripture corpus (JSON)
    #[arg(long, env = "CORPUS_PATH", default_value = "./data/corpus.json")]
    corpus: PathBuf,

    /// MemTable size limit in MB before flush
    #[arg(short = 'm', long, default_value = "16")]
    memtable_mb: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,refgate=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("refgate Server v{}", refgate::VERSION);
    tracing::info!("Data directory: {}", args.data_dir.display());

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_host(args.host.clone())
        .listen_port(args.port)
        .static_etag(args.static_etag.clone())
        .static_dir(&args.static_dir)
        .corpus_path(&args.corpus)
        .blocked_stall(Duration::from_secs(args.blocked_stall_secs))
        .blocklist_refresh(match args.blocklist_refresh_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        })
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .build();

    let addr = config.listen_addr()?;

    // Open store
    let store = Store::open(config.clone()).context("failed to open store")?;
    tracing::info!("Store opened");

    let corpus = Corpus::load(&config.corpus_path).context("failed to load corpus")?;

    let blocklist = Arc::new(BlockList::load(store.clone()).await?);
    let refresher = config
        .blocklist_refresh
        .map(|every| Arc::clone(&blocklist).spawn_refresh(every));

    let (log, log_writer) = LogWriter::spawn(RequestLog::new(store.clone()), config.log_queue_capacity);

    let state = Arc::new(AppState::new(
        &config,
        Arc::new(corpus),
        FindCache::new(store.clone()),
        blocklist,
        log,
    ));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    http::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    })
    .await?;

    if let Some(refresher) = refresher {
        refresher.abort();
    }

    // Drain queued request logs, then make everything durable
    log_writer.shutdown().await?;
    store.close().await?;

    tracing::info!("Server stopped");
    Ok(())
}
