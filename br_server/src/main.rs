//! Battle royale tournament server.
//!
//! Serves the REST and WebSocket API, sweeps stalled matches on an interval
//! and exports Prometheus metrics when configured.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use battle_royale::{
    MatchManager, RoyaleContext,
    coordination::{CoordinationStore, MemoryCoordination, RedisCoordination},
    db::Database,
    evaluator::ProcessEvaluator,
    questions::StaticQuestionBank,
};
use br_server::{
    api::{self, AppState},
    config::{Overrides, ServerConfig},
    logging, metrics,
};
use ctrlc::set_handler;
use log::{error, info, warn};
use pico_args::Arguments;
use tokio::sync::watch;

const HELP: &str = "\
Run a battle royale coding tournament server

USAGE:
  br_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:5000]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --redis-url  URL         Redis connection string     [default: env REDIS_URL, in-process when unset]

FLAGS:
  --in-memory              Run without PostgreSQL or Redis
  -h, --help               Print help information

ENVIRONMENT:
  JWT_SECRET               Token verification secret (required, 32+ bytes)
  METRICS_BIND             Prometheus exporter address (e.g., 0.0.0.0:9000)
  SWEEP_INTERVAL_SECS      Seconds between stalled-match sweeps [default: 15]
  MATCH_TIMEOUT_SECONDS    Seconds before an unresolved match is forfeited [default: 600]
  GRADING_TIMEOUT_SECS     Upper bound on grading one submission [default: 30]
  IN_MEMORY                Same as --in-memory when true
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        in_memory: pargs.contains("--in-memory"),
        bind: pargs
            .opt_value_from_str::<_, SocketAddr>("--bind")
            .context("Invalid --bind address")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        redis_url: pargs.opt_value_from_str("--redis-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    // Catching signals for graceful exit.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    set_handler(move || {
        let _ = shutdown_tx.send(true);
    })?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics exported on {}", addr);
    }

    let (ctx, database) = build_context(&config).await?;
    let state = AppState::new(ctx, config.security.jwt_secret.clone());

    let sweeper = tokio::spawn(run_sweeper(
        state.matches.clone(),
        config.sweep_interval,
        shutdown_rx.clone(),
    ));
    let event_metrics = tokio::spawn(record_event_metrics(state.context().clone()));

    let app = api::create_router(state);

    info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_rx))
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    sweeper.abort();
    event_metrics.abort();
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Wire up stores, evaluator and question bank. The database handle is
/// returned so it can be closed on shutdown.
async fn build_context(config: &ServerConfig) -> Result<(RoyaleContext, Option<Database>), Error> {
    let evaluator = Arc::new(ProcessEvaluator::new(config.runner.clone()));

    if config.in_memory {
        warn!("Running in-memory: state is lost on restart");
        return Ok((RoyaleContext::in_memory(evaluator, config.royale.clone()), None));
    }

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    db.apply_schema()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to apply schema: {}", e))?;
    info!("Database connected successfully");

    let coordination: Arc<dyn CoordinationStore> = match &config.redis_url {
        Some(url) => {
            let redis = RedisCoordination::connect(url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;
            info!("Redis connected successfully");
            Arc::new(redis)
        }
        None => {
            warn!("REDIS_URL not set, coordination state is kept in-process");
            Arc::new(MemoryCoordination::new())
        }
    };

    let ctx = RoyaleContext::new(
        Arc::new(db.royale_store()),
        coordination,
        evaluator,
        Arc::new(StaticQuestionBank::builtin()),
        config.royale.clone(),
    );
    Ok((ctx, Some(db)))
}

/// Periodically forfeit stalled matches and resume stuck rounds
async fn run_sweeper(
    matches: MatchManager,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match matches.sweep_expired().await {
                    Ok(report) if report.resolved > 0 => {
                        info!("Sweep resolved {} stalled match(es)", report.resolved);
                    }
                    Ok(_) => {}
                    Err(e) => error!("Stalled-match sweep failed: {}", e),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn record_event_metrics(ctx: RoyaleContext) {
    let mut events = ctx.events.subscribe();
    loop {
        match events.recv().await {
            Ok(envelope) => metrics::record_event(&envelope.event),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event metrics lagged, {} events not counted", skipped);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Resolves once the Ctrl+C / SIGTERM handler fires
async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}
