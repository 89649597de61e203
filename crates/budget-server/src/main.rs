//! budget-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! ledger, materializes every obligation that fell due while the server was
//! down, and serves the budget API over HTTP. Obligations are ticked again
//! every `tick_interval_secs`.

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use budget_core::clock::SystemClock;
use budget_engine::{Collaborators, Engine, sink::TracingSink};
use budget_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Budget & recurring-obligation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let collab = Collaborators {
    clock:    Arc::new(SystemClock),
    sink:     Arc::new(TracingSink),
    settings: Arc::new(server_cfg.settings_provider()),
  };
  let engine = Engine::with_config(store, collab, server_cfg.engine_config());

  // Catch up on anything that fell due while we were down.
  run_tick(&engine).await;

  if server_cfg.tick_interval_secs > 0 {
    let period = Duration::from_secs(server_cfg.tick_interval_secs);
    let engine = engine.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        run_tick(&engine).await;
      }
    });
  }

  let app = budget_api::api_router(engine).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

/// Tick every active obligation. Failures are logged; the server keeps going.
async fn run_tick(engine: &Engine<SqliteStore>) {
  let now = engine.clock().now();
  match engine.tick_all(now).await {
    Ok(report) => {
      for failure in &report.failures {
        tracing::warn!(
          obligation = %failure.obligation_id,
          error = %failure.error,
          "obligation tick failed"
        );
      }
    }
    Err(err) => tracing::error!(error = %err, "scheduling tick failed"),
  }
}

async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %err, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
