//! strata-server binary.
//!
//! Loads the layered configuration from the config directory, connects
//! to Redis, and serves the JSON API.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use strata_api::Settings;
use strata_store::{TableStore, engine::RedisKv};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "strata tabular store server")]
struct Cli {
  /// Directory holding the `common` and `env` configuration files.
  #[arg(short, long, default_value = "conf")]
  config_dir: PathBuf,
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
  let settings =
    Settings::load(&cli.config_dir).context("failed to read configuration")?;

  let kv = RedisKv::connect(
    &settings.redis.host,
    settings.redis.port,
    &settings.redis.password,
  )
  .await
  .context("failed to connect to redis")?;
  tracing::info!(
    host = settings.redis.host,
    port = settings.redis.port,
    "connected to redis"
  );

  let store = TableStore::new(kv, &settings.redis.prefix);
  let app = strata_api::api_router(Arc::new(store));

  let address = settings.server.addr();
  tracing::info!("listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}
