//! The storage node process: accepts `POST /parts/{name}`, stages the part
//! under its content hash, and holds it for later retrieval.
//! A direct port of `cmd/storage/main.go`.

mod handlers;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::routing::post;
use axum::Router;

use config::StorageConfig;
use content_store::FileStore;
use state::AppState;
use upload::Vault;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::TracingBuilder::default()
        .build()
        .context("set up logging")?;

    let shutdown = Arc::new(shutdown::Shutdown::new());

    let config = match StorageConfig::load() {
        Ok(config) => config,
        Err(err) => {
            shutdown.stop(Some(Box::new(err)));
            shutdown.ensure();
            return Ok(());
        }
    };

    let files = Arc::new(
        FileStore::new(config.dir.clone())
            .await
            .context("open file store")?,
    );
    let vault = Arc::new(Vault::new(files));

    let state = AppState { vault };

    let router = Router::new()
        .route("/parts/:name", post(handlers::save).get(handlers::load))
        .with_state(state);

    let server = web::Server::bind(router, &config.listen, config.limit as usize, config.timeout)
        .await
        .context("start storage server")?;

    tracing::info!(listen = %config.listen, "started");
    shutdown.add(server.into_closer("storage-http")).await;
    shutdown.wait().await;

    Ok(())
}
