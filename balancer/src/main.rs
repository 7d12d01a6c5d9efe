//! The balancer process: accepts `POST /files/{name}`, stages the upload
//! under its content hash, verifies the `Digest` header, then hands off to
//! the split-upload engine to fan the parts out to storage nodes.
//! A direct port of `cmd/balancer/main.go`.

mod handlers;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::routing::post;
use axum::Router;

use config::BalancerConfig;
use content_store::FileStore;
use keylock::KeyLock;
use net::StorageClient;
use state::AppState;
use upload::{SplitUpload, Vault};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::TracingBuilder::default()
        .build()
        .context("set up logging")?;

    let shutdown = Arc::new(shutdown::Shutdown::new());

    let config = match BalancerConfig::load() {
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
    let storages = Arc::new(
        StorageClient::new(config.timeout, config.storages.clone())
            .context("build storage dispatcher")?,
    );
    let vault = Arc::new(Vault::new(files.clone()));
    let split_upload = Arc::new(SplitUpload::new(files, storages));

    let state = AppState {
        vault,
        split_upload,
        keylock: Arc::new(KeyLock::new()),
    };

    let router = Router::new()
        .route(
            "/files/:name",
            post(handlers::upload).get(handlers::download),
        )
        .with_state(state);

    let server = web::Server::bind(router, &config.listen, config.limit as usize, config.timeout)
        .await
        .context("start balancer server")?;

    tracing::info!(listen = %config.listen, "started");
    shutdown.add(server.into_closer("balancer-http")).await;
    shutdown.wait().await;

    Ok(())
}
