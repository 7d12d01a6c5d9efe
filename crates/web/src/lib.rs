//! Shared HTTP server plumbing for the `balancer` and `storage` binaries.
//!
//! A direct port of `pkg/web/server.go` and `pkg/web/limiter.go`: bind a
//! listener, cap the request body at a configured byte limit, bound every
//! request by a configured timeout, and serve until asked to stop.
//! [`Server::close`] mirrors `(*Server).Close(ctx)` — trigger graceful
//! shutdown and wait for the accept loop to actually exit.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid listen address {addr}: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("serve: {0}")]
    Serve(#[source] std::io::Error),
}

/// A bound, running HTTP server. Body size is capped with
/// [`DefaultBodyLimit`] (the idiomatic analogue of `http.MaxBytesReader`);
/// every request is bounded by `timeout` via a small middleware standing in
/// for `net/http.Server`'s `ReadTimeout`/`WriteTimeout`, which has no direct
/// per-connection equivalent in axum's request/response model.
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<std::io::Result<()>>,
}

impl Server {
    /// Binds `addr` and starts serving `router` in the background.
    pub async fn bind(
        router: Router,
        addr: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let socket_addr: SocketAddr = addr.parse().map_err(|source| Error::Addr {
            addr: addr.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, source),
        })?;
        let listener =
            TcpListener::bind(socket_addr)
                .await
                .map_err(|source| Error::Bind { addr: addr.to_owned(), source })?;
        let bound_addr = listener
            .local_addr()
            .map_err(|source| Error::Bind { addr: addr.to_owned(), source })?;

        let app = router
            .layer(middleware::from_fn(
                move |req: Request, next: Next| timeout_middleware(timeout, req, next),
            ))
            .layer(DefaultBodyLimit::max(limit));

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await
        });

        Ok(Self { addr: bound_addr, shutdown_tx, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signals graceful shutdown and waits for the accept loop to exit.
    /// Matches `(*Server).Close(ctx)`, minus the passed-in deadline — the
    /// caller's [`shutdown::Shutdown`] already bounds this with its own
    /// close/cancel timeout budget (see [`Server::into_closer`]).
    pub async fn close(self) -> Result<(), Error> {
        let _ = self.shutdown_tx.send(true);
        self.task.await?.map_err(Error::Serve)
    }

    /// Adapts this server into a [`shutdown::Closer`] ready to register
    /// with a process-wide [`shutdown::Shutdown`].
    pub fn into_closer(self, name: &'static str) -> shutdown::Closer {
        shutdown::closer::from_fallible(move || self.close()).named(name)
    }
}

async fn timeout_middleware(timeout: Duration, req: Request, next: Next) -> Response {
    match tokio::time::timeout(timeout, next.run(req)).await {
        Ok(response) => response,
        Err(_elapsed) => axum::http::StatusCode::REQUEST_TIMEOUT.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};

    #[tokio::test]
    async fn binds_serves_and_closes_cleanly() {
        let router = Router::new().route("/", get(|| async { "ok" }));
        let server = Server::bind(router, "127.0.0.1:0", 4_000_000, Duration::from_secs(5))
            .await
            .unwrap();
        let addr = server.addr();

        let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "ok");

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_bodies_over_the_configured_limit() {
        let router = Router::new().route("/", post(|_body: axum::body::Bytes| async { "ok" }));
        let server = Server::bind(router, "127.0.0.1:0", 8, Duration::from_secs(5))
            .await
            .unwrap();
        let addr = server.addr();

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/"))
            .body(vec![0u8; 64])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn times_out_a_handler_that_runs_past_the_deadline() {
        let router = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too slow"
            }),
        );
        let server = Server::bind(router, "127.0.0.1:0", 4_000_000, Duration::from_millis(50))
            .await
            .unwrap();
        let addr = server.addr();

        let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::REQUEST_TIMEOUT);

        server.close().await.unwrap();
    }
}
