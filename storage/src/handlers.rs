//! `POST /parts/{name}` and `GET /parts/{name}` — the storage node's only
//! HTTP surface. A direct port of `internal/controller/storage.go`'s `Save`
//! and `Load` methods: unlike the balancer, a part arrives pre-verified (the
//! balancer already checked the whole file's digest), so there is no `Digest`
//! header here and nothing to fan back out.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

use crate::state::AppState;

pub async fn save(
    Path(name): Path<String>,
    State(state): State<AppState>,
    request: Request,
) -> Response {
    if !net::validation::is_valid_filename(&name) {
        tracing::error!(name = %name, "invalid name format");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let expected_size = request
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let body = request.into_body().into_data_stream();
    let reader = StreamReader::new(
        body.map_err(|e| std::io::Error::new(std::io::ErrorKind::BrokenPipe, e)),
    );
    let progress = content_store::ProgressReader::new(
        reader,
        expected_size,
        content_store::tracing_progress(name.clone()),
    );

    if let Err(err) = state.vault.write(Box::new(progress)).await {
        tracing::error!(name = %name, error = %err, "save part");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    StatusCode::OK.into_response()
}

pub async fn load(Path(_name): Path<String>) -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}
