//! `POST /files/{name}` and `GET /files/{name}` — the balancer's only HTTP
//! surface. A direct port of `internal/controller/balancer.go`'s `Upload`
//! and `Download` methods.

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

use crate::state::AppState;

pub async fn upload(
    Path(name): Path<String>,
    State(state): State<AppState>,
    request: Request,
) -> Response {
    if !net::validation::is_valid_filename(&name) {
        tracing::error!(name = %name, "invalid name format");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let digest = digest_header(request.headers());
    if !net::validation::is_valid_digest(&digest) {
        tracing::error!(digest = %digest, "invalid digest format");
        return StatusCode::BAD_REQUEST.into_response();
    }

    // Locks on `name` and `digest` serialize concurrent uploads of the same
    // content or filename; both are released once the detached split-upload
    // task below finishes, not when this handler returns.
    let name_guard = state.keylock.lock(&name).await;
    let digest_guard = state.keylock.lock(&digest).await;

    let expected_size = content_length(request.headers());
    let body = request.into_body().into_data_stream();
    let reader = StreamReader::new(body.map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, e)
    }));
    let progress = content_store::ProgressReader::new(
        reader,
        expected_size,
        content_store::tracing_progress(name.clone()),
    );

    let (hash, size) = match state.vault.write(Box::new(progress)).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(name = %name, error = %err, "upload");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let hash = hash.to_hex();

    if hash != digest {
        tracing::error!(hash = %hash, digest = %digest, "corrupted data");
        state.vault.remove(&hash).await;
        return StatusCode::BAD_REQUEST.into_response();
    }

    tokio::spawn(async move {
        state.split_upload.upload(name, hash, size).await;
        drop(name_guard);
        drop(digest_guard);
    });

    StatusCode::OK.into_response()
}

pub async fn download(Path(_name): Path<String>) -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}

fn digest_header(headers: &HeaderMap) -> String {
    headers
        .get("Digest")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
