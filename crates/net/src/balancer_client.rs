//! The `testcli` plain-upload path's view of the balancer: a single POST
//! with the content digest carried in the `Digest` header.

use std::time::Duration;

use content_store::{tracing_progress, ProgressReader};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::validation::success_status;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("send request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("balancer responded with status {0}")]
    Status(u16),
}

pub struct BalancerClient {
    base: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl BalancerClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base: base.into(),
            timeout,
            http: reqwest::Client::new(),
        }
    }

    pub async fn upload(
        &self,
        name: &str,
        hash: &str,
        reader: impl AsyncRead + Send + Unpin + 'static,
        limit: u64,
    ) -> Result<(), Error> {
        let url = format!("http://{}/files/{}", self.base, name);

        let bounded = tokio::io::AsyncReadExt::take(reader, limit);
        let progress = ProgressReader::new(bounded, limit, tracing_progress(name.to_owned()));
        let body = reqwest::Body::wrap_stream(ReaderStream::new(progress));

        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .header("Digest", hash)
            .body(body)
            .send()
            .await?;

        if !success_status(response.status().as_u16()) {
            return Err(Error::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
