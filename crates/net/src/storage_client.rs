//! The balancer's view of the storage tier: picks a backend for a given
//! `(name, part)` flow via Maglev and streams the part's bytes to it.

use std::time::Duration;

use content_store::{tracing_progress, ProgressReader};
use maglev::Maglev;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::validation::success_status;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("build maglev dispatcher: {0}")]
    Dispatcher(#[from] maglev::Error),
    #[error("send request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage responded with status {0}")]
    Status(u16),
}

pub struct StorageClient {
    timeout: Duration,
    hasher: Maglev,
    http: reqwest::Client,
}

impl StorageClient {
    pub fn new(timeout: Duration, backends: Vec<String>) -> Result<Self, Error> {
        let hasher = Maglev::with_backends(maglev::DEFAULT_PRIME, backends)?;
        Ok(Self {
            timeout,
            hasher,
            http: reqwest::Client::new(),
        })
    }

    /// Streams exactly `limit` bytes of `reader` to the backend Maglev picks
    /// for this `(name, part)` flow.
    pub async fn save(
        &self,
        name: &str,
        part: u32,
        reader: impl AsyncRead + Send + Unpin + 'static,
        limit: u64,
    ) -> Result<(), Error> {
        let flow = format!("name-{name}:part-{part}");
        let backend = self.hasher.get_backend(&flow);
        let url = format!("http://{backend}/parts/{flow}");

        let bounded = tokio::io::AsyncReadExt::take(reader, limit);
        let progress = ProgressReader::new(
            bounded,
            limit,
            tracing_progress(format!("{flow} -> {backend}")),
        );
        let body = reqwest::Body::wrap_stream(ReaderStream::new(progress));

        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        if !success_status(response.status().as_u16()) {
            return Err(Error::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// Number of backends currently in the dispatch table.
    pub fn backends(&self) -> usize {
        self.hasher.backends_num()
    }
}
