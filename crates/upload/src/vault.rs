//! Thin pass-through to the file repository, giving the balancer and
//! storage controllers one small surface instead of the full repository
//! port.

use std::sync::Arc;

use content_store::Sha256Digest;

use crate::model::{BoxAsyncRead, Error, FileRepository};

pub struct Vault {
    files: Arc<dyn FileRepository>,
}

impl Vault {
    pub fn new(files: Arc<dyn FileRepository>) -> Self {
        Self { files }
    }

    pub async fn write(&self, reader: BoxAsyncRead) -> Result<(Sha256Digest, u64), Error> {
        self.files.write(reader).await
    }

    pub async fn read(&self, digest: &str) -> Result<BoxAsyncRead, Error> {
        self.files.read(digest).await
    }

    pub async fn remove(&self, digest: &str) {
        self.files.remove(digest).await
    }
}
