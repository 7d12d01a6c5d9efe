//! The three ports the upload flows are written against, so each flow can be
//! exercised against fakes instead of real disk/network backends.

use std::path::Path;

use async_trait::async_trait;
use content_store::{FileStore, Sha256Digest};
use tokio::io::AsyncRead;

pub type BoxAsyncRead = Box<dyn AsyncRead + Send + Unpin>;
pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn write(&self, reader: BoxAsyncRead) -> Result<(Sha256Digest, u64), Error>;
    async fn read(&self, digest: &str) -> Result<BoxAsyncRead, Error>;
    async fn seek(&self, digest: &str, offset: u64) -> Result<BoxAsyncRead, Error>;
    async fn import(&self, path: &Path) -> Result<(Sha256Digest, u64), Error>;
    async fn remove(&self, digest: &str);
}

#[async_trait]
pub trait StorageRepository: Send + Sync {
    async fn save(&self, name: &str, part: u32, reader: BoxAsyncRead, limit: u64) -> Result<(), Error>;
    fn backends(&self) -> usize;
}

#[async_trait]
pub trait BalancerRepository: Send + Sync {
    async fn upload(&self, name: &str, hash: &str, reader: BoxAsyncRead, limit: u64) -> Result<(), Error>;
}

#[async_trait]
impl FileRepository for FileStore {
    async fn write(&self, reader: BoxAsyncRead) -> Result<(Sha256Digest, u64), Error> {
        Ok(FileStore::write(self, reader).await?)
    }

    async fn read(&self, digest: &str) -> Result<BoxAsyncRead, Error> {
        Ok(Box::new(FileStore::read(self, digest).await?))
    }

    async fn seek(&self, digest: &str, offset: u64) -> Result<BoxAsyncRead, Error> {
        Ok(Box::new(FileStore::seek(self, digest, offset).await?))
    }

    async fn import(&self, path: &Path) -> Result<(Sha256Digest, u64), Error> {
        Ok(FileStore::import(self, path).await?)
    }

    async fn remove(&self, digest: &str) {
        FileStore::remove(self, digest).await
    }
}

#[async_trait]
impl StorageRepository for net::StorageClient {
    async fn save(&self, name: &str, part: u32, reader: BoxAsyncRead, limit: u64) -> Result<(), Error> {
        Ok(net::StorageClient::save(self, name, part, reader, limit).await?)
    }

    fn backends(&self) -> usize {
        net::StorageClient::backends(self)
    }
}

#[async_trait]
impl BalancerRepository for net::BalancerClient {
    async fn upload(&self, name: &str, hash: &str, reader: BoxAsyncRead, limit: u64) -> Result<(), Error> {
        Ok(net::BalancerClient::upload(self, name, hash, reader, limit).await?)
    }
}
