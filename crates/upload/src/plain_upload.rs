//! The unsplit upload path used by `testcli`: hash a local file, cap it at
//! ten gigabytes, and forward the whole thing to the balancer in one POST.

use std::path::Path;
use std::sync::Arc;

use crate::model::{BalancerRepository, FileRepository};

/// Matches the original's hard-coded `10000000000`-byte ceiling.
pub const PLAIN_UPLOAD_LIMIT: u64 = 10_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("import file: {0}")]
    Import(#[source] crate::model::Error),
    #[error("file size is too large, should be lower than 10GB")]
    TooLarge,
    #[error("read file: {0}")]
    Read(#[source] crate::model::Error),
    #[error("upload file: {0}")]
    Upload(#[source] crate::model::Error),
}

pub struct PlainUpload {
    files: Arc<dyn FileRepository>,
    balancer: Arc<dyn BalancerRepository>,
}

impl PlainUpload {
    pub fn new(files: Arc<dyn FileRepository>, balancer: Arc<dyn BalancerRepository>) -> Self {
        Self { files, balancer }
    }

    pub async fn upload(&self, path: &Path, name: &str) -> Result<(), Error> {
        let (digest, size) = self.files.import(path).await.map_err(Error::Import)?;
        let hash = digest.to_hex();
        let result = self.upload_hashed(name, &hash, size).await;
        self.files.remove(&hash).await;
        result
    }

    async fn upload_hashed(&self, name: &str, hash: &str, size: u64) -> Result<(), Error> {
        if size > PLAIN_UPLOAD_LIMIT {
            return Err(Error::TooLarge);
        }

        let reader = self.files.read(hash).await.map_err(Error::Read)?;
        self.balancer
            .upload(name, hash, reader, size)
            .await
            .map_err(Error::Upload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoxAsyncRead;
    use async_trait::async_trait;
    use content_store::Sha256Digest;
    use std::sync::Mutex;

    struct FakeFiles {
        digest: Sha256Digest,
        size: u64,
        removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FileRepository for FakeFiles {
        async fn write(&self, _reader: BoxAsyncRead) -> Result<(Sha256Digest, u64), crate::model::Error> {
            unimplemented!()
        }

        async fn read(&self, _digest: &str) -> Result<BoxAsyncRead, crate::model::Error> {
            Ok(Box::new(std::io::Cursor::new(vec![0u8; self.size as usize])))
        }

        async fn seek(&self, _digest: &str, _offset: u64) -> Result<BoxAsyncRead, crate::model::Error> {
            unimplemented!()
        }

        async fn import(&self, _path: &Path) -> Result<(Sha256Digest, u64), crate::model::Error> {
            Ok((self.digest.clone(), self.size))
        }

        async fn remove(&self, digest: &str) {
            self.removed.lock().unwrap().push(digest.to_owned());
        }
    }

    struct FakeBalancer {
        fail: bool,
    }

    #[async_trait]
    impl BalancerRepository for FakeBalancer {
        async fn upload(
            &self,
            _name: &str,
            _hash: &str,
            _reader: BoxAsyncRead,
            _limit: u64,
        ) -> Result<(), crate::model::Error> {
            if self.fail {
                return Err("boom".into());
            }
            Ok(())
        }
    }

    fn digest() -> Sha256Digest {
        "a".repeat(64).parse().unwrap()
    }

    #[tokio::test]
    async fn uploads_then_removes_the_staged_file_regardless_of_outcome() {
        let files = Arc::new(FakeFiles {
            digest: digest(),
            size: 100,
            removed: Mutex::new(Vec::new()),
        });
        let balancer = Arc::new(FakeBalancer { fail: false });
        let upload = PlainUpload::new(files.clone(), balancer);

        upload.upload(Path::new("ignored"), "name.bin").await.unwrap();
        assert_eq!(*files.removed.lock().unwrap(), vec![digest().to_hex()]);
    }

    #[tokio::test]
    async fn removes_staged_file_even_when_balancer_upload_fails() {
        let files = Arc::new(FakeFiles {
            digest: digest(),
            size: 100,
            removed: Mutex::new(Vec::new()),
        });
        let balancer = Arc::new(FakeBalancer { fail: true });
        let upload = PlainUpload::new(files.clone(), balancer);

        assert!(upload.upload(Path::new("ignored"), "name.bin").await.is_err());
        assert_eq!(*files.removed.lock().unwrap(), vec![digest().to_hex()]);
    }

    #[tokio::test]
    async fn rejects_files_over_the_ten_gigabyte_limit() {
        let files = Arc::new(FakeFiles {
            digest: digest(),
            size: PLAIN_UPLOAD_LIMIT + 1,
            removed: Mutex::new(Vec::new()),
        });
        let balancer = Arc::new(FakeBalancer { fail: false });
        let upload = PlainUpload::new(files, balancer);

        let err = upload.upload(Path::new("ignored"), "name.bin").await.unwrap_err();
        assert!(matches!(err, Error::TooLarge));
    }
}
