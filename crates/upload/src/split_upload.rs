//! The balancer's split upload path: partitions an already-staged, already-
//! hashed file into one part per storage backend, sized so every part but
//! the last is the same power-of-two length, and streams each part to the
//! backend Maglev picks for it, in parallel.

use std::sync::Arc;

use tokio::io::AsyncReadExt;

use crate::math::prev_power_of_two;
use crate::model::{BoxAsyncRead, FileRepository, StorageRepository};
use crate::prepend_reader::PrependByte;

pub struct SplitUpload {
    files: Arc<dyn FileRepository>,
    storages: Arc<dyn StorageRepository>,
}

impl SplitUpload {
    pub fn new(files: Arc<dyn FileRepository>, storages: Arc<dyn StorageRepository>) -> Self {
        Self { files, storages }
    }

    /// Splits and forwards the staged file named by `hash`, then removes the
    /// local staging copy regardless of outcome. Failures are logged, not
    /// returned — this is the fire-and-forget tail of an upload request that
    /// has already been acknowledged to the client.
    pub async fn upload(&self, name: String, hash: String, size: u64) {
        let backends = self.storages.backends() as i64;
        let average = size as i64 / backends;
        let smaller = prev_power_of_two(average);
        let remains = size as i64 - smaller * backends;

        let mut set = tokio::task::JoinSet::new();
        for part in 0..backends {
            let files = self.files.clone();
            let storages = self.storages.clone();
            let name = name.clone();
            let hash = hash.clone();
            set.spawn(async move {
                stream_part(files, storages, name, hash, part, backends, smaller, remains).await
            });
        }

        let mut first_err: Option<crate::model::Error> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    first_err.get_or_insert(err);
                }
                Err(join_err) => {
                    first_err.get_or_insert(Box::new(join_err));
                }
            }
        }

        self.files.remove(&hash).await;

        match first_err {
            Some(err) => tracing::error!(hash = %hash, error = %err, "upload"),
            None => tracing::info!(name = %name, hash = %hash, "uploaded"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn stream_part(
    files: Arc<dyn FileRepository>,
    storages: Arc<dyn StorageRepository>,
    name: String,
    hash: String,
    part: i64,
    backends: i64,
    smaller: i64,
    remains: i64,
) -> Result<(), crate::model::Error> {
    let offset = (part * smaller) as u64;
    let reader = files
        .seek(&hash, offset)
        .await
        .map_err(|e| format!("seek offset {offset}: {e}"))?;

    let mut limit = if part == backends - 1 { remains } else { smaller };

    let reader: BoxAsyncRead = if part == 0 {
        limit += 1;
        Box::new(PrependByte::new(backends as u8, reader))
    } else {
        reader
    };

    storages
        .save(&name, part as u32, Box::new(reader.take(limit as u64)), limit as u64)
        .await
        .map_err(|e| format!("save on storage {offset}: {e}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BalancerRepository, FileRepository, StorageRepository};
    use async_trait::async_trait;
    use content_store::Sha256Digest;
    use std::path::Path;
    use std::sync::Mutex;

    struct FakeFiles {
        body: Vec<u8>,
    }

    #[async_trait]
    impl FileRepository for FakeFiles {
        async fn write(&self, _reader: BoxAsyncRead) -> Result<(Sha256Digest, u64), crate::model::Error> {
            unimplemented!()
        }

        async fn read(&self, _digest: &str) -> Result<BoxAsyncRead, crate::model::Error> {
            unimplemented!()
        }

        async fn seek(&self, _digest: &str, offset: u64) -> Result<BoxAsyncRead, crate::model::Error> {
            Ok(Box::new(std::io::Cursor::new(
                self.body[offset as usize..].to_vec(),
            )))
        }

        async fn import(&self, _path: &Path) -> Result<(Sha256Digest, u64), crate::model::Error> {
            unimplemented!()
        }

        async fn remove(&self, _digest: &str) {}
    }

    struct RecordingStorage {
        backends: usize,
        received: Mutex<Vec<(u32, Vec<u8>)>>,
    }

    #[async_trait]
    impl StorageRepository for RecordingStorage {
        async fn save(
            &self,
            _name: &str,
            part: u32,
            mut reader: BoxAsyncRead,
            limit: u64,
        ) -> Result<(), crate::model::Error> {
            let mut buf = Vec::new();
            tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buf).await?;
            assert_eq!(buf.len() as u64, limit);
            self.received.lock().unwrap().push((part, buf));
            Ok(())
        }

        fn backends(&self) -> usize {
            self.backends
        }
    }

    #[allow(dead_code)]
    fn assert_balancer_repo_object_safe(_: &dyn BalancerRepository) {}

    #[tokio::test]
    async fn splits_into_power_of_two_parts_with_remainder_on_the_last() {
        let body = vec![7u8; 300];
        let files = Arc::new(FakeFiles { body: body.clone() });
        let storage = Arc::new(RecordingStorage {
            backends: 3,
            received: Mutex::new(Vec::new()),
        });

        let upload = SplitUpload::new(files, storage.clone());
        upload.upload("x.bin".into(), "deadbeef".into(), 300).await;

        let mut received = storage.received.lock().unwrap().clone();
        received.sort_by_key(|(part, _)| *part);

        assert_eq!(received.len(), 3);
        // smaller = PrevPowerOfTwo(300/3) = PrevPowerOfTwo(100) = 64
        // remains = 300 - 64*3 = 108
        assert_eq!(received[0].1.len(), 65); // 64 + 1 framing byte
        assert_eq!(received[0].1[0], 3); // backend count
        assert_eq!(received[1].1.len(), 64);
        assert_eq!(received[2].1.len(), 108);
    }

    #[tokio::test]
    async fn small_file_yields_empty_parts_except_the_last() {
        // S=3, N=4 -> average=0, smaller=0, remains=3
        let files = Arc::new(FakeFiles { body: vec![9, 9, 9] });
        let storage = Arc::new(RecordingStorage {
            backends: 4,
            received: Mutex::new(Vec::new()),
        });

        let upload = SplitUpload::new(files, storage.clone());
        upload.upload("tiny.bin".into(), "hash".into(), 3).await;

        let mut received = storage.received.lock().unwrap().clone();
        received.sort_by_key(|(part, _)| *part);

        assert_eq!(received[0].1, vec![4]); // just the framing byte
        assert_eq!(received[1].1.len(), 0);
        assert_eq!(received[2].1.len(), 0);
        assert_eq!(received[3].1, vec![9, 9, 9]);
    }
}
