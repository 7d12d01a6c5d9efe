//! Content-addressed file storage: stream a reader to a randomly-named
//! staging file while hashing it, then atomically rename it into place
//! under its SHA-256 hex digest. No partially-written file is ever visible
//! under its content-address name — a reader either finds nothing or finds
//! the complete blob.

use std::path::{Path, PathBuf};

use sha2::Sha256;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::digest::Sha256Digest;
use crate::hashing_reader::HashingReader;

#[derive(Debug, Error)]
pub enum Error {
    #[error("create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stage file {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("open {digest}: {source}")]
    Open {
        digest: String,
        #[source]
        source: std::io::Error,
    },
    #[error("seek {digest} to offset {offset}: {source}")]
    Seek {
        digest: String,
        offset: u64,
        #[source]
        source: std::io::Error,
    },
}

/// A content-addressed file store rooted at a single directory.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Ensures `root` exists and returns a store backed by it. Staging files
    /// and finished blobs share this one directory, matching the layout
    /// this was ported from (no separate `tmp/` subdirectory). A freshly
    /// created directory is given owner-only permissions.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        let existed = tokio::fs::try_exists(&root).await.unwrap_or(false);
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| Error::CreateDir {
                path: root.clone(),
                source,
            })?;
        if !existed {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = tokio::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o700))
                    .await;
            }
        }
        Ok(Self { root })
    }

    fn path_for(&self, digest: &str) -> PathBuf {
        self.root.join(digest)
    }

    /// Streams `reader` to a staging file while hashing it, then renames the
    /// staging file to its digest. The staging file is removed on any
    /// failure before the rename.
    pub async fn write(
        &self,
        reader: impl AsyncRead + Unpin,
    ) -> Result<(Sha256Digest, u64), Error> {
        let staging = self.root.join(uuid::Uuid::new_v4().to_string());
        match self.write_staged(&staging, reader).await {
            Ok((digest, size)) => {
                let final_path = self.path_for(&digest.to_hex());
                tokio::fs::rename(&staging, &final_path)
                    .await
                    .map_err(|source| Error::Rename {
                        from: staging.clone(),
                        to: final_path,
                        source,
                    })?;
                Ok((digest, size))
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&staging).await;
                Err(err)
            }
        }
    }

    async fn write_staged(
        &self,
        staging: &Path,
        reader: impl AsyncRead + Unpin,
    ) -> Result<(Sha256Digest, u64), Error> {
        let mut file = File::create(staging).await.map_err(|source| Error::Stage {
            path: staging.to_path_buf(),
            source,
        })?;

        let mut hashing = HashingReader::<_, Sha256>::new(reader);
        tokio::io::copy(&mut hashing, &mut file)
            .await
            .map_err(|source| Error::Stage {
                path: staging.to_path_buf(),
                source,
            })?;
        file.flush().await.map_err(|source| Error::Stage {
            path: staging.to_path_buf(),
            source,
        })?;

        let size = hashing.count();
        let digest: Sha256Digest = hashing.finalize().into();
        Ok((digest, size))
    }

    /// Opens the blob named by `digest` for reading from the start.
    pub async fn read(&self, digest: &str) -> Result<File, Error> {
        File::open(self.path_for(digest))
            .await
            .map_err(|source| Error::Open {
                digest: digest.to_owned(),
                source,
            })
    }

    /// Opens the blob named by `digest`, pre-seeked to `offset`.
    pub async fn seek(&self, digest: &str, offset: u64) -> Result<File, Error> {
        use tokio::io::AsyncSeekExt;
        let mut file = self.read(digest).await?;
        file.seek(std::io::SeekFrom::Start(offset))
            .await
            .map_err(|source| Error::Seek {
                digest: digest.to_owned(),
                offset,
                source,
            })?;
        Ok(file)
    }

    /// Imports the file at `path` by streaming it through [`FileStore::write`].
    pub async fn import(&self, path: impl AsRef<Path>) -> Result<(Sha256Digest, u64), Error> {
        let file = File::open(path.as_ref())
            .await
            .map_err(|source| Error::Stage {
                path: path.as_ref().to_path_buf(),
                source,
            })?;
        self.write(file).await
    }

    /// Best-effort removal; mirrors the original's silent-remove semantics —
    /// a missing blob is not an error.
    pub async fn remove(&self, digest: &str) {
        let _ = tokio::fs::remove_file(self.path_for(digest)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();

        let (digest, size) = store.write(Cursor::new(b"hello world".to_vec())).await.unwrap();
        assert_eq!(size, 11);

        let mut file = store.read(&digest.to_hex()).await.unwrap();
        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut file, &mut buf)
            .await
            .unwrap();
        assert_eq!(buf, b"hello world");
    }

    #[tokio::test]
    async fn no_partial_file_is_ever_visible_under_its_digest_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();

        let (digest, _) = store.write(Cursor::new(b"deterministic".to_vec())).await.unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec![digest.to_hex()]);
    }

    #[tokio::test]
    async fn seek_starts_reading_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();

        let (digest, _) = store.write(Cursor::new(b"0123456789".to_vec())).await.unwrap();
        let mut file = store.seek(&digest.to_hex(), 5).await.unwrap();
        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut file, &mut buf)
            .await
            .unwrap();
        assert_eq!(buf, b"56789");
    }

    #[tokio::test]
    async fn remove_of_missing_digest_does_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();
        store.remove("0000000000000000000000000000000000000000000000000000000000000000").await;
    }

    #[tokio::test]
    async fn import_hashes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();

        let src = dir.path().join("src.bin");
        tokio::fs::write(&src, b"import me").await.unwrap();

        let (digest, size) = store.import(&src).await.unwrap();
        assert_eq!(size, 9);
        assert!(store.read(&digest.to_hex()).await.is_ok());
    }
}
