//! A typed SHA-256 content digest, hex-encoded the way the file store names
//! blobs on disk (unprefixed lowercase hex, matching
//! `encoding/hex.EncodeToString` on the original's `[32]byte` sum).

use data_encoding::HEXLOWER;
use thiserror::Error;

pub const DIGEST_LEN: usize = 32;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest([u8; DIGEST_LEN]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid digest length: {0}, expected {DIGEST_LEN}")]
    InvalidLength(usize),
    #[error("invalid hex digest: {0}")]
    InvalidHex(String),
}

impl Sha256Digest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }
}

impl From<digest::Output<sha2::Sha256>> for Sha256Digest {
    fn from(value: digest::Output<sha2::Sha256>) -> Self {
        Self(value.into())
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.len() != DIGEST_LEN * 2 {
            return Err(Error::InvalidLength(value.len() / 2));
        }
        let decoded = HEXLOWER
            .decode(value.to_ascii_lowercase().as_bytes())
            .map_err(|_| Error::InvalidHex(value.to_owned()))?;
        let bytes: [u8; DIGEST_LEN] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| Error::InvalidLength(v.len()))?;
        Ok(Self(bytes))
    }
}

impl std::str::FromStr for Sha256Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sha256Digest({})", self.to_hex())
    }
}
