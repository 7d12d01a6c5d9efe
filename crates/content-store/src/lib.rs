//! Content-addressed blob storage.
//!
//! [`store::FileStore`] is the on-disk repository: write streams a reader to
//! a staging file while hashing it, then renames atomically into place
//! under its hex digest. [`hashing_reader::HashingReader`] and
//! [`progress::ProgressReader`] are the two `AsyncRead` wrappers that make
//! that single streaming pass also produce a digest and, for outbound
//! forwarding, periodic progress reporting.

pub mod digest;
pub mod hashing_reader;
pub mod progress;
pub mod store;

pub use digest::Sha256Digest;
pub use progress::{tracing_progress, ProgressEvent, ProgressFn, ProgressReader};
pub use store::FileStore;
