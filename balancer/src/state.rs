use std::sync::Arc;

use keylock::KeyLock;
use upload::{SplitUpload, Vault};

/// Shared handler state: the vault (whole-file store) for the synchronous
/// half of an upload, the split-upload engine for the asynchronous
/// fan-out, and the keylock table serializing uploads by `name`/`digest`.
#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<Vault>,
    pub split_upload: Arc<SplitUpload>,
    pub keylock: Arc<KeyLock>,
}
