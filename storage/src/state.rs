use std::sync::Arc;

use upload::Vault;

/// Shared handler state: the storage node only ever holds a single whole-part
/// vault, with no keylock and no dispatcher — the balancer owns all of that.
#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<Vault>,
}
