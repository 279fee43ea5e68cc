//! Per-node cancellation.
//!
//! Each `execute` invocation registers a fresh [`CancellationToken`] under
//! the node id; the token is threaded through the collaborator call chain so
//! an in-flight provider call can observe the abort directly, and the kind
//! handler reports the abort as a controlled reset rather than a failure.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::types::NodeId;

#[derive(Debug, Default)]
pub struct CancelRegistry {
    tokens: Mutex<FxHashMap<NodeId, CancellationToken>>,
}

impl CancelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for `id`, replacing any stale one.
    pub fn register(&self, id: &NodeId) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.lock().insert(id.clone(), token.clone());
        token
    }

    /// Signal the node's in-flight step, if any. Returns whether a token was
    /// registered.
    pub fn cancel(&self, id: &NodeId) -> bool {
        match self.tokens.lock().get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the node's token after its step settles.
    pub fn remove(&self, id: &NodeId) {
        self.tokens.lock().remove(id);
    }
}
