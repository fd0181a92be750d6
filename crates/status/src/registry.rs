use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, error};

use crate::channel::StatusChannel;

/// Keyed collection of per-transfer [`StatusChannel`]s.
///
/// One registry is shared by the transfer worker (producer side) and the
/// presentation layer (consumer side): construct it once at session start
/// and hand it to both. All methods are safe to call from any thread with
/// no external locking.
///
/// The registry owns its channels. An entry lives until someone observes
/// the terminal result and calls [`remove`](Self::remove) — exactly once
/// per transfer — after which the identifier is free for a brand-new
/// transfer with a fresh channel.
pub struct StatusRegistry {
    channels: RwLock<HashMap<String, Arc<StatusChannel>>>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Installs a channel for `id` if none exists.
    ///
    /// Always returns the effective channel — the one now associated with
    /// `id` — whether this call inserted it or an earlier racing call did.
    pub fn create(&self, id: &str) -> Arc<StatusChannel> {
        let mut channels = self.channels.write().unwrap();
        let channel = channels.entry(id.to_string()).or_insert_with(|| {
            debug!(id, "status channel created");
            Arc::new(StatusChannel::new())
        });
        Arc::clone(channel)
    }

    /// Returns the channel for `id`, or `None` if the transfer was never
    /// registered or has already been cleaned up.
    pub fn get(&self, id: &str) -> Option<Arc<StatusChannel>> {
        self.channels.read().unwrap().get(id).cloned()
    }

    /// Like [`get`](Self::get), but recovers from a missing channel by
    /// creating an empty one.
    ///
    /// A miss here means producer and consumer disagree about who registers
    /// the channel — a coordination bug upstream. The error log is the
    /// operator's signal; the recovered channel has no retained value and,
    /// if the real producer is publishing elsewhere, may never see events.
    pub fn get_or_warn(&self, id: &str) -> Arc<StatusChannel> {
        if let Some(channel) = self.get(id) {
            return channel;
        }
        error!(
            id,
            "no status channel for transfer, creating one; it should have existed before this lookup"
        );
        self.create(id)
    }

    /// Detaches and returns the channel for `id`.
    ///
    /// `None` means it was already absent, letting the caller tell orderly
    /// cleanup from an anomalous double-removal.
    pub fn remove(&self, id: &str) -> Option<Arc<StatusChannel>> {
        let removed = self.channels.write().unwrap().remove(id);
        if removed.is_some() {
            debug!(id, "status channel removed");
        }
        removed
    }
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}
