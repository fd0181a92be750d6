//! Per-transfer status broadcast.
//!
//! One [`StatusChannel`] per transfer identifier carries a stream of
//! [`TransferStatus`] events from the single uploading worker to any number
//! of observers. Channels are **hot**: a subscriber only sees events
//! published after it attached, except for the one retained latest value,
//! which is replayed immediately so late observers can render current state
//! without waiting.
//!
//! The [`StatusRegistry`] keys channels by identifier and is the seam
//! between the worker thread (producer) and presentation threads
//! (consumers). Construct one registry per session and pass it to both
//! sides — there is no global state here.

mod channel;
mod event;
mod registry;

pub use channel::{DEFAULT_THROTTLE, StatusChannel, Subscription};
pub use event::{ProgressSnapshot, TransferOutcome, TransferStatus};
pub use registry::StatusRegistry;
