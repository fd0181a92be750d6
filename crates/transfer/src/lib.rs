//! Progress-instrumented streaming transfer.
//!
//! [`StreamingBody`] copies an open byte source into a transport sink chunk
//! by chunk without buffering the payload, emitting a progress event after
//! every flushed chunk. [`TransferWorker`] is the producer-side glue: it
//! bridges a body's progress stream onto the transfer's
//! [`StatusChannel`](uplink_status::StatusChannel) and publishes the single
//! terminal result once the [`Endpoint`] answers.
//!
//! The actual network client, URL retrieval, and request framing live
//! behind the [`Endpoint`] trait; this crate owns no wire format.

mod body;
mod worker;

pub use body::{DEFAULT_CHUNK_SIZE, StreamEvent, StreamListener, StreamingBody};
pub use worker::{Endpoint, TransferWorker};

/// Errors produced while streaming a transfer body.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("endpoint error: {0}")]
    Endpoint(String),
}
