use std::sync::Arc;

use tracing::{debug, info, warn};
use uplink_status::{StatusRegistry, TransferOutcome, TransferStatus};

use crate::TransferError;
use crate::body::{StreamEvent, StreamingBody};

/// The seam to the remote endpoint.
///
/// Implementations own URL retrieval, request framing, and the network
/// client. They drive [`StreamingBody::write_to`] against their transport
/// sink and translate the remote response into a [`TransferOutcome`] —
/// including non-success responses, which are outcomes rather than errors.
pub trait Endpoint {
    fn transmit(&self, body: StreamingBody) -> Result<TransferOutcome, TransferError>;
}

/// Runs one transfer on its producer thread and broadcasts its status.
///
/// The launching side is expected to call
/// [`StatusRegistry::create`] for the transfer id *before* handing off to
/// the worker, so early consumers and the worker agree on one channel.
pub struct TransferWorker<E> {
    registry: Arc<StatusRegistry>,
    endpoint: E,
}

impl<E: Endpoint> TransferWorker<E> {
    pub fn new(registry: Arc<StatusRegistry>, endpoint: E) -> Self {
        Self { registry, endpoint }
    }

    /// Streams `body` to the endpoint, publishing progress events and
    /// exactly one terminal [`TransferStatus::Result`] under `id`.
    ///
    /// `Err` is returned only for transport faults, and only after a
    /// failure-shaped result has been published. The registry entry is left
    /// in place: whichever side observes the result removes it.
    pub fn run(&self, id: &str, mut body: StreamingBody) -> Result<TransferOutcome, TransferError> {
        info!(
            id,
            content_type = body.content_type(),
            content_length = body.content_length(),
            "starting transfer"
        );
        let channel = self.registry.get_or_warn(id);

        // Bridge the body's private stream onto the broadcast channel.
        // Completion and faults are not republished: the terminal result
        // below is the only non-progress event consumers ever see.
        let bridge = Arc::clone(&channel);
        body.on_event(move |event| {
            if let StreamEvent::Progress(snapshot) = event {
                bridge.publish(TransferStatus::Progress(*snapshot));
            }
        });

        match self.endpoint.transmit(body) {
            Ok(outcome) => {
                debug!(
                    id,
                    success = outcome.success,
                    code = outcome.code,
                    "transfer finished"
                );
                channel.publish(TransferStatus::Result(outcome.clone()));
                Ok(outcome)
            }
            Err(e) => {
                warn!(id, error = %e, "transfer faulted");
                channel.publish(TransferStatus::Result(TransferOutcome::failed(
                    0,
                    e.to_string(),
                )));
                Err(e)
            }
        }
    }
}
