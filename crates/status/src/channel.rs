use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::event::TransferStatus;

/// Default minimum interval between deliveries to one subscriber.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(50);

/// Hot broadcast channel for one transfer's status events.
///
/// Every publish reaches all currently attached subscribers, and the most
/// recent event is retained and replayed to anyone subscribing later.
/// Publishing a [`TransferStatus::Result`] does **not** close the channel:
/// consumers treat receipt of a result as their own stop signal, and the
/// channel itself is torn down by an explicit
/// [`StatusRegistry::remove`](crate::StatusRegistry::remove).
pub struct StatusChannel {
    state: Mutex<ChannelState>,
}

struct ChannelState {
    latest: Option<TransferStatus>,
    subscribers: Vec<Sender<TransferStatus>>,
}

impl StatusChannel {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                latest: None,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Publishes `status` to all current subscribers and retains it for
    /// future ones.
    ///
    /// Delivery order is the registration order of subscribers, under the
    /// channel lock, so every subscriber observes the same serial sequence
    /// of events.
    pub fn publish(&self, status: TransferStatus) {
        let mut state = self.state.lock().unwrap();
        state.latest = Some(status.clone());

        let before = state.subscribers.len();
        state.subscribers.retain(|tx| tx.send(status.clone()).is_ok());
        let pruned = before - state.subscribers.len();
        if pruned > 0 {
            debug!(pruned, "dropped detached subscribers");
        }
    }

    /// Returns the retained latest event, if any has been published.
    pub fn latest(&self) -> Option<TransferStatus> {
        self.state.lock().unwrap().latest.clone()
    }

    /// Attaches a new subscriber.
    ///
    /// Never fails: with no prior events the subscriber simply blocks until
    /// the first publish. If an event was already published, it is pre-queued
    /// so the first [`Subscription::recv`] returns immediately.
    pub fn subscribe(&self, throttle: Duration) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let mut state = self.state.lock().unwrap();
        if let Some(latest) = &state.latest {
            // Cannot fail, we still hold the receiver.
            let _ = tx.send(latest.clone());
        }
        state.subscribers.push(tx);
        Subscription {
            rx,
            throttle,
            last_delivery: None,
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.state.lock().unwrap().subscribers.len()
    }
}

/// One consumer's handle on a [`StatusChannel`].
///
/// Each subscription owns its queue and its own delivery cadence; a slow
/// consumer never blocks the producer or its fellow subscribers.
pub struct Subscription {
    rx: Receiver<TransferStatus>,
    throttle: Duration,
    last_delivery: Option<Instant>,
}

impl Subscription {
    /// Blocks until the next delivery.
    ///
    /// Deliveries are trailing-edge throttled: no two happen closer together
    /// than the subscription's throttle interval, and within a window only
    /// the newest queued event survives — earlier ones are coalesced away,
    /// the newest is never dropped. The first delivery after subscribing is
    /// immediate. Returns `None` once the channel is gone and the queue has
    /// drained.
    pub fn recv(&mut self) -> Option<TransferStatus> {
        let mut newest = self.rx.recv().ok()?;

        let due = match self.last_delivery {
            Some(at) => at + self.throttle,
            None => Instant::now(),
        };
        loop {
            let now = Instant::now();
            if now >= due {
                // Window closed; coalesce whatever else is already queued.
                while let Ok(next) = self.rx.try_recv() {
                    newest = next;
                }
                break;
            }
            match self.rx.recv_timeout(due - now) {
                Ok(next) => newest = next,
                // Disconnected mid-window: deliver what we have, the next
                // call returns None.
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.last_delivery = Some(Instant::now());
        Some(newest)
    }

    /// Detaches this subscriber.
    ///
    /// No delivery can be observed after this returns. Other subscribers and
    /// the channel's retained latest value are unaffected.
    pub fn unsubscribe(self) {
        // Dropping the receiver is sufficient; the channel prunes the dead
        // queue on its next publish.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ProgressSnapshot, TransferOutcome, TransferStatus};
    use std::sync::Arc;
    use std::thread;

    fn progress(transferred: i64) -> TransferStatus {
        TransferStatus::Progress(ProgressSnapshot::new(transferred, 1000, Instant::now()))
    }

    fn transferred(status: &TransferStatus) -> i64 {
        match status {
            TransferStatus::Progress(p) => p.transferred_bytes,
            TransferStatus::Result(_) => panic!("expected progress"),
        }
    }

    #[test]
    fn subscriber_before_first_event_gets_nothing_until_publish() {
        let channel = Arc::new(StatusChannel::new());
        let mut sub = channel.subscribe(Duration::ZERO);

        let publisher = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                channel.publish(progress(100));
            })
        };

        // Blocks until the publish lands.
        let first = sub.recv().unwrap();
        assert_eq!(transferred(&first), 100);
        publisher.join().unwrap();
    }

    #[test]
    fn late_subscriber_replays_latest() {
        let channel = StatusChannel::new();
        channel.publish(progress(250));
        channel.publish(progress(500));

        let mut sub = channel.subscribe(Duration::ZERO);
        let first = sub.recv().unwrap();
        assert_eq!(transferred(&first), 500);
    }

    #[test]
    fn result_does_not_close_the_channel() {
        let channel = StatusChannel::new();
        let mut sub = channel.subscribe(Duration::ZERO);

        channel.publish(TransferStatus::Result(TransferOutcome::ok(200, "OK")));
        assert!(sub.recv().unwrap().is_result());

        // The channel mechanically keeps accepting and delivering.
        channel.publish(progress(1));
        assert_eq!(transferred(&sub.recv().unwrap()), 1);
    }

    #[test]
    fn two_subscribers_see_the_same_result() {
        let channel = StatusChannel::new();
        let mut early = channel.subscribe(Duration::ZERO);

        channel.publish(progress(250));
        let mut late = channel.subscribe(Duration::ZERO);

        let outcome = TransferOutcome::ok(200, "created");
        channel.publish(TransferStatus::Result(outcome.clone()));

        // Both consumers drain until they see the terminal result; the
        // values must be equal even though the attach times differ.
        let recv_until_result = |sub: &mut Subscription| {
            loop {
                match sub.recv() {
                    Some(TransferStatus::Result(outcome)) => return outcome,
                    Some(_) => continue,
                    None => panic!("channel ended before the result"),
                }
            }
        };
        assert_eq!(recv_until_result(&mut early), outcome);
        assert_eq!(recv_until_result(&mut late), outcome);
    }

    #[test]
    fn deliveries_are_an_ordered_subsequence() {
        let channel = Arc::new(StatusChannel::new());
        let mut sub = channel.subscribe(Duration::from_millis(5));

        let publisher = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                for i in 1..=50 {
                    channel.publish(progress(i * 10));
                }
                channel.publish(TransferStatus::Result(TransferOutcome::ok(200, "")));
            })
        };

        let mut seen = Vec::new();
        loop {
            match sub.recv() {
                Some(TransferStatus::Result(_)) => break,
                Some(status) => seen.push(transferred(&status)),
                None => break,
            }
        }
        publisher.join().unwrap();

        // Never reordered, never duplicated.
        for pair in seen.windows(2) {
            assert!(pair[0] < pair[1], "out of order: {seen:?}");
        }
    }

    #[test]
    fn throttle_coalesces_to_newest() {
        let channel = Arc::new(StatusChannel::new());
        let mut sub = channel.subscribe(Duration::from_millis(50));

        // Producer emits 10 events 5 ms apart while the consumer drains
        // concurrently with a 50 ms throttle.
        let publisher = thread::spawn(move || {
            for i in 1..=10 {
                channel.publish(progress(i * 100));
                thread::sleep(Duration::from_millis(5));
            }
            // Dropping the channel ends the subscription once drained.
        });

        let mut deliveries = Vec::new();
        while let Some(status) = sub.recv() {
            deliveries.push(transferred(&status));
        }
        publisher.join().unwrap();

        assert!(
            deliveries.len() < 10,
            "expected coalescing, got {deliveries:?}"
        );
        assert_eq!(*deliveries.last().unwrap(), 1000);
    }

    #[test]
    fn unsubscribe_detaches_only_one_consumer() {
        let channel = StatusChannel::new();
        let going = channel.subscribe(Duration::ZERO);
        let mut staying = channel.subscribe(Duration::ZERO);
        assert_eq!(channel.subscriber_count(), 2);

        going.unsubscribe();
        channel.publish(progress(100));

        // The dead queue was pruned on publish; the survivor still delivers.
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(transferred(&staying.recv().unwrap()), 100);
        assert_eq!(transferred(&channel.latest().unwrap()), 100);
    }
}
