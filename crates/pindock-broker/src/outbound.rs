//! Outbound message batching and redelivery.
//!
//! Two queues: `fresh` holds newly produced messages, `pending` holds the
//! most recent batch handed out but not yet confirmed delivered. On every
//! tick the bridge takes [`OutboundQueue::next_batch`]: while `pending` is
//! non-empty it is re-handed in full (duplicate delivery is preferred over
//! loss), otherwise up to [`PUBLISH_BATCH_SIZE`] fresh messages move into
//! `pending` and are handed out. [`OutboundQueue::mark_delivered`] clears
//! `pending` after a successful publish. There is no dead-lettering; a batch
//! is retried indefinitely until the broker accepts it.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;

use pindock_core::constants::PUBLISH_BATCH_SIZE;

/// One message toward the broker. Not individually acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub retain: bool,
}

impl OutboundMessage {
    #[must_use]
    pub fn new(topic: String, payload: impl Into<Bytes>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            retain: false,
        }
    }
}

/// The shared outbound queue. One instance per process.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    fresh: Mutex<VecDeque<OutboundMessage>>,
    pending: Mutex<VecDeque<OutboundMessage>>,
}

impl OutboundQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a freshly produced message.
    pub fn enqueue(&self, message: OutboundMessage) {
        self.fresh
            .lock()
            .expect("fresh lock poisoned")
            .push_back(message);
    }

    /// The batch to publish this tick.
    ///
    /// Re-hands the unconfirmed batch in full if one exists; otherwise
    /// moves up to [`PUBLISH_BATCH_SIZE`] fresh messages into the
    /// unconfirmed slot and hands those. Empty when there is nothing to do.
    #[must_use]
    pub fn next_batch(&self) -> Vec<OutboundMessage> {
        let mut pending = self.pending.lock().expect("pending lock poisoned");

        if pending.is_empty() {
            let mut fresh = self.fresh.lock().expect("fresh lock poisoned");
            for _ in 0..PUBLISH_BATCH_SIZE {
                match fresh.pop_front() {
                    Some(message) => pending.push_back(message),
                    None => break,
                }
            }
        }

        pending.iter().cloned().collect()
    }

    /// Confirm the current batch as published.
    pub fn mark_delivered(&self) {
        self.pending.lock().expect("pending lock poisoned").clear();
    }

    /// Whether both queues are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fresh.lock().expect("fresh lock poisoned").is_empty()
            && self.pending.lock().expect("pending lock poisoned").is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(n: usize) -> OutboundMessage {
        OutboundMessage::new(format!("t/{n}"), format!("p{n}"))
    }

    #[test]
    fn empty_queue_hands_empty_batch() {
        let queue = OutboundQueue::new();
        assert!(queue.next_batch().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn batch_is_capped_at_batch_size() {
        let queue = OutboundQueue::new();
        for n in 0..15 {
            queue.enqueue(message(n));
        }

        let batch = queue.next_batch();
        assert_eq!(batch.len(), PUBLISH_BATCH_SIZE);
        assert_eq!(batch[0].topic, "t/0");

        // The overflow stays fresh until the batch is confirmed.
        queue.mark_delivered();
        let rest = queue.next_batch();
        assert_eq!(rest.len(), 5);
        assert_eq!(rest[0].topic, "t/10");
    }

    #[test]
    fn unconfirmed_batch_is_rehanded_in_full() {
        let queue = OutboundQueue::new();
        queue.enqueue(message(0));
        queue.enqueue(message(1));

        let first = queue.next_batch();
        assert_eq!(first.len(), 2);

        // Publish failed: the same batch comes back, fresh arrivals wait.
        queue.enqueue(message(2));
        let retry = queue.next_batch();
        assert_eq!(retry, first);

        queue.mark_delivered();
        let next = queue.next_batch();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].topic, "t/2");
    }

    #[test]
    fn mark_delivered_empties_pending_only() {
        let queue = OutboundQueue::new();
        queue.enqueue(message(0));

        let _ = queue.next_batch();
        queue.mark_delivered();

        assert!(queue.is_empty());
        assert!(queue.next_batch().is_empty());
    }
}
