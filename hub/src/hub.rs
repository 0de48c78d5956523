use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Per-subscriber buffer used by [`EventHub::new`].
pub const DEFAULT_CAPACITY: usize = 64;

/// Opaque handle naming one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The receiving end handed to a subscriber.
#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriptionId,
    topic: String,
    receiver: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next delivered message; `None` once the hub has dropped this
    /// subscription and the buffer is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Result of one [`EventHub::publish`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Subscribers the message was queued for.
    pub delivered: usize,
    /// Subscribers skipped because their buffer was full or gone.
    pub dropped: usize,
}

type Registry<T> = HashMap<String, Vec<(SubscriptionId, mpsc::Sender<T>)>>;

pub struct EventHub<T> {
    capacity: usize,
    next_id: AtomicU64,
    topics: Mutex<Registry<T>>,
}

impl<T: Clone + Send + 'static> EventHub<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Hub whose subscribers each buffer up to `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry<T>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self, topic: &str) -> Subscription<T> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.registry()
            .entry(topic.to_string())
            .or_default()
            .push((id, sender));
        tracing::debug!(topic = %topic, id = id.0, "subscribed");
        Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        }
    }

    /// Remove `id` from `topic`. Returns whether anything was removed;
    /// repeating the call is harmless.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut registry = self.registry();
        let Some(subscribers) = registry.get_mut(topic) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            registry.remove(topic);
        }
        if removed {
            tracing::debug!(topic = %topic, id = id.0, "unsubscribed");
        }
        removed
    }

    /// Offer `message` to every subscriber of `topic` without waiting.
    pub fn publish(&self, topic: &str, message: T) -> PublishOutcome {
        let snapshot: Vec<(SubscriptionId, mpsc::Sender<T>)> = match self.registry().get(topic) {
            Some(subscribers) => subscribers.clone(),
            None => return PublishOutcome::default(),
        };

        let mut outcome = PublishOutcome::default();
        let mut closed = Vec::new();
        for (id, sender) in &snapshot {
            match sender.try_send(message.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(topic = %topic, id = id.0, "subscriber not ready, message dropped");
                    outcome.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    outcome.dropped += 1;
                    closed.push(*id);
                }
            }
        }

        for id in closed {
            self.unsubscribe(topic, id);
        }
        outcome
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry().get(topic).map_or(0, Vec::len)
    }

    pub fn total_subscribers(&self) -> usize {
        self.registry().values().map(Vec::len).sum()
    }

    pub fn topic_count(&self) -> usize {
        self.registry().len()
    }
}

impl<T: Clone + Send + 'static> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let hub: EventHub<u32> = EventHub::new();
        assert_eq!(hub.publish("tx", 1), PublishOutcome::default());
        assert_eq!(hub.topic_count(), 0);
    }

    #[test]
    fn full_subscriber_is_skipped_ready_one_receives() {
        let hub = EventHub::with_capacity(1);
        let mut ready = hub.subscribe("tx");
        let mut stuck = hub.subscribe("tx");

        // Fill `stuck`'s single slot, then drain `ready`.
        hub.publish("tx", 0u32);
        assert_eq!(ready.try_recv().unwrap(), 0);

        let outcome = hub.publish("tx", 1);
        assert_eq!(outcome, PublishOutcome { delivered: 1, dropped: 1 });
        assert_eq!(ready.try_recv().unwrap(), 1);
        assert_eq!(stuck.try_recv().unwrap(), 0);
        assert!(stuck.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_twice_equals_once() {
        let hub: EventHub<u32> = EventHub::new();
        let a = hub.subscribe("block");
        let _b = hub.subscribe("block");

        assert!(hub.unsubscribe("block", a.id()));
        assert_eq!(hub.subscriber_count("block"), 1);
        assert!(!hub.unsubscribe("block", a.id()));
        assert_eq!(hub.subscriber_count("block"), 1);
    }

    #[test]
    fn unsubscribe_on_wrong_topic_leaves_registry_alone() {
        let hub: EventHub<u32> = EventHub::new();
        let a = hub.subscribe("tx");
        assert!(!hub.unsubscribe("block", a.id()));
        assert_eq!(hub.subscriber_count("tx"), 1);
    }

    #[test]
    fn last_unsubscribe_removes_topic() {
        let hub: EventHub<u32> = EventHub::new();
        let a = hub.subscribe("0xcontract");
        assert_eq!(hub.topic_count(), 1);
        hub.unsubscribe("0xcontract", a.id());
        assert_eq!(hub.topic_count(), 0);
        assert_eq!(hub.total_subscribers(), 0);
    }

    #[test]
    fn topics_are_isolated() {
        let hub = EventHub::new();
        let mut tx = hub.subscribe("tx");
        let mut block = hub.subscribe("block");
        hub.publish("tx", "t");
        assert_eq!(tx.try_recv().unwrap(), "t");
        assert!(block.try_recv().is_err());
        assert_eq!(hub.total_subscribers(), 2);
    }

    #[test]
    fn dropped_receiver_is_pruned_on_publish() {
        let hub = EventHub::new();
        let gone = hub.subscribe("tx");
        let mut live = hub.subscribe("tx");
        drop(gone);

        let outcome = hub.publish("tx", 5u8);
        assert_eq!(outcome, PublishOutcome { delivered: 1, dropped: 1 });
        assert_eq!(hub.subscriber_count("tx"), 1);
        assert_eq!(live.try_recv().unwrap(), 5);
    }

    #[tokio::test]
    async fn per_subscriber_order_follows_publish_order() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe("tx");
        for i in 0..10u32 {
            hub.publish("tx", i);
        }
        for i in 0..10u32 {
            assert_eq!(sub.recv().await, Some(i));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publish_and_unsubscribe() {
        let hub = Arc::new(EventHub::with_capacity(1024));
        let subs: Vec<_> = (0..16).map(|_| hub.subscribe("tx")).collect();
        let ids: Vec<_> = subs.iter().map(Subscription::id).collect();

        let publisher = {
            let hub = hub.clone();
            tokio::spawn(async move {
                for i in 0..500u32 {
                    hub.publish("tx", i);
                    tokio::task::yield_now().await;
                }
            })
        };
        let remover = {
            let hub = hub.clone();
            tokio::spawn(async move {
                for id in ids {
                    hub.unsubscribe("tx", id);
                    tokio::task::yield_now().await;
                }
            })
        };

        publisher.await.unwrap();
        remover.await.unwrap();
        assert_eq!(hub.subscriber_count("tx"), 0);
        drop(subs);
    }
}
