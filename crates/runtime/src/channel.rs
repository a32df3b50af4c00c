use std::collections::BTreeMap;

/// Handle returned by [`EventChannel::subscribe`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Publish/subscribe queue owned by whoever produces the events.
///
/// Every subscriber gets its own queue and drains it at its own pace.
/// Delivery order is publish order; subscribers are visited in
/// subscription order. Dropping the owner (or calling
/// [`EventChannel::unsubscribe_all`]) detaches everyone at once.
#[derive(Debug)]
pub struct EventChannel<E> {
    next_id: u64,
    queues: BTreeMap<SubscriptionId, Vec<E>>,
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            queues: BTreeMap::new(),
        }
    }
}

impl<E: Clone> EventChannel<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.queues.insert(id, Vec::new());
        id
    }

    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.queues.remove(&id).is_some()
    }

    /// Detaches every subscriber; returns how many there were.
    pub fn unsubscribe_all(&mut self) -> usize {
        let n = self.queues.len();
        self.queues.clear();
        n
    }

    pub fn subscriber_count(&self) -> usize {
        self.queues.len()
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.queues.contains_key(&id)
    }

    pub fn publish(&mut self, event: E) {
        for queue in self.queues.values_mut() {
            queue.push(event.clone());
        }
    }

    pub fn pending(&self, id: SubscriptionId) -> &[E] {
        self.queues.get(&id).map(|q| q.as_slice()).unwrap_or(&[])
    }

    /// Takes all queued events for `id`. Unknown subscriptions yield nothing.
    pub fn drain(&mut self, id: SubscriptionId) -> Vec<E> {
        self.queues
            .get_mut(&id)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::EventChannel;

    #[test]
    fn each_subscriber_sees_every_event_in_order() {
        let mut ch = EventChannel::new();
        let a = ch.subscribe();
        let b = ch.subscribe();
        ch.publish("loaded");
        ch.publish("refreshed");

        assert_eq!(ch.drain(a), vec!["loaded", "refreshed"]);
        assert!(ch.pending(a).is_empty());
        assert_eq!(ch.pending(b), &["loaded", "refreshed"]);
    }

    #[test]
    fn late_subscribers_miss_earlier_events() {
        let mut ch = EventChannel::new();
        ch.publish(1);
        let s = ch.subscribe();
        ch.publish(2);
        assert_eq!(ch.drain(s), vec![2]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut ch = EventChannel::new();
        let a = ch.subscribe();
        let b = ch.subscribe();
        assert!(ch.unsubscribe(a));
        assert!(!ch.unsubscribe(a));
        ch.publish(7);
        assert!(ch.drain(a).is_empty());
        assert_eq!(ch.drain(b), vec![7]);

        assert_eq!(ch.unsubscribe_all(), 1);
        assert_eq!(ch.subscriber_count(), 0);
        assert!(!ch.is_subscribed(b));
    }
}
