//! Subscriber-side bookkeeping: maps a router-assigned subscription id to the
//! local slots (event queues) listening on it, and lets several local
//! `subscribe()` calls on the same topic+policy share one subscription id.

use std::collections::HashMap;

use log::warn;
use tokio::sync::mpsc;

use crate::common::*;
use crate::error::WampError;

pub type SlotId = u64;

/// A decoded EVENT, handed to every slot subscribed to its subscription id.
#[derive(Debug, Clone)]
pub struct Event {
    pub subscription: WampId,
    pub publication: WampId,
    pub details: WampDict,
    pub arguments: Option<WampArgs>,
    pub arguments_kw: Option<WampKwArgs>,
}

struct SubscriptionRecord {
    topic: WampUri,
    policy: String,
    slots: HashMap<SlotId, mpsc::UnboundedSender<Event>>,
}

impl SubscriptionRecord {
    fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Tracks active subscriptions and fans out EVENT messages to local slots.
pub struct Readership {
    next_slot_id: SlotId,
    by_id: HashMap<WampId, SubscriptionRecord>,
    by_topic: HashMap<(String, WampUri), WampId>,
}

impl Readership {
    pub fn new() -> Self {
        Readership {
            next_slot_id: 1,
            by_id: HashMap::new(),
            by_topic: HashMap::new(),
        }
    }

    /// Looks up an already-subscribed topic+policy pair so a second local
    /// `subscribe()` call can be satisfied without another SUBSCRIBE message.
    pub fn find_subscription(&self, policy: &str, topic: &str) -> Option<WampId> {
        self.by_topic
            .get(&(policy.to_owned(), topic.to_owned()))
            .copied()
    }

    /// Adds a local slot to an existing subscription, returning its slot id.
    pub fn add_slot(&mut self, subscription_id: WampId, tx: mpsc::UnboundedSender<Event>) -> SlotId {
        let slot_id = self.next_slot_id;
        self.next_slot_id += 1;
        if let Some(record) = self.by_id.get_mut(&subscription_id) {
            record.slots.insert(slot_id, tx);
        }
        slot_id
    }

    /// Records a brand-new subscription the router just confirmed.
    pub fn create_subscription(
        &mut self,
        subscription_id: WampId,
        topic: WampUri,
        policy: String,
        tx: mpsc::UnboundedSender<Event>,
    ) -> SlotId {
        let slot_id = self.next_slot_id;
        self.next_slot_id += 1;

        let mut slots = HashMap::new();
        slots.insert(slot_id, tx);
        self.by_topic
            .insert((policy.clone(), topic.clone()), subscription_id);
        self.by_id.insert(
            subscription_id,
            SubscriptionRecord {
                topic,
                policy,
                slots,
            },
        );
        slot_id
    }

    /// Removes a local slot. Returns true if this was the last slot for the
    /// subscription, meaning the caller must send UNSUBSCRIBE.
    pub fn remove_slot(&mut self, subscription_id: WampId, slot_id: SlotId) -> bool {
        let record = match self.by_id.get_mut(&subscription_id) {
            Some(r) => r,
            None => return false,
        };
        record.slots.remove(&slot_id);
        if record.is_empty() {
            if let Some(record) = self.by_id.remove(&subscription_id) {
                self.by_topic.remove(&(record.policy, record.topic));
            }
            true
        } else {
            false
        }
    }

    /// Fans an EVENT out to every local slot, isolating failures: a slot
    /// whose receiver was dropped is pruned rather than killing the rest.
    pub fn on_event(&mut self, event: Event) -> bool {
        let record = match self.by_id.get_mut(&event.subscription) {
            Some(r) => r,
            None => return false,
        };

        let mut dead = Vec::new();
        for (slot_id, tx) in record.slots.iter() {
            if tx.send(event.clone()).is_err() {
                dead.push(*slot_id);
            }
        }
        for slot_id in dead {
            record.slots.remove(&slot_id);
        }
        if record.slots.is_empty() {
            warn!(
                "all local slots for subscription {} are gone but it was never unsubscribed",
                event.subscription
            );
        }
        true
    }

    pub fn topic_of(&self, subscription_id: WampId) -> Option<&WampUri> {
        self.by_id.get(&subscription_id).map(|r| &r.topic)
    }

    pub fn abandon_all(&mut self, errc: crate::error::SessionErrc) {
        let _ = errc;
        self.by_id.clear();
        self.by_topic.clear();
    }
}

impl Default for Readership {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_subscribe_on_same_topic_reuses_the_subscription() {
        let mut r = Readership::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        r.create_subscription(7, "com.example.topic".to_owned(), "exact".to_owned(), tx);

        assert_eq!(r.find_subscription("exact", "com.example.topic"), Some(7));
    }

    #[test]
    fn last_slot_removed_reports_unsubscribe_needed() {
        let mut r = Readership::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let slot = r.create_subscription(7, "com.example.topic".to_owned(), "exact".to_owned(), tx);

        assert!(r.remove_slot(7, slot));
        assert_eq!(r.find_subscription("exact", "com.example.topic"), None);
    }

    #[test]
    fn event_fan_out_reaches_every_slot() {
        let mut r = Readership::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        r.create_subscription(7, "com.example.topic".to_owned(), "exact".to_owned(), tx1);
        r.add_slot(7, tx2);

        let delivered = r.on_event(Event {
            subscription: 7,
            publication: 99,
            details: WampDict::new(),
            arguments: None,
            arguments_kw: None,
        });

        assert!(delivered);
        assert_eq!(rx1.try_recv().unwrap().publication, 99);
        assert_eq!(rx2.try_recv().unwrap().publication, 99);
    }

    #[test]
    fn event_for_unknown_subscription_is_reported_undelivered() {
        let mut r = Readership::new();
        let delivered = r.on_event(Event {
            subscription: 404,
            publication: 1,
            details: WampDict::new(),
            arguments: None,
            arguments_kw: None,
        });
        assert!(!delivered);
    }
}
