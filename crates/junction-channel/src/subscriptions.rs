//! Topic membership for channel pub/sub
//!
//! A plain topic → connection-id-set registry. Delivery lives in the
//! channel runner, which owns the transports; this type only tracks
//! membership and purges ids when their connection closes.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

#[derive(Default)]
pub struct SubscriptionRegistry {
    topics: RwLock<HashMap<String, HashSet<String>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str, connection_id: &str) {
        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    pub fn unsubscribe(&self, topic: &str, connection_id: &str) {
        let mut topics = self.topics.write();
        if let Some(members) = topics.get_mut(topic) {
            members.remove(connection_id);
            if members.is_empty() {
                topics.remove(topic);
            }
        }
    }

    pub fn is_subscribed(&self, topic: &str, connection_id: &str) -> bool {
        self.topics
            .read()
            .get(topic)
            .is_some_and(|members| members.contains(connection_id))
    }

    pub fn subscribers(&self, topic: &str) -> Vec<String> {
        self.topics
            .read()
            .get(topic)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Purge a closed connection from every topic
    pub fn on_channel_closed(&self, connection_id: &str) {
        let mut topics = self.topics.write();
        topics.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_unsubscribe() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("room:general", "c1");
        registry.subscribe("room:general", "c2");
        assert!(registry.is_subscribed("room:general", "c1"));

        registry.unsubscribe("room:general", "c1");
        assert!(!registry.is_subscribed("room:general", "c1"));
        assert!(registry.is_subscribed("room:general", "c2"));
    }

    #[test]
    fn test_empty_topics_are_dropped() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("room:general", "c1");
        registry.unsubscribe("room:general", "c1");
        assert_eq!(registry.topic_count(), 0);
    }

    #[test]
    fn test_channel_close_purges_all_topics() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("a", "c1");
        registry.subscribe("b", "c1");
        registry.subscribe("b", "c2");
        registry.on_channel_closed("c1");
        assert!(!registry.is_subscribed("a", "c1"));
        assert!(!registry.is_subscribed("b", "c1"));
        assert!(registry.is_subscribed("b", "c2"));
        assert_eq!(registry.topic_count(), 1);
    }
}
