//! Channel registry and matcher
//!
//! Same registration and matching semantics as the route registry, in a
//! separate store: first-match-wins in registration order, leading
//! double-slash normalization, schema names resolved from metadata.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::channel::{Channel, ChannelMeta};

/// Outcome of a successful channel match
pub struct ChannelMatch<S, P> {
    pub channel: Arc<Channel<S, P>>,
    pub params: HashMap<String, String>,
    pub schema_name: Option<String>,
}

pub struct ChannelRegistry<S, P> {
    channels: RwLock<Vec<Arc<Channel<S, P>>>>,
    meta: RwLock<HashMap<String, ChannelMeta>>,
}

impl<S, P> ChannelRegistry<S, P> {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            meta: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, channel: Channel<S, P>) {
        self.channels.write().push(Arc::new(channel));
    }

    pub fn register_meta(&self, meta: ChannelMeta) {
        self.meta.write().insert(meta.name.clone(), meta);
    }

    /// Test-only reset
    pub fn clear(&self) {
        self.channels.write().clear();
        self.meta.write().clear();
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Match a handshake path against registered channels
    pub fn find(&self, path: &str) -> Option<ChannelMatch<S, P>> {
        let channels = self.channels.read();
        for channel in channels.iter() {
            if let Some(params) = channel.pattern().matches(path) {
                let schema_name = channel.schema_name().map(str::to_string).or_else(|| {
                    self.meta
                        .read()
                        .get(channel.name())
                        .and_then(|meta| meta.schema_name.clone())
                });
                return Some(ChannelMatch {
                    channel: Arc::clone(channel),
                    params,
                    schema_name,
                });
            }
        }
        None
    }
}

impl<S, P> Default for ChannelRegistry<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::NoServices;

    fn registry() -> ChannelRegistry<(), NoServices> {
        ChannelRegistry::new()
    }

    #[test]
    fn test_find_extracts_params() {
        let registry = registry();
        registry.register(Channel::new("room", "/chat/:room").unwrap());
        let matched = registry.find("/chat/general").unwrap();
        assert_eq!(matched.channel.name(), "room");
        assert_eq!(matched.params.get("room").map(String::as_str), Some("general"));
    }

    #[test]
    fn test_schema_resolved_from_meta_by_name() {
        let registry = registry();
        registry.register(Channel::new("chat", "/chat").unwrap());
        registry.register_meta(ChannelMeta {
            name: "chat".to_string(),
            route: "/chat".to_string(),
            params: vec![],
            schema_name: Some("ChatOpen".to_string()),
        });
        let matched = registry.find("/chat").unwrap();
        assert_eq!(matched.schema_name.as_deref(), Some("ChatOpen"));
    }

    #[test]
    fn test_unmatched_path() {
        let registry = registry();
        registry.register(Channel::new("chat", "/chat").unwrap());
        assert!(registry.find("/video").is_none());
    }
}
