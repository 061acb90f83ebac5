//! Channel runtime state
//!
//! One [`ChannelHandle`] exists per open connection. The lifecycle is a
//! strict `Initial → Open → Closed` machine with a terminal `Closed` state;
//! the close transition is claimed exactly once even under concurrent
//! close/error races. Opening data is captured at connect time and immutable
//! thereafter; the session may be replaced after late authentication.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use junction_core::{ApiResult, UserSession};

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Initial,
    Open,
    Closed,
}

/// Transport-bound send capability for one connection
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn send(&self, message: Value) -> ApiResult<()>;
}

/// An open (or opening) channel connection
pub struct ChannelHandle {
    id: String,
    channel_name: String,
    opening_data: Value,
    state: Mutex<ChannelState>,
    session: Mutex<Option<UserSession>>,
    transport: Arc<dyn ChannelTransport>,
    sends: AtomicU64,
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.id)
            .field("channel_name", &self.channel_name)
            .field("opening_data", &self.opening_data)
            .field("state", &self.state())
            .field("sends", &self.sends.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ChannelHandle {
    pub(crate) fn new(
        channel_name: impl Into<String>,
        opening_data: Value,
        session: Option<UserSession>,
        transport: Arc<dyn ChannelTransport>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            channel_name: channel_name.into(),
            opening_data,
            state: Mutex::new(ChannelState::Initial),
            session: Mutex::new(session),
            transport,
            sends: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Payload captured during the connect handshake, immutable for the
    /// connection's lifetime
    pub fn opening_data(&self) -> &Value {
        &self.opening_data
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    pub fn session(&self) -> Option<UserSession> {
        self.session.lock().clone()
    }

    /// Replace the connection's session, e.g. after message-time
    /// authentication
    pub fn set_session(&self, session: Option<UserSession>) {
        *self.session.lock() = session;
    }

    /// Send a message to this connection's peer
    pub async fn send(&self, message: Value) -> ApiResult<()> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.transport.send(message).await
    }

    pub(crate) fn transport(&self) -> &Arc<dyn ChannelTransport> {
        &self.transport
    }

    pub(crate) fn send_count(&self) -> u64 {
        self.sends.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_open(&self) {
        *self.state.lock() = ChannelState::Open;
    }

    /// Claim the close transition; returns false if already closed
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ChannelState::Closed {
            return false;
        }
        *state = ChannelState::Closed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NullTransport;

    #[async_trait]
    impl ChannelTransport for NullTransport {
        async fn send(&self, _message: Value) -> ApiResult<()> {
            Ok(())
        }
    }

    fn handle() -> ChannelHandle {
        ChannelHandle::new("chat", json!({"room": "general"}), None, Arc::new(NullTransport))
    }

    #[test]
    fn test_initial_state_and_identity() {
        let handle = handle();
        assert_eq!(handle.state(), ChannelState::Initial);
        assert_eq!(handle.channel_name(), "chat");
        assert!(!handle.id().is_empty());
        assert_eq!(handle.opening_data(), &json!({"room": "general"}));
    }

    #[test]
    fn test_close_is_claimed_once() {
        let handle = handle();
        handle.mark_open();
        assert!(handle.begin_close());
        assert!(!handle.begin_close());
        assert_eq!(handle.state(), ChannelState::Closed);
    }

    #[test]
    fn test_session_replacement() {
        let handle = handle();
        assert!(handle.session().is_none());
        let session = UserSession::from_value(json!({"sub": "u1"})).unwrap();
        handle.set_session(Some(session));
        assert_eq!(handle.session().and_then(|s| s.user_id().map(str::to_string)), Some("u1".into()));
    }

    #[tokio::test]
    async fn test_send_bumps_counter() {
        let handle = handle();
        assert_eq!(handle.send_count(), 0);
        handle.send(json!({"hello": true})).await.unwrap();
        assert_eq!(handle.send_count(), 1);
    }
}
