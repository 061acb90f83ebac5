//! WebSocket channel dispatch built on the Junction core primitives
//!
//! Channels parallel HTTP routes for long-lived connections: a separate
//! registry with the same matcher semantics, a connect/message/disconnect
//! state machine per connection, per-sub-route permission groups, and a
//! topic subscription registry for publish/broadcast fan-out.

pub mod channel;
pub mod registry;
pub mod runner;
pub mod runtime;
pub mod subscriptions;

pub use channel::{
    Channel, ChannelMeta, ConnectHandler, DEFAULT_ROUTE_KEY, DisconnectHandler, MessageHandler,
    MessageRoute,
};
pub use registry::{ChannelMatch, ChannelRegistry};
pub use runner::{
    ChannelAccessGuard, ChannelRunner, ChannelRunnerBuilder, ChannelRunnerOptions,
};
pub use runtime::{ChannelHandle, ChannelState, ChannelTransport};
pub use subscriptions::SubscriptionRegistry;
