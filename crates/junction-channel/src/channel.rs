//! Channel descriptors and handler traits
//!
//! A [`Channel`] binds a path pattern to connect/message/disconnect handlers
//! bound at construction time. Message payloads may name a sub-route through
//! the channel's route key; each sub-route carries its own optional
//! permission groups, evaluated exactly like HTTP route permissions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use junction_core::{ApiResult, ServiceScope};
use junction_router::pattern::PathPattern;
use junction_router::permissions::{PermissionCheck, PermissionGroups};

use crate::runtime::ChannelHandle;

/// Field of an inbound payload that selects a message sub-route
pub const DEFAULT_ROUTE_KEY: &str = "action";

#[async_trait]
pub trait ConnectHandler<S, P>: Send + Sync {
    async fn call(
        &self,
        services: &mut ServiceScope<'_, S, P>,
        channel: &ChannelHandle,
    ) -> ApiResult<()>;
}

#[async_trait]
pub trait DisconnectHandler<S, P>: Send + Sync {
    async fn call(
        &self,
        services: &mut ServiceScope<'_, S, P>,
        channel: &ChannelHandle,
    ) -> ApiResult<()>;
}

/// Message handler; a returned value is sent back to the peer unless the
/// handler already sent through the channel itself
#[async_trait]
pub trait MessageHandler<S, P>: Send + Sync {
    async fn call(
        &self,
        services: &mut ServiceScope<'_, S, P>,
        channel: &ChannelHandle,
        data: Value,
    ) -> ApiResult<Option<Value>>;
}

/// A message handler with its permission groups
pub struct MessageRoute<S, P> {
    handler: Arc<dyn MessageHandler<S, P>>,
    permissions: PermissionGroups<S, P>,
}

impl<S, P> MessageRoute<S, P> {
    pub fn handler(&self) -> &Arc<dyn MessageHandler<S, P>> {
        &self.handler
    }

    pub fn permissions(&self) -> &PermissionGroups<S, P> {
        &self.permissions
    }
}

/// Registered WebSocket endpoint descriptor
pub struct Channel<S, P> {
    name: String,
    pattern: PathPattern,
    auth: bool,
    route_key: String,
    on_connect: Option<Arc<dyn ConnectHandler<S, P>>>,
    on_disconnect: Option<Arc<dyn DisconnectHandler<S, P>>>,
    on_message: Option<MessageRoute<S, P>>,
    message_routes: Vec<(String, MessageRoute<S, P>)>,
    schema_name: Option<String>,
}

impl<S, P> Channel<S, P> {
    pub fn new(name: impl Into<String>, pattern: &str) -> ApiResult<Self> {
        Ok(Self {
            name: name.into(),
            pattern: PathPattern::new(pattern)?,
            auth: true,
            route_key: DEFAULT_ROUTE_KEY.to_string(),
            on_connect: None,
            on_disconnect: None,
            on_message: None,
            message_routes: Vec::new(),
            schema_name: None,
        })
    }

    pub fn with_auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    /// Change the payload field used for sub-route selection
    pub fn with_route_key(mut self, key: impl Into<String>) -> Self {
        self.route_key = key.into();
        self
    }

    /// Schema for the opening payload
    pub fn with_schema(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    pub fn on_connect(mut self, handler: impl ConnectHandler<S, P> + 'static) -> Self {
        self.on_connect = Some(Arc::new(handler));
        self
    }

    pub fn on_disconnect(mut self, handler: impl DisconnectHandler<S, P> + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(handler));
        self
    }

    /// Default handler for payloads naming no (or an unknown) sub-route
    pub fn on_message(mut self, handler: impl MessageHandler<S, P> + 'static) -> Self {
        self.on_message = Some(MessageRoute {
            handler: Arc::new(handler),
            permissions: PermissionGroups::new(),
        });
        self
    }

    pub fn on_message_with_permissions(
        mut self,
        handler: impl MessageHandler<S, P> + 'static,
        name: impl Into<String>,
        checks: Vec<Arc<dyn PermissionCheck<S, P>>>,
    ) -> Self {
        let mut permissions = PermissionGroups::new();
        permissions.add_group(name, checks);
        self.on_message = Some(MessageRoute {
            handler: Arc::new(handler),
            permissions,
        });
        self
    }

    /// Register a named sub-route handler
    pub fn message_route(
        mut self,
        route: impl Into<String>,
        handler: impl MessageHandler<S, P> + 'static,
    ) -> Self {
        self.message_routes.push((
            route.into(),
            MessageRoute {
                handler: Arc::new(handler),
                permissions: PermissionGroups::new(),
            },
        ));
        self
    }

    pub fn message_route_with_permissions(
        mut self,
        route: impl Into<String>,
        handler: impl MessageHandler<S, P> + 'static,
        name: impl Into<String>,
        checks: Vec<Arc<dyn PermissionCheck<S, P>>>,
    ) -> Self {
        let mut permissions = PermissionGroups::new();
        permissions.add_group(name, checks);
        self.message_routes
            .push((route.into(), MessageRoute {
                handler: Arc::new(handler),
                permissions,
            }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn requires_session(&self) -> bool {
        self.auth
    }

    pub fn route_key(&self) -> &str {
        &self.route_key
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    pub fn connect_handler(&self) -> Option<&Arc<dyn ConnectHandler<S, P>>> {
        self.on_connect.as_ref()
    }

    pub fn disconnect_handler(&self) -> Option<&Arc<dyn DisconnectHandler<S, P>>> {
        self.on_disconnect.as_ref()
    }

    pub fn default_message_route(&self) -> Option<&MessageRoute<S, P>> {
        self.on_message.as_ref()
    }

    pub fn named_message_route(&self, route: &str) -> Option<&MessageRoute<S, P>> {
        self.message_routes
            .iter()
            .find(|(name, _)| name == route)
            .map(|(_, handler)| handler)
    }
}

/// Generated channel metadata, consumed read-only for schema resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMeta {
    pub name: String,
    pub route: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub schema_name: Option<String>,
}
