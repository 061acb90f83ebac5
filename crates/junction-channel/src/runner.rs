//! Channel runner: connect, message dispatch, disconnect, fan-out
//!
//! The WebSocket counterpart of the HTTP route runner, built on the same
//! primitives: matcher semantics from the channel registry, the shared
//! session resolver, schema validation with coercion for query-shaped
//! opening payloads, and per-event session-service lifecycles.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use junction_core::{
    ApiError, ApiResult, ErrorKind, HttpRequest, HttpResponse, Interaction, ServiceScope,
    SessionServices, SessionServicesFactory, UserSession,
};
use junction_router::session_resolver::SessionResolver;
use junction_schema::SchemaRegistry;

use crate::channel::{Channel, ChannelMeta, MessageRoute};
use crate::registry::{ChannelMatch, ChannelRegistry};
use crate::runtime::{ChannelHandle, ChannelState, ChannelTransport};
use crate::subscriptions::SubscriptionRegistry;

/// Hook consulted before a matched channel accepts a connection; rejects by
/// returning an error
#[async_trait]
pub trait ChannelAccessGuard<S, P>: Send + Sync {
    async fn can_open(
        &self,
        channel: &Channel<S, P>,
        session: Option<&UserSession>,
    ) -> ApiResult<()>;
}

#[derive(Debug, Clone)]
pub struct ChannelRunnerOptions {
    /// Finalize a 404 on the handshake response when no channel matches
    pub respond_with_404: bool,
    /// Coerce singleton opening-data values into arrays for array-typed
    /// schema fields (query-string-shaped handshakes)
    pub coerce_opening_data: bool,
}

impl Default for ChannelRunnerOptions {
    fn default() -> Self {
        Self {
            respond_with_404: true,
            coerce_opening_data: true,
        }
    }
}

struct OpenConnection<S, P> {
    handle: Arc<ChannelHandle>,
    channel: Arc<Channel<S, P>>,
}

impl<S, P> Clone for OpenConnection<S, P> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            channel: Arc::clone(&self.channel),
        }
    }
}

/// Orchestrates the channel connect/message/disconnect state machine
pub struct ChannelRunner<S, P>
where
    S: Send + Sync,
    P: SessionServices,
{
    registry: Arc<ChannelRegistry<S, P>>,
    schemas: Arc<SchemaRegistry>,
    resolver: Arc<SessionResolver>,
    singleton: Arc<S>,
    factory: Arc<dyn SessionServicesFactory<Singleton = S, Services = P>>,
    guard: Option<Arc<dyn ChannelAccessGuard<S, P>>>,
    connections: RwLock<HashMap<String, OpenConnection<S, P>>>,
    subscriptions: SubscriptionRegistry,
    options: ChannelRunnerOptions,
}

impl<S, P> ChannelRunner<S, P>
where
    S: Send + Sync,
    P: SessionServices,
{
    pub fn registry(&self) -> &Arc<ChannelRegistry<S, P>> {
        &self.registry
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn connection(&self, connection_id: &str) -> Option<Arc<ChannelHandle>> {
        self.connections
            .read()
            .await
            .get(connection_id)
            .map(|conn| Arc::clone(&conn.handle))
    }

    /// Handle a connect handshake
    ///
    /// An unmatched path is a clean negative signal, not an error: the
    /// handshake response is finalized with 404 (when configured) and `None`
    /// is returned. Session resolution deliberately runs as optional even
    /// for auth channels, since handshakes often cannot carry bearer-style
    /// credentials; hard authentication is deferred to message time via
    /// permissions or the access guard.
    pub async fn connect(
        &self,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        transport: Arc<dyn ChannelTransport>,
    ) -> ApiResult<Option<Arc<ChannelHandle>>> {
        let Some(matched) = self.registry.find(request.path()) else {
            if self.options.respond_with_404 {
                response.set_status(404);
                response.end();
            }
            return Ok(None);
        };
        debug!(
            channel = matched.channel.name(),
            path = request.path(),
            "matched channel"
        );
        request.set_params(matched.params.clone());

        let session = self.resolver.resolve(&*request, false).await?;

        if let Some(guard) = &self.guard {
            guard.can_open(&matched.channel, session.as_ref()).await?;
        }

        let mut opening_data = aggregate_opening_data(&*request)?;
        if let Some(name) = matched.schema_name.as_deref() {
            self.schemas.load(name)?;
            self.schemas.validate_and_coerce(
                Some(name),
                &mut opening_data,
                self.options.coerce_opening_data,
            )?;
        }

        let handle = Arc::new(ChannelHandle::new(
            matched.channel.name(),
            opening_data,
            session,
            transport,
        ));

        let interaction = Interaction::with_request(&*request);
        let session = handle.session();
        let mut services = self
            .factory
            .create(self.singleton.as_ref(), interaction, session.as_ref())
            .await?;
        let outcome = self
            .invoke_connect(&matched, &mut services, &handle)
            .await;
        self.teardown(&mut services).await;
        outcome?;

        handle.mark_open();
        self.connections.write().await.insert(
            handle.id().to_string(),
            OpenConnection {
                handle: Arc::clone(&handle),
                channel: Arc::clone(&matched.channel),
            },
        );
        debug!(
            channel = matched.channel.name(),
            connection = handle.id(),
            "channel opened"
        );
        Ok(Some(handle))
    }

    async fn invoke_connect(
        &self,
        matched: &ChannelMatch<S, P>,
        services: &mut P,
        handle: &Arc<ChannelHandle>,
    ) -> ApiResult<()> {
        if let Some(handler) = matched.channel.connect_handler() {
            let mut scope = ServiceScope {
                singleton: self.singleton.as_ref(),
                session: services,
            };
            handler.call(&mut scope, handle).await?;
        }
        Ok(())
    }

    /// Dispatch an inbound message for a connection
    ///
    /// The target handler is the sub-route named by the payload's route-key
    /// field when one is registered, otherwise the channel's default message
    /// handler. The returned value has already been delivered to the peer
    /// unless the handler sent through the channel itself; adapters must not
    /// send it again.
    pub async fn message(&self, connection_id: &str, payload: Value) -> ApiResult<Option<Value>> {
        let conn = self
            .connections
            .read()
            .await
            .get(connection_id)
            .cloned()
            .ok_or_else(|| {
                ApiError::not_found(format!("unknown channel connection '{}'", connection_id))
            })?;
        if conn.handle.state() != ChannelState::Open {
            return Err(ApiError::new(ErrorKind::Gone)
                .with_message(format!("connection '{}' is closed", connection_id)));
        }

        let sub_route = payload
            .get(conn.channel.route_key())
            .and_then(Value::as_str)
            .map(str::to_string);
        let route = match sub_route
            .as_deref()
            .and_then(|name| conn.channel.named_message_route(name))
        {
            Some(route) => route,
            None => conn.channel.default_message_route().ok_or_else(|| {
                ApiError::not_found(format!(
                    "channel '{}' has no message handler",
                    conn.channel.name()
                ))
            })?,
        };

        let session = conn.handle.session();
        let mut services = self
            .factory
            .create(self.singleton.as_ref(), Interaction::detached(), session.as_ref())
            .await?;
        let sends_before = conn.handle.send_count();
        let outcome = self
            .invoke_message(route, &mut services, &conn.handle, payload, session.as_ref())
            .await;
        self.teardown(&mut services).await;
        let reply = outcome?;

        if let Some(value) = &reply {
            // the runner does not double-send: a handler that already wrote
            // to the channel keeps its return value out of the socket
            if conn.handle.send_count() == sends_before {
                conn.handle.send(value.clone()).await?;
            }
        }
        Ok(reply)
    }

    async fn invoke_message(
        &self,
        route: &MessageRoute<S, P>,
        services: &mut P,
        handle: &Arc<ChannelHandle>,
        payload: Value,
        session: Option<&UserSession>,
    ) -> ApiResult<Option<Value>> {
        let mut scope = ServiceScope {
            singleton: self.singleton.as_ref(),
            session: services,
        };
        if !route.permissions().is_empty() {
            let granted = route.permissions().verify(&scope, &payload, session).await?;
            if !granted {
                return Err(ApiError::forbidden());
            }
        }
        route.handler().call(&mut scope, handle, payload).await
    }

    /// Tear a connection down, exactly once
    ///
    /// The close transition is claimed through the handle's state machine,
    /// so concurrent close/error races collapse to a single disconnect
    /// callback. The connection is always purged from the map and from
    /// every subscription topic, even if the callback fails.
    pub async fn disconnect(&self, connection_id: &str) -> ApiResult<()> {
        let Some(conn) = self.connections.write().await.remove(connection_id) else {
            return Ok(());
        };
        if !conn.handle.begin_close() {
            return Ok(());
        }

        let outcome = match conn.channel.disconnect_handler() {
            Some(handler) => {
                let session = conn.handle.session();
                let mut services = self
                    .factory
                    .create(self.singleton.as_ref(), Interaction::detached(), session.as_ref())
                    .await?;
                let mut scope = ServiceScope {
                    singleton: self.singleton.as_ref(),
                    session: &mut services,
                };
                let result = handler.call(&mut scope, &conn.handle).await;
                self.teardown(&mut services).await;
                result
            }
            None => Ok(()),
        };

        self.subscriptions.on_channel_closed(connection_id);
        debug!(connection = connection_id, "channel closed");
        outcome
    }

    pub fn subscribe(&self, topic: &str, connection_id: &str) {
        self.subscriptions.subscribe(topic, connection_id);
    }

    pub fn unsubscribe(&self, topic: &str, connection_id: &str) {
        self.subscriptions.unsubscribe(topic, connection_id);
    }

    /// Deliver to every subscriber of a topic except the sender
    ///
    /// A failing recipient is logged and skipped; fan-out never aborts.
    pub async fn publish(&self, topic: &str, from_id: &str, data: &Value) {
        let targets = self.subscriptions.subscribers(topic);
        let handles = {
            let connections = self.connections.read().await;
            targets
                .iter()
                .filter(|id| id.as_str() != from_id)
                .filter_map(|id| connections.get(id).map(|conn| Arc::clone(&conn.handle)))
                .collect::<Vec<_>>()
        };
        for handle in handles {
            if let Err(err) = handle.transport().send(data.clone()).await {
                warn!(
                    topic,
                    connection = handle.id(),
                    "publish delivery failed: {}",
                    err
                );
            }
        }
    }

    /// Deliver to every open connection except the sender
    pub async fn broadcast(&self, from_id: &str, data: &Value) {
        let handles = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|conn| conn.handle.id() != from_id)
                .map(|conn| Arc::clone(&conn.handle))
                .collect::<Vec<_>>()
        };
        for handle in handles {
            if let Err(err) = handle.transport().send(data.clone()).await {
                warn!(connection = handle.id(), "broadcast delivery failed: {}", err);
            }
        }
    }

    async fn teardown(&self, services: &mut P) {
        for closable in services.closables() {
            if let Err(err) = closable.close().await {
                warn!("session service teardown failed: {}", err);
            }
        }
    }
}

/// Opening data: params, then query, then any handshake body; earlier
/// sources win, matching the HTTP aggregation contract
fn aggregate_opening_data(request: &dyn HttpRequest) -> ApiResult<Value> {
    let mut merged = Map::new();
    for (key, value) in request.params() {
        merged.insert(key.clone(), Value::String(value.clone()));
    }
    for (key, value) in request.query() {
        merged.entry(key).or_insert(value);
    }
    if let Some(Value::Object(body)) = request.body()? {
        for (key, value) in body {
            merged.entry(key).or_insert(value);
        }
    }
    Ok(Value::Object(merged))
}

/// Builder assembling the channel runner's registries and options
pub struct ChannelRunnerBuilder<S, P>
where
    S: Send + Sync,
    P: SessionServices,
{
    registry: ChannelRegistry<S, P>,
    schemas: SchemaRegistry,
    resolver: SessionResolver,
    guard: Option<Arc<dyn ChannelAccessGuard<S, P>>>,
    options: ChannelRunnerOptions,
    singleton: Arc<S>,
    factory: Arc<dyn SessionServicesFactory<Singleton = S, Services = P>>,
}

impl<S, P> ChannelRunnerBuilder<S, P>
where
    S: Send + Sync,
    P: SessionServices,
{
    pub fn new(
        singleton: S,
        factory: Arc<dyn SessionServicesFactory<Singleton = S, Services = P>>,
    ) -> Self {
        Self {
            registry: ChannelRegistry::new(),
            schemas: SchemaRegistry::new(),
            resolver: SessionResolver::new(),
            guard: None,
            options: ChannelRunnerOptions::default(),
            singleton: Arc::new(singleton),
            factory,
        }
    }

    pub fn channel(self, channel: Channel<S, P>) -> Self {
        self.registry.register(channel);
        self
    }

    pub fn meta(self, meta: ChannelMeta) -> Self {
        self.registry.register_meta(meta);
        self
    }

    pub fn schema(self, name: impl Into<String>, schema: Value) -> Self {
        self.schemas.register(name, schema);
        self
    }

    pub fn resolver(mut self, resolver: SessionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn access_guard(mut self, guard: Arc<dyn ChannelAccessGuard<S, P>>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn respond_with_404(mut self, enable: bool) -> Self {
        self.options.respond_with_404 = enable;
        self
    }

    pub fn coerce_opening_data(mut self, enable: bool) -> Self {
        self.options.coerce_opening_data = enable;
        self
    }

    pub fn build(self) -> ChannelRunner<S, P> {
        ChannelRunner {
            registry: Arc::new(self.registry),
            schemas: Arc::new(self.schemas),
            resolver: Arc::new(self.resolver),
            singleton: self.singleton,
            factory: self.factory,
            guard: self.guard,
            connections: RwLock::new(HashMap::new()),
            subscriptions: SubscriptionRegistry::new(),
            options: self.options,
        }
    }
}
