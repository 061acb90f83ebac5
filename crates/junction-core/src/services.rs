//! Session-service capability traits
//!
//! Singleton services live for the process; session services are constructed
//! per request or channel event by a [`SessionServicesFactory`] and torn down
//! unconditionally afterwards. Teardown only touches services that opt into
//! the [`Closable`] capability, in the order [`SessionServices::closables`]
//! returns them, and a failing close never masks the primary outcome.

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::http::HttpRequest;
use crate::session::UserSession;

/// Explicit close capability for a per-request service
#[async_trait]
pub trait Closable: Send {
    async fn close(&mut self) -> ApiResult<()>;
}

/// A per-request/per-connection service bundle
pub trait SessionServices: Send + Sync {
    /// Services to tear down, in teardown order
    fn closables(&mut self) -> Vec<&mut dyn Closable> {
        Vec::new()
    }
}

/// What the factory may inspect while constructing session services
///
/// Channels construct services for message/disconnect events with no request
/// in flight, hence the option.
pub struct Interaction<'a> {
    pub request: Option<&'a dyn HttpRequest>,
}

impl<'a> Interaction<'a> {
    pub fn with_request(request: &'a dyn HttpRequest) -> Self {
        Self {
            request: Some(request),
        }
    }

    pub fn detached() -> Self {
        Self { request: None }
    }
}

/// Factory producing the per-request service bundle
///
/// Invoked after schema validation succeeds, so resources are never spent on
/// invalid input.
#[async_trait]
pub trait SessionServicesFactory: Send + Sync {
    type Singleton: Send + Sync;
    type Services: SessionServices;

    async fn create(
        &self,
        singleton: &Self::Singleton,
        interaction: Interaction<'_>,
        session: Option<&UserSession>,
    ) -> ApiResult<Self::Services>;
}

/// The composed view handlers and permission checks receive
pub struct ServiceScope<'a, S, P> {
    pub singleton: &'a S,
    pub session: &'a mut P,
}

/// Empty session-service bundle for applications that need none
#[derive(Debug, Default, Clone, Copy)]
pub struct NoServices;

impl SessionServices for NoServices {}

/// Factory yielding [`NoServices`] for every request
pub struct NoServicesFactory<S> {
    _marker: PhantomData<fn() -> S>,
}

impl<S> NoServicesFactory<S> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S> Default for NoServicesFactory<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: Send + Sync> SessionServicesFactory for NoServicesFactory<S> {
    type Singleton = S;
    type Services = NoServices;

    async fn create(
        &self,
        _singleton: &Self::Singleton,
        _interaction: Interaction<'_>,
        _session: Option<&UserSession>,
    ) -> ApiResult<Self::Services> {
        Ok(NoServices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    struct Recorder {
        closed: bool,
        fail: bool,
    }

    #[async_trait]
    impl Closable for Recorder {
        async fn close(&mut self) -> ApiResult<()> {
            self.closed = true;
            if self.fail {
                return Err(ApiError::internal("close failed"));
            }
            Ok(())
        }
    }

    struct Bundle {
        db: Recorder,
        cache: Recorder,
    }

    impl SessionServices for Bundle {
        fn closables(&mut self) -> Vec<&mut dyn Closable> {
            vec![&mut self.db, &mut self.cache]
        }
    }

    #[tokio::test]
    async fn test_closables_run_in_declared_order() {
        let mut bundle = Bundle {
            db: Recorder {
                closed: false,
                fail: true,
            },
            cache: Recorder {
                closed: false,
                fail: false,
            },
        };
        for closable in bundle.closables() {
            let _ = closable.close().await;
        }
        assert!(bundle.db.closed);
        assert!(bundle.cache.closed);
    }

    #[tokio::test]
    async fn test_no_services_factory() {
        let factory: NoServicesFactory<()> = NoServicesFactory::new();
        let services = factory
            .create(&(), Interaction::detached(), None)
            .await
            .unwrap();
        let mut services = services;
        assert!(services.closables().is_empty());
    }
}
