//! Convenient re-exports for building routed applications

pub use junction_core::prelude::*;

pub use crate::builder::RouterBuilder;
pub use crate::jwt::Hs256Decoder;
pub use crate::permissions::{PermissionCheck, PermissionGroups};
pub use crate::registry::RouteRegistry;
pub use crate::route::{Route, RouteHandler, RouteMeta};
pub use crate::runner::{RouteRunner, RunRouteOptions, RunnerOptions};
pub use crate::session_resolver::{SessionResolver, TokenDecoder};
