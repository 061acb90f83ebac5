//! Route registration, matching, and the HTTP route runner
//!
//! This crate is the HTTP half of the dispatch core: a route registry with
//! `:param` path matching, the session-resolution and permission-evaluation
//! pipeline, schema validation gating, handler invocation, and deterministic
//! error mapping. The parallel WebSocket machinery lives in
//! `junction-channel` and is built on the same primitives.

pub mod builder;
pub mod jwt;
pub mod pattern;
pub mod permissions;
pub mod registry;
pub mod route;
pub mod runner;
pub mod session_resolver;

pub mod prelude;

pub use builder::RouterBuilder;
pub use jwt::Hs256Decoder;
pub use pattern::PathPattern;
pub use permissions::{PermissionCheck, PermissionGroups};
pub use registry::{RouteMatch, RouteRegistry};
pub use route::{Route, RouteHandler, RouteMeta};
pub use runner::{RouteRunner, RunRouteOptions, RunnerOptions};
pub use session_resolver::{
    ApiKeyLookup, CookieSessionLookup, QuerySessionLookup, SessionResolver, SessionTransform,
    TokenDecoder,
};
