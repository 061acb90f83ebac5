//! Core abstractions for the Junction dispatch framework
//!
//! This crate defines the transport-agnostic surface the runners are built
//! on: the HTTP method/request/response abstractions, the opaque user
//! session, the tagged error model with its status registry, and the
//! session-service capability traits.
//!
//! Concrete transports (an embedded server, a serverless shim) implement
//! [`HttpRequest`] and [`HttpResponse`]; everything above them is shared.

pub mod error;
pub mod http;
pub mod registry;
pub mod services;
pub mod session;
pub mod testing;

pub mod prelude;

pub use error::{ApiError, ApiResult, ErrorKind, new_trace_id};
pub use http::{
    CookieOptions, HttpMethod, HttpRequest, HttpResponse, ResponseBody, SameSite,
    parse_cookie_header,
};
pub use registry::{ErrorEntry, ErrorRegistry, ErrorResponseBody};
pub use services::{
    Closable, Interaction, NoServices, NoServicesFactory, ServiceScope, SessionServices,
    SessionServicesFactory,
};
pub use session::UserSession;
