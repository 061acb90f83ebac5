//! Convenient re-exports for downstream crates

pub use crate::error::{ApiError, ApiResult, ErrorKind, new_trace_id};
pub use crate::http::{
    CookieOptions, HttpMethod, HttpRequest, HttpResponse, ResponseBody, SameSite,
};
pub use crate::registry::{ErrorEntry, ErrorRegistry, ErrorResponseBody};
pub use crate::services::{
    Closable, Interaction, NoServices, NoServicesFactory, ServiceScope, SessionServices,
    SessionServicesFactory,
};
pub use crate::session::UserSession;
