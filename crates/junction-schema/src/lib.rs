//! Named JSON-schema validator registry
//!
//! Raw schema documents are registered by name at composition time and
//! compiled lazily into cached validators the first time a matched route
//! needs them. Compilation failures propagate immediately: a schema that
//! cannot compile is a deployment bug, not bad input.

mod coerce;
mod registry;

pub use coerce::coerce_singletons_to_arrays;
pub use registry::SchemaRegistry;
