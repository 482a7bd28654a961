//! Core endpoint dispatch engine
//!
//! This library provides:
//! - Endpoint capability contract for typed resource handlers
//! - Endpoint registry built once at startup, immutable thereafter
//! - Router dispatching delivered envelopes and emitting acknowledgements

pub mod endpoint;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod router;

pub use endpoint::{BusEndpoint, EndpointRegistration};
pub use error::{BusError, Result};
pub use publisher::Publisher;
pub use registry::EndpointRegistry;
pub use router::{RouteOutcome, Router};
