//! Resource bus wire types
//!
//! This library defines the data model exchanged between bus nodes:
//! - Envelope: the unit of communication, serialized onto the transport
//! - Operation: the resource-change verb carried by an envelope
//! - Failure: a captured handler failure carried by a callback envelope

pub mod envelope;
pub mod operation;

pub use envelope::{Envelope, Failure};
pub use operation::Operation;
