//! Bridge relay: producer TCP intake and viewer fan-out.

pub mod producer;
pub mod registry;

pub use registry::{Connection, Delivery, ViewerRegistry};
