//! Domain traits - Abstractions for infrastructure implementations

pub mod store;
pub mod transport;

pub use store::Store;
pub use transport::{AccountInfo, EventStream, Transport};
