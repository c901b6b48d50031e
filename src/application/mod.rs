//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Errors: Error taxonomy shared by every layer
//! - Messaging: Command parsing, middleware, dispatching
//! - Services: Built-in commands, the agent loop and its wiring

pub mod errors;
pub mod messaging;
pub mod services;
