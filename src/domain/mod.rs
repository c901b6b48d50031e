//! Domain layer - Core business objects and the seams to the outside
//!
//! This layer contains:
//! - Entities: Message, command table, module descriptors, owner set
//! - Traits: Abstractions for infrastructure (Transport, Store)

pub mod entities;
pub mod traits;
