//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: YAML configuration and runtime overrides
//! - Storage: JSON persistence (key-value store, sessions)
//! - Security: Owner registry and startup gate
//! - Plugins: Module sources (compiled-in catalog, shared libraries)
//! - Adapters: Transports (console, in-memory)
//! - Utils: Helpers handed to modules

pub mod adapters;
pub mod config;
pub mod plugins;
pub mod security;
pub mod storage;
pub mod utils;
