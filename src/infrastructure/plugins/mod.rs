//! Module sources
//!
//! Modules come either from the compiled-in catalog or from shared libraries
//! in the configured module directory. Each library exports
//! `argent_module_init`, returning a boxed `Module`.

pub mod catalog;
pub mod loader;

pub use catalog::BuiltinCatalog;
pub use loader::{DylibSource, ENTRY_SYMBOL};
