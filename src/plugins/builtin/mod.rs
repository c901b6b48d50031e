//! Modules compiled into the binary

pub mod core_utils;
pub mod hello;

use crate::infrastructure::plugins::BuiltinCatalog;

/// Catalog holding every compiled-in module
pub fn catalog() -> BuiltinCatalog {
    BuiltinCatalog::new()
        .with("core_utils", core_utils::create)
        .with("hello", hello::create)
}
