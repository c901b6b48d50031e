//! argent - a self-hosted userbot core
//!
//! Outgoing messages that start with the command sentinel are routed through
//! an owner gate to dynamically loaded modules or a fixed set of built-ins.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::errors::{BotError, CommandError, PluginError, StorageError};
pub use application::services::{Runtime, RunOutcome};
pub use domain::entities::{Message, ModuleDescriptor, ModuleMeta};
pub use infrastructure::config::Config;
pub use plugins::{Invocation, Module, ModuleBase, ModuleRegistry};

/// Declare the entry point of a module built as a shared library.
///
/// ```ignore
/// argent::export_module!(MyModule::new);
/// ```
#[macro_export]
macro_rules! export_module {
    ($ctor:expr) => {
        #[no_mangle]
        pub extern "Rust" fn argent_module_init() -> ::std::boxed::Box<dyn $crate::plugins::Module> {
            ::std::boxed::Box::new($ctor())
        }
    };
}
