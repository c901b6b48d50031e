//! Domain entities - Core business objects with no external dependencies

pub mod command;
pub mod message;
pub mod module;
pub mod owner;

pub use command::{CommandEntry, CommandHandler, CommandTable, HandlerFuture};
pub use message::Message;
pub use module::{Category, ModuleDescriptor, ModuleMeta};
pub use owner::{OwnerChange, OwnerConfig, OwnerState};
