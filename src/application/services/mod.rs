//! Application services - built-in commands, the agent loop and its wiring

pub mod command_service;
pub mod message_service;
pub mod runtime;

pub use command_service::BuiltinCommands;
pub use message_service::{MessageService, RestartMarker, RunOutcome};
pub use runtime::Runtime;
