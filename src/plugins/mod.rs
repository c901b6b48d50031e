//! Module system for argent
//!
//! A module is any type implementing `Module`. It declares its commands in
//! its constructor through `ModuleBase::register_command`; the registry
//! injects the shared context, publishes the commands and runs `on_load`.

pub mod builtin;
pub mod manager;
pub mod trait_def;

#[cfg(test)]
mod tests;

pub use manager::{LoadPlan, ModuleRegistry};
pub use trait_def::{
    DeclaredCommand, Invocation, Module, ModuleBase, ModuleContext, ModuleFactory, ModuleSource,
};
