//! Owner registry and startup gate

pub mod owners;
pub mod startup;

pub use owners::{OwnerConfigInfo, OwnerRegistry, CLAIM_FILE, OWNER_FILE};
pub use startup::StartupSecurity;
