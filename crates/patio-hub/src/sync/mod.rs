//! Device configuration synchronization.

mod locks;
mod orchestrator;
mod policy;


pub use locks::DeviceLocks;
pub use orchestrator::{ConfigSync, SyncState};
pub use policy::SyncPolicy;
