//! Coordination primitives for a distributed middleware service.
//!
//! Two independent subsystems live here:
//! - a layered configuration store ([`ConfigData`]) holding an operator
//!   provided local tree and a remote tree published by a master server,
//!   merged into one view that is compressed for propagation to peers
//! - a task dispatcher ([`TaskDispatcher`]) routing tasks to worker types and
//!   handing them to idle workers through injected collaborators
mod config;
mod configuration;
mod dispatch;
mod errors;
mod tree;
pub mod utils;

pub use config::*;
pub use configuration::*;
pub use dispatch::*;
pub use errors::*;
pub use tree::*;
pub use utils::*;
