//! Layered configuration store with peer propagation.
//!
//! [`ConfigData`] owns a local and a remote [`crate::ConfigTree`], keeps their
//! merged overlay and the compressed snapshot shipped to peers, and guards
//! both layers with a [`DangerZone`].
mod backup;
pub mod codec;
mod config_data;
mod danger_zone;

pub use config_data::*;
pub use danger_zone::*;
