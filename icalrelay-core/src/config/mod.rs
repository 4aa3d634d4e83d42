//! Configuration types for the relay.

mod relay_config;
mod store;

pub use relay_config::{Notifier, Profile, RelayConfig, ServerConfig};
pub use store::ConfigStore;
