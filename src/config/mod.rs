//! Configuration for the updater.
//!
//! - [`OtaConfig`] - settings file (root namespace, endpoint, tunables)
//! - [`AppIdentity`] - host-supplied version and package identifier

mod global;
mod identity;

pub use global::{CONFIG_ENV_VAR, OtaConfig};
pub use identity::{AppIdentity, StaticIdentity, fallback_identifier};
