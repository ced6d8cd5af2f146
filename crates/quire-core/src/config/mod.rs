//! Configuration management for Quire.
//!
//! User preferences ([`settings::Config`]) are stored as TOML and loaded at
//! startup; [`store::ConfigStore`] keeps the live copy and lets the
//! embedder swap it at runtime.

pub mod settings;
pub mod store;

pub use settings::{Config, EventsConfig, GeneralConfig, LoggingConfig};
pub use store::ConfigStore;
