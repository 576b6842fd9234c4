//! Shared types for the wayfarer client core: protocol values, colors,
//! resource references and the client configuration.

mod config;
mod types;

pub use config::{ClientConfig, ClockConfig, ConfigError, RenderConfig};
pub use types::{Color, ResourceRef, Value};
