pub mod configuration;

pub use configuration::{CallerConfig, CallerConfigError};
