//! Shared foundations for the Sominner backend clients: configuration,
//! the top-level error type, chat domain records, and lenient field decoders.

pub mod config;
pub mod error;
pub mod lenient;
pub mod types;

pub use config::{BackendConfig, SominnerConfig};
pub use error::{Result, SominnerError};
pub use types::*;
