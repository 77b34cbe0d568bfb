pub mod config;
pub mod error;
pub mod types;

pub use config::JackConfig;
pub use error::{CoreError, Result};
