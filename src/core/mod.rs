//! Core types, traits, constants and errors.

pub mod config;
pub mod constants;
mod error;
mod traits;
mod types;

pub use config::{AlarmConfig, SessionParams, SessionParamsBuilder, keepalive_delay_secs};
pub use error::*;
pub use traits::*;
pub use types::*;
