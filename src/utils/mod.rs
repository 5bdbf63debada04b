//! The `utils` module provides the pieces shared by every part of `wpp-agent`:
//! the error taxonomy and logging initialization.

pub mod error;
pub mod logging;

pub use error::{AdapterError, BrokerError, Error, Result, ValidationError};
