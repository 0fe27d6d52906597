//! Common utilities and types shared across the Golem monitoring crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
