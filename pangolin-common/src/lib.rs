//! Shared error types for the pangolin routing toolkit.

mod error;

pub use error::{Error, Result};
