//! Shared types for the retail analytics workspace.
//!
//! Holds the typed transaction model, the error taxonomy, timestamp and
//! quarter helpers, and the CLI settings layer.

pub mod answers;
pub mod error;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{ErrorKind, Result, RetailError};
