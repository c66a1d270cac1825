//! Base types and error handling.
//!
//! Provides the foundational error type shared by every layer:
//! - [`NetError`]: typed connection, HTTP and authentication failures

pub mod neterror;

pub use neterror::NetError;
