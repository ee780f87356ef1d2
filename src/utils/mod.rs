//! The `utils` module holds the pieces shared by every other module:
//! error types and logging setup.

pub mod error;
pub mod logging;
