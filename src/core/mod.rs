//! Core types shared by every stage of the update pipeline.
//!
//! Currently this is the error taxonomy: [`NmkupError`] for typed failures,
//! [`ErrorContext`] for terminal rendering, and [`user_friendly_error`] to
//! turn an arbitrary [`anyhow::Error`] into something a user can act on.

pub mod error;

pub use error::{ErrorContext, NmkupError, user_friendly_error};
