//! Core types shared by every pipeline.
//!
//! Currently this is the error taxonomy: [`OtaError`] for typed failures,
//! [`ErrorContext`] for terminal rendering, and [`user_friendly_error`] to
//! turn any `anyhow::Error` into something a user can act on.

pub mod error;

pub use error::{ErrorContext, OtaError, OtaResult, user_friendly_error};
