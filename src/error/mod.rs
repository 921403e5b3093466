//! Error handling
//!
//! Defines error types for each layer and their translation into client-facing text.

pub mod handlers;
pub mod types;

pub use types::*;
