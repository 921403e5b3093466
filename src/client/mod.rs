//! Client management system
//!
//! Handles per-connection session state, the shared connection registry and
//! the connection loop.

pub mod handler;
pub mod registry;
pub mod state;

pub use handler::handle_client;
pub use registry::{ClientRegistry, SharedRegistry};
pub use state::Session;
