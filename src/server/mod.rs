//! Server core functionality
//!
//! Listener, accept loop and the state shared by all connections.

pub mod core;

pub use self::core::Server;
