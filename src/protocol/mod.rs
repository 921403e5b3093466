//! Store protocol implementation
//!
//! Framing, request parsing, response shapes and command dispatch.

pub mod codec;
pub mod commands;
pub mod handlers;
pub mod responses;

pub use codec::FrameCodec;
pub use commands::{Request, parse_request};
pub use handlers::{CommandDispatcher, Reply};
pub use responses::Response;
