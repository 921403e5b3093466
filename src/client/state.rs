//! Module `state`
//!
//! Defines the `Session` struct: the authentication state of one connection.
//! A session lives exactly as long as its connection and is never shared.

use std::net::SocketAddr;

use crate::auth::UserId;

/// Per-connection state machine: `Unauthenticated` or `Authenticated(user)`.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    user: Option<UserId>,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        Self { peer, user: None }
    }

    /// Moves to `Authenticated(user)`, replacing any earlier identity.
    pub fn authenticate(&mut self, user: UserId) {
        self.user = Some(user);
    }

    /// Moves to `Unauthenticated`. Returns the user that was logged in, if any.
    pub fn logout(&mut self) -> Option<UserId> {
        self.user.take()
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}
