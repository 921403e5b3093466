//! Client registry
//!
//! Tracks live connections and which user each one is authenticated as.
//! Shared by every connection task behind a `tokio::sync::Mutex`; callers
//! never hold the lock across a socket read or write.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::UserId;

pub type SharedRegistry = Arc<Mutex<ClientRegistry>>;

/// Registry of live connections
#[derive(Debug)]
pub struct ClientRegistry {
    max_clients: usize,
    connected: HashSet<SocketAddr>,
    authenticated: HashMap<SocketAddr, UserId>,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            max_clients,
            connected: HashSet::new(),
            authenticated: HashMap::new(),
        }
    }

    pub fn shared(max_clients: usize) -> SharedRegistry {
        Arc::new(Mutex::new(Self::new(max_clients)))
    }

    /// Registers a new connection. Returns false when the server is full.
    pub fn admit(&mut self, addr: SocketAddr) -> bool {
        if self.connected.len() >= self.max_clients {
            return false;
        }
        self.connected.insert(addr);
        true
    }

    /// Records that `addr` is authenticated as `user`.
    pub fn bind(&mut self, addr: SocketAddr, user: UserId) {
        self.authenticated.insert(addr, user);
    }

    pub fn unbind(&mut self, addr: &SocketAddr) -> Option<UserId> {
        self.authenticated.remove(addr)
    }

    /// Forgets a connection entirely.
    pub fn remove(&mut self, addr: &SocketAddr) {
        self.connected.remove(addr);
        self.authenticated.remove(addr);
    }

    pub fn user_of(&self, addr: &SocketAddr) -> Option<&UserId> {
        self.authenticated.get(addr)
    }

    /// Number of live connections authenticated as `user`.
    pub fn sessions_for(&self, user: &UserId) -> usize {
        self.authenticated.values().filter(|u| *u == user).count()
    }

    pub fn len(&self) -> usize {
        self.connected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_admit_respects_limit() {
        let mut registry = ClientRegistry::new(2);
        assert!(registry.admit(addr(1)));
        assert!(registry.admit(addr(2)));
        assert!(!registry.admit(addr(3)));

        registry.remove(&addr(1));
        assert!(registry.admit(addr(3)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_clears_binding() {
        let mut registry = ClientRegistry::new(4);
        let user = UserId::generate();

        registry.admit(addr(1));
        registry.admit(addr(2));
        registry.bind(addr(1), user.clone());
        registry.bind(addr(2), user.clone());
        assert_eq!(registry.sessions_for(&user), 2);

        registry.remove(&addr(1));
        assert!(registry.user_of(&addr(1)).is_none());
        assert_eq!(registry.sessions_for(&user), 1);

        assert_eq!(registry.unbind(&addr(2)), Some(user));
        assert!(registry.unbind(&addr(2)).is_none());
    }
}
