//! Client connections and the watched set.
//!
//! Every open connection lives in the `WatchedSet` from accept until its
//! handler reports closure. The slab key doubles as the mio poll token.

use mio::net::TcpStream;
use slab::Slab;
use std::net::SocketAddr;

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    /// Non-blocking socket registered with the multiplexer.
    pub stream: TcpStream,
    /// Peer address captured at accept time.
    pub peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }
}

/// Slab-backed registry of open client connections.
///
/// Provides O(1) insert, lookup, and remove. Removal is idempotent: removing
/// an id that is no longer present is a no-op, so a connection is taken out
/// exactly once even if multiple events referenced it in one poll cycle.
pub struct WatchedSet {
    connections: Slab<Connection>,
    max_connections: usize,
}

impl WatchedSet {
    /// Create a watched set with the given connection cap.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: Slab::with_capacity(max_connections),
            max_connections,
        }
    }

    /// Insert a new connection, returning its id.
    ///
    /// Returns `None` if the set is at capacity.
    pub fn insert(&mut self, conn: Connection) -> Option<usize> {
        if self.connections.len() >= self.max_connections {
            return None;
        }
        Some(self.connections.insert(conn))
    }

    /// Get a mutable reference to a connection.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    /// Remove a connection from the set, if present.
    pub fn remove(&mut self, id: usize) -> Option<Connection> {
        if self.connections.contains(id) {
            Some(self.connections.remove(id))
        } else {
            None
        }
    }

    /// Check if a connection exists.
    pub fn contains(&self, id: usize) -> bool {
        self.connections.contains(id)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if there are no open connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream as StdTcpStream};

    // Real socket pair so Connection wraps a live stream. The client end is
    // returned to keep the connection open for the duration of the test.
    fn accepted_conn() -> (Connection, StdTcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = StdTcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, peer) = listener.accept().unwrap();
        accepted.set_nonblocking(true).unwrap();
        (Connection::new(TcpStream::from_std(accepted), peer), client)
    }

    #[test]
    fn test_insert_and_remove() {
        let mut watched = WatchedSet::new(4);
        let (c1, _k1) = accepted_conn();
        let (c2, _k2) = accepted_conn();
        let peer1 = c1.peer;

        let id1 = watched.insert(c1).unwrap();
        let id2 = watched.insert(c2).unwrap();
        assert_ne!(id1, id2);
        assert_eq!(watched.len(), 2);
        assert_eq!(watched.get_mut(id1).unwrap().peer, peer1);

        let removed = watched.remove(id1).unwrap();
        assert_eq!(removed.peer, peer1);
        assert!(!watched.contains(id1));
        assert_eq!(watched.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut watched = WatchedSet::new(4);
        let (conn, _keep) = accepted_conn();
        let id = watched.insert(conn).unwrap();

        assert!(watched.remove(id).is_some());
        assert!(watched.remove(id).is_none());
        assert!(watched.is_empty());
    }

    #[test]
    fn test_capacity_cap() {
        let mut watched = WatchedSet::new(1);
        let (c1, _k1) = accepted_conn();
        let (c2, _k2) = accepted_conn();

        let id1 = watched.insert(c1).unwrap();
        assert!(watched.insert(c2).is_none());

        watched.remove(id1);
        let (c3, _k3) = accepted_conn();
        assert!(watched.insert(c3).is_some());
    }
}
