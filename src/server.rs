//! The server loop.
//!
//! One thread owns the listening socket, the readiness multiplexer, and the
//! watched set of open connections. Each iteration polls for readiness with
//! a bounded timeout, drains pending accepts, and dispatches ready client
//! sockets to the echo handler. No handler call blocks: every socket acted
//! on has already been confirmed readable.

use crate::config::Config;
use crate::conn::{Connection, WatchedSet};
use crate::handler::{self, Outcome};
use crate::mux::{Multiplexer, LISTENER_TOKEN};
use mio::net::TcpListener;
use mio::Token;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::{error, info, warn};

const EVENT_CAPACITY: usize = 1024;

pub struct EchoServer {
    listener: TcpListener,
    mux: Multiplexer,
    watched: WatchedSet,
    poll_interval: Duration,
    /// Scratch buffer handed to the handler for each read.
    read_buf: Vec<u8>,
    local_addr: SocketAddr,
}

impl EchoServer {
    /// Bind the listening socket and register it with the multiplexer.
    ///
    /// Bind or listen refusal (address in use, permission denied) propagates
    /// as an error; the partially set up socket is closed on the way out.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr = resolve(&config.host, config.port)?;
        let listener = create_listener(addr, config.backlog)?;
        let local_addr = listener.local_addr()?;
        let mut listener = TcpListener::from_std(listener);

        let mux = Multiplexer::new(EVENT_CAPACITY)?;
        mux.register(&mut listener, LISTENER_TOKEN)?;

        Ok(Self {
            listener,
            mux,
            watched: WatchedSet::new(config.max_connections),
            poll_interval: config.poll_interval,
            read_buf: vec![0u8; config.read_buffer_size],
            local_addr,
        })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the process is killed.
    ///
    /// Only multiplexer failures terminate the loop: they mean the watched
    /// set is corrupt and continuing would poll garbage state. Everything
    /// per-connection is recovered locally.
    pub fn run(&mut self) -> io::Result<()> {
        let thread = std::thread::current();
        let tag = thread.name().unwrap_or("main").to_string();
        info!(tag = %tag, addr = %self.local_addr, "Serving");

        loop {
            let ready = match self.mux.poll(self.poll_interval) {
                Ok(tokens) => tokens,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            for token in ready {
                if token == LISTENER_TOKEN {
                    self.accept_pending()?;
                } else {
                    self.dispatch(token.0, &tag);
                }
            }
        }
    }

    /// Accept until the listener reports no pending connection.
    ///
    /// A drained accept queue (another cycle got there first) is skipped,
    /// not treated as an error.
    fn accept_pending(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let conn_id = match self.watched.insert(Connection::new(stream, peer)) {
                        Some(id) => id,
                        None => {
                            warn!(peer = %peer, "Connection limit reached, rejecting");
                            continue;
                        }
                    };
                    if let Some(conn) = self.watched.get_mut(conn_id) {
                        self.mux.register(&mut conn.stream, Token(conn_id))?;
                    }
                    info!(conn_id, peer = %peer, "Connection accepted");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Hand a ready client socket to the handler and act on its outcome.
    fn dispatch(&mut self, conn_id: usize, tag: &str) {
        let outcome = match self.watched.get_mut(conn_id) {
            Some(conn) => handler::handle(conn, tag, &mut self.read_buf),
            // Already removed earlier in this poll cycle.
            None => return,
        };

        if outcome == Outcome::Close {
            self.close_connection(conn_id);
        }
    }

    /// Deregister and drop a connection. Removing an absent id is a no-op.
    fn close_connection(&mut self, conn_id: usize) {
        if let Some(mut conn) = self.watched.remove(conn_id) {
            let _ = self.mux.deregister(&mut conn.stream);
            info!(conn_id, peer = %conn.peer, "Connection removed");
        }
    }
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "host resolved to no addresses",
        )
    })
}

/// Build the non-blocking listening socket: bind, then listen(backlog).
///
/// The socket2 handle is dropped (and the descriptor closed) if any step
/// fails before conversion to a std listener.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;
    info!(addr = %addr, "Bound");

    socket.listen(backlog)?;
    info!(addr = %addr, backlog, "Listening");

    Ok(socket.into())
}
