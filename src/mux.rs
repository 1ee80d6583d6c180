//! Readiness multiplexer.
//!
//! Thin wrapper over mio's `Poll` (epoll on Linux, kqueue on macOS): owns
//! the registration of watched sockets and answers which of them are
//! readable right now, within a bounded timeout.

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::time::Duration;

/// Token reserved for the listening socket. Client connections use their
/// slab key as token, which never reaches usize::MAX.
pub const LISTENER_TOKEN: Token = Token(usize::MAX);

pub struct Multiplexer {
    poll: Poll,
    events: Events,
}

impl Multiplexer {
    pub fn new(event_capacity: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(event_capacity),
        })
    }

    /// Watch a socket for read readiness under the given token.
    pub fn register<S: Source + ?Sized>(&self, source: &mut S, token: Token) -> io::Result<()> {
        self.poll.registry().register(source, token, Interest::READABLE)
    }

    /// Stop watching a socket.
    pub fn deregister<S: Source + ?Sized>(&self, source: &mut S) -> io::Result<()> {
        self.poll.registry().deregister(source)
    }

    /// Wait up to `timeout` for readiness and return the tokens of the
    /// sockets that are readable now.
    ///
    /// An empty result is a normal timeout expiry, not an error. A poll
    /// failure means a watched descriptor is invalid and the watched set is
    /// corrupt; it propagates rather than being swallowed.
    pub fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Token>> {
        self.poll.poll(&mut self.events, Some(timeout))?;
        Ok(self.events.iter().map(|event| event.token()).collect())
    }
}
