//! Per-requester session bookkeeping.
//!
//! The protocol has no session identifier. A resolver infers a session from
//! the address datagrams arrive from: a hello starts (or restarts) the
//! session of that address and every acknowledgment counts towards the
//! threshold at which the resolver ends it.

use core::time::Duration;

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::time::Instant;
use tracing::debug;

//------------ Session -------------------------------------------------------

/// The state kept for one requester.
#[derive(Clone, Copy, Debug)]
pub struct Session {
    /// The number of acknowledgments since the session started.
    acks: usize,

    /// When the last message of this requester arrived.
    last_seen: Instant,
}

impl Session {
    /// Creates a fresh session.
    fn new(now: Instant) -> Self {
        Session {
            acks: 0,
            last_seen: now,
        }
    }

    /// Returns the number of acknowledgments received so far.
    pub fn acks(&self) -> usize {
        self.acks
    }

    /// Returns when the last message of the requester arrived.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

//------------ Sessions ------------------------------------------------------

/// The sessions of all requesters, keyed by their address.
#[derive(Clone, Debug, Default)]
pub struct Sessions {
    sessions: HashMap<SocketAddr, Session>,
}

impl Sessions {
    /// Creates an empty session table.
    pub fn new() -> Self {
        Default::default()
    }

    /// Starts a new session for `peer`, discarding any previous one.
    pub fn start(&mut self, peer: SocketAddr, now: Instant) {
        if self.sessions.insert(peer, Session::new(now)).is_some() {
            debug!(%peer, "Restarting session");
        }
    }

    /// Notes activity of `peer` without changing its tally.
    pub fn touch(&mut self, peer: &SocketAddr, now: Instant) {
        if let Some(session) = self.sessions.get_mut(peer) {
            session.last_seen = now;
        }
    }

    /// Counts an acknowledgment from `peer` and returns the new tally.
    ///
    /// A requester that never said hello gets a session on its first
    /// acknowledgment.
    pub fn ack(&mut self, peer: SocketAddr, now: Instant) -> usize {
        let session = self
            .sessions
            .entry(peer)
            .or_insert_with(|| Session::new(now));
        session.acks += 1;
        session.last_seen = now;
        session.acks
    }

    /// Ends the session of `peer`.
    pub fn remove(&mut self, peer: &SocketAddr) -> Option<Session> {
        self.sessions.remove(peer)
    }

    /// Drops all sessions that have been idle for longer than `timeout`.
    ///
    /// Returns the number of sessions dropped.
    pub fn evict_idle(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|peer, session| {
            let keep = now.saturating_duration_since(session.last_seen)
                <= timeout;
            if !keep {
                debug!(%peer, "Evicting idle session");
            }
            keep
        });
        before - self.sessions.len()
    }

    /// Returns the session of `peer`.
    pub fn get(&self, peer: &SocketAddr) -> Option<&Session> {
        self.sessions.get(peer)
    }

    /// Returns the number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns whether there are no active sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

//============ Testing =======================================================
