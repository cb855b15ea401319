//! Answering lookups over UDP.
//!
//! A resolver answers every requester that talks to its socket. It keeps
//! no connection state other than a small session per requester address
//! which counts acknowledgments:
//!
//! ```text
//!    --> socket         - reads a datagram from a requester
//!       --> server      - parses the datagram into a message
//!          --> responder  - updates the session of the requester,
//!          <--              consults the record store, picks a reply
//!       <-- server      - serializes the reply
//!    <-- socket         - writes the datagram back to the requester
//! ```
//!
//! # Usage
//!
//!   - Load a [`RecordStore`].
//!   - Bind a [`tokio::net::UdpSocket`].
//!   - Construct a [`DgramServer`] with [`new()`] or, to tune the ack
//!     threshold and timeouts, [`with_config()`].
//!   - [`run()`] the server.
//!   - [`shutdown()`] the server, explicitly or on [`drop()`].
//!
//! The type alias [`UdpServer`] is provided for convenience.
//!
//! [`RecordStore`]: crate::store::RecordStore
//! [`new()`]: DgramServer::new()
//! [`with_config()`]: DgramServer::with_config()
//! [`run()`]: DgramServer::run()
//! [`shutdown()`]: DgramServer::shutdown()
//! [`drop()`]: std::ops::Drop::drop()

pub mod dgram;
pub mod error;
pub mod metrics;
pub mod service;
pub mod session;

pub use self::dgram::{Config, DgramServer, UdpServer};
pub use self::error::Error;
pub use self::metrics::ServerMetrics;
pub use self::service::{LookupError, Responder};

//------------ ServerCommand -------------------------------------------------

/// Command a server to do something.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerCommand {
    /// Command the server to initialize.
    ///
    /// This is the initial value of the command channel. A server never
    /// acts on it.
    Init,

    /// Command the server to stop receiving messages.
    Shutdown,
}
