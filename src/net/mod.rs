//! Sending and receiving messages.
//!
//! * [`client`] contains the requester side of an exchange,
//! * [`server`] contains the resolver side of an exchange, and
//! * [`transport`] moves single messages over an [`AsyncDgramSock`].
//!
//! [`AsyncDgramSock`]: sock::AsyncDgramSock

pub mod client;
pub mod server;
pub mod sock;
pub mod transport;
