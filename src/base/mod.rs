//! Basics.
//!
//! This module provides the data exchanged by requesters and resolvers:
//! [`Record`]s, the pieces of named data a resolver knows about, and
//! [`Message`]s, the envelopes that carry lookups, replies, and the
//! handshake around them.
//!
//! A message is turned into a datagram via [`Message::to_vec`] and parsed
//! back via [`Message::from_slice`]. Both stay within [`MAX_DGRAM_SIZE`].

pub use self::message::{
    ComposeError, Message, MessageType, ParseError, Payload, MAX_DGRAM_SIZE,
};
pub use self::record::Record;

pub mod message;
pub mod record;
