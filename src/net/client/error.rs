//! Error type for the requester.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::error;
use std::fmt::{Display, Formatter};

use crate::base::{MessageType, ParseError};
use crate::net::transport;

/// Error type for the requester.
///
/// Every error ends the exchange. The requester is left in the
/// [`Failed`] state.
///
/// [`Failed`]: super::requester::State::Failed
#[derive(Clone, Debug)]
pub enum Error {
    /// A reply could not be parsed.
    MalformedEnvelope(ParseError),

    /// A reply had a type not valid at this point of the exchange.
    UnexpectedMessage {
        /// The type that was expected.
        expected: MessageType,

        /// The type that was received.
        received: MessageType,
    },

    /// Sending or receiving failed.
    Transport(transport::Error),

    /// No reply arrived within the read timeout.
    Timeout,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::MalformedEnvelope(err) => {
                write!(f, "malformed reply: {err}")
            }
            Error::UnexpectedMessage { expected, received } => write!(
                f,
                "protocol error: expected {expected} message, \
                 received {received}"
            ),
            Error::Transport(err) => write!(f, "{err}"),
            Error::Timeout => write!(f, "timeout waiting for reply"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::MalformedEnvelope(err) => Some(err),
            Error::UnexpectedMessage { .. } => None,
            Error::Transport(err) => Some(err),
            Error::Timeout => None,
        }
    }
}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Self {
        Error::Transport(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::MalformedEnvelope(err)
    }
}
