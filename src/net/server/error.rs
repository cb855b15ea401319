//! Server related errors.

use core::fmt;

use std::error;

/// Errors raised by the resolver server.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// An attempt to send a [`ServerCommand`] to the server failed.
    ///
    /// [`ServerCommand`]: super::ServerCommand
    CommandCouldNotBeSent,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CommandCouldNotBeSent => {
                f.write_str("command could not be sent to server")
            }
        }
    }
}

impl error::Error for Error {}
