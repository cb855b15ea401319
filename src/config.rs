//! The settings file shared by resolver and requester.
//!
//! Both binaries read the same JSON file naming the address each end binds
//! to:
//!
//! ```text
//! {
//!   "ServerIPAddress": "127.0.0.1",
//!   "ServerPortNumber": 11000,
//!   "ClientIPAddress": "127.0.0.1",
//!   "ClientPortNumber": 11001
//! }
//! ```
//!
//! The resolver binds to the server address. The requester binds to the
//! client address and sends to the server address. A client port of zero
//! lets the operating system pick one.

use core::fmt;

use std::error;
use std::fs::File;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::string::String;
use std::sync::Arc;

use serde::Deserialize;

//------------ Settings ------------------------------------------------------

/// The addresses of both ends of an exchange.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Settings {
    /// The address the resolver listens on.
    #[serde(rename = "ServerIPAddress", default)]
    server_ip: Option<String>,

    /// The port the resolver listens on.
    #[serde(rename = "ServerPortNumber", default)]
    server_port: u16,

    /// The address the requester sends from.
    #[serde(rename = "ClientIPAddress", default)]
    client_ip: Option<String>,

    /// The port the requester sends from.
    #[serde(rename = "ClientPortNumber", default)]
    client_port: u16,
}

impl Settings {
    /// Reads settings from a reader providing a JSON object.
    pub fn load(reader: impl io::Read) -> Result<Self, ConfigError> {
        serde_json::from_reader(reader).map_err(|err| {
            if err.is_io() {
                ConfigError::Io(Arc::new(err.into()))
            } else {
                ConfigError::Parse(Arc::new(err))
            }
        })
    }

    /// Reads settings from the file at the given path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path.as_ref())
            .map_err(|err| ConfigError::Io(Arc::new(err)))?;
        Self::load(io::BufReader::new(file))
    }

    /// Returns the socket address of the resolver.
    pub fn resolver_addr(&self) -> Result<SocketAddr, ConfigError> {
        Self::socket_addr(
            "ServerIPAddress",
            self.server_ip.as_deref(),
            self.server_port,
        )
    }

    /// Returns the socket address the requester binds to.
    pub fn requester_addr(&self) -> Result<SocketAddr, ConfigError> {
        Self::socket_addr(
            "ClientIPAddress",
            self.client_ip.as_deref(),
            self.client_port,
        )
    }

    fn socket_addr(
        key: &'static str,
        ip: Option<&str>,
        port: u16,
    ) -> Result<SocketAddr, ConfigError> {
        let ip = match ip.map(str::trim) {
            Some(ip) if !ip.is_empty() => ip,
            _ => return Err(ConfigError::Missing(key)),
        };
        let ip: IpAddr = ip.parse().map_err(|_| ConfigError::InvalidAddress {
            key,
            value: ip.into(),
        })?;
        Ok(SocketAddr::new(ip, port))
    }
}

//------------ ConfigError ---------------------------------------------------

/// The settings could not be used.
#[derive(Clone, Debug)]
pub enum ConfigError {
    /// Reading the settings failed.
    Io(Arc<io::Error>),

    /// The settings are not valid JSON or have the wrong shape.
    Parse(Arc<serde_json::Error>),

    /// A required address is missing or empty.
    Missing(&'static str),

    /// An address is not an IP address.
    InvalidAddress {
        /// The settings key holding the address.
        key: &'static str,

        /// The offending value.
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read settings: {err}"),
            ConfigError::Parse(err) => {
                write!(f, "invalid settings: {err}")
            }
            ConfigError::Missing(key) => {
                write!(f, "missing '{key}' in settings")
            }
            ConfigError::InvalidAddress { key, value } => {
                write!(f, "invalid IP address '{value}' for '{key}'")
            }
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Missing(_) => None,
            ConfigError::InvalidAddress { .. } => None,
        }
    }
}

//============ Testing =======================================================
