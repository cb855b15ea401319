//! A small record lookup protocol over UDP.
//!
//! This crate implements both ends of a four phase exchange in which a
//! requester greets a resolver, asks it for a number of records by name
//! and type, acknowledges every answer, and is finally dismissed by the
//! resolver. Every message travels as a single JSON encoded datagram.
//!
//! # Modules
//!
//! * [base] contains the message and record types and their wire format,
//! * [store] contains the in-memory record table a resolver answers from,
//! * [net] contains the requester, the resolver and the datagram
//!   transport they share, and
//! * [config] reads the settings file naming the addresses of both ends.
//!
#![cfg_attr(feature = "logging", doc = "* [logging]:")]
#![cfg_attr(not(feature = "logging"), doc = "* logging:")]
//!   Initialization of `tracing` output for the binaries and tests.
//!
//! # Reference of Feature Flags
//!
//! * `logging`: Enables the
#![cfg_attr(feature = "logging", doc = "  [logging]")]
#![cfg_attr(not(feature = "logging"), doc = "  logging")]
//!   module via the
//!   [tracing-subscriber](https://github.com/tokio-rs/tracing) crate. It
//!   is enabled by default and required by the binaries.

#![warn(missing_docs)]

pub mod base;
pub mod config;
#[cfg(feature = "logging")]
pub mod logging;
pub mod net;
pub mod store;

mod utils;
