//! The requesting side of an exchange.
//!
//! A [`Requester`] greets a resolver, performs a list of lookups one after
//! the other, acknowledging each reply, and finally waits for the resolver
//! to end the exchange:
//!
//! ```text
//!   requester                    resolver
//!       Hello         -------->
//!                     <--------  Welcome
//!       DNSLookup     -------->
//!                     <--------  DNSLookupReply | Error
//!       Ack           -------->
//!         ... once per lookup ...
//!                     <--------  End
//! ```
//!
//! There is never more than one outstanding lookup. Each wait for a reply
//! is bounded by the read timeout of the requester’s [`Config`].
//!
//! [`Requester`]: requester::Requester
//! [`Config`]: requester::Config

pub mod error;
pub mod requester;

pub use self::error::Error;
pub use self::requester::{
    Answer, Closure, Config, Exchange, LogObserver, Observer, Outcome,
    Requester, State,
};
