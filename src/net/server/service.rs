//! The resolver state machine.
//!
//! [`Responder`] decides how to answer a single message from a single
//! requester. It is independent of any network socket: the server feeds it
//! whatever arrives and sends back whatever it returns. This keeps all
//! protocol decisions in one place that is easy to test.
//!
//! | received          | reply                                         |
//! |-------------------|-----------------------------------------------|
//! | `Hello`           | `Welcome` with a fresh id, session restarted  |
//! | `DNSLookup`       | `DNSLookupReply` or `Error`, echoing the id   |
//! | `Ack`             | nothing, or `End` once the threshold is hit   |
//! | anything else     | nothing                                       |

use core::fmt;

use std::error;
use std::net::SocketAddr;
use std::string::String;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::base::{Message, MessageType, ParseError, Payload, Record};
use crate::net::server::dgram::Config;
use crate::net::server::session::Sessions;
use crate::store::RecordStore;

/// The text sent with every welcome.
const WELCOME_TEXT: &str = "Welcome from server";

/// The text sent with every end message.
const END_TEXT: &str = "End of communication";

//------------ Responder -----------------------------------------------------

/// Produces replies to incoming messages.
#[derive(Debug)]
pub struct Responder {
    /// The records to answer lookups from.
    store: Arc<RecordStore>,

    /// The sessions of all requesters.
    sessions: Sessions,

    /// User supplied settings.
    config: Config,
}

impl Responder {
    /// Creates a new responder answering from `store`.
    pub fn new(store: Arc<RecordStore>, config: Config) -> Self {
        Responder {
            store,
            sessions: Sessions::new(),
            config,
        }
    }

    /// Returns the record store.
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Returns the session table.
    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    /// Processes a message received from `peer` at `now`.
    ///
    /// `request` is the outcome of parsing the datagram. Returns the reply
    /// to send to `peer`, if any.
    pub fn respond(
        &mut self,
        request: Result<Message, ParseError>,
        peer: SocketAddr,
        now: Instant,
    ) -> Option<Message> {
        self.sessions.evict_idle(now, self.config.session_timeout());

        let request = match request {
            Ok(request) => request,
            Err(ParseError::InvalidPayload {
                id,
                msg_type: MessageType::Lookup,
                reason,
            }) => {
                self.sessions.touch(&peer, now);
                let err = LookupError::QueryInvalid(reason);
                debug!(%peer, "Invalid lookup with ID {id}: {err:?}");
                return Some(Message::error(id, err.to_string()));
            }
            Err(err) => {
                warn!(%peer, "Discarding message: {err}");
                return None;
            }
        };

        match request.payload() {
            Payload::Hello(_) => {
                self.sessions.start(peer, now);
                Some(Message::welcome(request.id(), WELCOME_TEXT))
            }
            Payload::Lookup(query) => {
                self.sessions.touch(&peer, now);
                let reply = match self.lookup(query) {
                    Ok(record) => {
                        Message::lookup_reply(request.id(), record.clone())
                    }
                    Err(err) => {
                        debug!(%peer, "{err}");
                        Message::error(request.id(), err.to_string())
                    }
                };
                Some(reply)
            }
            Payload::Ack(content) => {
                let acks = self.sessions.ack(peer, now);
                info!(%peer, "Received ACK #{acks} for message ID {content}");
                if request.payload().acked_id().is_none() {
                    warn!(%peer, "Ack content '{content}' is not an ID");
                }
                if acks >= self.config.ack_threshold() {
                    self.sessions.remove(&peer);
                    info!(%peer, "Completed communication with requester");
                    Some(Message::end(request.id(), END_TEXT))
                } else {
                    None
                }
            }
            _ => {
                warn!(%peer, "Ignoring unexpected {request}");
                None
            }
        }
    }

    /// Looks up the record for a query.
    pub fn lookup(&self, query: &Record) -> Result<&Record, LookupError> {
        if !query.is_valid_query() {
            return Err(LookupError::QueryInvalid(
                "record Type and Name must not be empty".into(),
            ));
        }
        self.store.find(query.name(), query.rtype()).ok_or_else(|| {
            LookupError::NotFound {
                name: query.name().into(),
                rtype: query.rtype().into(),
            }
        })
    }
}

//------------ LookupError ---------------------------------------------------

/// A lookup could not be answered with a record.
///
/// The display form of the error is the text sent to the requester.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LookupError {
    /// The lookup didn’t carry a usable query.
    QueryInvalid(String),

    /// No record has the queried name and type.
    NotFound {
        /// The queried name.
        name: String,

        /// The queried record type.
        rtype: String,
    },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LookupError::QueryInvalid(_) => {
                f.write_str(
                    "Invalid DNSLookup format. Expected Type and Name.",
                )
            }
            LookupError::NotFound { name, rtype } => {
                write!(f, "Domain {name} (Type: {rtype}) not found")
            }
        }
    }
}

impl error::Error for LookupError {}

//============ Testing =======================================================
