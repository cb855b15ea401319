//! Messages and their wire format.
//!
//! Every datagram exchanged between a requester and a resolver carries
//! exactly one [`Message`]. A message consists of a numeric id, a message
//! type, and a payload whose shape is determined by the type. The payload
//! is modelled by the [`Payload`] enum so that a message can never carry
//! a record where a text is expected or vice versa.
//!
//! # Wire format
//!
//! Messages are encoded as a JSON object with three fields:
//!
//! ```text
//! {"MsgId":5,"MsgType":"DNSLookup","Content":{"Type":"A","Name":"a.b"}}
//! ```
//!
//! `MsgType` is one of the tags listed for [`MessageType`]. `Content` is a
//! JSON string for text payloads and a [`Record`] object for lookups and
//! lookup replies. An encoded message must not be longer than
//! [`MAX_DGRAM_SIZE`] octets.
//!
//! Parsing happens in two steps. First the envelope is checked: it must be
//! a JSON object with an id and a known type. Then the content is decoded
//! according to the type. If only the second step fails, the error still
//! carries the envelope’s id and type, allowing a resolver to answer a
//! garbled lookup with an error reply for the right id.

use core::fmt;
use core::ops::Range;
use core::str::FromStr;

use std::error;
use std::string::String;
use std::sync::Arc;
use std::vec::Vec;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::Record;

//------------ Configuration Constants ---------------------------------------

/// The maximum size of an encoded message in octets.
///
/// This is also the size of the receive buffer. Longer messages are
/// rejected when composing and treated as malformed when received.
pub const MAX_DGRAM_SIZE: usize = 1024;

/// The range ids of hello messages are picked from.
const HELLO_IDS: Range<u32> = 1..1000;

/// The range ids of welcome messages are picked from.
const WELCOME_IDS: Range<u32> = 1..1000;

/// The range ids of lookup messages are picked from.
const LOOKUP_IDS: Range<u32> = 100..1000;

/// The range ids of acknowledgments are picked from.
const ACK_IDS: Range<u32> = 1000..10000;

/// The range ids of end messages are picked from.
const END_IDS: Range<u32> = 10000..100000;

//------------ MessageType ---------------------------------------------------

/// The type of a message.
///
/// The type determines the phase of the exchange a message belongs to as
/// well as the shape of its payload.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum MessageType {
    /// A requester starts an exchange. Wire tag `Hello`.
    Hello,

    /// A resolver accepts an exchange. Wire tag `Welcome`.
    Welcome,

    /// A requester asks for a record. Wire tag `DNSLookup`.
    #[serde(rename = "DNSLookup")]
    Lookup,

    /// A resolver answers a lookup. Wire tag `DNSLookupReply`.
    #[serde(rename = "DNSLookupReply")]
    LookupReply,

    /// A resolver failed to answer a lookup. Wire tag `Error`.
    Error,

    /// A requester acknowledges a reply. Wire tag `Ack`.
    Ack,

    /// A resolver ends the exchange. Wire tag `End`.
    End,
}

impl MessageType {
    /// Returns the wire tag of the message type.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Hello => "Hello",
            MessageType::Welcome => "Welcome",
            MessageType::Lookup => "DNSLookup",
            MessageType::LookupReply => "DNSLookupReply",
            MessageType::Error => "Error",
            MessageType::Ack => "Ack",
            MessageType::End => "End",
        }
    }
}

//--- FromStr

impl FromStr for MessageType {
    type Err = UnknownTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hello" => Ok(MessageType::Hello),
            "Welcome" => Ok(MessageType::Welcome),
            "DNSLookup" => Ok(MessageType::Lookup),
            "DNSLookupReply" => Ok(MessageType::LookupReply),
            "Error" => Ok(MessageType::Error),
            "Ack" => Ok(MessageType::Ack),
            "End" => Ok(MessageType::End),
            _ => Err(UnknownTypeError),
        }
    }
}

//--- Display

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//------------ Payload -------------------------------------------------------

/// The payload of a message.
///
/// There is one variant per [`MessageType`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Payload {
    /// A hello with a free text.
    Hello(String),

    /// A welcome with a free text.
    Welcome(String),

    /// A lookup for the record type and name of the record.
    Lookup(Record),

    /// The record found for a lookup.
    LookupReply(Record),

    /// A description of why a lookup failed.
    Error(String),

    /// The decimal id of the message being acknowledged.
    Ack(String),

    /// An end with a free text.
    End(String),
}

impl Payload {
    /// Returns the message type for this payload.
    pub fn msg_type(&self) -> MessageType {
        match self {
            Payload::Hello(_) => MessageType::Hello,
            Payload::Welcome(_) => MessageType::Welcome,
            Payload::Lookup(_) => MessageType::Lookup,
            Payload::LookupReply(_) => MessageType::LookupReply,
            Payload::Error(_) => MessageType::Error,
            Payload::Ack(_) => MessageType::Ack,
            Payload::End(_) => MessageType::End,
        }
    }

    /// Returns the text of a text payload.
    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Hello(text)
            | Payload::Welcome(text)
            | Payload::Error(text)
            | Payload::Ack(text)
            | Payload::End(text) => Some(text),
            Payload::Lookup(_) | Payload::LookupReply(_) => None,
        }
    }

    /// Returns the record of a record payload.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Payload::Lookup(record) | Payload::LookupReply(record) => {
                Some(record)
            }
            _ => None,
        }
    }

    /// Returns the acknowledged id of an ack payload.
    ///
    /// Returns `None` for other payloads or if the text isn’t a decimal
    /// number.
    pub fn acked_id(&self) -> Option<u32> {
        match self {
            Payload::Ack(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Decodes the content of a message of the given type.
    fn from_content(
        msg_type: MessageType,
        content: Value,
    ) -> Result<Self, String> {
        match msg_type {
            MessageType::Hello => Ok(Payload::Hello(text_content(content))),
            MessageType::Welcome => {
                Ok(Payload::Welcome(text_content(content)))
            }
            MessageType::Lookup => {
                record_content(content).map(Payload::Lookup)
            }
            MessageType::LookupReply => {
                record_content(content).map(Payload::LookupReply)
            }
            MessageType::Error => Ok(Payload::Error(text_content(content))),
            MessageType::Ack => Ok(Payload::Ack(text_content(content))),
            MessageType::End => Ok(Payload::End(text_content(content))),
        }
    }
}

/// Decodes text content.
///
/// Any content is accepted. Missing content is an empty text, strings are
/// taken as is and every other value in its JSON form.
fn text_content(content: Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Decodes record content.
///
/// The record must at least have a type and a name.
fn record_content(content: Value) -> Result<Record, String> {
    if !content.is_object() {
        return Err("expected a record with Type and Name".into());
    }
    let record: Record =
        serde_json::from_value(content).map_err(|err| err.to_string())?;
    if !record.is_valid_query() {
        return Err("record Type and Name must not be empty".into());
    }
    Ok(record)
}

//------------ Message -------------------------------------------------------

/// A single protocol message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    /// The id of the message.
    id: u32,

    /// The payload and, implicitly, the type.
    payload: Payload,
}

/// # Creation
///
impl Message {
    /// Creates a message from its parts.
    pub fn new(id: u32, payload: Payload) -> Self {
        Message { id, payload }
    }

    /// Creates a hello message with a random id.
    pub fn hello(text: impl Into<String>) -> Self {
        Self::new(random_id(HELLO_IDS, None), Payload::Hello(text.into()))
    }

    /// Creates a welcome in response to the hello with the given id.
    ///
    /// The welcome gets a fresh id different from `hello_id`.
    pub fn welcome(hello_id: u32, text: impl Into<String>) -> Self {
        Self::new(
            random_id(WELCOME_IDS, Some(hello_id)),
            Payload::Welcome(text.into()),
        )
    }

    /// Creates a lookup for the given query with a random id.
    pub fn lookup(query: Record) -> Self {
        Self::new(random_id(LOOKUP_IDS, None), Payload::Lookup(query))
    }

    /// Creates a lookup reply for the lookup with the given id.
    pub fn lookup_reply(lookup_id: u32, record: Record) -> Self {
        Self::new(lookup_id, Payload::LookupReply(record))
    }

    /// Creates an error reply for the lookup with the given id.
    pub fn error(lookup_id: u32, text: impl Into<String>) -> Self {
        Self::new(lookup_id, Payload::Error(text.into()))
    }

    /// Creates an acknowledgment of the given message.
    ///
    /// The content is the decimal id of `reply`. The acknowledgment itself
    /// gets a fresh id.
    pub fn ack(reply: &Message) -> Self {
        Self::new(
            random_id(ACK_IDS, Some(reply.id)),
            Payload::Ack(reply.id.to_string()),
        )
    }

    /// Creates an end message in response to the ack with the given id.
    pub fn end(ack_id: u32, text: impl Into<String>) -> Self {
        Self::new(
            random_id(END_IDS, Some(ack_id)),
            Payload::End(text.into()),
        )
    }
}

/// # Access
///
impl Message {
    /// Returns the id of the message.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the type of the message.
    pub fn msg_type(&self) -> MessageType {
        self.payload.msg_type()
    }

    /// Returns a reference to the payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Converts the message into its payload.
    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

/// # Parsing and Composing
///
impl Message {
    /// Parses a message from a received datagram.
    pub fn from_slice(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() > MAX_DGRAM_SIZE {
            return Err(ParseError::TooLarge(data.len()));
        }
        let wire: WireMessage = serde_json::from_slice(data)
            .map_err(|err| ParseError::Malformed(Arc::new(err)))?;
        let msg_type = wire.msg_type.parse().map_err(|_| {
            ParseError::UnknownType {
                id: wire.id,
                tag: wire.msg_type.clone(),
            }
        })?;
        let payload =
            Payload::from_content(msg_type, wire.content).map_err(|reason| {
                ParseError::InvalidPayload {
                    id: wire.id,
                    msg_type,
                    reason,
                }
            })?;
        Ok(Message::new(wire.id, payload))
    }

    /// Composes the wire format of the message.
    pub fn to_vec(&self) -> Result<Vec<u8>, ComposeError> {
        let content = match &self.payload {
            Payload::Lookup(record) | Payload::LookupReply(record) => {
                WireContent::Record(record)
            }
            Payload::Hello(text)
            | Payload::Welcome(text)
            | Payload::Error(text)
            | Payload::Ack(text)
            | Payload::End(text) => WireContent::Text(text),
        };
        let wire = WireMessageRef {
            id: self.id,
            msg_type: self.msg_type(),
            content,
        };
        let data = serde_json::to_vec(&wire)
            .map_err(|err| ComposeError::Serialize(Arc::new(err)))?;
        if data.len() > MAX_DGRAM_SIZE {
            return Err(ComposeError::TooLarge(data.len()));
        }
        Ok(data)
    }
}

//--- Display

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} message with ID {}", self.msg_type(), self.id)
    }
}

//------------ WireMessage ---------------------------------------------------

/// The envelope as it is received.
#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "MsgId")]
    id: u32,

    #[serde(rename = "MsgType")]
    msg_type: String,

    #[serde(rename = "Content", default)]
    content: Value,
}

/// The envelope as it is sent.
#[derive(Serialize)]
struct WireMessageRef<'a> {
    #[serde(rename = "MsgId")]
    id: u32,

    #[serde(rename = "MsgType")]
    msg_type: MessageType,

    #[serde(rename = "Content")]
    content: WireContent<'a>,
}

/// The content of an envelope as it is sent.
#[derive(Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Record(&'a Record),
}

//------------ Helper Functions ----------------------------------------------

/// Returns a random id from `range` that is different from `avoid`.
fn random_id(range: Range<u32>, avoid: Option<u32>) -> u32 {
    let mut rng = rand::thread_rng();
    loop {
        let id = rng.gen_range(range.clone());
        if Some(id) != avoid {
            return id;
        }
    }
}

//============ Error Types ===================================================

//------------ UnknownTypeError ----------------------------------------------

/// A message type tag was not recognized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownTypeError;

impl fmt::Display for UnknownTypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unknown message type")
    }
}

impl error::Error for UnknownTypeError {}

//------------ ParseError ----------------------------------------------------

/// A received datagram could not be parsed into a message.
#[derive(Clone, Debug)]
pub enum ParseError {
    /// The datagram exceeds [`MAX_DGRAM_SIZE`].
    TooLarge(usize),

    /// The datagram is not a well-formed envelope.
    Malformed(Arc<serde_json::Error>),

    /// The envelope has a type tag that isn’t part of the protocol.
    UnknownType {
        /// The id of the envelope.
        id: u32,

        /// The unknown tag.
        tag: String,
    },

    /// The content doesn’t have the shape required by the type.
    InvalidPayload {
        /// The id of the envelope.
        id: u32,

        /// The type of the envelope.
        msg_type: MessageType,

        /// What was wrong with the content.
        reason: String,
    },
}

impl ParseError {
    /// Returns whether the envelope itself was unreadable.
    ///
    /// This is the case when neither id nor type could be recovered.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ParseError::TooLarge(_) | ParseError::Malformed(_))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::TooLarge(len) => write!(
                f,
                "message of {len} octets exceeds limit of {MAX_DGRAM_SIZE}"
            ),
            ParseError::Malformed(err) => {
                write!(f, "malformed message: {err}")
            }
            ParseError::UnknownType { id, tag } => {
                write!(f, "message with ID {id} has unknown type '{tag}'")
            }
            ParseError::InvalidPayload {
                id,
                msg_type,
                reason,
            } => {
                write!(
                    f,
                    "invalid content in {msg_type} message with ID {id}: \
                     {reason}"
                )
            }
        }
    }
}

impl error::Error for ParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ParseError::Malformed(err) => Some(err),
            _ => None,
        }
    }
}

//------------ ComposeError --------------------------------------------------

/// A message could not be composed.
#[derive(Clone, Debug)]
pub enum ComposeError {
    /// The encoded message exceeds [`MAX_DGRAM_SIZE`].
    TooLarge(usize),

    /// Serialization failed.
    Serialize(Arc<serde_json::Error>),
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ComposeError::TooLarge(len) => write!(
                f,
                "envelope of {len} octets exceeds limit of {MAX_DGRAM_SIZE}"
            ),
            ComposeError::Serialize(err) => {
                write!(f, "failed to serialize message: {err}")
            }
        }
    }
}

impl error::Error for ComposeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ComposeError::TooLarge(_) => None,
            ComposeError::Serialize(err) => Some(err),
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_lookup() {
        let msg = Message::from_slice(
            br#"{"MsgId":5,"MsgType":"DNSLookup",
                "Content":{"Type":"A","Name":"www.test.com"}}"#,
        )
        .unwrap();
        assert_eq!(msg.id(), 5);
        assert_eq!(msg.msg_type(), MessageType::Lookup);
        assert_eq!(
            msg.payload().record(),
            Some(&Record::query("A", "www.test.com"))
        );
    }

    #[test]
    fn compose_lookup_reply() {
        let record =
            Record::new("A", "www.test.com", "192.168.1.20").with_ttl(3600);
        let msg = Message::lookup_reply(5, record.clone());
        let data = msg.to_vec().unwrap();
        let json: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(json["MsgId"], 5);
        assert_eq!(json["MsgType"], "DNSLookupReply");
        assert_eq!(json["Content"]["Value"], "192.168.1.20");
        assert_eq!(Message::from_slice(&data).unwrap(), msg);
    }

    #[test]
    fn text_content_variants() {
        let msg =
            Message::from_slice(br#"{"MsgId":1,"MsgType":"Hello"}"#).unwrap();
        assert_eq!(msg.payload(), &Payload::Hello(String::new()));

        let msg =
            Message::from_slice(br#"{"MsgId":7,"MsgType":"Ack","Content":5}"#)
                .unwrap();
        assert_eq!(msg.payload().acked_id(), Some(5));

        let cases: [(&[u8], &str); 3] = [
            (br#"{"MsgId":2,"MsgType":"Ack","Content":{"x":1}}"#, r#"{"x":1}"#),
            (br#"{"MsgId":2,"MsgType":"Ack","Content":[1,2]}"#, "[1,2]"),
            (br#"{"MsgId":2,"MsgType":"Ack","Content":true}"#, "true"),
        ];
        for (data, text) in cases {
            let msg = Message::from_slice(data).unwrap();
            assert_eq!(msg.payload(), &Payload::Ack(text.into()));
            assert_eq!(msg.payload().acked_id(), None);
        }
    }

    #[test]
    fn malformed_envelopes() {
        let cases: [&[u8]; 6] = [
            b"",
            b"not json",
            br#"{"MsgId":1,"MsgType":"Hel"#,
            br#"{"MsgType":"Hello"}"#,
            br#"{"MsgId":"x","MsgType":"Hello"}"#,
            br#"[1, 2, 3]"#,
        ];
        for data in cases {
            let err = Message::from_slice(data).unwrap_err();
            assert!(err.is_malformed(), "{err}");
        }
    }

    #[test]
    fn unknown_type() {
        let err =
            Message::from_slice(br#"{"MsgId":3,"MsgType":"Goodbye"}"#)
                .unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnknownType { id: 3, ref tag } if tag == "Goodbye"
        ));
    }

    #[test]
    fn invalid_lookup_keeps_id() {
        let cases: [&[u8]; 4] = [
            br#"{"MsgId":9,"MsgType":"DNSLookup","Content":"www.test.com"}"#,
            br#"{"MsgId":9,"MsgType":"DNSLookup","Content":{"Name":"a"}}"#,
            br#"{"MsgId":9,"MsgType":"DNSLookup","Content":{"Type":"A","Name":""}}"#,
            br#"{"MsgId":9,"MsgType":"DNSLookup"}"#,
        ];
        for data in cases {
            let err = Message::from_slice(data).unwrap_err();
            assert!(matches!(
                err,
                ParseError::InvalidPayload {
                    id: 9,
                    msg_type: MessageType::Lookup,
                    ..
                }
            ));
        }
    }

    #[test]
    fn size_ceiling() {
        let long = "x".repeat(MAX_DGRAM_SIZE);
        assert!(matches!(
            Message::error(1, long).to_vec(),
            Err(ComposeError::TooLarge(_))
        ));
        let data = vec![b' '; MAX_DGRAM_SIZE + 1];
        assert!(matches!(
            Message::from_slice(&data),
            Err(ParseError::TooLarge(_))
        ));
    }

    #[test]
    fn fresh_ids() {
        for _ in 0..100 {
            let hello = Message::new(5, Payload::Hello("hi".into()));
            assert_ne!(Message::welcome(hello.id(), "").id(), hello.id());

            let reply = Message::lookup_reply(1500, Record::query("A", "a"));
            let ack = Message::ack(&reply);
            assert_ne!(ack.id(), reply.id());
            assert_eq!(ack.payload().acked_id(), Some(1500));

            assert_ne!(Message::end(ack.id(), "").id(), ack.id());
        }
    }

    #[test]
    fn type_tags() {
        for msg_type in [
            MessageType::Hello,
            MessageType::Welcome,
            MessageType::Lookup,
            MessageType::LookupReply,
            MessageType::Error,
            MessageType::Ack,
            MessageType::End,
        ] {
            let parsed = msg_type.as_str().parse::<MessageType>();
            assert_eq!(parsed, Ok(msg_type));
        }
    }
}
