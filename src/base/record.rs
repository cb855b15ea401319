//! Records.
//!
//! This module defines [`Record`], the single piece of data the protocol
//! knows how to transport. A record is keyed by its name and record type.
//! Both parts of the key are compared ignoring case, so `www.test.com`
//! and `WWW.TEST.COM` are the same name and `a` is the same record type as
//! `A`. Case folding isn’t limited to ASCII: `bücher.example` matches
//! `BÜCHER.EXAMPLE`.
//!
//! The same type is used for queries. A query is simply a record of which
//! only the key is known, i.e., it has no value, TTL, or priority.

use core::fmt;

use serde::{Deserialize, Serialize};

//------------ Record --------------------------------------------------------

/// A named record.
///
/// The record type is a short tag such as `A` for an address record or
/// `MX` for a mail exchange record. The crate doesn’t interpret it beyond
/// comparing it.
///
/// The value holds the resolved data and is only present on records that
/// come out of a record store. The TTL is advisory and given in seconds.
/// The priority only has a meaning for some record types, such as `MX`.
///
/// On the wire, the fields are called `Type`, `Name`, `Value`, `TTL`, and
/// `Priority`. Fields that are not present are omitted.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Record {
    /// The record type.
    #[serde(rename = "Type")]
    rtype: String,

    /// The name the record is looked up by.
    #[serde(rename = "Name")]
    name: String,

    /// The resolved data.
    #[serde(
        rename = "Value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    value: Option<String>,

    /// The time to live in seconds.
    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,

    /// The priority for record types that have one.
    #[serde(
        rename = "Priority",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    priority: Option<u16>,
}

/// # Creation
///
impl Record {
    /// Creates a new record with a value.
    pub fn new(
        rtype: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Record {
            rtype: rtype.into(),
            name: name.into(),
            value: Some(value.into()),
            ttl: None,
            priority: None,
        }
    }

    /// Creates a query for the given record type and name.
    pub fn query(rtype: impl Into<String>, name: impl Into<String>) -> Self {
        Record {
            rtype: rtype.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the TTL of the record.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the priority of the record.
    #[must_use]
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// # Access
///
impl Record {
    /// Returns the record type.
    pub fn rtype(&self) -> &str {
        &self.rtype
    }

    /// Returns the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value if there is one.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns the TTL in seconds if there is one.
    pub fn ttl(&self) -> Option<u32> {
        self.ttl
    }

    /// Returns the priority.
    ///
    /// Records without a priority return zero.
    pub fn priority(&self) -> u16 {
        self.priority.unwrap_or(0)
    }

    /// Returns whether the record is a usable query.
    ///
    /// A query needs both a record type and a name.
    pub fn is_valid_query(&self) -> bool {
        !self.rtype.is_empty() && !self.name.is_empty()
    }

    /// Returns whether the record has the given key.
    ///
    /// Both name and record type are compared ignoring case.
    pub fn matches(&self, name: &str, rtype: &str) -> bool {
        eq_ignore_case(&self.name, name) && eq_ignore_case(&self.rtype, rtype)
    }
}

/// Compares two strings by their lowercase form without allocating.
fn eq_ignore_case(left: &str, right: &str) -> bool {
    left.chars()
        .flat_map(char::to_lowercase)
        .eq(right.chars().flat_map(char::to_lowercase))
}

//--- Display

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.name, self.rtype)?;
        if let Some(ttl) = self.ttl {
            write!(f, " {ttl}")?;
        }
        if let Some(priority) = self.priority {
            write!(f, " {priority}")?;
        }
        if let Some(value) = self.value.as_ref() {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matches_ignores_case() {
        let record = Record::new("A", "www.test.com", "192.168.1.20");
        assert!(record.matches("www.test.com", "A"));
        assert!(record.matches("WWW.TEST.COM", "a"));
        assert!(!record.matches("www.test.org", "A"));
        assert!(!record.matches("www.test.com", "MX"));
        assert!(!record.matches("www.test.co", "A"));
    }

    #[test]
    fn matches_folds_non_ascii() {
        let record = Record::new("A", "bücher.example", "192.0.2.1");
        assert!(record.matches("BÜCHER.EXAMPLE", "a"));
        assert!(record.matches("Bücher.Example", "A"));
        assert!(!record.matches("bucher.example", "A"));
    }

    #[test]
    fn query_validity() {
        assert!(Record::query("A", "example.com").is_valid_query());
        assert!(!Record::query("", "example.com").is_valid_query());
        assert!(!Record::query("A", "").is_valid_query());
    }

    #[test]
    fn wire_field_names() {
        let record = Record::new("MX", "example.com", "mail.example.com")
            .with_ttl(3600)
            .with_priority(10);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Type"], "MX");
        assert_eq!(json["Name"], "example.com");
        assert_eq!(json["Value"], "mail.example.com");
        assert_eq!(json["TTL"], 3600);
        assert_eq!(json["Priority"], 10);

        let query = serde_json::to_value(Record::query("A", "a.b")).unwrap();
        assert_eq!(query.as_object().unwrap().len(), 2);
    }

    #[test]
    fn display() {
        let record =
            Record::new("A", "www.test.com", "192.168.1.20").with_ttl(3600);
        assert_eq!(format!("{record}"), "www.test.com A 3600 192.168.1.20");
        assert_eq!(record.priority(), 0);
    }
}
