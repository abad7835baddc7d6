//! Record set reconciling DNS zone management.
//!
//! This crate defines a generic provider-agnostic API to manage the records of a DNS zone and implements it for
//! AWS Route53, whose zones store records as named, typed record sets rather than as a flat list.
//!
//! # Capabilities
//!
//! The most basic trait for every DNS zone provider is [`RecordGetter`]. It only supports record retrieval.
//! <br/>The following capabilities can be implemented additionally:
//!
//! - [`RecordAppender`]
//! - [`RecordSetter`]
//! - [`RecordDeleter`]
//!
//! # Records
//!
//! Callers always operate on individual logical [`Record`]s. Names are relative to the zone, with the zone apex
//! represented by `@`.

use std::{
    error::Error as StdError,
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
    time::Duration,
};

#[cfg(feature = "route53")]
pub mod route53;

/// Represents a DNS record value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    CNAME(String),
    MX {
        priority: u16,
        mail_server: String,
    },
    NS(String),
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    /// The decoded text of a TXT record, never its quoted wire form.
    TXT(String),
    Other {
        typ: String,
        value: String,
    },
}

impl RecordData {
    /// Tries to parse raw DNS record data to their corresponsing [`RecordData`] value.
    ///
    /// This function falls back to [`RecordData::Other`] if the value could not be parsed or the type is not supported.
    pub fn from_raw(typ: &str, value: &str) -> RecordData {
        let data = match typ {
            "A" => Ipv4Addr::from_str(value).ok().map(RecordData::A),
            "AAAA" => Ipv6Addr::from_str(value).ok().map(RecordData::AAAA),
            "CNAME" => Some(RecordData::CNAME(value.to_owned())),
            "MX" => {
                let mut iter = value.split_whitespace();
                match (
                    iter.next().and_then(|raw| raw.parse::<u16>().ok()),
                    iter.next(),
                    iter.next(),
                ) {
                    (Some(priority), Some(server), None) => Some(RecordData::MX {
                        priority,
                        mail_server: server.to_owned(),
                    }),
                    _ => None,
                }
            }
            "NS" => Some(RecordData::NS(value.to_owned())),
            "SRV" => {
                let mut iter = value.split_whitespace();
                let mut number = || iter.next().and_then(|raw| raw.parse::<u16>().ok());
                match (number(), number(), number()) {
                    (Some(priority), Some(weight), Some(port)) => {
                        let rest: Vec<&str> = iter.collect();
                        match rest.as_slice() {
                            [target] => Some(RecordData::SRV {
                                priority,
                                weight,
                                port,
                                target: (*target).to_owned(),
                            }),
                            _ => None,
                        }
                    }
                    _ => None,
                }
            }
            "TXT" => Some(RecordData::TXT(value.to_owned())),
            _ => None,
        };

        data.unwrap_or(RecordData::Other {
            typ: typ.to_owned(),
            value: value.to_owned(),
        })
    }

    pub fn get_type(&self) -> &str {
        match self {
            RecordData::A(_) => "A",
            RecordData::AAAA(_) => "AAAA",
            RecordData::CNAME(_) => "CNAME",
            RecordData::MX { .. } => "MX",
            RecordData::NS(_) => "NS",
            RecordData::SRV { .. } => "SRV",
            RecordData::TXT(_) => "TXT",
            RecordData::Other { typ, .. } => typ.as_str(),
        }
    }

    pub fn get_value(&self) -> String {
        match self {
            RecordData::A(addr) => addr.to_string(),
            RecordData::AAAA(addr) => addr.to_string(),
            RecordData::CNAME(alias) => alias.clone(),
            RecordData::MX {
                priority,
                mail_server,
            } => format!("{} {}", priority, mail_server),
            RecordData::NS(ns) => ns.clone(),
            RecordData::SRV {
                priority,
                weight,
                port,
                target,
            } => format!("{} {} {} {}", priority, weight, port, target),
            RecordData::TXT(val) => val.clone(),
            RecordData::Other { value, .. } => value.clone(),
        }
    }
}

/// Represents a logical DNS record, the unit every record operation works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The record name relative to its zone, `@` for the zone apex.
    pub name: String,
    pub data: RecordData,
    /// The time to live, with a granularity of seconds.
    pub ttl: Duration,
}

impl Record {
    pub fn new(name: impl Into<String>, data: RecordData, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            data,
            ttl,
        }
    }

    /// Returns the record type, e.g. `TXT`.
    pub fn typ(&self) -> &str {
        self.data.get_type()
    }

    /// Returns the record value as a single logical string.
    /// <br/>Two records of the same name and type hold the same value if and only if their values are equal.
    pub fn value(&self) -> String {
        self.data.get_value()
    }
}

/// Qualifies a zone-relative name with its zone.
///
/// The zone apex may be given as `@` or as an empty name. Names that already end in a dot are considered absolute
/// and are returned unchanged. The result always carries exactly one trailing dot.
pub fn absolute_name(name: &str, zone: &str) -> String {
    let zone = zone.trim_end_matches('.');
    if name.is_empty() || name == "@" {
        return format!("{}.", zone);
    }
    if name.ends_with('.') {
        return name.to_owned();
    }
    if zone.is_empty() {
        return format!("{}.", name);
    }
    format!("{}.{}.", name, zone)
}

/// Strips the zone from a fully qualified name.
///
/// The comparison is case-insensitive and only matches on a label boundary. The zone apex is returned as `@`, names
/// outside of the zone are returned without their trailing dot.
pub fn relative_name(fqdn: &str, zone: &str) -> String {
    let fqdn = fqdn.trim_end_matches('.');
    let zone = zone.trim_end_matches('.');

    if fqdn.is_empty() || fqdn.eq_ignore_ascii_case(zone) {
        return "@".to_owned();
    }
    if zone.is_empty() || fqdn.len() <= zone.len() + 1 {
        return fqdn.to_owned();
    }

    let split = fqdn.len() - zone.len();
    if !fqdn.is_char_boundary(split) {
        return fqdn.to_owned();
    }
    let (head, tail) = fqdn.split_at(split);
    match head.strip_suffix('.') {
        Some(label) if tail.eq_ignore_ascii_case(zone) => label.to_owned(),
        _ => fqdn.to_owned(),
    }
}

/// Represents a DNS zone provider that supports record retrieval.
///
/// Zones are addressed by their fully qualified name, e.g. `example.com.`.
/// <br/>The following additional capabilities may be implemented to allow further record management:
///
/// - [`RecordAppender`]
/// - [`RecordSetter`]
/// - [`RecordDeleter`]
pub trait RecordGetter {
    /// The provider-specific error type shared by all record capabilities.
    type Error: StdError;

    /// Retrieves all records of a zone.
    /// <br/>When no record exists, an [`Ok`] value with an empty [`Vec`] will be returned.
    fn get_records(&self, zone: &str) -> Result<Vec<Record>, Self::Error>;
}

/// Represents a provider that supports adding records to a zone.
pub trait RecordAppender: RecordGetter {
    /// Adds records to the zone without touching any existing value.
    /// <br/>Returns the records that were actually added.
    fn append_records(&self, zone: &str, records: &[Record]) -> Result<Vec<Record>, Self::Error>;
}

/// Represents a provider that supports replacing records of a zone.
pub trait RecordSetter: RecordGetter {
    /// Replaces every record with the same name and type as one of the given records.
    /// <br/>Returns the records as they were set.
    fn set_records(&self, zone: &str, records: &[Record]) -> Result<Vec<Record>, Self::Error>;
}

/// Represents a provider that supports record deletion.
pub trait RecordDeleter: RecordGetter {
    /// Deletes the records with matching name, type and value. Records that do not exist are ignored.
    /// <br/>Returns the records that were actually removed.
    fn delete_records(&self, zone: &str, records: &[Record]) -> Result<Vec<Record>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_data_from_raw() {
        assert_eq!(
            RecordData::from_raw("A", "127.0.0.1"),
            RecordData::A(Ipv4Addr::new(127, 0, 0, 1))
        );
        assert_eq!(
            RecordData::from_raw("MX", "10 mail.example.com."),
            RecordData::MX {
                priority: 10,
                mail_server: "mail.example.com.".to_owned()
            }
        );
        assert_eq!(
            RecordData::from_raw("SRV", "1 2 443 sip.example.com."),
            RecordData::SRV {
                priority: 1,
                weight: 2,
                port: 443,
                target: "sip.example.com.".to_owned()
            }
        );
        assert_eq!(
            RecordData::from_raw("A", "not-an-address"),
            RecordData::Other {
                typ: "A".to_owned(),
                value: "not-an-address".to_owned()
            }
        );
        assert_eq!(RecordData::from_raw("SPF", "v=spf1 -all").get_type(), "SPF");
    }

    #[test]
    fn test_record_data_types() {
        let aaaa = RecordData::from_raw("AAAA", "2001:db8::1");
        assert_eq!(aaaa.get_type(), "AAAA");
        assert_eq!(aaaa.get_value(), "2001:db8::1");

        let mx = RecordData::from_raw("MX", "10   mail.example.com.");
        assert_eq!(mx.get_value(), "10 mail.example.com.");
    }

    #[test]
    fn test_absolute_name() {
        assert_eq!(absolute_name("www", "example.com."), "www.example.com.");
        assert_eq!(absolute_name("www", "example.com"), "www.example.com.");
        assert_eq!(absolute_name("@", "example.com."), "example.com.");
        assert_eq!(absolute_name("", "example.com."), "example.com.");
        assert_eq!(absolute_name("www.example.com.", "example.com."), "www.example.com.");
        assert_eq!(absolute_name("a.b", "example.com."), "a.b.example.com.");
    }

    #[test]
    fn test_relative_name() {
        assert_eq!(relative_name("www.example.com.", "example.com."), "www");
        assert_eq!(relative_name("example.com.", "example.com."), "@");
        assert_eq!(relative_name("WWW.Example.COM.", "example.com."), "WWW");
        assert_eq!(relative_name("a.b.example.com", "example.com."), "a.b");
        assert_eq!(relative_name("notexample.com.", "example.com."), "notexample.com");
        assert_eq!(relative_name("other.org.", "example.com."), "other.org");
    }
}
