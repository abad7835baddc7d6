//! Conversion between Route53 record sets and logical records.

use std::time::Duration;

use super::{
    codec::{self, DecodeError},
    Error,
};
use crate::{relative_name, Record, RecordData};

/// Represents a Route53 resource record set: every value stored for one name and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// The fully qualified name with a trailing dot, as Route53 returns it (`\052` for `*`).
    pub name: String,
    pub typ: String,
    /// The TTL in seconds shared by all values.
    pub ttl: u64,
    /// The raw wire values. For text-bearing types, each one is quoted and escaped.
    pub values: Vec<String>,
}

impl RecordSet {
    /// Returns whether this set is addressed by the given absolute name and type.
    pub fn matches(&self, name: &str, typ: &str) -> bool {
        if !self.typ.eq_ignore_ascii_case(typ) {
            return false;
        }
        let own = codec::unescape(&self.name).unwrap_or_else(|_| self.name.clone());
        own.trim_end_matches('.')
            .eq_ignore_ascii_case(name.trim_end_matches('.'))
    }
}

/// Returns whether values of the given type are stored as quoted character strings.
pub fn is_text_type(typ: &str) -> bool {
    typ.eq_ignore_ascii_case("TXT") || typ.eq_ignore_ascii_case("SPF")
}

/// Converts a record set into one logical record per raw value.
///
/// Text values are decoded; all quoted segments of one raw value are concatenated into a single record. Names are
/// made relative to `zone`.
pub fn parse(set: &RecordSet, zone: &str) -> Result<Vec<Record>, Error> {
    let decode_error = |source: DecodeError| Error::Decode {
        name: set.name.clone(),
        typ: set.typ.clone(),
        source,
    };

    let name = relative_name(&codec::unescape(&set.name).map_err(decode_error)?, zone);
    let ttl = Duration::from_secs(set.ttl);

    set.values
        .iter()
        .map(|raw| {
            let value = if is_text_type(&set.typ) {
                codec::decode_str(raw).map_err(decode_error)?
            } else {
                raw.clone()
            };
            Ok(Record::new(
                name.clone(),
                RecordData::from_raw(&set.typ, &value),
                ttl,
            ))
        })
        .collect()
}

/// Converts a logical record into the raw values Route53 stores for it.
pub fn marshal(record: &Record) -> Vec<String> {
    if is_text_type(record.typ()) {
        vec![codec::encode_str(&record.value())]
    } else {
        vec![record.value()]
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn set(name: &str, typ: &str, values: &[&str]) -> RecordSet {
        RecordSet {
            name: name.to_owned(),
            typ: typ.to_owned(),
            ttl: 300,
            values: values.iter().map(|v| (*v).to_owned()).collect(),
        }
    }

    fn txt(name: &str, text: &str) -> Record {
        Record::new(name, RecordData::TXT(text.to_owned()), Duration::from_secs(300))
    }

    #[test]
    fn test_parse_a_record() {
        let records = parse(&set("example.com.", "A", &["127.0.0.1"]), "example.com.").unwrap();
        assert_eq!(
            records,
            vec![Record::new(
                "@",
                RecordData::A(Ipv4Addr::new(127, 0, 0, 1)),
                Duration::from_secs(300)
            )]
        );
    }

    #[test]
    fn test_parse_wildcard_cname() {
        let records = parse(
            &set(r"\052.example.com.", "CNAME", &["example.com"]),
            "example.com.",
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "*");
        assert_eq!(records[0].data, RecordData::CNAME("example.com".to_owned()));
    }

    #[test]
    fn test_parse_txt_record() {
        let records = parse(
            &set(
                "test.example.com.",
                "TXT",
                &[
                    r#""This string includes \"quotation marks\".""#,
                    r#""This string includes \\backslashes\\""#,
                    r#""accented e: \303\251""#,
                    r#""String 1" "String 2" "String 3""#,
                ],
            ),
            "example.com.",
        )
        .unwrap();

        assert_eq!(
            records,
            vec![
                txt("test", r#"This string includes "quotation marks"."#),
                txt("test", r#"This string includes \backslashes\"#),
                txt("test", "accented e: é"),
                txt("test", "String 1String 2String 3"),
            ]
        );
    }

    #[test]
    fn test_parse_long_txt_record() {
        let first = "a".repeat(255);
        let wire = format!("\"{}\" \"tail\"", first);
        let records = parse(&set("_long.example.com.", "TXT", &[&wire]), "example.com.").unwrap();

        assert_eq!(records, vec![txt("_long", &format!("{}tail", first))]);
    }

    #[test]
    fn test_parse_spf_record() {
        let records = parse(
            &set("example.com.", "SPF", &[r#""v=spf1 -all""#]),
            "example.com.",
        )
        .unwrap();
        assert_eq!(records[0].typ(), "SPF");
        assert_eq!(records[0].value(), "v=spf1 -all");
    }

    #[test]
    fn test_parse_malformed_txt_record() {
        let err = parse(&set("bad.example.com.", "TXT", &[r#""ok\q""#]), "example.com.").unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                source: DecodeError::InvalidEscape(3),
                ..
            }
        ));
    }

    #[test]
    fn test_marshal() {
        let a = Record::new(
            "test",
            RecordData::A(Ipv4Addr::new(127, 0, 0, 1)),
            Duration::from_secs(300),
        );
        assert_eq!(marshal(&a), vec!["127.0.0.1".to_owned()]);

        assert_eq!(marshal(&txt("test", "test")), vec![r#""test""#.to_owned()]);
        assert_eq!(marshal(&txt("@", r#""test""#)), vec![r#""\"test\"""#.to_owned()]);
        assert_eq!(marshal(&txt("test", r"\test\")), vec![r#""\\test\\""#.to_owned()]);
        assert_eq!(marshal(&txt("test", "test é")), vec![r#""test \303\251""#.to_owned()]);

        let long = "x".repeat(300);
        let values = marshal(&txt("test", &long));
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], format!("\"{}\" \"{}\"", "x".repeat(255), "x".repeat(45)));
    }

    #[test]
    fn test_record_set_matches() {
        let wildcard = set(r"\052.Example.com.", "TXT", &[]);
        assert!(wildcard.matches("*.example.com.", "TXT"));
        assert!(wildcard.matches("*.example.com", "txt"));
        assert!(!wildcard.matches("*.example.com.", "A"));
        assert!(!wildcard.matches("www.example.com.", "TXT"));
    }
}
