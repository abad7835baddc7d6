//! Partitioning of logical records into Route53 record set granularity.

use std::collections::HashMap;

use crate::{absolute_name, Record};

/// Addresses one record set: the fully qualified, lowercased name and the uppercased type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub name: String,
    pub typ: String,
}

impl GroupKey {
    pub fn new(name: &str, typ: &str, zone: &str) -> Self {
        Self {
            name: absolute_name(name, zone).to_ascii_lowercase(),
            typ: typ.to_ascii_uppercase(),
        }
    }
}

/// Represents the records of one call that address the same record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub key: GroupKey,
    /// The records in input order, without deduplication.
    pub records: Vec<Record>,
}

/// Partitions records by record set.
///
/// Groups are returned in the order their first record appears in the input.
pub fn group(records: &[Record], zone: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for record in records {
        let key = GroupKey::new(&record.name, record.typ(), zone);
        match index.get(&key) {
            Some(&position) => groups[position].records.push(record.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Group {
                    key,
                    records: vec![record.clone()],
                });
            }
        }
    }

    groups
}
