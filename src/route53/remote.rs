//! The calls the provider makes against Route53.
//!
//! [`api::Client`](super::api::Client) implements them over HTTP. Any other type implementing all three traits can
//! be handed to [`Route53Provider::with_api`](super::Route53Provider::with_api).

use std::{fmt, time::Duration};

use tracing::debug;

use super::{rrset::RecordSet, Error};

/// Represents the action of a single record set change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Upsert,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Upsert => "UPSERT",
            ChangeAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a change to exactly one record set.
///
/// For [`ChangeAction::Delete`], the record set has to match the stored one exactly, including TTL and values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub action: ChangeAction,
    pub record_set: RecordSet,
}

/// Represents a hosted zone returned by a zone lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    /// The zone ID, with or without the `/hostedzone/` prefix.
    pub id: String,
    pub name: String,
    /// Whether the zone is only visible inside associated VPCs.
    pub private: bool,
}

/// Represents the position in a record set listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub name: String,
    pub typ: Option<String>,
    pub identifier: Option<String>,
}

/// Represents one page of a record set listing.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub record_sets: Vec<RecordSet>,
    /// The position of the next page, [`None`] if this was the last one.
    pub next: Option<Cursor>,
}

/// Looks up hosted zones by name.
pub trait ZoneLookup {
    /// Returns the hosted zones whose name is equal to or sorts after `name`, starting with exact matches.
    fn find_zones_by_name(&self, name: &str) -> Result<Vec<HostedZone>, Error>;
}

/// Lists the record sets of a hosted zone, page by page.
pub trait PageFetcher {
    /// Returns the page of record sets starting at `start`, or at the beginning of the zone.
    fn list_record_sets(&self, zone_id: &str, start: Option<&Cursor>) -> Result<Page, Error>;

    /// Follows the continuation cursors until the listing is exhausted.
    fn list_all_record_sets(&self, zone_id: &str) -> Result<Vec<RecordSet>, Error> {
        let mut record_sets = Vec::new();
        let mut cursor: Option<Cursor> = None;

        loop {
            let page = self.list_record_sets(zone_id, cursor.as_ref())?;
            debug!(
                "Fetched {} record sets of zone {}",
                page.record_sets.len(),
                zone_id
            );
            record_sets.extend(page.record_sets);

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(record_sets)
    }

    /// Fetches the record set addressed by `name` and `typ`, if it exists.
    ///
    /// The listing is started at the record set itself, so only the first returned set has to be inspected.
    fn find_record_set(
        &self,
        zone_id: &str,
        name: &str,
        typ: &str,
    ) -> Result<Option<RecordSet>, Error> {
        let start = Cursor {
            name: name.to_owned(),
            typ: Some(typ.to_owned()),
            identifier: None,
        };
        let page = self.list_record_sets(zone_id, Some(&start))?;

        Ok(page
            .record_sets
            .into_iter()
            .next()
            .filter(|set| set.matches(name, typ)))
    }
}

/// Applies record set changes.
pub trait ChangeApplier {
    /// Submits a single change and returns the ID Route53 assigned to it.
    fn apply(&self, zone_id: &str, change: &Change) -> Result<String, Error>;

    /// Blocks until the change is reported as propagated to all authoritative servers.
    /// <br/>Returns [`Error::Timeout`] once `max_wait` has passed.
    fn await_propagation(&self, change_id: &str, max_wait: Duration) -> Result<(), Error>;
}

/// Represents everything the provider needs from Route53.
pub trait Route53Api: ZoneLookup + PageFetcher + ChangeApplier {}

impl<T: ZoneLookup + PageFetcher + ChangeApplier> Route53Api for T {}
