//! Reconciliation of per-record operations against record sets.
//!
//! Callers name individual records while Route53 only accepts whole record sets. Every operation therefore groups
//! its input by record set, compares each group with the set currently stored, and submits one change per group
//! that actually needs one. Groups are independent: a failing group aborts the operation, but the groups before it
//! stay applied.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::{
    group::{group, Group, GroupKey},
    remote::{Change, ChangeAction, Route53Api},
    rrset::{self, is_text_type, RecordSet},
    Config, Error,
};
use crate::Record;

/// Executes record operations for one hosted zone.
pub struct Reconciler<'a, A: ?Sized> {
    api: &'a A,
    config: &'a Config,
    zone: &'a str,
    zone_id: &'a str,
}

impl<'a, A: Route53Api + ?Sized> Reconciler<'a, A> {
    /// Creates a reconciler for the fully qualified `zone` stored in the hosted zone `zone_id`.
    pub fn new(api: &'a A, config: &'a Config, zone: &'a str, zone_id: &'a str) -> Self {
        Self {
            api,
            config,
            zone,
            zone_id,
        }
    }

    /// Adds records without touching the values already stored in their record sets.
    ///
    /// A lone record for a record set that does not exist yet creates the set. Every other group is merged into
    /// the existing values, which keep their order, and replaces the set in one go. Values that are already stored
    /// are skipped. Returns the records that were actually added.
    pub fn append(&self, records: &[Record]) -> Result<Vec<Record>, Error> {
        self.for_each_group(records, |group| self.append_group(group))
    }

    /// Replaces the record set of every group with exactly the values of that group.
    ///
    /// Returns the records as they were set, with duplicate values removed.
    pub fn set(&self, records: &[Record]) -> Result<Vec<Record>, Error> {
        self.for_each_group(records, |group| self.set_group(group))
    }

    /// Removes the values of the given records from their record sets.
    ///
    /// Records are matched by name, type and value; their TTL is ignored. A set losing all of its values is deleted,
    /// otherwise it is replaced by the remaining values. Records that are not stored are ignored. Returns the stored
    /// records that were removed.
    pub fn delete(&self, records: &[Record]) -> Result<Vec<Record>, Error> {
        self.for_each_group(records, |group| self.delete_group(group))
    }

    fn for_each_group<F>(&self, records: &[Record], mut apply: F) -> Result<Vec<Record>, Error>
    where
        F: FnMut(&Group) -> Result<Vec<Record>, Error>,
    {
        let mut done = Vec::new();
        for group in group(records, self.zone) {
            let mut records = apply(&group).map_err(|err| err.with_completed(&done))?;
            done.append(&mut records);
        }
        Ok(done)
    }

    fn append_group(&self, group: &Group) -> Result<Vec<Record>, Error> {
        let existing = self.existing(&group.key)?;

        let (mut values, mut present) = match &existing {
            None if group.records.len() == 1 => {
                let record = &group.records[0];
                let set = new_record_set(&group.key, record.ttl.as_secs(), rrset::marshal(record));
                self.submit(&group.key, ChangeAction::Create, set, self.config.should_wait_for_propagation())?;
                return Ok(vec![record.clone()]);
            }
            None => (Vec::new(), HashSet::new()),
            Some(set) => (set.values.clone(), self.stored_values(&group.key, set)?),
        };

        let mut added = Vec::new();
        for record in &group.records {
            if present.insert(record.value()) {
                values.extend(rrset::marshal(record));
                added.push(record.clone());
            }
        }

        if added.is_empty() {
            debug!(
                "All {} values of {} are already present",
                group.key.typ, group.key.name
            );
            return Ok(added);
        }

        let set = new_record_set(&group.key, added[0].ttl.as_secs(), values);
        self.submit(&group.key, ChangeAction::Upsert, set, self.config.should_wait_for_propagation())?;
        Ok(added)
    }

    fn set_group(&self, group: &Group) -> Result<Vec<Record>, Error> {
        let mut seen = HashSet::new();
        let records: Vec<Record> = group
            .records
            .iter()
            .filter(|record| seen.insert(record.value()))
            .cloned()
            .collect();
        let values = records.iter().flat_map(rrset::marshal).collect();

        let set = new_record_set(&group.key, records[0].ttl.as_secs(), values);
        self.submit(&group.key, ChangeAction::Upsert, set, self.config.should_wait_for_propagation())?;
        Ok(records)
    }

    fn delete_group(&self, group: &Group) -> Result<Vec<Record>, Error> {
        let Some(existing) = self.existing(&group.key)? else {
            debug!("No {} record set {} to delete from", group.key.typ, group.key.name);
            return Ok(Vec::new());
        };

        let stored = rrset::parse(&existing, self.zone).map_err(|err| err.in_group(&group.key, None))?;
        let doomed: HashSet<String> = group.records.iter().map(Record::value).collect();

        let mut removed = Vec::new();
        let mut remaining = Vec::new();
        for (raw, record) in existing.values.iter().zip(stored) {
            if doomed.contains(&record.value()) {
                removed.push(record);
            } else {
                remaining.push(raw.clone());
            }
        }

        if removed.is_empty() {
            debug!(
                "None of the requested values are stored in {} record set {}",
                group.key.typ, group.key.name
            );
            return Ok(removed);
        }

        let wait = self.config.should_wait_for_delete_propagation();
        if !remaining.is_empty() {
            let set = RecordSet {
                values: remaining,
                ..existing
            };
            self.submit(&group.key, ChangeAction::Upsert, set, wait)?;
            return Ok(removed);
        }

        match self.submit(&group.key, ChangeAction::Delete, existing, wait) {
            Err(err) if is_text_type(&group.key.typ) && matches!(err.root(), Error::InvalidChangeBatch(_)) => {
                // tolerated only if the set is really gone
                if self.existing(&group.key)?.is_some() {
                    return Err(err);
                }
                warn!(
                    "{} record set {} vanished before it could be deleted: {}",
                    group.key.typ,
                    group.key.name,
                    err.root()
                );
                Ok(removed)
            }
            Err(err) => Err(err),
            Ok(()) => Ok(removed),
        }
    }

    fn existing(&self, key: &GroupKey) -> Result<Option<RecordSet>, Error> {
        self.api
            .find_record_set(self.zone_id, &key.name, &key.typ)
            .map_err(|err| err.in_group(key, None))
    }

    fn stored_values(&self, key: &GroupKey, set: &RecordSet) -> Result<HashSet<String>, Error> {
        Ok(rrset::parse(set, self.zone)
            .map_err(|err| err.in_group(key, None))?
            .iter()
            .map(Record::value)
            .collect())
    }

    fn submit(&self, key: &GroupKey, action: ChangeAction, record_set: RecordSet, wait: bool) -> Result<(), Error> {
        debug!(
            "Submitting {} of {} record set {} with {} values",
            action,
            key.typ,
            key.name,
            record_set.values.len()
        );

        let change = Change { action, record_set };
        let change_id = self
            .api
            .apply(self.zone_id, &change)
            .map_err(|err| err.in_group(key, Some(action)))?;
        info!("{} of {} record set {} submitted as {}", action, key.typ, key.name, change_id);

        if wait {
            self.api
                .await_propagation(&change_id, self.config.max_wait())
                .map_err(|err| err.in_group(key, Some(action)))?;
            debug!("Change {} propagated", change_id);
        }
        Ok(())
    }
}

fn new_record_set(key: &GroupKey, ttl: u64, values: Vec<String>) -> RecordSet {
    RecordSet {
        name: key.name.clone(),
        typ: key.typ.clone(),
        ttl,
        values,
    }
}
