//! An in-memory Route53 for tests.

use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use super::{
    remote::{Change, ChangeAction, ChangeApplier, Cursor, HostedZone, Page, PageFetcher, ZoneLookup},
    rrset::RecordSet,
    Error,
};

pub(crate) const ZONE: &str = "example.com.";
pub(crate) const ZONE_ID: &str = "Z0EXAMPLE";

type Key = (String, String);

#[derive(Default)]
struct State {
    zones: Vec<HostedZone>,
    sets: BTreeMap<Key, RecordSet>,
    changes: Vec<Change>,
    waits: Vec<(String, Duration)>,
    failures: Vec<(usize, Error)>,
    vanishing: Vec<usize>,
    applied: usize,
    pages: usize,
    stuck: bool,
}

/// Behaves like a single Route53 hosted zone: CREATE fails on existing sets, DELETE has to match the stored set
/// exactly, and listings are paginated.
pub(crate) struct FakeRoute53 {
    state: Mutex<State>,
    page_size: usize,
}

impl FakeRoute53 {
    pub(crate) fn new() -> Self {
        Self::with_page_size(100)
    }

    pub(crate) fn with_page_size(page_size: usize) -> Self {
        let state = State {
            zones: vec![HostedZone {
                id: format!("/hostedzone/{}", ZONE_ID),
                name: ZONE.to_owned(),
                private: false,
            }],
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
            page_size,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn insert(&self, name: &str, typ: &str, ttl: u64, values: &[&str]) {
        let set = RecordSet {
            name: name.to_owned(),
            typ: typ.to_owned(),
            ttl,
            values: values.iter().map(|v| (*v).to_owned()).collect(),
        };
        self.state().sets.insert(key(&set.name, &set.typ), set);
    }

    pub(crate) fn get(&self, name: &str, typ: &str) -> Option<RecordSet> {
        self.state().sets.get(&key(name, typ)).cloned()
    }

    pub(crate) fn changes(&self) -> Vec<Change> {
        self.state().changes.clone()
    }

    pub(crate) fn waits(&self) -> Vec<(String, Duration)> {
        self.state().waits.clone()
    }

    pub(crate) fn pages_fetched(&self) -> usize {
        self.state().pages
    }

    /// Makes the `index`th change call (counting from zero) fail with `error` without applying it.
    pub(crate) fn fail_change(&self, index: usize, error: Error) {
        self.state().failures.push((index, error));
    }

    /// Removes the target record set right before the `index`th change call is applied, as a concurrent client
    /// would.
    pub(crate) fn remove_before_change(&self, index: usize) {
        self.state().vanishing.push(index);
    }

    /// Makes every propagation wait time out.
    pub(crate) fn never_propagate(&self) {
        self.state().stuck = true;
    }
}

fn key(name: &str, typ: &str) -> Key {
    let name = name.replace(r"\052", "*").to_ascii_lowercase();
    let name = if name.ends_with('.') { name } else { format!("{}.", name) };
    (name, typ.to_ascii_uppercase())
}

fn invalid(message: String) -> Error {
    Error::InvalidChangeBatch(message)
}

impl ZoneLookup for FakeRoute53 {
    fn find_zones_by_name(&self, name: &str) -> Result<Vec<HostedZone>, Error> {
        let name = name.trim_end_matches('.');
        Ok(self
            .state()
            .zones
            .iter()
            .filter(|zone| zone.name.trim_end_matches('.') >= name)
            .cloned()
            .collect())
    }
}

impl PageFetcher for FakeRoute53 {
    fn list_record_sets(&self, zone_id: &str, start: Option<&Cursor>) -> Result<Page, Error> {
        let mut state = self.state();
        if zone_id != ZONE_ID {
            return Err(Error::ZoneNotFound(zone_id.to_owned()));
        }
        state.pages += 1;

        let lower = match start {
            Some(cursor) => {
                let (name, _) = key(&cursor.name, "");
                Bound::Included((name, cursor.typ.clone().unwrap_or_default().to_ascii_uppercase()))
            }
            None => Bound::Unbounded,
        };

        let mut remaining = state.sets.range((lower, Bound::Unbounded)).map(|(_, set)| set);
        let record_sets: Vec<RecordSet> = remaining.by_ref().take(self.page_size).cloned().collect();
        let next = remaining.next().map(|set| Cursor {
            name: set.name.clone(),
            typ: Some(set.typ.clone()),
            identifier: None,
        });

        Ok(Page { record_sets, next })
    }
}

impl ChangeApplier for FakeRoute53 {
    fn apply(&self, zone_id: &str, change: &Change) -> Result<String, Error> {
        let mut state = self.state();
        let index = state.applied;
        state.applied += 1;

        if let Some(position) = state.failures.iter().position(|(at, _)| *at == index) {
            return Err(state.failures.remove(position).1);
        }
        if zone_id != ZONE_ID {
            return Err(Error::ZoneNotFound(zone_id.to_owned()));
        }

        let set = &change.record_set;
        if set.values.is_empty() {
            return Err(Error::InvalidInput("resource records must not be empty".to_owned()));
        }
        let k = key(&set.name, &set.typ);
        if state.vanishing.contains(&index) {
            state.sets.remove(&k);
        }

        match change.action {
            ChangeAction::Create | ChangeAction::Upsert => {
                if change.action == ChangeAction::Create && state.sets.contains_key(&k) {
                    return Err(invalid(format!(
                        "Tried to create resource record set [name='{}', type='{}'] but it already exists",
                        k.0, k.1
                    )));
                }
                for (i, value) in set.values.iter().enumerate() {
                    if set.values[..i].contains(value) {
                        return Err(invalid(format!("Duplicate Resource Record: '{}'", value)));
                    }
                }
                state.sets.insert(k, set.clone());
            }
            ChangeAction::Delete => match state.sets.get(&k) {
                None => {
                    return Err(invalid(format!(
                        "Tried to delete resource record set [name='{}', type='{}'] but it was not found",
                        k.0, k.1
                    )))
                }
                Some(stored) if stored.ttl != set.ttl || stored.values != set.values => {
                    return Err(invalid(format!(
                        "Tried to delete resource record set [name='{}', type='{}'] but the values provided do not match the current values",
                        k.0, k.1
                    )))
                }
                Some(_) => {
                    state.sets.remove(&k);
                }
            },
        }

        state.changes.push(change.clone());
        Ok(format!("/change/C{}", state.changes.len()))
    }

    fn await_propagation(&self, change_id: &str, max_wait: Duration) -> Result<(), Error> {
        let mut state = self.state();
        state.waits.push((change_id.to_owned(), max_wait));
        if state.stuck {
            return Err(Error::Timeout {
                change_id: change_id.to_owned(),
                max_wait,
            });
        }
        Ok(())
    }
}
