//! The AWS Route53 provider.
//!
//! Route53 stores every value of a name and type in one record set and only accepts changes of whole record sets.
//! [`Route53Provider`] maps the per-record capabilities of this crate onto that model: it reads the affected
//! record sets, merges the requested records into them and submits one change per record set.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use libdns_route53::{route53::{Config, Route53Provider}, Record, RecordAppender, RecordData};
//!
//! let provider = Route53Provider::new(Config {
//!     wait_for_propagation: true,
//!     ..Config::default()
//! })?;
//! provider.append_records(
//!     "example.com.",
//!     &[Record::new("_acme-challenge", RecordData::TXT("token".to_owned()), Duration::from_secs(60))],
//! )?;
//! # Ok::<(), libdns_route53::route53::Error>(())
//! ```

use tracing::debug;

use crate::{Record, RecordAppender, RecordDeleter, RecordGetter, RecordSetter};

pub mod api;
mod codec;
mod config;
mod credentials;
mod error;
mod group;
mod reconcile;
pub mod remote;
mod rrset;
mod sigv4;
#[cfg(test)]
mod testing;
mod zone;

pub use codec::DecodeError;
pub use config::{Config, DeletePropagation};
pub use credentials::Credentials;
pub use error::Error;
pub use remote::{Change, ChangeAction, Route53Api};
pub use rrset::RecordSet;
pub use zone::normalize_zone;

use reconcile::Reconciler;

/// Manages the records of Route53 hosted zones.
pub struct Route53Provider<A = api::Client> {
    config: Config,
    api: A,
}

impl Route53Provider {
    /// Creates a provider talking to the Route53 API with the resolved credentials.
    pub fn new(config: Config) -> Result<Self, Error> {
        let api = api::Client::new(&config)?;
        Ok(Self { config, api })
    }
}

impl<A: Route53Api> Route53Provider<A> {
    /// Creates a provider using a custom [`Route53Api`] implementation.
    pub fn with_api(config: Config, api: A) -> Self {
        Self { config, api }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn reconcile<F>(&self, zone: &str, apply: F) -> Result<Vec<Record>, Error>
    where
        F: FnOnce(&Reconciler<'_, A>) -> Result<Vec<Record>, Error>,
    {
        let zone = normalize_zone(zone)?;
        let zone_id = zone::resolve_zone_id(&self.api, &self.config, &zone)?;
        apply(&Reconciler::new(&self.api, &self.config, &zone, &zone_id))
    }
}

impl<A: Route53Api> RecordGetter for Route53Provider<A> {
    type Error = Error;

    fn get_records(&self, zone: &str) -> Result<Vec<Record>, Self::Error> {
        let zone = normalize_zone(zone)?;
        let zone_id = zone::resolve_zone_id(&self.api, &self.config, &zone)?;

        let mut records = Vec::new();
        for set in self.api.list_all_record_sets(&zone_id)? {
            records.extend(rrset::parse(&set, &zone)?);
        }

        debug!("Retrieved {} records of zone {}", records.len(), zone);
        Ok(records)
    }
}

impl<A: Route53Api> RecordAppender for Route53Provider<A> {
    fn append_records(&self, zone: &str, records: &[Record]) -> Result<Vec<Record>, Self::Error> {
        self.reconcile(zone, |reconciler| reconciler.append(records))
    }
}

impl<A: Route53Api> RecordSetter for Route53Provider<A> {
    fn set_records(&self, zone: &str, records: &[Record]) -> Result<Vec<Record>, Self::Error> {
        self.reconcile(zone, |reconciler| reconciler.set(records))
    }
}

impl<A: Route53Api> RecordDeleter for Route53Provider<A> {
    fn delete_records(&self, zone: &str, records: &[Record]) -> Result<Vec<Record>, Self::Error> {
        self.reconcile(zone, |reconciler| reconciler.delete(records))
    }
}
