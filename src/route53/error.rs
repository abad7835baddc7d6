use std::time::Duration;

use thiserror::Error;

use super::{codec::DecodeError, group::GroupKey, remote::ChangeAction};
use crate::Record;

/// Represents every failure of the Route53 provider.
#[derive(Debug, Error)]
pub enum Error {
    /// Indicates that no hosted zone with the exact requested name exists.
    #[error("no hosted zone named {0}")]
    ZoneNotFound(String),

    /// Indicates that Route53 did not accept the zone name.
    #[error("invalid domain name: {0}")]
    InvalidDomainName(String),

    /// Indicates that Route53 rejected a request parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Indicates that Route53 rejected a composed change, e.g. because the record set to delete does not exist.
    #[error("invalid change batch: {0}")]
    InvalidChangeBatch(String),

    /// Indicates that another change to the same zone is still being applied.
    #[error("prior request not complete: {0}")]
    PriorRequestNotComplete(String),

    /// Indicates a malformed value in an existing record set.
    #[error("malformed {typ} value in record set {name}")]
    Decode {
        name: String,
        typ: String,
        #[source]
        source: DecodeError,
    },

    /// Indicates that a change was not reported as propagated within the configured maximum wait.
    #[error("change {change_id} did not propagate within {max_wait:?}")]
    Timeout {
        change_id: String,
        max_wait: Duration,
    },

    /// Wraps the failure of a single record set group.
    ///
    /// Groups are not applied atomically: `completed` holds the records committed by the groups processed before the
    /// failing one, the zone keeps those changes.
    #[error("reconciling {typ} record set {name} failed")]
    Group {
        name: String,
        typ: String,
        /// The change that was attempted, [`None`] if the group failed before a change was composed.
        action: Option<ChangeAction>,
        completed: Vec<Record>,
        #[source]
        source: Box<Error>,
    },

    /// Indicates that no AWS credentials could be found.
    #[error("no AWS credentials: {0}")]
    Credentials(String),

    /// Provides any other error returned by Route53.
    #[error("Route53 returned {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed Route53 XML: {0}")]
    Xml(String),
}

impl Error {
    /// Returns the underlying cause, looking through [`Error::Group`].
    pub fn root(&self) -> &Error {
        match self {
            Error::Group { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the records committed before the operation failed.
    pub fn completed(&self) -> &[Record] {
        match self {
            Error::Group { completed, .. } => completed,
            _ => &[],
        }
    }

    pub(crate) fn in_group(self, key: &GroupKey, action: Option<ChangeAction>) -> Self {
        if let Error::Group { .. } = self {
            return self;
        }
        Error::Group {
            name: key.name.clone(),
            typ: key.typ.clone(),
            action,
            completed: Vec::new(),
            source: Box::new(self),
        }
    }

    pub(crate) fn with_completed(mut self, records: &[Record]) -> Self {
        if let Error::Group { completed, .. } = &mut self {
            completed.extend_from_slice(records);
        }
        self
    }
}
