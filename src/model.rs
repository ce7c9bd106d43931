//! # Data Model
//!
//! Core data structures for contact identity resolution: record identifiers,
//! link precedence, the contact record itself, and the observation that
//! drives one pass through the identify pipeline.

use crate::error::IdentifyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact identifier for contact records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub u32);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Creation timestamp as UTC epoch milliseconds.
///
/// The store assigns these strictly monotonically, so `created_at` is a
/// total order over records and the sole tie-break for canonical selection.
pub type Timestamp = i64;

/// Link precedence of a record within its cluster.
///
/// Exactly one record per cluster is `Primary`; every other member is
/// `Secondary` and carries a `linked_id` pointing at that primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precedence {
    Primary,
    Secondary,
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precedence::Primary => write!(f, "primary"),
            Precedence::Secondary => write!(f, "secondary"),
        }
    }
}

/// A single contact record.
///
/// `email`, `phone`, and `created_at` never change after creation.
/// `precedence`/`linked_id` change at most once per merge event, from
/// primary to secondary, when an older primary absorbs this record's
/// cluster. Records are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: ContactId,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub precedence: Precedence,
    /// Present iff `precedence == Secondary`; always references a primary.
    pub linked_id: Option<ContactId>,
    pub created_at: Timestamp,
}

impl ContactRecord {
    pub fn is_primary(&self) -> bool {
        self.precedence == Precedence::Primary
    }

    /// The id of this record's cluster root: itself when primary, otherwise
    /// the primary it links to. Falls back to the record's own id if a
    /// secondary has no `linked_id`, which only a corrupt store produces.
    pub fn root_id(&self) -> ContactId {
        match self.precedence {
            Precedence::Primary => self.id,
            Precedence::Secondary => self.linked_id.unwrap_or(self.id),
        }
    }

    /// True if at least one of email/phone is present and non-empty.
    pub fn has_contact_point(&self) -> bool {
        self.email.as_deref().is_some_and(|v| !v.is_empty())
            || self.phone.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// One identify request's (email, phone) pair.
///
/// Construction validates that at least one field is supplied; empty
/// strings count as absent. Values are matched verbatim, with no trimming
/// or case folding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    email: Option<String>,
    phone: Option<String>,
}

impl Observation {
    /// Create an observation, rejecting the empty pair before any store
    /// access can happen.
    pub fn new(email: Option<String>, phone: Option<String>) -> Result<Self, IdentifyError> {
        let email = email.filter(|v| !v.is_empty());
        let phone = phone.filter(|v| !v.is_empty());
        if email.is_none() && phone.is_none() {
            return Err(IdentifyError::InvalidInput);
        }
        Ok(Self { email, phone })
    }

    pub fn from_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            phone: None,
        }
    }

    pub fn from_phone(phone: impl Into<String>) -> Self {
        Self {
            email: None,
            phone: Some(phone.into()),
        }
    }

    pub fn from_pair(email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            phone: Some(phone.into()),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    /// The contact-point values this observation can touch, used to key
    /// lock acquisition.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.email.as_deref().into_iter().chain(self.phone.as_deref())
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})",
            self.email.as_deref().unwrap_or("-"),
            self.phone.as_deref().unwrap_or("-")
        )
    }
}
