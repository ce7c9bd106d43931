//! # Error Types
//!
//! Failure taxonomy for the identify pipeline and the record store.
//! No error is swallowed or retried inside the core; everything propagates
//! to the caller.

use crate::model::ContactId;
use thiserror::Error;

/// Failures surfaced by a record store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot serve requests at all (connection loss, corrupt
    /// state, unreadable snapshot).
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// A write could not be committed.
    #[error("write conflict on record {0}")]
    WriteConflict(ContactId),

    /// A referenced record does not exist. Seen when a secondary carries a
    /// dangling `linked_id`.
    #[error("record {0} does not exist")]
    MissingRecord(ContactId),

    /// Attempted to create a record with neither an email nor a phone.
    #[error("a record needs at least one contact point")]
    EmptyRecord,
}

/// Failures surfaced by `identify`.
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// Neither email nor phone was supplied. Reported before any store
    /// access is attempted.
    #[error("an email or a phone number is required")]
    InvalidInput,

    #[error(transparent)]
    Store(#[from] StoreError),
}
