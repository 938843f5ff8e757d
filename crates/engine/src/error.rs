//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when the input has a bad shape or value.
//! - [`NotFound`] thrown when a record is absent.
//! - [`AlreadyExists`] thrown when a create collides with an existing key.
//! - [`Conflict`] thrown when an update lost an optimistic-concurrency race.
//! - [`BatchWriteFailed`] thrown when a batch chunk exhausted its retries.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`NotFound`]: EngineError::NotFound
//!  [`AlreadyExists`]: EngineError::AlreadyExists
//!  [`Conflict`]: EngineError::Conflict
//!  [`BatchWriteFailed`]: EngineError::BatchWriteFailed
use thiserror::Error;

use crate::{item::DecodeError, store::StoreError};

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("\"{0}\" already present!")]
    AlreadyExists(String),
    #[error("{0} was modified by another process, retry")]
    Conflict(String),
    /// Items `first..=last` of the batch input were submitted in the failing
    /// chunk; `unprocessed` of them were never acknowledged by the store.
    /// Chunks before `first` are committed.
    #[error("batch write of items {first}-{last} failed: {unprocessed} unprocessed after retries")]
    BatchWriteFailed {
        first: usize,
        last: usize,
        unprocessed: usize,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("failed to {context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    /// Wrap a store error with the name of the operation that hit it.
    pub(crate) fn store(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { context, source }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::AlreadyExists(a), Self::AlreadyExists(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (
                Self::BatchWriteFailed {
                    first: a1,
                    last: a2,
                    unprocessed: a3,
                },
                Self::BatchWriteFailed {
                    first: b1,
                    last: b2,
                    unprocessed: b3,
                },
            ) => a1 == b1 && a2 == b2 && a3 == b3,
            (Self::Decode(a), Self::Decode(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (
                Self::Store {
                    context: a,
                    source: sa,
                },
                Self::Store {
                    context: b,
                    source: sb,
                },
            ) => a == b && sa.to_string() == sb.to_string(),
            _ => false,
        }
    }
}
