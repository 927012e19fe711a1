//! Error types for ticket operations.
//!
//! A single error enum flows from the value objects, through the entity and
//! the repository, up to the service. Each layer returns these variants
//! unchanged; translation into transport status codes happens at the HTTP
//! boundary.

use crate::ticket::TicketId;
use thiserror::Error;

/// Result alias for ticket operations.
pub type Result<T> = std::result::Result<T, TicketError>;

/// Errors that can occur while creating, reading or purchasing tickets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// Input did not satisfy a value-object or request constraint.
    #[error("{message}")]
    ValidationFailed {
        /// The field that failed validation.
        field: &'static str,
        /// Human-readable reason.
        message: String,
    },

    /// No (non-deleted) ticket exists with the given identifier.
    #[error("ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// The ticket does not have enough allocation left for the purchase.
    #[error("insufficient allocation: requested {requested}, available {available}")]
    InsufficientAllocation {
        /// Amount the caller tried to purchase.
        requested: i32,
        /// Allocation remaining on the ticket.
        available: i32,
    },

    /// The storage backend failed (connectivity, constraint, commit...).
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// Commit or rollback was requested while no transaction was open.
    #[error("no active transaction")]
    NoActiveTransaction,
}

impl TicketError {
    /// Create a validation error for `field`.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field,
            message: message.into(),
        }
    }

    /// Create a persistence error from any displayable backend error.
    #[must_use]
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::PersistenceFailure(err.to_string())
    }
}
