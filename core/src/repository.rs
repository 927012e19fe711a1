//! Persistence contracts for tickets.
//!
//! Three traits describe a storage backend:
//!
//! - [`Database`]: the connection handle a transaction is opened against
//! - [`TransactionHandle`]: one open transaction, consumed by commit/rollback
//! - [`TicketRepository`]: row/entity translation, including the locked read
//!
//! # Implementations
//!
//! - `PgTicketRepository` (in `ticketing-postgres`): production backend
//! - `InMemoryTicketRepository` (in `ticketing-testing`): fast, deterministic tests
//!
//! # Cancellation
//!
//! Implementations must roll back a [`TransactionHandle`] that is dropped
//! without being committed. A caller whose future is cancelled mid-purchase
//! therefore never leaves a transaction (or a row lock) behind.

use crate::error::Result;
use crate::ticket::{Ticket, TicketId};
use std::future::Future;

/// An open transaction.
pub trait TransactionHandle: Send {
    /// Make every write performed in this transaction durable.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::PersistenceFailure`](crate::TicketError::PersistenceFailure)
    /// if the backend rejects the commit.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    /// Discard every write performed in this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::PersistenceFailure`](crate::TicketError::PersistenceFailure)
    /// if the backend fails to roll back.
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}

/// Connection handle transactions are opened against.
pub trait Database: Send + Sync {
    /// Transaction type produced by [`Database::begin`].
    type Transaction: TransactionHandle;

    /// Open a new transaction.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::PersistenceFailure`](crate::TicketError::PersistenceFailure)
    /// if the backend cannot start one.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;
}

/// Shorthand for a repository's transaction type.
pub type TransactionOf<R> = <<R as TicketRepository>::Database as Database>::Transaction;

/// Storage boundary for [`Ticket`] aggregates.
///
/// Reads never return soft-deleted rows.
pub trait TicketRepository: Send + Sync {
    /// Connection handle type.
    type Database: Database;

    /// Connection handle bound to this repository, used to open transactions.
    fn database(&self) -> Self::Database;

    /// Insert `ticket` and record the generated identifier on it.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::PersistenceFailure`](crate::TicketError::PersistenceFailure)
    /// on constraint or connectivity errors.
    fn create(&self, ticket: &mut Ticket) -> impl Future<Output = Result<()>> + Send;

    /// Load a ticket outside of any transaction.
    ///
    /// # Errors
    ///
    /// - [`TicketError::TicketNotFound`](crate::TicketError::TicketNotFound) if no row matches
    /// - [`TicketError::PersistenceFailure`](crate::TicketError::PersistenceFailure) otherwise
    fn find_by_id(&self, id: TicketId) -> impl Future<Output = Result<Ticket>> + Send;

    /// Load a ticket inside `tx`, holding a row lock until `tx` ends.
    ///
    /// Concurrent callers for the same `id` block here until the holder's
    /// transaction commits or rolls back.
    ///
    /// # Errors
    ///
    /// Same as [`TicketRepository::find_by_id`].
    fn find_by_id_for_update(
        &self,
        id: TicketId,
        tx: &mut <Self::Database as Database>::Transaction,
    ) -> impl Future<Output = Result<Ticket>> + Send;

    /// Persist the full current state of `ticket` inside `tx`.
    ///
    /// # Errors
    ///
    /// - [`TicketError::TicketNotFound`](crate::TicketError::TicketNotFound) if the row vanished
    /// - [`TicketError::PersistenceFailure`](crate::TicketError::PersistenceFailure) otherwise
    fn update(
        &self,
        ticket: &mut Ticket,
        tx: &mut <Self::Database as Database>::Transaction,
    ) -> impl Future<Output = Result<()>> + Send;
}
