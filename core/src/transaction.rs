//! Transaction lifecycle for a single logical operation.
//!
//! [`TransactionManager`] is an explicit state machine:
//!
//! ```text
//!            begin()                 commit() / rollback()
//!   Idle ──────────────▶ Active(tx) ───────────────────────▶ Idle
//!                         │    ▲
//!                         └────┘ begin() returns the same tx
//! ```
//!
//! Commit or rollback from `Idle` fails with
//! [`TicketError::NoActiveTransaction`]. A manager is built per operation and
//! never shared; it holds no pooling logic of its own.

use crate::error::{Result, TicketError};
use crate::repository::{Database, TransactionHandle};

/// State of a [`TransactionManager`].
#[derive(Debug)]
pub enum TransactionState<T> {
    /// No transaction has been opened, or the last one has ended.
    Idle,
    /// A transaction is open.
    Active(T),
}

/// Begin/commit/rollback wrapper around at most one open transaction.
pub struct TransactionManager<D: Database> {
    database: D,
    state: TransactionState<D::Transaction>,
}

impl<D: Database> TransactionManager<D> {
    /// Create an idle manager bound to `database`.
    #[must_use]
    pub const fn new(database: D) -> Self {
        Self {
            database,
            state: TransactionState::Idle,
        }
    }

    /// Whether a transaction is currently open.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, TransactionState::Active(_))
    }

    /// Open a transaction, or return the one already open.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::PersistenceFailure`] if the backend cannot start
    /// a transaction. The manager stays idle in that case.
    pub async fn begin(&mut self) -> Result<&mut D::Transaction> {
        if matches!(self.state, TransactionState::Idle) {
            let tx = self.database.begin().await?;
            self.state = TransactionState::Active(tx);
        }

        match &mut self.state {
            TransactionState::Active(tx) => Ok(tx),
            TransactionState::Idle => Err(TicketError::NoActiveTransaction),
        }
    }

    /// Commit the open transaction and return to idle.
    ///
    /// # Errors
    ///
    /// - [`TicketError::NoActiveTransaction`] if nothing is open
    /// - [`TicketError::PersistenceFailure`] if the backend rejects the commit
    pub async fn commit(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, TransactionState::Idle) {
            TransactionState::Active(tx) => tx.commit().await,
            TransactionState::Idle => Err(TicketError::NoActiveTransaction),
        }
    }

    /// Roll back the open transaction and return to idle.
    ///
    /// # Errors
    ///
    /// - [`TicketError::NoActiveTransaction`] if nothing is open
    /// - [`TicketError::PersistenceFailure`] if the backend fails to roll back
    pub async fn rollback(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, TransactionState::Idle) {
            TransactionState::Active(tx) => tx.rollback().await,
            TransactionState::Idle => Err(TicketError::NoActiveTransaction),
        }
    }
}
