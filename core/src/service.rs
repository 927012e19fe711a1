//! Ticket use cases.
//!
//! [`TicketService`] is the only place that orchestrates repositories and
//! transactions. Create and read are single repository calls; a purchase is
//! a locked read-modify-write cycle:
//!
//! ```text
//! begin ─▶ find_by_id_for_update (row lock) ─▶ decrement_allocation ─▶ update ─▶ commit
//!              │                                   │                     │
//!              └──────────────── rollback, then return the original error ┘
//! ```
//!
//! The row lock serializes concurrent purchases of the same ticket: the
//! second purchaser blocks until the first transaction ends and then reads
//! the already decremented allocation. The entity check is a second safety
//! net, independent of locking.
//!
//! A purchase deadline ([`TicketService::with_purchase_timeout`]) bounds the
//! locked section. When it expires the pending lock wait or database call is
//! abandoned and the transaction is rolled back before the error is returned.

use crate::error::{Result, TicketError};
use crate::repository::{TicketRepository, TransactionOf};
use crate::telemetry;
use crate::ticket::{Ticket, TicketDto, TicketId};
use crate::transaction::TransactionManager;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Input for [`TicketService::create`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTicket {
    /// Ticket name.
    pub name: String,
    /// Ticket description.
    pub description: String,
    /// Initial allocation.
    pub allocation: i32,
}

/// Orchestrates ticket use cases over a [`TicketRepository`].
#[derive(Clone, Debug)]
pub struct TicketService<R> {
    repository: R,
    purchase_timeout: Option<Duration>,
}

impl<R: TicketRepository> TicketService<R> {
    /// Create a service backed by `repository`.
    #[must_use]
    pub const fn new(repository: R) -> Self {
        Self {
            repository,
            purchase_timeout: None,
        }
    }

    /// Bound each purchase's locked section by `timeout`.
    #[must_use]
    pub fn with_purchase_timeout(mut self, timeout: Duration) -> Self {
        self.purchase_timeout = Some(timeout);
        self
    }

    /// Create and persist a ticket.
    ///
    /// # Errors
    ///
    /// - [`TicketError::ValidationFailed`] for an invalid field
    /// - [`TicketError::PersistenceFailure`] if the insert fails
    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: CreateTicket) -> Result<TicketDto> {
        let mut ticket = Ticket::new(request.name, request.description, request.allocation)?;
        self.repository.create(&mut ticket).await?;

        let dto = TicketDto::from_entity(&ticket)?;
        metrics::counter!(telemetry::TICKETS_CREATED).increment(1);
        tracing::info!(ticket_id = dto.id, allocation = dto.allocation, "Ticket created");

        Ok(dto)
    }

    /// Read a ticket.
    ///
    /// # Errors
    ///
    /// - [`TicketError::TicketNotFound`] if no ticket has this identifier
    /// - [`TicketError::PersistenceFailure`] if the read fails
    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: TicketId) -> Result<TicketDto> {
        let ticket = self.repository.find_by_id(id).await?;
        TicketDto::from_entity(&ticket)
    }

    /// Purchase `amount` units of a ticket.
    ///
    /// Runs in its own transaction holding the ticket's row lock. Every
    /// failure after `begin` rolls back before the original error is
    /// returned; a rollback failure is logged, never substituted.
    ///
    /// # Errors
    ///
    /// - [`TicketError::TicketNotFound`] if no ticket has this identifier
    /// - [`TicketError::InsufficientAllocation`] if not enough is left
    /// - [`TicketError::ValidationFailed`] if `amount` is not positive
    /// - [`TicketError::PersistenceFailure`] if begin, read, update or commit
    ///   fails, or the purchase deadline expires
    #[tracing::instrument(skip(self))]
    pub async fn decrement_allocation(&self, ticket_id: TicketId, amount: i32) -> Result<()> {
        let mut transactions = TransactionManager::new(self.repository.database());
        let tx = transactions.begin().await?;

        let outcome = match self.purchase_timeout {
            Some(limit) => tokio::time::timeout(limit, self.decrement_locked(ticket_id, amount, tx))
                .await
                .unwrap_or_else(|_| {
                    Err(TicketError::persistence(format!(
                        "purchase deadline of {}ms exceeded",
                        limit.as_millis()
                    )))
                }),
            None => self.decrement_locked(ticket_id, amount, tx).await,
        };

        let remaining = match outcome {
            Ok(remaining) => remaining,
            Err(err) => {
                match transactions.rollback().await {
                    Ok(()) => metrics::counter!(telemetry::ROLLBACKS).increment(1),
                    Err(rollback_err) => tracing::warn!(
                        ticket_id = %ticket_id,
                        error = %rollback_err,
                        "Rollback failed after aborted purchase"
                    ),
                }
                metrics::counter!(telemetry::PURCHASES, "outcome" => outcome_label(&err))
                    .increment(1);
                tracing::info!(ticket_id = %ticket_id, amount, error = %err, "Purchase rejected");
                return Err(err);
            }
        };

        if let Err(err) = transactions.commit().await {
            metrics::counter!(telemetry::PURCHASES, "outcome" => outcome_label(&err)).increment(1);
            tracing::error!(ticket_id = %ticket_id, error = %err, "Purchase commit failed");
            return Err(err);
        }

        metrics::counter!(telemetry::PURCHASES, "outcome" => "succeeded").increment(1);
        metrics::counter!(telemetry::TICKETS_SOLD).increment(u64::from(amount.unsigned_abs()));
        tracing::info!(ticket_id = %ticket_id, amount, remaining, "Purchase committed");

        Ok(())
    }

    /// Lock, decrement and write back. Returns the remaining allocation.
    async fn decrement_locked(
        &self,
        ticket_id: TicketId,
        amount: i32,
        tx: &mut TransactionOf<R>,
    ) -> Result<i32> {
        let mut ticket = self.repository.find_by_id_for_update(ticket_id, tx).await?;
        ticket.decrement_allocation(amount)?;
        self.repository.update(&mut ticket, tx).await?;
        Ok(ticket.allocation().value())
    }
}

const fn outcome_label(err: &TicketError) -> &'static str {
    match err {
        TicketError::InsufficientAllocation { .. } => "insufficient",
        TicketError::TicketNotFound(_) => "not_found",
        TicketError::ValidationFailed { .. } => "invalid",
        TicketError::PersistenceFailure(_) | TicketError::NoActiveTransaction => "failed",
    }
}
