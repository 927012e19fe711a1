//! The `Ticket` aggregate root and its read-only projection.
//!
//! All invariant-preserving mutations flow through [`Ticket`]. The only
//! business mutation is [`Ticket::decrement_allocation`]; everything else is
//! bookkeeping performed by storage adapters when a ticket is persisted or
//! loaded.

use crate::error::{Result, TicketError};
use crate::value_object::{Allocation, Description, Name};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage-assigned ticket identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(i64);

impl TicketId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate root for a purchasable ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    id: Option<TicketId>,
    name: Name,
    description: Description,
    allocation: Allocation,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Build a new, not yet persisted ticket.
    ///
    /// Fields are validated in order name, description, allocation; the first
    /// invalid one aborts construction.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::ValidationFailed`] naming the first invalid field.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        allocation: i32,
    ) -> Result<Self> {
        let name = Name::new(name)?;
        let description = Description::new(description)?;
        let allocation = Allocation::new(allocation)?;

        Ok(Self {
            id: None,
            name,
            description,
            allocation,
            created_at: None,
            updated_at: None,
        })
    }

    /// Rebuild a ticket from stored values.
    ///
    /// Used by storage adapters; no validation is re-run.
    #[must_use]
    pub const fn restore(
        id: TicketId,
        name: Name,
        description: Description,
        allocation: Allocation,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            name,
            description,
            allocation,
            created_at: Some(created_at),
            updated_at: Some(updated_at),
        }
    }

    /// Identifier, once storage has assigned one.
    #[must_use]
    pub const fn id(&self) -> Option<TicketId> {
        self.id
    }

    /// Ticket name.
    #[must_use]
    pub const fn name(&self) -> &Name {
        &self.name
    }

    /// Ticket description.
    #[must_use]
    pub const fn description(&self) -> &Description {
        &self.description
    }

    /// Remaining allocation.
    #[must_use]
    pub const fn allocation(&self) -> Allocation {
        self.allocation
    }

    /// Creation timestamp, once persisted.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Last update timestamp, once persisted.
    #[must_use]
    pub const fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Record the identifier and timestamps storage assigned on insert.
    pub fn record_created(
        &mut self,
        id: TicketId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) {
        self.id = Some(id);
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }

    /// Record the timestamp storage set on update.
    pub fn record_updated(&mut self, updated_at: DateTime<Utc>) {
        self.updated_at = Some(updated_at);
    }

    /// Take `amount` off the remaining allocation.
    ///
    /// The entity is left unchanged on failure. Persisting the new state is
    /// the caller's job.
    ///
    /// # Errors
    ///
    /// - [`TicketError::ValidationFailed`] if `amount` is not positive
    /// - [`TicketError::InsufficientAllocation`] if the allocation is already
    ///   zero or smaller than `amount`
    pub fn decrement_allocation(&mut self, amount: i32) -> Result<()> {
        if amount <= 0 {
            return Err(TicketError::validation(
                "amount",
                "Amount must be greater than zero",
            ));
        }

        let available = self.allocation.value();
        if self.allocation.is_zero() || available < amount {
            return Err(TicketError::InsufficientAllocation {
                requested: amount,
                available,
            });
        }

        self.allocation = Allocation::new(available - amount)?;
        Ok(())
    }
}

/// Read-only projection of a ticket returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDto {
    /// Ticket identifier.
    pub id: i64,
    /// Ticket name.
    pub name: String,
    /// Ticket description.
    pub description: String,
    /// Remaining allocation.
    pub allocation: i32,
}

impl TicketDto {
    /// Project a persisted ticket.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::PersistenceFailure`] if storage never assigned
    /// an identifier to `ticket`.
    pub fn from_entity(ticket: &Ticket) -> Result<Self> {
        let id = ticket
            .id()
            .ok_or_else(|| TicketError::persistence("ticket has no storage identifier"))?;

        Ok(Self {
            id: id.get(),
            name: ticket.name().value().to_string(),
            description: ticket.description().value().to_string(),
            allocation: ticket.allocation().value(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ticket(allocation: i32) -> Ticket {
        Ticket::new("Test Ticket", "Test Description", allocation).unwrap()
    }

    #[test]
    fn new_ticket_has_no_id() {
        let t = ticket(10);
        assert_eq!(t.id(), None);
        assert_eq!(t.name().value(), "Test Ticket");
        assert_eq!(t.description().value(), "Test Description");
        assert_eq!(t.allocation().value(), 10);
    }

    #[test]
    fn new_ticket_stops_at_first_invalid_field() {
        let err = Ticket::new("", "", -1).unwrap_err();
        assert!(matches!(
            err,
            TicketError::ValidationFailed { field: "name", .. }
        ));

        let err = Ticket::new("Test Ticket", "", -1).unwrap_err();
        assert!(matches!(
            err,
            TicketError::ValidationFailed {
                field: "description",
                ..
            }
        ));

        let err = Ticket::new("Test Ticket", "Test Description", -1).unwrap_err();
        assert!(matches!(
            err,
            TicketError::ValidationFailed {
                field: "allocation",
                ..
            }
        ));
    }

    #[test]
    fn decrement_succeeds() {
        let mut t = ticket(10);
        t.decrement_allocation(5).unwrap();
        assert_eq!(t.allocation().value(), 5);
    }

    #[test]
    fn decrement_beyond_allocation_leaves_ticket_unchanged() {
        let mut t = ticket(10);
        let err = t.decrement_allocation(15).unwrap_err();
        assert_eq!(
            err,
            TicketError::InsufficientAllocation {
                requested: 15,
                available: 10
            }
        );
        assert_eq!(t.allocation().value(), 10);
    }

    #[test]
    fn decrement_to_zero_then_fails() {
        let mut t = ticket(10);
        t.decrement_allocation(10).unwrap();
        assert!(t.allocation().is_zero());

        let err = t.decrement_allocation(1).unwrap_err();
        assert!(matches!(err, TicketError::InsufficientAllocation { .. }));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut t = ticket(10);
        let err = t.decrement_allocation(0).unwrap_err();
        assert!(matches!(
            err,
            TicketError::ValidationFailed { field: "amount", .. }
        ));
        assert_eq!(t.allocation().value(), 10);
    }

    #[test]
    fn dto_requires_identifier() {
        let t = ticket(100);
        assert!(matches!(
            TicketDto::from_entity(&t),
            Err(TicketError::PersistenceFailure(_))
        ));
    }

    #[test]
    fn dto_projects_fields() {
        let mut t = Ticket::new("example", "sample description", 100).unwrap();
        let now = Utc::now();
        t.record_created(TicketId::new(1), now, now);

        let dto = TicketDto::from_entity(&t).unwrap();
        assert_eq!(
            dto,
            TicketDto {
                id: 1,
                name: "example".to_string(),
                description: "sample description".to_string(),
                allocation: 100,
            }
        );
    }

    proptest! {
        #[test]
        fn decrement_succeeds_iff_within_allocation(
            allocation in 0..10_000i32,
            amount in 1..20_000i32,
        ) {
            let mut t = ticket(allocation);
            let result = t.decrement_allocation(amount);

            if amount <= allocation {
                prop_assert!(result.is_ok());
                prop_assert_eq!(t.allocation().value(), allocation - amount);
            } else {
                prop_assert!(
                    matches!(result, Err(TicketError::InsufficientAllocation { .. })),
                    "expected InsufficientAllocation",
                );
                prop_assert_eq!(t.allocation().value(), allocation);
            }
        }
    }
}
