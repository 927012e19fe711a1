//! # Ticketing Core
//!
//! Domain model and use cases for the ticketing service.
//!
//! ## Core Concepts
//!
//! - **Value objects**: [`Name`], [`Description`], [`Allocation`], self-validating
//!   and compared by value
//! - **Aggregate root**: [`Ticket`], through which every allocation change flows
//! - **Repository**: [`TicketRepository`], the storage boundary with a locked read
//! - **Transaction manager**: [`TransactionManager`], an `Idle | Active` state machine
//! - **Service**: [`TicketService`], orchestration of create, read and purchase
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        TicketService         │  ← use cases, transaction lifecycle
//! ├──────────────┬───────────────┤
//! │    Ticket    │ Transaction   │  ← invariants   │ begin/commit/rollback
//! │ (aggregate)  │   Manager     │
//! ├──────────────┴───────────────┤
//! │ TicketRepository / Database  │  ← traits; Postgres and in-memory adapters
//! └──────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use ticketing_core::{CreateTicket, TicketService};
//!
//! let service = TicketService::new(repository);
//! let ticket = service
//!     .create(CreateTicket {
//!         name: "example".into(),
//!         description: "sample description".into(),
//!         allocation: 100,
//!     })
//!     .await?;
//!
//! service.decrement_allocation(TicketId::new(ticket.id), 10).await?;
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod repository;
pub mod service;
pub mod telemetry;
pub mod ticket;
pub mod transaction;
pub mod value_object;

pub use error::{Result, TicketError};
pub use repository::{Database, TicketRepository, TransactionHandle, TransactionOf};
pub use service::{CreateTicket, TicketService};
pub use ticket::{Ticket, TicketDto, TicketId};
pub use transaction::{TransactionManager, TransactionState};
pub use value_object::{Allocation, Description, Name, StoredValue, ValueObject};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Environment module - Injected dependencies
///
/// Storage adapters that stamp rows themselves (rather than relying on the
/// database clock) take a [`Clock`](environment::Clock) so tests can pin time.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - Abstraction over time
    ///
    /// # Example
    ///
    /// ```
    /// use ticketing_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock using system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
