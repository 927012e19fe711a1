//! # Ticketing Testing
//!
//! Testing utilities for the ticketing service.
//!
//! This crate provides:
//! - [`InMemoryTicketRepository`]: a repository with real row locks and
//!   staged, commit-on-success writes
//! - Deterministic [`FixedClock`]
//! - proptest strategies for ticket inputs
//! - A tracing subscriber that writes through the test harness
//!
//! ## Example
//!
//! ```ignore
//! use ticketing_core::TicketService;
//! use ticketing_testing::{Fault, InMemoryTicketRepository};
//!
//! #[tokio::test]
//! async fn commit_failure_is_reported() {
//!     let repository = InMemoryTicketRepository::new();
//!     let service = TicketService::new(repository.clone());
//!     let ticket = service.create(example()).await.unwrap();
//!
//!     repository.inject(Fault::Commit);
//!     assert!(service.decrement_allocation(ticket_id, 1).await.is_err());
//! }
//! ```

use chrono::{DateTime, Utc};
use ticketing_core::environment::Clock;

pub mod repository;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticketing_testing::mocks::FixedClock;
    /// use ticketing_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use ticketing_core::CreateTicket;

    /// The request used throughout the service scenarios.
    #[must_use]
    pub fn sample_ticket(allocation: i32) -> CreateTicket {
        CreateTicket {
            name: "example".to_string(),
            description: "sample description".to_string(),
            allocation,
        }
    }

    /// Route `tracing` output through the test harness.
    ///
    /// Safe to call from every test; only the first call installs a subscriber.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use ticketing_core::CreateTicket;

    /// Non-empty printable names and descriptions.
    pub fn non_empty_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ]{1,40}"
    }

    /// Valid allocations, zero included.
    pub fn allocation() -> impl Strategy<Value = i32> {
        0..=10_000i32
    }

    /// Valid creation requests.
    pub fn create_ticket() -> impl Strategy<Value = CreateTicket> {
        (non_empty_text(), non_empty_text(), allocation()).prop_map(
            |(name, description, allocation)| CreateTicket {
                name,
                description,
                allocation,
            },
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use repository::{Fault, InMemoryDatabase, InMemoryTicketRepository, InMemoryTransaction};
