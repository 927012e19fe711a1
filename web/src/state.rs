//! Application state for Axum handlers.

use std::sync::Arc;
use ticketing_core::{TicketRepository, TicketService};

/// Application state shared across all HTTP handlers.
///
/// Generic over the repository so the same router serves `PostgreSQL` in
/// production and the in-memory adapter in tests.
pub struct AppState<R> {
    service: Arc<TicketService<R>>,
}

impl<R: TicketRepository> AppState<R> {
    /// Wrap a repository in a ticket service.
    #[must_use]
    pub fn new(repository: R) -> Self {
        Self {
            service: Arc::new(TicketService::new(repository)),
        }
    }

    /// Share an already configured ticket service.
    #[must_use]
    pub fn from_service(service: TicketService<R>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// The ticket service.
    #[must_use]
    pub fn service(&self) -> &TicketService<R> {
        &self.service
    }

    /// An owned handle on the ticket service, for work that outlives the request.
    #[must_use]
    pub fn shared_service(&self) -> Arc<TicketService<R>> {
        Arc::clone(&self.service)
    }
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}
