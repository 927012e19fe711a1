//! HTTP interface of the ticketing service.
//!
//! # Routes
//!
//! ```text
//! GET  /health                    liveness
//! POST /tickets                   create a ticket
//! GET  /tickets/{id}              read a ticket
//! POST /tickets/{id}/purchases    buy units of a ticket
//! ```
//!
//! # Request Flow
//!
//! 1. **Correlation id** attached and echoed ([`middleware`])
//! 2. **Deadline** enforced by the timeout layer
//! 3. **Body parsed and validated** ([`requests`]); failures become `400`
//! 4. **Service call** on [`TicketService`](ticketing_core::TicketService)
//! 5. **Errors mapped** to status and body by [`AppError`]
//!
//! Purchases run on their own task under the service's purchase deadline,
//! which rolls the transaction back before reporting a timeout. Configure it
//! shorter than the request deadline.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ticketing_web::{router, AppState};
//!
//! let app = router(AppState::new(repository), Duration::from_secs(30));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod requests;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::time::Duration;
use ticketing_core::TicketRepository;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

// Re-export key types for convenience
pub use error::{AppError, ErrorResponse, FieldError};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};
pub use requests::{CreateTicketRequest, Purchase, PurchaseTicketRequest};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the service router.
///
/// Requests taking longer than `request_timeout` are answered with
/// `408 Request Timeout`.
pub fn router<R: TicketRepository + 'static>(
    state: AppState<R>,
    request_timeout: Duration,
) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/tickets", post(handlers::create_ticket::<R>))
        .route("/tickets/", get(handlers::missing_ticket_id))
        .route("/tickets/:id", get(handlers::get_ticket::<R>))
        .route("/tickets/:id/purchases", post(handlers::purchase_ticket::<R>))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}
