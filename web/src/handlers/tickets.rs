//! Ticket endpoints.
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | `POST` | `/tickets` | `201` with the created ticket |
//! | `GET` | `/tickets/{id}` | `200` with the ticket |
//! | `GET` | `/tickets/` | `400`, the id is missing |
//! | `POST` | `/tickets/{id}/purchases` | `200` with an empty body |

use crate::WebResult;
use crate::error::AppError;
use crate::requests::{CreateTicketRequest, PurchaseTicketRequest};
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use ticketing_core::{TicketDto, TicketId, TicketRepository};

/// Create a ticket.
///
/// # Errors
///
/// - `400` for a malformed body or a failed field rule
/// - `422` if the service cannot create the ticket
pub async fn create_ticket<R: TicketRepository + 'static>(
    State(state): State<AppState<R>>,
    body: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> WebResult<(StatusCode, Json<TicketDto>)> {
    let Json(request) = body?;
    let create = request.validate().map_err(AppError::invalid_fields)?;

    let ticket = state
        .service()
        .create(create)
        .await
        .map_err(|e| AppError::from_service(e, StatusCode::UNPROCESSABLE_ENTITY))?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Read a ticket.
///
/// # Errors
///
/// - `400` if the id is not an integer
/// - `404` if no live ticket has this id
pub async fn get_ticket<R: TicketRepository + 'static>(
    State(state): State<AppState<R>>,
    id: Result<Path<i64>, PathRejection>,
) -> WebResult<Json<TicketDto>> {
    let Path(id) = id?;
    let ticket = state.service().find_by_id(TicketId::new(id)).await?;
    Ok(Json(ticket))
}

/// Reject a read whose id segment is empty.
///
/// # Errors
///
/// Always `400`.
pub async fn missing_ticket_id() -> WebResult<Json<TicketDto>> {
    Err(AppError::bad_request("id is required"))
}

/// Purchase units of a ticket.
///
/// The purchaser id is validated and logged but not stored. The purchase
/// runs on its own task, so a request deadline firing mid-purchase does not
/// cut the transaction short; the service's purchase deadline bounds it
/// and rolls it back instead.
///
/// # Errors
///
/// - `400` for a malformed body, a failed field rule or a non-integer id
/// - `404` if no live ticket has this id
/// - `422` if the allocation is insufficient or the purchase fails
pub async fn purchase_ticket<R: TicketRepository + 'static>(
    State(state): State<AppState<R>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<PurchaseTicketRequest>, JsonRejection>,
) -> WebResult<StatusCode> {
    let Json(request) = body?;
    let purchase = request.validate().map_err(AppError::invalid_fields)?;
    let Path(id) = id?;

    tracing::debug!(ticket_id = id, user_id = %purchase.user_id, "Purchase requested");

    let service = state.shared_service();
    let ticket_id = TicketId::new(id);
    tokio::spawn(async move {
        service
            .decrement_allocation(ticket_id, purchase.quantity)
            .await
    })
    .await
    .map_err(|e| AppError::internal("An internal error occurred").with_source(e.into()))?
    .map_err(|e| AppError::from_service(e, StatusCode::UNPROCESSABLE_ENTITY))?;

    Ok(StatusCode::OK)
}
