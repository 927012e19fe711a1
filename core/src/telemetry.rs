//! Business metrics recorded by the ticket service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `ticketing_tickets_created_total` - Tickets created
//! - `ticketing_purchases_total{outcome}` - Purchase attempts by outcome
//! - `ticketing_tickets_sold_total` - Allocation units sold
//! - `ticketing_transaction_rollbacks_total` - Purchase transactions rolled back

use metrics::describe_counter;

/// Tickets created.
pub const TICKETS_CREATED: &str = "ticketing_tickets_created_total";
/// Purchase attempts, labelled by `outcome`.
pub const PURCHASES: &str = "ticketing_purchases_total";
/// Allocation units sold.
pub const TICKETS_SOLD: &str = "ticketing_tickets_sold_total";
/// Purchase transactions rolled back.
pub const ROLLBACKS: &str = "ticketing_transaction_rollbacks_total";

/// Register metric descriptions.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    describe_counter!(TICKETS_CREATED, "Total number of tickets created");
    describe_counter!(
        PURCHASES,
        "Total number of purchase attempts by outcome (succeeded, insufficient, not_found, failed)"
    );
    describe_counter!(TICKETS_SOLD, "Total number of allocation units sold");
    describe_counter!(
        ROLLBACKS,
        "Total number of purchase transactions rolled back"
    );

    tracing::debug!("Ticketing metrics registered");
}
