//! sqlx implementation of the ticket repository.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::FromRow;
use ticketing_core::{
    Allocation, Database, Description, Name, Result, StoredValue, Ticket, TicketError, TicketId,
    TicketRepository, TransactionHandle,
};

/// Ticket repository backed by a `PostgreSQL` pool.
#[derive(Clone, Debug)]
pub struct PgTicketRepository {
    pool: PgPool,
}

impl PgTicketRepository {
    /// Create a repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `tickets` table and its indexes if they don't already exist.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::PersistenceFailure`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TicketError::persistence(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Begins transactions on a pool.
#[derive(Clone, Debug)]
pub struct PgDatabase(PgPool);

impl Database for PgDatabase {
    type Transaction = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        let tx = self
            .0
            .begin()
            .await
            .map_err(|e| TicketError::persistence(format!("Failed to begin transaction: {e}")))?;
        Ok(PgTransaction(tx))
    }
}

/// Open `PostgreSQL` transaction.
///
/// Dropping it without commit issues a rollback before the connection
/// returns to the pool.
pub struct PgTransaction(sqlx::Transaction<'static, Postgres>);

impl TransactionHandle for PgTransaction {
    async fn commit(self) -> Result<()> {
        self.0
            .commit()
            .await
            .map_err(|e| TicketError::persistence(format!("Failed to commit transaction: {e}")))
    }

    async fn rollback(self) -> Result<()> {
        self.0
            .rollback()
            .await
            .map_err(|e| TicketError::persistence(format!("Failed to roll back transaction: {e}")))
    }
}

#[derive(FromRow)]
struct TicketRow {
    id: i64,
    name: Option<String>,
    description: Option<String>,
    allocation: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TicketRow {
    fn into_ticket(self) -> Result<Ticket> {
        let null = |column: &str| TicketError::persistence(format!("tickets.{column} is NULL"));

        Ok(Ticket::restore(
            TicketId::new(self.id),
            Name::decode(self.name).ok_or_else(|| null("name"))?,
            Description::decode(self.description).ok_or_else(|| null("description"))?,
            Allocation::decode(self.allocation).ok_or_else(|| null("allocation"))?,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// Translate a storage error, turning "no rows" into [`TicketError::TicketNotFound`].
fn storage_error(id: TicketId, context: &str, err: sqlx::Error) -> TicketError {
    match err {
        sqlx::Error::RowNotFound => TicketError::TicketNotFound(id),
        other => TicketError::persistence(format!("{context}: {other}")),
    }
}

const SELECT_LIVE: &str = r"
    SELECT id, name, description, allocation, created_at, updated_at
    FROM tickets
    WHERE id = $1 AND deleted_at IS NULL
";

const SELECT_LIVE_FOR_UPDATE: &str = r"
    SELECT id, name, description, allocation, created_at, updated_at
    FROM tickets
    WHERE id = $1 AND deleted_at IS NULL
    FOR UPDATE
";

impl TicketRepository for PgTicketRepository {
    type Database = PgDatabase;

    fn database(&self) -> PgDatabase {
        PgDatabase(self.pool.clone())
    }

    async fn create(&self, ticket: &mut Ticket) -> Result<()> {
        let (id, created_at, updated_at): (i64, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            r"
            INSERT INTO tickets (name, description, allocation)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, updated_at
            ",
        )
        .bind(ticket.name().encode())
        .bind(ticket.description().encode())
        .bind(ticket.allocation().encode())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| TicketError::persistence(format!("Failed to insert ticket: {e}")))?;

        tracing::debug!(ticket_id = id, "Ticket row inserted");
        ticket.record_created(TicketId::new(id), created_at, updated_at);
        Ok(())
    }

    async fn find_by_id(&self, id: TicketId) -> Result<Ticket> {
        sqlx::query_as::<_, TicketRow>(SELECT_LIVE)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error(id, "Failed to load ticket", e))?
            .ok_or(TicketError::TicketNotFound(id))?
            .into_ticket()
    }

    async fn find_by_id_for_update(&self, id: TicketId, tx: &mut PgTransaction) -> Result<Ticket> {
        sqlx::query_as::<_, TicketRow>(SELECT_LIVE_FOR_UPDATE)
            .bind(id.get())
            .fetch_optional(&mut *tx.0)
            .await
            .map_err(|e| storage_error(id, "Failed to lock ticket", e))?
            .ok_or(TicketError::TicketNotFound(id))?
            .into_ticket()
    }

    async fn update(&self, ticket: &mut Ticket, tx: &mut PgTransaction) -> Result<()> {
        let id = ticket
            .id()
            .ok_or_else(|| TicketError::persistence("cannot update a ticket without an id"))?;

        let updated_at: DateTime<Utc> = sqlx::query_scalar(
            r"
            UPDATE tickets
            SET name = $1, description = $2, allocation = $3, updated_at = NOW()
            WHERE id = $4 AND deleted_at IS NULL
            RETURNING updated_at
            ",
        )
        .bind(ticket.name().encode())
        .bind(ticket.description().encode())
        .bind(ticket.allocation().encode())
        .bind(id.get())
        .fetch_optional(&mut *tx.0)
        .await
        .map_err(|e| storage_error(id, "Failed to update ticket", e))?
        .ok_or(TicketError::TicketNotFound(id))?;

        tracing::debug!(
            ticket_id = %id,
            allocation = ticket.allocation().value(),
            "Ticket row updated"
        );
        ticket.record_updated(updated_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_ticket_not_found() {
        let err = storage_error(TicketId::new(7), "ctx", sqlx::Error::RowNotFound);
        assert_eq!(err, TicketError::TicketNotFound(TicketId::new(7)));
    }

    #[test]
    fn other_errors_map_to_persistence_failure() {
        let err = storage_error(TicketId::new(7), "Failed", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, TicketError::PersistenceFailure(msg) if msg.starts_with("Failed:")));
    }

    #[test]
    fn null_column_is_a_persistence_failure() {
        let row = TicketRow {
            id: 1,
            name: None,
            description: Some("d".into()),
            allocation: Some(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(row.into_ticket(), Err(TicketError::PersistenceFailure(_))));
    }
}
