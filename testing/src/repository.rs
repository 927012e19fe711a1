//! In-memory ticket storage for fast, deterministic tests.
//!
//! [`InMemoryTicketRepository`] honours the full repository contract,
//! including the row lock: [`find_by_id_for_update`] takes a per-row async
//! mutex that is held by the transaction until it commits, rolls back or is
//! dropped. Concurrent purchases therefore really do serialize, which lets
//! the no-oversell property be tested without a database.
//!
//! Writes made inside a transaction are staged and only become visible on
//! commit. Faults can be injected per operation to exercise rollback paths.
//!
//! [`find_by_id_for_update`]: TicketRepository::find_by_id_for_update

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use crate::mocks::test_clock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use ticketing_core::environment::Clock;
use ticketing_core::{
    Allocation, Database, DateTime, Description, Name, Result, StoredValue, Ticket,
    TicketError, TicketId, TicketRepository, TransactionHandle, Utc,
};
use tokio::sync::OwnedMutexGuard;

/// Operations that can be made to fail on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `TicketRepository::create`
    Create,
    /// `Database::begin`
    Begin,
    /// `TicketRepository::find_by_id` and `find_by_id_for_update`
    Read,
    /// `TicketRepository::update`
    Update,
    /// `TransactionHandle::commit`
    Commit,
    /// `TransactionHandle::rollback`
    Rollback,
}

/// A stored row, in column form.
#[derive(Clone, Debug)]
struct Row {
    name: String,
    description: String,
    allocation: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Row {
    fn to_ticket(&self, id: TicketId) -> Result<Ticket> {
        let missing = |column: &str| TicketError::persistence(format!("tickets.{column} is NULL"));

        Ok(Ticket::restore(
            id,
            Name::decode(Some(self.name.clone())).ok_or_else(|| missing("name"))?,
            Description::decode(Some(self.description.clone()))
                .ok_or_else(|| missing("description"))?,
            Allocation::decode(Some(self.allocation)).ok_or_else(|| missing("allocation"))?,
            self.created_at,
            self.updated_at,
        ))
    }

    const fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

struct Inner {
    rows: Mutex<BTreeMap<TicketId, Row>>,
    row_locks: Mutex<HashMap<TicketId, Arc<tokio::sync::Mutex<()>>>>,
    next_id: AtomicI64,
    faults: Mutex<HashSet<Fault>>,
    clock: Arc<dyn Clock>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    abandoned: AtomicUsize,
}

impl Inner {
    fn check(&self, fault: Fault) -> Result<()> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| TicketError::persistence("fault registry poisoned"))?;
        if faults.contains(&fault) {
            return Err(TicketError::persistence(format!("injected {fault:?} failure")));
        }
        Ok(())
    }

    fn live_row(&self, id: TicketId) -> Result<Row> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| TicketError::persistence("row storage poisoned"))?;
        rows.get(&id)
            .filter(|row| row.is_live())
            .cloned()
            .ok_or(TicketError::TicketNotFound(id))
    }

    fn row_lock(&self, id: TicketId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| TicketError::persistence("lock table poisoned"))?;
        Ok(Arc::clone(locks.entry(id).or_default()))
    }

    /// Drop lock table entries nobody holds or waits on any more.
    fn prune_row_locks(&self, ids: impl IntoIterator<Item = TicketId>) {
        let Ok(mut locks) = self.row_locks.lock() else {
            return;
        };
        for id in ids {
            // Every holder and waiter owns a clone, and new clones are only
            // handed out under this mutex.
            if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(&id);
            }
        }
    }

    fn row_lock_count(&self) -> usize {
        self.row_locks.lock().map_or(0, |locks| locks.len())
    }
}

/// In-memory [`TicketRepository`] with real row locks.
///
/// # Example
///
/// ```
/// use ticketing_core::{CreateTicket, TicketId, TicketService};
/// use ticketing_testing::InMemoryTicketRepository;
///
/// # tokio_test::block_on(async {
/// let repository = InMemoryTicketRepository::new();
/// let service = TicketService::new(repository.clone());
///
/// let ticket = service
///     .create(CreateTicket {
///         name: "example".into(),
///         description: "sample description".into(),
///         allocation: 100,
///     })
///     .await?;
///
/// service.decrement_allocation(TicketId::new(ticket.id), 10).await?;
/// assert_eq!(repository.allocation_of(TicketId::new(ticket.id)), Some(90));
/// # Ok::<(), ticketing_core::TicketError>(())
/// # });
/// ```
#[derive(Clone)]
pub struct InMemoryTicketRepository {
    inner: Arc<Inner>,
}

impl InMemoryTicketRepository {
    /// Create an empty repository stamped by the fixed test clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(test_clock()))
    }

    /// Create an empty repository stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                rows: Mutex::new(BTreeMap::new()),
                row_locks: Mutex::new(HashMap::new()),
                next_id: AtomicI64::new(1),
                faults: Mutex::new(HashSet::new()),
                clock,
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
                abandoned: AtomicUsize::new(0),
            }),
        }
    }

    /// Make every subsequent `fault` operation fail with `PersistenceFailure`.
    pub fn inject(&self, fault: Fault) {
        self.inner.faults.lock().unwrap().insert(fault);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.inner.faults.lock().unwrap().clear();
    }

    /// Mark a ticket as soft-deleted. Returns whether a live row was found.
    pub fn soft_delete(&self, id: TicketId) -> bool {
        let now = self.inner.clock.now();
        let mut rows = self.inner.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(row) if row.is_live() => {
                row.deleted_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Committed allocation of a live ticket.
    #[must_use]
    pub fn allocation_of(&self, id: TicketId) -> Option<i32> {
        self.inner
            .rows
            .lock()
            .unwrap()
            .get(&id)
            .filter(|row| row.is_live())
            .map(|row| row.allocation)
    }

    /// Number of stored rows, deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.rows.lock().unwrap().len()
    }

    /// Whether nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.rows.lock().unwrap().is_empty()
    }

    /// Transactions committed so far.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Transactions explicitly rolled back so far.
    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }

    /// Transactions dropped without commit or rollback (implicitly rolled back).
    #[must_use]
    pub fn abandoned(&self) -> usize {
        self.inner.abandoned.load(Ordering::SeqCst)
    }

    /// Rows with a lock currently held or awaited.
    #[must_use]
    pub fn locked_rows(&self) -> usize {
        self.inner.row_lock_count()
    }
}

impl Default for InMemoryTicketRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTicketRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTicketRepository")
            .field("rows", &self.len())
            .field("commits", &self.commits())
            .field("rollbacks", &self.rollbacks())
            .finish_non_exhaustive()
    }
}

/// Connection handle for [`InMemoryTicketRepository`].
#[derive(Clone)]
pub struct InMemoryDatabase {
    inner: Arc<Inner>,
}

impl Database for InMemoryDatabase {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        self.inner.check(Fault::Begin)?;
        Ok(InMemoryTransaction {
            inner: Arc::clone(&self.inner),
            held: HashMap::new(),
            staged: BTreeMap::new(),
            finished: false,
        })
    }
}

/// Open in-memory transaction.
///
/// Holds the row locks it acquired and the writes it staged. Dropping it
/// without commit discards the writes and releases the locks.
pub struct InMemoryTransaction {
    inner: Arc<Inner>,
    held: HashMap<TicketId, OwnedMutexGuard<()>>,
    staged: BTreeMap<TicketId, Row>,
    finished: bool,
}

impl InMemoryTransaction {
    async fn lock_row(&mut self, id: TicketId) -> Result<()> {
        if self.held.contains_key(&id) {
            return Ok(());
        }
        let lock = self.inner.row_lock(id)?;
        let guard = lock.lock_owned().await;
        self.held.insert(id, guard);
        Ok(())
    }

    fn visible_row(&self, id: TicketId) -> Result<Row> {
        match self.staged.get(&id) {
            Some(row) => Ok(row.clone()),
            None => self.inner.live_row(id),
        }
    }

    fn release_locks(&mut self) {
        let ids: Vec<TicketId> = self.held.drain().map(|(id, _guard)| id).collect();
        self.inner.prune_row_locks(ids);
    }

    fn finish(&mut self) {
        self.finished = true;
        self.staged.clear();
        self.release_locks();
    }
}

impl TransactionHandle for InMemoryTransaction {
    async fn commit(mut self) -> Result<()> {
        if let Err(err) = self.inner.check(Fault::Commit) {
            self.finish();
            return Err(err);
        }

        {
            let mut rows = self
                .inner
                .rows
                .lock()
                .map_err(|_| TicketError::persistence("row storage poisoned"))?;
            for (id, row) in std::mem::take(&mut self.staged) {
                rows.insert(id, row);
            }
        }

        self.inner.commits.fetch_add(1, Ordering::SeqCst);
        self.finish();
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.finish();
        self.inner.check(Fault::Rollback)?;
        self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.abandoned.fetch_add(1, Ordering::SeqCst);
            self.release_locks();
        }
    }
}

impl TicketRepository for InMemoryTicketRepository {
    type Database = InMemoryDatabase;

    fn database(&self) -> InMemoryDatabase {
        InMemoryDatabase {
            inner: Arc::clone(&self.inner),
        }
    }

    async fn create(&self, ticket: &mut Ticket) -> Result<()> {
        self.inner.check(Fault::Create)?;

        let id = TicketId::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let now = self.inner.clock.now();
        let row = Row {
            name: ticket.name().encode(),
            description: ticket.description().encode(),
            allocation: ticket.allocation().encode(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        self.inner
            .rows
            .lock()
            .map_err(|_| TicketError::persistence("row storage poisoned"))?
            .insert(id, row);
        ticket.record_created(id, now, now);
        Ok(())
    }

    async fn find_by_id(&self, id: TicketId) -> Result<Ticket> {
        self.inner.check(Fault::Read)?;
        self.inner.live_row(id)?.to_ticket(id)
    }

    async fn find_by_id_for_update(
        &self,
        id: TicketId,
        tx: &mut InMemoryTransaction,
    ) -> Result<Ticket> {
        self.inner.check(Fault::Read)?;
        // No lock is taken for rows that do not exist.
        tx.visible_row(id)?;
        tx.lock_row(id).await?;
        tx.visible_row(id)?.to_ticket(id)
    }

    async fn update(&self, ticket: &mut Ticket, tx: &mut InMemoryTransaction) -> Result<()> {
        self.inner.check(Fault::Update)?;

        let id = ticket
            .id()
            .ok_or_else(|| TicketError::persistence("cannot update a ticket without an id"))?;
        tx.lock_row(id).await?;

        let mut row = tx.visible_row(id)?;
        let now = self.inner.clock.now();
        row.name = ticket.name().encode();
        row.description = ticket.description().encode();
        row.allocation = ticket.allocation().encode();
        row.updated_at = now;
        tx.staged.insert(id, row);

        ticket.record_updated(now);
        Ok(())
    }
}
