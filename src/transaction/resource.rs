use super::status::TransactionId;
use crate::connection::TransactionalConnection;
use crate::connection::pool::PoolGuard;
use crate::core::{Result, TxError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// The shared record of one physical transaction.
///
/// Exclusively owns the pooled connection for the transaction's lifetime and
/// carries the rollback-only flag every participating status can see. The
/// flag is monotonic: once set it stays set until the transaction is
/// finalized, and the governing commit must honor it.
pub struct PhysicalTransaction {
    id: TransactionId,
    rollback_only: AtomicBool,
    /// Taken exactly once, by the governing finalize; dropping the guard
    /// returns the connection to the pool.
    guard: Mutex<Option<PoolGuard>>,
}

impl PhysicalTransaction {
    pub(crate) fn new(id: TransactionId, guard: PoolGuard) -> Self {
        Self {
            id,
            rollback_only: AtomicBool::new(false),
            guard: Mutex::new(Some(guard)),
        }
    }

    /// Get the physical transaction ID
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Check whether this transaction is doomed to roll back
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::SeqCst);
    }

    /// Write one record through this transaction's connection
    pub async fn put(&self, table: &str, key: &str, value: &str) -> Result<()> {
        let mut slot = self.guard.lock().await;
        let guard = slot.as_mut().ok_or_else(Self::already_finalized)?;
        guard.connection().put(table, key, value)
    }

    /// Remove one record through this transaction's connection
    pub async fn delete(&self, table: &str, key: &str) -> Result<()> {
        let mut slot = self.guard.lock().await;
        let guard = slot.as_mut().ok_or_else(Self::already_finalized)?;
        guard.connection().delete(table, key)
    }

    /// Read one record through this transaction's connection: its own
    /// uncommitted writes first, committed data second
    pub async fn get(&self, table: &str, key: &str) -> Result<Option<String>> {
        let slot = self.guard.lock().await;
        let guard = slot.as_ref().ok_or_else(Self::already_finalized)?;
        guard.peek().get(table, key)
    }

    pub(crate) async fn finalize_commit(&self) -> Result<()> {
        let mut slot = self.guard.lock().await;
        let mut guard = slot.take().ok_or_else(Self::already_finalized)?;
        guard.connection().commit().await
    }

    pub(crate) async fn finalize_rollback(&self) -> Result<()> {
        let mut slot = self.guard.lock().await;
        let mut guard = slot.take().ok_or_else(Self::already_finalized)?;
        guard.connection().rollback().await
    }

    fn already_finalized() -> TxError {
        TxError::IllegalState("Physical transaction already finalized".into())
    }
}

/// Per-context record of the current physical transaction.
///
/// Invariant: at most one current handle per context at any instant. A
/// REQUIRES_NEW begin replaces the handle (the old one survives, parked on
/// the new status); completion of the owning governing status clears it.
pub(crate) struct ResourceHolder {
    current: std::sync::Mutex<Option<Arc<PhysicalTransaction>>>,
}

impl ResourceHolder {
    pub(crate) fn new() -> Self {
        Self {
            current: std::sync::Mutex::new(None),
        }
    }

    pub(crate) fn current(&self) -> Result<Option<Arc<PhysicalTransaction>>> {
        Ok(self.current.lock()?.clone())
    }

    pub(crate) fn install(&self, transaction: Arc<PhysicalTransaction>) -> Result<()> {
        *self.current.lock()? = Some(transaction);
        Ok(())
    }

    pub(crate) fn take(&self) -> Result<Option<Arc<PhysicalTransaction>>> {
        Ok(self.current.lock()?.take())
    }
}

/// One logical execution context (a request, a call stack).
///
/// Replaces ambient thread-local lookup with an explicit object the caller
/// threads through `begin`. Independent contexts never observe each other's
/// current transaction or rollback-only flag.
pub struct TransactionContext {
    id: Uuid,
    holder: Arc<ResourceHolder>,
}

impl TransactionContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            holder: Arc::new(ResourceHolder::new()),
        }
    }

    /// Opaque context ID, for diagnostics
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Check whether a physical transaction is active on this context
    pub fn has_active_transaction(&self) -> Result<bool> {
        Ok(self.holder.current()?.is_some())
    }

    /// The context's current physical transaction, if any.
    ///
    /// This is how collaborator code (repositories) reaches the governing
    /// transaction's connection to do its work.
    pub fn current(&self) -> Result<Option<Arc<PhysicalTransaction>>> {
        self.holder.current()
    }

    pub(crate) fn holder(&self) -> &Arc<ResourceHolder> {
        &self.holder
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}
