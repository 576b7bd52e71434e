// ============================================================================
// Transaction Status
// ============================================================================
//
// Implements the State Pattern for the logical transaction lifecycle.
// Each status moves through defined states: Active -> Committed/RolledBack,
// exactly once, on the matching commit or rollback call.
//
// ============================================================================

use super::resource::{PhysicalTransaction, ResourceHolder};
use crate::core::{Result, TxError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global physical transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a physical transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx_{}", self.0)
    }
}

/// Lifecycle of one logical transaction as seen by its caller
///
/// State transitions:
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    /// The status can still be committed or rolled back
    Active,

    /// Completed via commit
    Committed,

    /// Completed via rollback (or a commit overridden by rollback-only)
    RolledBack,
}

impl CompletionState {
    pub fn is_active(&self) -> bool {
        matches!(self, CompletionState::Active)
    }

    /// Check if the status is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, CompletionState::Committed | CompletionState::RolledBack)
    }
}

impl std::fmt::Display for CompletionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionState::Active => write!(f, "ACTIVE"),
            CompletionState::Committed => write!(f, "COMMITTED"),
            CompletionState::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}

/// Handle for one logical transaction, returned by `begin` and handed back
/// on commit/rollback.
///
/// Multiple statuses may share one physical transaction: exactly one of them
/// (the one with `is_new_transaction() == true`) governs the physical
/// outcome, the rest only participate. Completion is terminal; a second
/// commit or rollback on the same status fails with
/// [`TxError::IllegalState`].
pub struct TransactionStatus {
    is_new_transaction: bool,
    physical: Arc<PhysicalTransaction>,
    /// Holder to clean up on finalize; governing statuses only
    holder: Option<Arc<ResourceHolder>>,
    /// Physical transaction parked while this one runs; REQUIRES_NEW only
    suspended: Option<Arc<PhysicalTransaction>>,
    completion: CompletionState,
}

impl TransactionStatus {
    pub(crate) fn governing(
        physical: Arc<PhysicalTransaction>,
        holder: Arc<ResourceHolder>,
        suspended: Option<Arc<PhysicalTransaction>>,
    ) -> Self {
        Self {
            is_new_transaction: true,
            physical,
            holder: Some(holder),
            suspended,
            completion: CompletionState::Active,
        }
    }

    pub(crate) fn participating(physical: Arc<PhysicalTransaction>) -> Self {
        Self {
            is_new_transaction: false,
            physical,
            holder: None,
            suspended: None,
            completion: CompletionState::Active,
        }
    }

    /// True iff this status started a new physical transaction (as opposed
    /// to joining one already in progress)
    pub fn is_new_transaction(&self) -> bool {
        self.is_new_transaction
    }

    /// The physical transaction this status takes part in
    pub fn transaction_id(&self) -> TransactionId {
        self.physical.id()
    }

    /// Get the current completion state
    pub fn completion(&self) -> CompletionState {
        self.completion
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_terminal()
    }

    /// True iff a suspended physical transaction will be resumed when this
    /// status completes
    pub fn has_suspended_transaction(&self) -> bool {
        self.suspended.is_some()
    }

    /// Doom the shared physical transaction.
    ///
    /// Any participant may call this; once set, the governing commit fails
    /// with [`TxError::UnexpectedRollback`] instead of committing.
    pub fn set_rollback_only(&self) {
        self.physical.mark_rollback_only();
    }

    /// Check whether the shared physical transaction is doomed
    pub fn is_rollback_only(&self) -> bool {
        self.physical.is_rollback_only()
    }

    pub(crate) fn physical(&self) -> &Arc<PhysicalTransaction> {
        &self.physical
    }

    pub(crate) fn holder(&self) -> Option<&Arc<ResourceHolder>> {
        self.holder.as_ref()
    }

    pub(crate) fn take_suspended(&mut self) -> Option<Arc<PhysicalTransaction>> {
        self.suspended.take()
    }

    pub(crate) fn ensure_active(&self, operation: &str) -> Result<()> {
        if self.completion.is_terminal() {
            return Err(TxError::IllegalState(format!(
                "Cannot {operation}: transaction {} is already {}",
                self.physical.id(),
                self.completion
            )));
        }
        Ok(())
    }

    pub(crate) fn complete(&mut self, state: CompletionState) {
        self.completion = state;
    }
}
