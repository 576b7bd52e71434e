// ============================================================================
// Transaction Manager
// ============================================================================

use super::descriptor::TransactionDescriptor;
use super::resolver::{Decision, resolve};
use super::resource::{PhysicalTransaction, TransactionContext};
use super::status::{CompletionState, TransactionId, TransactionStatus};
use crate::connection::TransactionalConnection;
use crate::connection::pool::ConnectionPool;
use crate::core::{Result, TxError};
use log::{debug, info, warn};
use std::sync::Arc;

enum Outcome {
    Commit,
    Rollback,
}

/// Orchestrates logical transactions over pooled physical connections.
///
/// `begin` resolves the request's propagation policy against the calling
/// context, starting, joining or suspending physical transactions as needed.
/// `commit` and `rollback` complete one status each; only the governing
/// status (the one that started its physical transaction) ever touches the
/// physical resource, exactly once. Participants influence the outcome only
/// through the rollback-only flag, which the governing commit surfaces as
/// [`TxError::UnexpectedRollback`] rather than committing half-applied work.
///
/// The manager keeps no per-context state of its own; everything a context
/// needs lives in its [`TransactionContext`], so independent contexts are
/// fully isolated from each other.
pub struct TransactionManager {
    pool: Arc<ConnectionPool>,
}

impl TransactionManager {
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// The pool physical connections are drawn from
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Start or join a transaction on the given context.
    ///
    /// Fails with [`TxError::NoResourceAvailable`] if a new physical
    /// transaction is called for and the pool cannot supply a connection
    /// within its acquire timeout, and with [`TxError::UnsupportedOperation`]
    /// for propagation values the resolver does not implement.
    pub async fn begin(
        &self,
        ctx: &TransactionContext,
        descriptor: TransactionDescriptor,
    ) -> Result<TransactionStatus> {
        let holder = ctx.holder();
        let current = holder.current()?;

        match resolve(&descriptor, current.is_some())? {
            Decision::StartNew => {
                let physical = self.open_physical(&descriptor).await?;
                holder.install(Arc::clone(&physical))?;
                debug!(
                    "context {}: started new transaction {}",
                    ctx.id(),
                    physical.id()
                );
                Ok(TransactionStatus::governing(
                    physical,
                    Arc::clone(holder),
                    None,
                ))
            }
            Decision::Join => {
                let physical = current.ok_or_else(|| {
                    TxError::IllegalState("Active transaction vanished during begin".into())
                })?;
                debug!(
                    "context {}: participating in existing transaction {}",
                    ctx.id(),
                    physical.id()
                );
                Ok(TransactionStatus::participating(physical))
            }
            Decision::SuspendAndStartNew => {
                let suspended = holder.take()?;
                if let Some(previous) = &suspended {
                    debug!("context {}: suspending transaction {}", ctx.id(), previous.id());
                }

                match self.open_physical(&descriptor).await {
                    Ok(physical) => {
                        holder.install(Arc::clone(&physical))?;
                        debug!(
                            "context {}: started independent transaction {}",
                            ctx.id(),
                            physical.id()
                        );
                        Ok(TransactionStatus::governing(
                            physical,
                            Arc::clone(holder),
                            suspended,
                        ))
                    }
                    Err(err) => {
                        // Resume what we suspended before surfacing the error.
                        if let Some(previous) = suspended {
                            holder.install(previous)?;
                        }
                        Err(err)
                    }
                }
            }
        }
    }

    /// Complete one status via commit.
    ///
    /// For a participating status this is purely logical. For the governing
    /// status the physical transaction is committed, unless a participant
    /// marked it rollback-only: then it is rolled back and the call fails
    /// with [`TxError::UnexpectedRollback`] so the caller cannot mistake the
    /// override for success.
    pub async fn commit(&self, status: &mut TransactionStatus) -> Result<()> {
        status.ensure_active("commit")?;

        if !status.is_new_transaction() {
            status.complete(CompletionState::Committed);
            debug!(
                "transaction {}: participant committed, physical outcome deferred to governing status",
                status.transaction_id()
            );
            return Ok(());
        }

        if status.is_rollback_only() {
            warn!(
                "transaction {} is marked rollback-only, rolling back instead of committing",
                status.transaction_id()
            );
            let finalized = self.finalize(status, Outcome::Rollback).await;
            status.complete(CompletionState::RolledBack);
            finalized?;
            return Err(TxError::UnexpectedRollback);
        }

        let finalized = self.finalize(status, Outcome::Commit).await;
        status.complete(CompletionState::Committed);
        finalized
    }

    /// Complete one status via rollback.
    ///
    /// A participating status does not touch the physical transaction; it
    /// marks the shared record rollback-only and lets the governing commit
    /// surface the failure. The governing status rolls the physical
    /// transaction back immediately and unconditionally.
    pub async fn rollback(&self, status: &mut TransactionStatus) -> Result<()> {
        status.ensure_active("rollback")?;

        if !status.is_new_transaction() {
            status.set_rollback_only();
            status.complete(CompletionState::RolledBack);
            info!(
                "transaction {}: participant failed, marking existing transaction rollback-only",
                status.transaction_id()
            );
            return Ok(());
        }

        let finalized = self.finalize(status, Outcome::Rollback).await;
        status.complete(CompletionState::RolledBack);
        finalized
    }

    async fn open_physical(
        &self,
        descriptor: &TransactionDescriptor,
    ) -> Result<Arc<PhysicalTransaction>> {
        let mut guard = self.pool.acquire().await?;
        guard
            .connection()
            .begin(descriptor.isolation_level(), descriptor.is_read_only())
            .await?;
        Ok(Arc::new(PhysicalTransaction::new(TransactionId::new(), guard)))
    }

    /// Finalize the physical transaction and put the holder back in order,
    /// resuming a suspended transaction if the status parked one.
    async fn finalize(&self, status: &mut TransactionStatus, outcome: Outcome) -> Result<()> {
        let finalized = match outcome {
            Outcome::Commit => status.physical().finalize_commit().await,
            Outcome::Rollback => status.physical().finalize_rollback().await,
        };

        let holder = status.holder().cloned();
        let suspended = status.take_suspended();
        if let Some(holder) = holder {
            holder.take()?;
            if let Some(previous) = suspended {
                debug!("resuming suspended transaction {}", previous.id());
                holder.install(previous)?;
            }
        }

        finalized
    }
}
