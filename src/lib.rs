// ============================================================================
// txflow Library
// ============================================================================

//! Nested transaction manager with propagation control.
//!
//! Callers describe each transaction request with a [`TransactionDescriptor`]
//! (propagation policy, isolation level, read-only flag); the
//! [`TransactionManager`] decides whether the request starts a new physical
//! transaction, joins the one already running on the caller's
//! [`TransactionContext`], or suspends it and starts an independent one.
//! Participants that fail mark the shared transaction rollback-only, and the
//! outermost commit surfaces that as [`TxError::UnexpectedRollback`] instead
//! of committing half-applied work.
//!
//! ```no_run
//! use txflow::{
//!     ConnectionPool, PoolConfig, TransactionContext, TransactionDescriptor,
//!     TransactionManager,
//! };
//!
//! # async fn demo() -> txflow::Result<()> {
//! let pool = ConnectionPool::new(PoolConfig::default())?;
//! let manager = TransactionManager::new(pool);
//! let ctx = TransactionContext::new();
//!
//! let mut status = manager.begin(&ctx, TransactionDescriptor::default()).await?;
//! if let Some(txn) = ctx.current()? {
//!     txn.put("accounts", "alice", "100").await?;
//! }
//! manager.commit(&mut status).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod core;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use crate::core::{Result, TxError};
pub use storage::{Change, InMemoryStore};

// Re-export connection API
pub use connection::{
    MemoryConnection, TransactionalConnection,
    config::PoolConfig,
    pool::{ConnectionPool, PoolGuard, PoolStats},
};

// Re-export transaction API
pub use transaction::{
    CompletionState, IsolationLevel, PhysicalTransaction, Propagation, RollbackDecision,
    RollbackOnAll, RollbackPolicy, TransactionContext, TransactionDescriptor, TransactionId,
    TransactionManager, TransactionStatus,
};
