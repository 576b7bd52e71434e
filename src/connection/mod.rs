pub mod config;
pub mod pool;

use crate::core::{Result, TxError};
use crate::storage::{Change, InMemoryStore};
use crate::transaction::IsolationLevel;
use async_trait::async_trait;
use std::sync::Arc;

/// The injected physical transaction primitive.
///
/// This is the seam between the transaction manager and whatever actually
/// owns atomic commit/rollback, e.g. a database driver's native transaction
/// object. The manager only ever drives connections through this trait.
#[async_trait]
pub trait TransactionalConnection: Send {
    /// Open a physical transaction on this connection.
    ///
    /// Fails if the connection is closed or a physical transaction is
    /// already open on it.
    async fn begin(&mut self, isolation: IsolationLevel, read_only: bool) -> Result<()>;

    /// Make all buffered work durable and end the physical transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Discard all buffered work and end the physical transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Check whether a physical transaction is open on this connection
    fn is_in_transaction(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Active,
    InTransaction,
    Closed,
}

/// Connection against the in-memory store.
///
/// Writes are buffered while a physical transaction is open and applied to
/// the shared store on commit, so work from a rolled-back transaction is
/// never visible to anyone. Commit and rollback both return the connection
/// to a clean state, which is what lets the pool hand it out again for an
/// entirely independent transaction.
pub struct MemoryConnection {
    /// Unique connection ID
    id: u64,
    /// Shared store committed changes are applied to
    store: Arc<InMemoryStore>,
    /// Connection state
    state: ConnectionState,
    /// Pending changes of the open physical transaction
    pending: Vec<Change>,
    read_only: bool,
}

impl MemoryConnection {
    pub(crate) fn new(id: u64, store: Arc<InMemoryStore>) -> Self {
        Self {
            id,
            store,
            state: ConnectionState::Active,
            pending: Vec::new(),
            read_only: false,
        }
    }

    /// Get connection ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Buffer an insert-or-overwrite of one record.
    ///
    /// Fails outside a physical transaction and on read-only transactions.
    pub fn put(&mut self, table: &str, key: &str, value: &str) -> Result<()> {
        self.ensure_writable()?;
        self.pending.push(Change::Put {
            table: table.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    /// Buffer the removal of one record.
    pub fn delete(&mut self, table: &str, key: &str) -> Result<()> {
        self.ensure_writable()?;
        self.pending.push(Change::Delete {
            table: table.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }

    /// Read a record: own buffered writes first, committed data second.
    pub fn get(&self, table: &str, key: &str) -> Result<Option<String>> {
        if self.state == ConnectionState::Closed {
            return Err(TxError::ConnectionError("Connection is closed".into()));
        }

        for change in self.pending.iter().rev() {
            if change.table_name() == table && change.key() == key {
                return Ok(match change {
                    Change::Put { value, .. } => Some(value.clone()),
                    Change::Delete { .. } => None,
                });
            }
        }

        self.store.get(table, key)
    }

    /// Check if connection is usable
    pub fn is_active(&self) -> bool {
        self.state != ConnectionState::Closed
    }

    /// Close the connection, discarding any open transaction
    pub fn close(&mut self) {
        self.pending.clear();
        self.state = ConnectionState::Closed;
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.state {
            ConnectionState::Closed => {
                Err(TxError::ConnectionError("Connection is closed".into()))
            }
            ConnectionState::Active => Err(TxError::ConnectionError(
                "No transaction in progress on this connection".into(),
            )),
            ConnectionState::InTransaction if self.read_only => Err(TxError::ConnectionError(
                "Transaction is read-only".into(),
            )),
            ConnectionState::InTransaction => Ok(()),
        }
    }
}

#[async_trait]
impl TransactionalConnection for MemoryConnection {
    async fn begin(&mut self, _isolation: IsolationLevel, read_only: bool) -> Result<()> {
        match self.state {
            ConnectionState::Closed => {
                return Err(TxError::ConnectionError("Connection is closed".into()));
            }
            ConnectionState::InTransaction => {
                return Err(TxError::ConnectionError(
                    "Transaction already in progress on this connection".into(),
                ));
            }
            ConnectionState::Active => {}
        }

        // The store is single-versioned, so every isolation level reads
        // committed data; the requested level is accepted as-is.
        self.state = ConnectionState::InTransaction;
        self.read_only = read_only;
        self.pending.clear();
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(TxError::ConnectionError(
                "No transaction in progress on this connection".into(),
            ));
        }

        self.store.apply(&self.pending)?;
        self.pending.clear();
        self.state = ConnectionState::Active;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(TxError::ConnectionError(
                "No transaction in progress on this connection".into(),
            ));
        }

        self.pending.clear();
        self.state = ConnectionState::Active;
        Ok(())
    }

    fn is_in_transaction(&self) -> bool {
        self.state == ConnectionState::InTransaction
    }
}
