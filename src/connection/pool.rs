use super::config::PoolConfig;
use super::{MemoryConnection, TransactionalConnection};
use crate::core::{Result, TxError};
use crate::storage::InMemoryStore;
use log::warn;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long an exhausted acquire sleeps before re-checking the pool
const ACQUIRE_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Bounded connection pool.
///
/// Hands out connections wrapped in an RAII [`PoolGuard`]; a caller that
/// cannot be served within the configured acquire timeout fails with
/// [`TxError::NoResourceAvailable`].
pub struct ConnectionPool {
    /// Pool configuration
    config: PoolConfig,
    /// Idle connections ready for reuse
    available: Arc<Mutex<VecDeque<IdleConnection>>>,
    /// Total number of live connections (idle + handed out)
    total: Arc<AtomicUsize>,
    /// Shared store all pooled connections write into
    store: Arc<InMemoryStore>,
    next_id: AtomicU64,
}

struct IdleConnection {
    connection: MemoryConnection,
    idle_since: Instant,
}

impl IdleConnection {
    fn new(connection: MemoryConnection) -> Self {
        Self {
            connection,
            idle_since: Instant::now(),
        }
    }

    fn is_expired(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|timeout| self.idle_since.elapsed() > timeout)
    }
}

impl ConnectionPool {
    /// Create a pool over a fresh, private store
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryStore::new()))
    }

    /// Create a pool over a shared store
    pub fn with_store(config: PoolConfig, store: Arc<InMemoryStore>) -> Result<Self> {
        config.validate().map_err(TxError::ConfigError)?;

        let pool = Self {
            config,
            available: Arc::new(Mutex::new(VecDeque::new())),
            total: Arc::new(AtomicUsize::new(0)),
            store,
            next_id: AtomicU64::new(1),
        };

        pool.ensure_min_connections()?;
        Ok(pool)
    }

    /// The store this pool's connections commit into
    pub fn store(&self) -> Arc<InMemoryStore> {
        Arc::clone(&self.store)
    }

    /// Get a connection from the pool.
    ///
    /// Blocks up to the configured acquire timeout, then fails with
    /// [`TxError::NoResourceAvailable`].
    pub async fn acquire(&self) -> Result<PoolGuard> {
        let start = Instant::now();

        loop {
            if let Some(connection) = self.checkout_idle()? {
                return Ok(self.guard(connection));
            }

            if let Some(connection) = self.try_open()? {
                return Ok(self.guard(connection));
            }

            if start.elapsed() >= self.config.acquire_timeout {
                return Err(TxError::NoResourceAvailable(self.config.acquire_timeout));
            }

            tokio::time::sleep(ACQUIRE_RETRY_INTERVAL).await;
        }
    }

    /// Get pool statistics
    pub fn stats(&self) -> Result<PoolStats> {
        let available = self.available.lock()?;
        let total = self.total.load(Ordering::SeqCst);

        Ok(PoolStats {
            total_connections: total,
            available_connections: available.len(),
            active_connections: total.saturating_sub(available.len()),
            max_connections: self.config.max_connections,
        })
    }

    fn guard(&self, connection: MemoryConnection) -> PoolGuard {
        PoolGuard {
            connection: Some(connection),
            available: Arc::clone(&self.available),
            total: Arc::clone(&self.total),
        }
    }

    /// Pop an idle connection, discarding any that sat idle for too long
    fn checkout_idle(&self) -> Result<Option<MemoryConnection>> {
        let mut available = self.available.lock()?;

        while let Some(idle) = available.pop_front() {
            if idle.is_expired(self.config.idle_timeout) {
                self.total.fetch_sub(1, Ordering::SeqCst);
                continue;
            }
            return Ok(Some(idle.connection));
        }

        Ok(None)
    }

    /// Open a new connection if the pool is under its limit
    fn try_open(&self) -> Result<Option<MemoryConnection>> {
        let max = self.config.max_connections;
        let reserved = self
            .total
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |total| {
                (total < max).then_some(total + 1)
            });
        if reserved.is_err() {
            return Ok(None);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Some(MemoryConnection::new(id, Arc::clone(&self.store))))
    }

    fn ensure_min_connections(&self) -> Result<()> {
        let mut available = self.available.lock()?;

        while self.total.load(Ordering::SeqCst) < self.config.min_connections {
            self.total.fetch_add(1, Ordering::SeqCst);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let connection = MemoryConnection::new(id, Arc::clone(&self.store));
            available.push_back(IdleConnection::new(connection));
        }

        Ok(())
    }
}

/// Connection pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}

/// RAII guard for pooled connections.
///
/// Returns the connection to the pool when dropped. A connection dropped
/// while still inside a physical transaction is discarded instead of
/// re-pooled, so the pool only ever hands out clean connections.
pub struct PoolGuard {
    connection: Option<MemoryConnection>,
    available: Arc<Mutex<VecDeque<IdleConnection>>>,
    total: Arc<AtomicUsize>,
}

impl PoolGuard {
    /// Get the pooled connection
    pub fn connection(&mut self) -> &mut MemoryConnection {
        self.connection
            .as_mut()
            .expect("Connection already returned to pool")
    }

    /// Read-only access to the pooled connection
    pub fn peek(&self) -> &MemoryConnection {
        self.connection
            .as_ref()
            .expect("Connection already returned to pool")
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if connection.is_in_transaction() {
                warn!(
                    "connection {} dropped mid-transaction, discarding instead of re-pooling",
                    connection.id()
                );
                connection.close();
                self.total.fetch_sub(1, Ordering::SeqCst);
                return;
            }

            match self.available.lock() {
                Ok(mut available) => available.push_back(IdleConnection::new(connection)),
                Err(_) => {
                    self.total.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }
    }
}
