//! Process-wide connection cache
//!
//! Owns the single connection handle for the process. The first caller
//! starts one connection attempt; every caller that arrives while it is in
//! flight awaits that same attempt, and everyone sees the same handle or the
//! same error. A failed attempt is forgotten so the next caller retries.
//!
//! The pending attempt is a `Shared` future behind a mutex. The mutex is only
//! held to read or swap the marker, never across an await.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, DatabaseConfig};

/// Failure to establish the shared connection.
///
/// Cloneable so that every waiter on one attempt receives the same error.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    #[error("failed to connect to database: {0}")]
    Failed(#[source] Arc<sqlx::Error>),

    #[error("connection attempt timed out after {0:?}")]
    TimedOut(Duration),

    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// The shared connection has not been established yet
    #[error("database connection is not ready")]
    NotReady,
}

impl From<sqlx::Error> for ConnectionError {
    fn from(e: sqlx::Error) -> Self {
        Self::Failed(Arc::new(e))
    }
}

/// Something that can open a connection handle from a config.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The shared handle; cloning must be cheap (e.g. a pool).
    type Handle: Clone + Send + Sync + 'static;

    async fn connect(&self, config: &DatabaseConfig) -> Result<Self::Handle, ConnectionError>;
}

type Attempt<H> = Shared<BoxFuture<'static, Result<H, ConnectionError>>>;

/// In-flight attempt tagged with its sequence number
struct Pending<H> {
    seq: u64,
    attempt: Attempt<H>,
}

/// Single-flight cache around one connection handle
pub struct ConnectionCache<C: Connector> {
    config: Arc<DatabaseConfig>,
    connector: Arc<C>,
    ready: OnceLock<C::Handle>,
    pending: Mutex<Option<Pending<C::Handle>>>,
    attempts: AtomicU64,
}

impl<C: Connector> ConnectionCache<C> {
    /// Create an empty cache. No connection is opened until [`acquire`](Self::acquire).
    pub fn new(config: DatabaseConfig, connector: C) -> Self {
        Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
            ready: OnceLock::new(),
            pending: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    /// Create a cache configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` immediately if `DATABASE_URL` is absent.
    pub fn from_env(connector: C) -> Result<Self, ConfigError> {
        Ok(Self::new(DatabaseConfig::from_env()?, connector))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Whether a handle has been established.
    pub fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    /// The established handle, if any, without waiting.
    pub fn try_get(&self) -> Option<C::Handle> {
        self.ready.get().cloned()
    }

    /// The established handle, failing fast when there is none.
    ///
    /// Never starts or waits on a connection attempt; use
    /// [`acquire`](Self::acquire) to connect.
    pub fn ready(&self) -> Result<C::Handle, ConnectionError> {
        self.try_get().ok_or(ConnectionError::NotReady)
    }

    /// Number of connection attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Get the shared handle, connecting on first use.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the attempt this caller joined failed or
    /// timed out. The cache is left empty so a later call can retry.
    pub async fn acquire(&self) -> Result<C::Handle, ConnectionError> {
        if let Some(handle) = self.ready.get() {
            trace!("connection cache hit");
            return Ok(handle.clone());
        }

        let (seq, attempt) = self.join_or_start();
        let result = attempt.await;

        match &result {
            Ok(handle) => {
                if self.ready.set(handle.clone()).is_ok() {
                    info!(attempt = seq, "database connection ready");
                }
            }
            Err(err) => {
                let mut pending = self.lock_pending();
                if pending.as_ref().is_some_and(|p| p.seq == seq) {
                    *pending = None;
                    warn!(attempt = seq, error = %err, "database connection attempt failed");
                }
            }
        }

        result
    }

    fn join_or_start(&self) -> (u64, Attempt<C::Handle>) {
        let mut pending = self.lock_pending();

        if let Some(p) = pending.as_ref() {
            debug!(attempt = p.seq, "joining in-flight connection attempt");
            return (p.seq, p.attempt.clone());
        }

        let seq = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let connector = Arc::clone(&self.connector);
        let config = Arc::clone(&self.config);
        let timeout = config.connect_timeout();

        info!(attempt = seq, url = %config.redacted_url(), "opening database connection");

        let attempt = async move {
            match tokio::time::timeout(timeout, connector.connect(&config)).await {
                Ok(result) => result,
                Err(_) => Err(ConnectionError::TimedOut(timeout)),
            }
        }
        .boxed()
        .shared();

        *pending = Some(Pending {
            seq,
            attempt: attempt.clone(),
        });

        (seq, attempt)
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<Pending<C::Handle>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("config", &self.config)
            .field("ready", &self.is_ready())
            .field("attempts", &self.attempts())
            .finish()
    }
}
