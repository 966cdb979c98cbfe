//! Application state shared across handlers
//!
//! Built once at process start and passed by reference to every handler.
//! [`AppState::init_global`] installs one instance for the whole process;
//! repeated initialization (e.g. a reloaded module) gets the first instance
//! back, so the pool is never opened twice.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::booking::BookingGate;
use crate::config::{ConfigError, DatabaseConfig};
use crate::db::repos::{
    BookingStore, DbError, EventLookup, PgBookingRepo, PgEventRepo,
};
use crate::db::{self, ConnectionError, PgCache, PgConnector, MIGRATOR};
use crate::registry::ModelRegistry;

static GLOBAL: OnceCell<AppState> = OnceCell::new();

/// Shared application state
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    cache: Arc<PgCache>,
    registry: Arc<ModelRegistry>,
    bookings: BookingGate,
}

impl AppState {
    /// Wire the cache, registry and booking gate. Does not connect.
    pub fn new(config: DatabaseConfig) -> Self {
        let operation_timeout = config.operation_timeout();
        let cache = Arc::new(PgCache::new(config, PgConnector));

        let registry = Arc::new(ModelRegistry::new());
        registry.register::<dyn EventLookup>(Arc::new(PgEventRepo::new(Arc::clone(&cache))));
        registry.register::<dyn BookingStore>(Arc::new(PgBookingRepo::new(Arc::clone(&cache))));

        let bookings = BookingGate::new(Arc::clone(&registry), operation_timeout);

        Self {
            inner: Arc::new(AppStateInner {
                cache,
                registry,
                bookings,
            }),
        }
    }

    /// Build from the process environment.
    ///
    /// # Errors
    ///
    /// Fails synchronously with `ConfigError` when `DATABASE_URL` is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(DatabaseConfig::from_env()?))
    }

    /// Install `state` as the process-wide instance, or return the one
    /// already installed.
    pub fn init_global(state: AppState) -> &'static AppState {
        let mut installed = false;
        let global = GLOBAL.get_or_init(|| {
            installed = true;
            state
        });

        if installed {
            info!("application state initialized");
        } else {
            debug!("application state already initialized; reusing");
        }
        global
    }

    /// The process-wide instance, if installed.
    pub fn global() -> Option<&'static AppState> {
        GLOBAL.get()
    }

    pub fn cache(&self) -> &Arc<PgCache> {
        &self.inner.cache
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.inner.registry
    }

    pub fn bookings(&self) -> &BookingGate {
        &self.inner.bookings
    }

    /// Get the shared pool, connecting on first use.
    pub async fn pool(&self) -> Result<PgPool, ConnectionError> {
        self.inner.cache.acquire().await
    }

    /// Run embedded migrations against the shared pool.
    pub async fn migrate(&self) -> Result<(), DbError> {
        let pool = self.pool().await?;
        info!("Running migrations...");
        MIGRATOR.run(&pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Close the shared pool if it was opened. Waits for checked-out
    /// connections to be returned.
    pub async fn close(&self) {
        if let Some(pool) = self.inner.cache.try_get() {
            pool.close().await;
            info!("database pool closed");
        }
    }

    /// Connect if needed and round-trip a trivial query.
    pub async fn health_check(&self) -> Result<(), DbError> {
        let pool = self.pool().await?;
        db::health_check(&pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSettings;
    use crate::booking::BookingError;
    use crate::db::repos::{BOOKING_MODEL, EVENT_MODEL};
    use crate::models::EventId;

    fn config() -> DatabaseConfig {
        DatabaseConfig::new("postgres://localhost/evently", PoolSettings::default()).unwrap()
    }

    #[test]
    fn new_registers_both_models_without_connecting() {
        let state = AppState::new(config());

        assert!(!state.cache().is_ready());
        assert_eq!(state.cache().attempts(), 0);
        assert_eq!(state.registry().names(), vec![BOOKING_MODEL, EVENT_MODEL]);
        assert!(state.registry().contains::<dyn EventLookup>());
    }

    #[tokio::test]
    async fn close_without_connection_is_noop() {
        let state = AppState::new(config());
        state.close().await;
        assert_eq!(state.cache().attempts(), 0);
    }

    #[tokio::test]
    async fn cold_cache_create_fails_fast_with_connection_error() {
        let unreachable =
            DatabaseConfig::new("postgres://evently@127.0.0.1:1/evently", PoolSettings::default())
                .unwrap();
        let state = AppState::new(unreachable);

        let err = state
            .bookings()
            .create(&EventId::new().to_string(), "a@b.com")
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Connection(ConnectionError::NotReady)));
        assert!(err.is_retryable());
        assert_eq!(state.cache().attempts(), 0);
    }

    #[test]
    fn global_is_installed_once() {
        let first = AppState::init_global(AppState::new(config()));
        let second = AppState::init_global(AppState::new(config()));

        assert!(Arc::ptr_eq(&first.inner, &second.inner));
        assert!(Arc::ptr_eq(
            &AppState::global().unwrap().inner,
            &first.inner
        ));
    }
}
