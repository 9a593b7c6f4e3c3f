//! Service layer owning the history engine state.
//!
//! `HistoryService` wraps `TemporaDb` (raw database access) together with the
//! naming rules, the clock, the registry, and the introspector. Synthesis,
//! capture, teardown, and history reads are implemented as `impl
//! HistoryService` blocks in their own modules.
//!
//! Each instance owns its registry handle; nothing is process-global, so
//! several services over different stores can coexist (e.g. in tests).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempora_config::TemporaConfig;
use tempora_core::{Clock, EntityShape, HistoryNaming, RegistryEntry, SystemClock};

use crate::TemporaDb;
use crate::error::DatabaseError;
use crate::introspect::SchemaIntrospector;
use crate::registry::HistoryRegistry;

/// The history engine.
///
/// Every write to a versioned live table must go through the mutation
/// methods in [`crate::store`]; writes issued directly on the connection are
/// not captured.
pub struct HistoryService {
    db: TemporaDb,
    naming: HistoryNaming,
    follow_inheritance: bool,
    versioned_tables: Vec<String>,
    clock: Arc<dyn Clock>,
    registry: HistoryRegistry,
    introspector: SchemaIntrospector,
}

impl HistoryService {
    /// Create a service over a local database with the given naming rules.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the naming rules are invalid or the
    /// database cannot be opened.
    pub async fn new_local(db_path: &str, naming: HistoryNaming) -> Result<Self, DatabaseError> {
        naming.validate()?;
        let db = TemporaDb::open_local(db_path).await?;
        Ok(Self::from_db(db, naming))
    }

    /// Create a service from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn from_config(config: &TemporaConfig) -> Result<Self, DatabaseError> {
        let mut service = Self::new_local(&config.database.path, config.history.naming()).await?;
        service.follow_inheritance = config.history.follow_inheritance;
        service
            .versioned_tables
            .clone_from(&config.history.versioned_tables);
        Ok(service)
    }

    /// Create from an existing `TemporaDb` (for testing).
    #[must_use]
    pub fn from_db(db: TemporaDb, naming: HistoryNaming) -> Self {
        Self {
            db,
            naming,
            follow_inheritance: true,
            versioned_tables: Vec::new(),
            clock: Arc::new(SystemClock),
            registry: HistoryRegistry,
            introspector: SchemaIntrospector,
        }
    }

    /// Replace the transaction clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &TemporaDb {
        &self.db
    }

    #[must_use]
    pub const fn naming(&self) -> &HistoryNaming {
        &self.naming
    }

    #[must_use]
    pub const fn registry(&self) -> &HistoryRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn introspector(&self) -> &SchemaIntrospector {
        &self.introspector
    }

    /// Whether synthesis mirrors live inheritance by default.
    #[must_use]
    pub const fn follows_inheritance(&self) -> bool {
        self.follow_inheritance
    }

    /// Tables named in configuration for `bootstrap_from_config`.
    #[must_use]
    pub fn configured_tables(&self) -> &[String] {
        &self.versioned_tables
    }

    /// Current transaction timestamp.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Whether a live table has a registry entry.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the catalog query fails.
    pub async fn is_versioned(&self, live_table: &str) -> Result<bool, DatabaseError> {
        let read = self.db.begin_read().await;
        Ok(self.registry.lookup(read.conn(), live_table).await?.is_some())
    }

    /// All registry entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the catalog query fails.
    pub async fn registry_entries(&self) -> Result<Vec<RegistryEntry>, DatabaseError> {
        let read = self.db.begin_read().await;
        self.registry.all(read.conn()).await
    }

    /// Describe a live table.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::UnknownEntity` if the table does not exist.
    pub async fn describe(&self, live_table: &str) -> Result<EntityShape, DatabaseError> {
        let read = self.db.begin_read().await;
        self.introspector.describe(read.conn(), live_table).await
    }

    /// Record a live inheritance link (schema tooling entry point).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::UnknownEntity` if either table is missing.
    pub async fn declare_inheritance(&self, child: &str, parent: &str) -> Result<(), DatabaseError> {
        let tx = self.db.begin_write().await?;
        let result = self
            .introspector
            .declare_inheritance(tx.conn(), child, parent)
            .await;
        tx.settle(result).await
    }
}
