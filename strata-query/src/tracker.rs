//! Change tracking and the unit-of-work save pipeline.
//!
//! The tracker maps an [`EntityKey`] to the entity it was computed from and
//! its lifecycle state. [`ChangeTracker::save_changes`] turns every pending
//! entry into one statement and runs the whole batch in a single
//! transaction.
//!
//! ```rust,no_run
//! use strata_query::testing::MemoryExecutor;
//! use strata_query::ChangeTracker;
//! # use strata_query::{Entity, Value};
//! # struct User { id: i64 }
//! # impl Entity for User {
//! #     fn type_name(&self) -> &str { "User" }
//! #     fn table_name(&self) -> &str { "users" }
//! #     fn primary_key(&self) -> &[&str] { &["id"] }
//! #     fn values(&self) -> Vec<(&str, Value)> { vec![("id", Value::Int(self.id))] }
//! # }
//!
//! # async fn example() -> strata_query::QueryResult<()> {
//! let executor = MemoryExecutor::new();
//! let tracker = ChangeTracker::new();
//! tracker.add(User { id: 1 });
//!
//! let saved = tracker.save_changes(&executor).await?;
//! assert_eq!(saved.inserted, 1);
//! assert!(tracker.is_empty());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::entity::Entity;
use crate::error::QueryResult;
use crate::executor::{Executor, Transaction};
use crate::identity::{EntityKey, IdentityStrategy, StructuralIdentity};
use crate::statement::{self, Statement};

/// Lifecycle state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Loaded and not changed since.
    Unchanged,
    /// New; inserted on save.
    Added,
    /// Changed; fully rewritten on save.
    Modified,
    /// Deleted on save.
    Deleted,
}

impl EntityState {
    /// Whether saving this state writes anything.
    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// One entry of the tracker.
#[derive(Clone)]
pub struct TrackedEntry {
    /// Derived identity.
    pub key: EntityKey,
    /// The tracked value.
    pub entity: Arc<dyn Entity>,
    /// Lifecycle state.
    pub state: EntityState,
    fingerprint: String,
}

impl fmt::Debug for TrackedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedEntry")
            .field("key", &self.key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Counts of rows written by a save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveResult {
    /// Inserted rows.
    pub inserted: usize,
    /// Updated rows.
    pub updated: usize,
    /// Deleted rows.
    pub deleted: usize,
}

impl SaveResult {
    /// Total number of statements executed.
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

#[derive(Clone, Copy)]
enum Action {
    Add,
    Update,
    Remove,
    Attach,
}

/// Tracks entity lifecycle state for one unit of work.
///
/// All reads and writes of the entry map go through a single lock. Saving
/// holds it only while collecting the pending entries and while settling
/// them after commit, so entities tracked during a save stay pending for the
/// next one. Concurrent `save_changes` calls on the same tracker are not
/// supported.
///
/// A pending insert tracked before its primary key was assigned is moved
/// under the real key the first time the keyed value is tracked, as long as
/// its non-key values are unchanged.
pub struct ChangeTracker<S: IdentityStrategy = StructuralIdentity> {
    strategy: S,
    entries: RwLock<IndexMap<EntityKey, TrackedEntry>>,
    log_queries: bool,
}

impl ChangeTracker<StructuralIdentity> {
    /// Create a tracker using structural identity.
    pub fn new() -> Self {
        Self::with_strategy(StructuralIdentity)
    }
}

impl Default for ChangeTracker<StructuralIdentity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: IdentityStrategy> fmt::Debug for ChangeTracker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

impl<S: IdentityStrategy> ChangeTracker<S> {
    /// Create a tracker with a custom identity strategy.
    pub fn with_strategy(strategy: S) -> Self {
        Self {
            strategy,
            entries: RwLock::new(IndexMap::new()),
            log_queries: false,
        }
    }

    /// Log saved statements at info level instead of debug.
    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Track a new entity to be inserted.
    pub fn add<E: Entity>(&self, entity: E) -> EntityKey {
        self.track(Arc::new(entity), Action::Add)
    }

    /// Track an entity to be fully rewritten.
    pub fn update<E: Entity>(&self, entity: E) -> EntityKey {
        self.track(Arc::new(entity), Action::Update)
    }

    /// Track an entity to be deleted.
    ///
    /// An entity that is still only `Added` is forgotten instead.
    pub fn remove<E: Entity>(&self, entity: E) -> EntityKey {
        self.track(Arc::new(entity), Action::Remove)
    }

    /// Track an entity as loaded from the database.
    ///
    /// Attaching a different value under a key already tracked as unchanged
    /// marks it modified.
    pub fn attach<E: Entity>(&self, entity: E) -> EntityKey {
        self.track(Arc::new(entity), Action::Attach)
    }

    /// Key the tracker would use for an entity.
    pub fn key_for(&self, entity: &dyn Entity) -> EntityKey {
        self.strategy.key_for(entity)
    }

    /// State of a tracked key; `None` when it is not tracked.
    pub fn state_of(&self, key: &EntityKey) -> Option<EntityState> {
        self.entries.read().get(key).map(|e| e.state)
    }

    /// State of the entry an entity maps to.
    pub fn state_of_entity(&self, entity: &dyn Entity) -> Option<EntityState> {
        self.state_of(&self.strategy.key_for(entity))
    }

    /// Tracked value for a key.
    pub fn get(&self, key: &EntityKey) -> Option<Arc<dyn Entity>> {
        self.entries.read().get(key).map(|e| Arc::clone(&e.entity))
    }

    /// Snapshot of all entries in tracking order.
    pub fn entries(&self) -> Vec<TrackedEntry> {
        self.entries.read().values().cloned().collect()
    }

    /// Whether any entry would be written on save.
    pub fn has_changes(&self) -> bool {
        self.entries.read().values().any(|e| e.state.is_pending())
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Forget every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn track(&self, entity: Arc<dyn Entity>, action: Action) -> EntityKey {
        let key = self.strategy.key_for(entity.as_ref());
        let fingerprint = self.strategy.fingerprint(entity.as_ref());

        let mut entries = self.entries.write();
        if !entries.contains_key(&key)
            && let Some(provisional) = self.strategy.provisional_key(entity.as_ref())
            && entries
                .get(&provisional)
                .is_some_and(|e| e.state == EntityState::Added)
            && let Some((index, _, pending)) = entries.shift_remove_full(&provisional)
        {
            debug!(from = %provisional, to = %key, "reconciled unsaved entity with its key");
            entries.shift_insert(
                index,
                key.clone(),
                TrackedEntry {
                    key: key.clone(),
                    ..pending
                },
            );
        }
        let current = entries.get(&key).map(|e| (e.state, e.fingerprint == fingerprint));

        let next = match (current, action) {
            (None, Action::Add) => Some(EntityState::Added),
            (None, Action::Update) => Some(EntityState::Modified),
            (None, Action::Remove) => Some(EntityState::Deleted),
            (None, Action::Attach) => Some(EntityState::Unchanged),

            (Some((EntityState::Added, _)), Action::Remove) => None,
            (Some((EntityState::Added, _)), _) => Some(EntityState::Added),

            (Some((_, _)), Action::Remove) => Some(EntityState::Deleted),
            (Some((EntityState::Deleted, _)), Action::Attach) => Some(EntityState::Deleted),
            (Some((EntityState::Unchanged, same)), Action::Add | Action::Attach) => Some(if same {
                EntityState::Unchanged
            } else {
                EntityState::Modified
            }),
            (Some((_, _)), _) => Some(EntityState::Modified),
        };

        match next {
            Some(state) => {
                debug!(key = %key, state = %state, "tracking entity");
                entries.insert(
                    key.clone(),
                    TrackedEntry {
                        key: key.clone(),
                        entity,
                        state,
                        fingerprint,
                    },
                );
            }
            None => {
                debug!(key = %key, "forgetting unsaved entity");
                entries.shift_remove(&key);
            }
        }
        key
    }

    /// Write every pending entry in one transaction.
    ///
    /// Statements are rendered before the transaction opens, so an entity
    /// that cannot be addressed fails the save without touching the
    /// database. Any failure inside the transaction rolls back the whole
    /// batch and leaves the tracker as it was. On commit every entry seen by
    /// the save is forgotten unless it was tracked again meanwhile.
    pub async fn save_changes<X: Executor>(&self, executor: &X) -> QueryResult<SaveResult> {
        let seen: Vec<TrackedEntry> = self.entries.read().values().cloned().collect();
        let pending: Vec<&TrackedEntry> = seen.iter().filter(|e| e.state.is_pending()).collect();

        if pending.is_empty() {
            debug!("no pending changes to save");
            return Ok(SaveResult::default());
        }

        let mut result = SaveResult::default();
        let mut statements: Vec<Statement> = Vec::with_capacity(pending.len());
        for entry in pending {
            let entity = entry.entity.as_ref();
            let stmt = match entry.state {
                EntityState::Added => {
                    result.inserted += 1;
                    statement::insert_statement(entity)
                }
                EntityState::Modified => {
                    result.updated += 1;
                    statement::update_statement(entity)
                }
                EntityState::Deleted => {
                    result.deleted += 1;
                    statement::delete_statement(entity)
                }
                EntityState::Unchanged => continue,
            }?;
            statements.push(stmt);
        }

        let mut tx = executor.begin_transaction().await?;
        for stmt in &statements {
            if self.log_queries {
                info!(sql = %stmt.sql, params = stmt.params.len(), "executing");
            } else {
                debug!(sql = %stmt.sql, params = stmt.params.len(), "executing");
            }
            if let Err(err) = tx.execute(stmt).await {
                warn!(error = %err, "save failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return Err(err.with_sql(stmt.sql.clone()));
            }
        }

        if let Err(err) = tx.commit().await {
            warn!(error = %err, "commit failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            return Err(err);
        }

        self.settle(&seen);
        info!(
            inserted = result.inserted,
            updated = result.updated,
            deleted = result.deleted,
            "saved changes"
        );
        Ok(result)
    }

    /// Drop the entries a committed save covered. An entry tracked again
    /// during the save is kept; one that was inserted becomes a rewrite.
    fn settle(&self, seen: &[TrackedEntry]) {
        let mut entries = self.entries.write();
        for saved in seen {
            let Some(current) = entries.get_mut(&saved.key) else {
                continue;
            };
            let untouched =
                current.state == saved.state && current.fingerprint == saved.fingerprint;
            if !untouched && saved.state == EntityState::Added && current.state == EntityState::Added
            {
                current.state = EntityState::Modified;
            }
            if untouched {
                entries.shift_remove(&saved.key);
            }
        }
    }
}
