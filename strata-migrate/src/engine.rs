//! Migration engine implementation.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use strata_query::{Executor, Statement, Transaction};
use strata_schema::config::DatabaseProvider;
use strata_schema::{EntityRegistry, StrataConfig};
use tracing::{debug, info, warn};

use crate::diff::{SnapshotComparison, compare};
use crate::drift::{SchemaDrift, detect_drift};
use crate::error::{MigrateResult, MigrationError};
use crate::file::{MigrationArtifact, MigrationFileManager};
use crate::history::{HistoryTable, Migration, MigrationHistoryRepository};
use crate::operation::{DropTableOperation, MigrationOperation};
use crate::order::DependencyGraph;
use crate::plan::{OperationPlanner, PlannedMigration};
use crate::snapshot::{ModelSnapshot, SNAPSHOT_FILE, SnapshotStore};
use crate::sql::PostgresSqlGenerator;

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Snapshot document name inside the migrations directory.
    pub snapshot_file: String,
    /// Name of the applied-migrations table.
    pub history_table: String,
    /// Whether to run in dry-run mode.
    pub dry_run: bool,
    /// Whether to allow data loss (dropping tables/columns) without warnings.
    pub allow_data_loss: bool,
    /// Log every executed statement at info level instead of debug.
    pub log_queries: bool,
    /// Database the rendered SQL targets.
    pub provider: DatabaseProvider,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            snapshot_file: SNAPSHOT_FILE.to_string(),
            history_table: crate::history::DEFAULT_HISTORY_TABLE.to_string(),
            dry_run: false,
            allow_data_loss: false,
            log_queries: false,
            provider: DatabaseProvider::PostgreSql,
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Set the snapshot document name.
    pub fn snapshot_file(mut self, name: impl Into<String>) -> Self {
        self.snapshot_file = name.into();
        self
    }

    /// Set the applied-migrations table name.
    pub fn history_table(mut self, name: impl Into<String>) -> Self {
        self.history_table = name.into();
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Allow data loss operations.
    pub fn allow_data_loss(mut self, allow: bool) -> Self {
        self.allow_data_loss = allow;
        self
    }

    /// Log executed statements at info level.
    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Set the target database.
    pub fn provider(mut self, provider: DatabaseProvider) -> Self {
        self.provider = provider;
        self
    }
}

impl From<&StrataConfig> for MigrationConfig {
    fn from(config: &StrataConfig) -> Self {
        Self::new()
            .migrations_dir(&config.migrations.directory)
            .snapshot_file(&config.migrations.snapshot_file)
            .history_table(&config.migrations.table_name)
            .allow_data_loss(config.migrations.allow_data_loss)
            .log_queries(config.debug.log_queries)
            .provider(config.database.provider)
    }
}

/// A migration produced by [`MigrationEngine::add_migration`].
#[derive(Debug, Clone)]
pub struct GeneratedMigration {
    /// The artifact.
    pub artifact: MigrationArtifact,
    /// Where it was written; `None` in dry-run mode.
    pub path: Option<PathBuf>,
    /// The comparison it was planned from; `None` for the initial migration.
    pub comparison: Option<SnapshotComparison>,
    /// Planning warnings.
    pub warnings: Vec<String>,
}

/// Result of applying or reverting migrations.
#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    /// IDs of applied migrations.
    pub applied_migrations: Vec<String>,
    /// IDs of reverted migrations, newest first.
    pub rolled_back_migrations: Vec<String>,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
    /// Warnings generated during migration.
    pub warnings: Vec<String>,
}

impl MigrationResult {
    /// Number of migrations applied.
    pub fn applied_count(&self) -> usize {
        self.applied_migrations.len()
    }

    /// Check if any migrations were applied or reverted.
    pub fn has_changes(&self) -> bool {
        !self.applied_migrations.is_empty() || !self.rolled_back_migrations.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.applied_migrations.is_empty() {
            parts.push(format!("{} applied", self.applied_migrations.len()));
        }

        if !self.rolled_back_migrations.is_empty() {
            parts.push(format!("{} rolled back", self.rolled_back_migrations.len()));
        }

        if parts.is_empty() {
            "No migrations applied".to_string()
        } else {
            format!("{} in {}ms", parts.join(", "), self.duration_ms)
        }
    }
}

/// A migration artifact and whether it has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    /// Migration ID.
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// Snapshot version.
    pub version: u32,
    /// Whether the migration is recorded as applied.
    pub applied: bool,
}

/// Migration status information.
#[derive(Debug)]
pub struct MigrationStatus {
    /// Applied migrations.
    pub applied: Vec<Migration>,
    /// Pending migration IDs.
    pub pending: Vec<String>,
    /// Total number of applied migrations.
    pub total_applied: usize,
    /// Total number of pending migrations.
    pub total_pending: usize,
}

/// The main migration engine.
pub struct MigrationEngine<X: Executor, H: MigrationHistoryRepository> {
    config: MigrationConfig,
    executor: X,
    history: H,
    file_manager: MigrationFileManager,
    snapshots: SnapshotStore,
    sql_generator: PostgresSqlGenerator,
    planner: OperationPlanner,
}

impl<X: Executor, H: MigrationHistoryRepository> MigrationEngine<X, H> {
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig, executor: X, history: H) -> Self {
        let file_manager = MigrationFileManager::new(&config.migrations_dir);
        let snapshots = SnapshotStore::new(&config.migrations_dir, &config.snapshot_file);
        let planner = OperationPlanner::new().allow_data_loss(config.allow_data_loss);
        Self {
            config,
            executor,
            history,
            file_manager,
            snapshots,
            sql_generator: PostgresSqlGenerator,
            planner,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the executor.
    pub fn executor(&self) -> &X {
        &self.executor
    }

    /// Get the history repository.
    pub fn history(&self) -> &H {
        &self.history
    }

    /// Get the artifact file manager.
    pub fn file_manager(&self) -> &MigrationFileManager {
        &self.file_manager
    }

    /// Get the snapshot store.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// SQL helpers for the configured history table.
    pub fn history_table(&self) -> HistoryTable {
        HistoryTable::new(&self.config.history_table)
    }

    /// Initialize the migration system.
    ///
    /// Creates the migrations directory and the applied-migrations table.
    /// Only PostgreSQL is rendered; any other provider is rejected here.
    pub async fn initialize(&self) -> MigrateResult<()> {
        if self.config.provider != DatabaseProvider::PostgreSql {
            return Err(MigrationError::InvalidMigration(format!(
                "no SQL renderer for provider '{}'",
                self.config.provider.as_str()
            )));
        }
        self.file_manager.ensure_dir().await?;
        if self.config.dry_run {
            info!(table = %self.config.history_table, "[DRY RUN] would create history table");
        } else {
            self.run_in_transaction(&self.history_table().create_statements())
                .await?;
        }
        self.history.initialize().await?;
        Ok(())
    }

    /// Generate a migration from the registered entities.
    ///
    /// Without a previous snapshot every entity becomes a `CreateTable`, in
    /// dependency order. Otherwise the current model is compared with the
    /// stored snapshot; [`MigrationError::NoChanges`] means there is nothing
    /// to do. The artifact is written before the snapshot, so a failed write
    /// leaves the previous snapshot in place.
    pub async fn add_migration(
        &self,
        name: &str,
        registry: &EntityRegistry,
    ) -> MigrateResult<GeneratedMigration> {
        let previous = self.snapshots.load().await?;
        let current = ModelSnapshot::new(registry.iter());

        let (plan, comparison, version) = match &previous {
            None => {
                let mut warnings = Vec::new();
                let graph = DependencyGraph::from_models(registry.iter());
                let order = match graph.try_topological_sort() {
                    Ok(order) => order,
                    Err(report) => {
                        warn!(%report, "falling back to registration order");
                        warnings.push(format!("{}; using registration order", report));
                        graph.nodes().to_vec()
                    }
                };
                let mut plan = self.planner.plan_initial(&current, &order)?;
                plan.warnings.extend(warnings);
                (plan, None, 1)
            }
            Some(previous) => {
                let comparison = compare(&current, Some(previous));
                if !comparison.has_changes {
                    if current.checksum == previous.checksum {
                        info!("model matches the stored snapshot");
                    } else {
                        warn!(
                            stored = %previous.checksum,
                            current = %current.checksum,
                            "model differs from the snapshot only in settings migrations do not cover, such as indexes"
                        );
                    }
                    return Err(MigrationError::NoChanges);
                }
                debug!(changes = %comparison.summary(), "comparison");
                let plan = self.planner.plan_changes(&comparison, &current, previous)?;
                (plan, Some(comparison), previous.version + 1)
            }
        };
        let PlannedMigration { up, down, warnings } = plan;
        if up.is_empty() {
            return Err(MigrationError::NoChanges);
        }

        let current = current.with_version(version);
        let id = self.file_manager.next_id(name).await?;
        let artifact = MigrationArtifact::new(id, name, up, down, current.clone());

        if self.config.dry_run {
            info!(migration = %artifact.id, "[DRY RUN] would write migration");
            return Ok(GeneratedMigration {
                artifact,
                path: None,
                comparison,
                warnings,
            });
        }

        let path = self.file_manager.write(&artifact).await?;
        self.snapshots.save(&current).await?;
        info!(
            migration = %artifact.id,
            operations = artifact.up.len(),
            version,
            "generated migration"
        );

        Ok(GeneratedMigration {
            artifact,
            path: Some(path),
            comparison,
            warnings,
        })
    }

    /// All migrations on disk, oldest first.
    pub async fn list_migrations(&self) -> MigrateResult<Vec<MigrationInfo>> {
        let applied = self.applied_ids().await?;
        Ok(self
            .file_manager
            .list()
            .await?
            .into_iter()
            .map(|a| MigrationInfo {
                applied: applied.contains(&a.id),
                id: a.id,
                name: a.name,
                version: a.version,
            })
            .collect())
    }

    /// Delete the newest migration, which must not be applied.
    ///
    /// The snapshot is restored to the one stored with the previous
    /// migration, or deleted when no migration remains.
    pub async fn remove_migration(&self) -> MigrateResult<String> {
        let mut artifacts = self.file_manager.list().await?;
        let Some(newest) = artifacts.pop() else {
            return Err(MigrationError::NotFound("no migrations to remove".to_string()));
        };
        if self.history.is_applied(&newest.id).await? {
            return Err(MigrationError::AlreadyApplied(newest.id));
        }

        if self.config.dry_run {
            info!(migration = %newest.id, "[DRY RUN] would remove migration");
            return Ok(newest.id);
        }

        self.file_manager.delete(&newest.id).await?;
        match artifacts.last() {
            Some(previous) => self.snapshots.save(&previous.snapshot).await?,
            None => self.snapshots.delete().await?,
        }
        info!(migration = %newest.id, "removed migration");
        Ok(newest.id)
    }

    /// Apply pending migrations, oldest first.
    ///
    /// Each migration runs in its own transaction; the first failure rolls
    /// that migration back and stops. A pending migration older than the
    /// last applied one is applied anyway, with a warning.
    pub async fn update(&self) -> MigrateResult<MigrationResult> {
        let start = Instant::now();
        let mut result = MigrationResult::default();

        let applied = self.history.get_applied().await?;
        let artifacts = self.file_manager.list().await?;

        for record in &applied {
            if let Some(artifact) = artifacts.iter().find(|a| a.id == record.id)
                && artifact.checksum != record.checksum
            {
                return Err(MigrationError::ChecksumMismatch {
                    id: record.id.clone(),
                    expected: record.checksum.clone(),
                    actual: artifact.checksum.clone(),
                });
            }
        }

        let applied_ids: HashSet<&str> = applied.iter().map(|m| m.id.as_str()).collect();
        let pending: Vec<&MigrationArtifact> = artifacts
            .iter()
            .filter(|a| !applied_ids.contains(a.id.as_str()))
            .collect();

        let mut depends_on = applied.last().map(|m| m.id.clone());
        if let Some(last) = &depends_on {
            let last_stamp = last.get(..14).unwrap_or(last);
            for artifact in &pending {
                if artifact.timestamp() < last_stamp {
                    let msg = format!(
                        "Migration '{}' is older than the last applied migration '{}'",
                        artifact.id, last
                    );
                    warn!("{}", msg);
                    result.warnings.push(msg);
                }
            }
        }

        for artifact in pending {
            if self.config.dry_run {
                result
                    .warnings
                    .push(format!("[DRY RUN] Would apply: {}", artifact.id));
                result.applied_migrations.push(artifact.id.clone());
                continue;
            }

            let record = Migration {
                id: artifact.id.clone(),
                name: artifact.name.clone(),
                applied_at: Utc::now(),
                version: artifact.version,
                checksum: artifact.checksum.clone(),
                depends_on: depends_on.take(),
            };
            let mut statements = self.sql_generator.generate(&artifact.up);
            statements.push(self.history_table().insert(&record));
            self.run_in_transaction(&statements).await?;
            self.history.record_applied(&record).await?;
            info!(migration = %artifact.id, statements = statements.len(), "applied migration");

            depends_on = Some(record.id);
            result.applied_migrations.push(artifact.id.clone());
        }

        result.duration_ms = start.elapsed().as_millis() as i64;
        Ok(result)
    }

    /// Revert the last `steps` applied migrations, newest first.
    pub async fn rollback(&self, steps: usize) -> MigrateResult<MigrationResult> {
        let start = Instant::now();
        let mut result = MigrationResult::default();

        let applied = self.history.get_applied().await?;
        for record in applied.iter().rev().take(steps) {
            let artifact = self.file_manager.read(&record.id).await?;

            if self.config.dry_run {
                result
                    .warnings
                    .push(format!("[DRY RUN] Would rollback: {}", artifact.id));
                result.rolled_back_migrations.push(artifact.id);
                continue;
            }

            let mut statements = self.sql_generator.generate(&artifact.down);
            statements.push(self.history_table().delete(&artifact.id));
            self.run_in_transaction(&statements).await?;
            self.history.remove(&artifact.id).await?;
            info!(migration = %artifact.id, "rolled back migration");
            result.rolled_back_migrations.push(artifact.id);
        }

        result.duration_ms = start.elapsed().as_millis() as i64;
        Ok(result)
    }

    /// Drop every table in the snapshot and clear the history.
    ///
    /// Tables are dropped in reverse dependency order inside one
    /// transaction. Returns the dropped table names.
    pub async fn drop_database(&self) -> MigrateResult<Vec<String>> {
        let Some(snapshot) = self.snapshots.load().await? else {
            return Ok(Vec::new());
        };

        let mut order = DependencyGraph::from_snapshot(&snapshot).order_or_fallback();
        order.reverse();

        let drops: Vec<MigrationOperation> = order
            .iter()
            .filter_map(|name| snapshot.entity(name))
            .map(|entity| MigrationOperation::DropTable {
                entity_name: entity.name.clone(),
                details: DropTableOperation {
                    table_name: entity.table_name.clone(),
                    definition: None,
                },
            })
            .collect();
        let tables: Vec<String> = drops.iter().map(|op| op.table_name().to_string()).collect();

        if self.config.dry_run {
            info!(tables = ?tables, "[DRY RUN] would drop tables");
            return Ok(tables);
        }

        let mut statements = self.sql_generator.generate(&drops);
        statements.push(self.history_table().clear());
        self.run_in_transaction(&statements).await?;
        self.history.clear().await?;
        warn!(tables = ?tables, "dropped database tables");
        Ok(tables)
    }

    /// Get migration status.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let applied = self.history.get_applied().await?;
        let files = self.file_manager.list().await?;

        let applied_ids: HashSet<&str> = applied.iter().map(|r| r.id.as_str()).collect();

        let pending: Vec<_> = files
            .iter()
            .filter(|f| !applied_ids.contains(f.id.as_str()))
            .map(|f| f.id.clone())
            .collect();

        let total_applied = applied.len();
        let total_pending = pending.len();

        Ok(MigrationStatus {
            applied,
            pending,
            total_applied,
            total_pending,
        })
    }

    /// Compare the stored snapshot with the live database.
    pub async fn check_drift(&self) -> MigrateResult<SchemaDrift> {
        let Some(snapshot) = self.snapshots.load().await? else {
            return Ok(SchemaDrift::default());
        };

        let mut actual = HashMap::with_capacity(snapshot.len());
        for entity in snapshot.entities.values() {
            let columns = self.executor.introspect_columns(&entity.table_name).await?;
            actual.insert(entity.table_name.clone(), columns);
        }

        let drift = detect_drift(&snapshot, &actual);
        if drift.has_drift() {
            warn!(summary = %drift.summary(), "schema drift detected");
        }
        Ok(drift)
    }

    async fn applied_ids(&self) -> MigrateResult<HashSet<String>> {
        Ok(self
            .history
            .get_applied()
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect())
    }

    async fn run_in_transaction(&self, statements: &[Statement]) -> MigrateResult<()> {
        let mut tx = self.executor.begin_transaction().await?;
        for statement in statements {
            if self.config.log_queries {
                info!(sql = %statement.sql, params = statement.params.len(), "executing");
            } else {
                debug!(sql = %statement.sql, params = statement.params.len(), "executing");
            }
            if let Err(e) = tx.execute(statement).await {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                return Err(e.into());
            }
        }
        tx.commit().await?;
        Ok(())
    }
}
