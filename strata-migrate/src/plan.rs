//! Turning snapshot changes into ordered operations.

use tracing::{debug, warn};

use crate::diff::{SnapshotChange, SnapshotComparison};
use crate::error::{MigrateResult, MigrationError};
use crate::operation::{
    AddColumnOperation, AlterColumnOperation, ColumnDefinition, CreateTableOperation,
    DropColumnOperation, DropTableOperation, ForeignKeyReference, IndexDefinition,
    MigrationOperation, RenameColumnOperation,
};
use crate::order::DependencyGraph;
use crate::snapshot::{EntitySnapshot, FieldSnapshot, ModelSnapshot};

/// Up and Down operations for one migration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannedMigration {
    /// Operations that apply the change.
    pub up: Vec<MigrationOperation>,
    /// Operations that undo it, in execution order.
    pub down: Vec<MigrationOperation>,
    /// Non-fatal issues found while planning.
    pub warnings: Vec<String>,
}

impl PlannedMigration {
    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
    }
}

/// Builds operation lists from snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationPlanner {
    allow_data_loss: bool,
}

impl OperationPlanner {
    /// Create a planner that warns about data loss.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow data loss operations without warnings.
    pub fn allow_data_loss(mut self, allow: bool) -> Self {
        self.allow_data_loss = allow;
        self
    }

    /// One `CreateTable` per entity, following `order`.
    ///
    /// Entities missing from `order` are appended in name order.
    pub fn plan_initial(
        &self,
        snapshot: &ModelSnapshot,
        order: &[String],
    ) -> MigrateResult<PlannedMigration> {
        let mut names: Vec<&str> = order
            .iter()
            .map(String::as_str)
            .filter(|n| snapshot.entities.contains_key(*n))
            .collect();
        for name in snapshot.entities.keys() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }

        let up = names
            .into_iter()
            .filter_map(|n| snapshot.entity(n))
            .map(|entity| create_table(entity, snapshot))
            .collect();
        finish(up, Vec::new())
    }

    /// Operations for an incremental comparison.
    ///
    /// Order: created tables (dependency order), renames, alterations, added
    /// columns, dropped columns, dropped tables (reverse dependency order).
    pub fn plan_changes(
        &self,
        comparison: &SnapshotComparison,
        current: &ModelSnapshot,
        previous: &ModelSnapshot,
    ) -> MigrateResult<PlannedMigration> {
        let mut warnings = Vec::new();

        let mut creates = Vec::new();
        let mut renames = Vec::new();
        let mut alters = Vec::new();
        let mut adds = Vec::new();
        let mut drops = Vec::new();
        let mut dropped_tables = Vec::new();

        for change in &comparison.changes {
            match change {
                SnapshotChange::EntityAdded { entity } => creates.push(entity),
                SnapshotChange::EntityRemoved { entity } => dropped_tables.push(entity),
                SnapshotChange::FieldAdded { entity, field } => {
                    let Some(owner) = current.entity(entity) else {
                        continue;
                    };
                    adds.push(MigrationOperation::AddColumn {
                        entity_name: entity.clone(),
                        details: AddColumnOperation {
                            table_name: owner.table_name.clone(),
                            column: column(field, current),
                        },
                    });
                }
                SnapshotChange::FieldRemoved { entity, field } => {
                    let Some(owner) = previous.entity(entity) else {
                        continue;
                    };
                    drops.push(MigrationOperation::DropColumn {
                        entity_name: entity.clone(),
                        details: DropColumnOperation {
                            table_name: owner.table_name.clone(),
                            column_name: field.column_name.clone(),
                            column: Some(column(field, previous)),
                        },
                    });
                }
                SnapshotChange::FieldModified { entity, old, new } => {
                    let Some(owner) = current.entity(entity) else {
                        continue;
                    };
                    alters.push(alter(entity, &owner.table_name, old, new, previous, current));
                }
                SnapshotChange::FieldRenamed {
                    entity, old, new, ..
                } => {
                    let Some(owner) = current.entity(entity) else {
                        continue;
                    };
                    if old.column_name != new.column_name {
                        renames.push(MigrationOperation::RenameColumn {
                            entity_name: entity.clone(),
                            details: RenameColumnOperation {
                                table_name: owner.table_name.clone(),
                                old_name: old.column_name.clone(),
                                new_name: new.column_name.clone(),
                            },
                        });
                    }
                    if !old.same_descriptor(new) {
                        alters.push(alter(entity, &owner.table_name, old, new, previous, current));
                    }
                }
            }
        }

        let mut up = Vec::new();

        if !creates.is_empty() {
            let order = self.order(current, &mut warnings);
            creates.sort_by_key(|e| order.iter().position(|n| *n == e.name));
            up.extend(creates.into_iter().map(|e| create_table(e, current)));
        }

        up.extend(renames);
        up.extend(alters);
        up.extend(adds);

        if !self.allow_data_loss {
            for op in &drops {
                if let MigrationOperation::DropColumn { details, .. } = op {
                    warnings.push(format!(
                        "Would drop column '{}' from '{}'. Set allow_data_loss=true to silence this warning.",
                        details.column_name, details.table_name
                    ));
                }
            }
        }
        up.extend(drops);

        if !dropped_tables.is_empty() {
            let order = self.order(previous, &mut warnings);
            dropped_tables.sort_by_key(|e| {
                std::cmp::Reverse(order.iter().position(|n| *n == e.name))
            });
            if !self.allow_data_loss {
                let names: Vec<&str> = dropped_tables.iter().map(|e| e.table_name.as_str()).collect();
                warnings.push(format!(
                    "Would drop {} tables: {}. Set allow_data_loss=true to silence this warning.",
                    names.len(),
                    names.join(", ")
                ));
            }
            up.extend(dropped_tables.into_iter().map(|e| {
                let create = create_table(e, previous);
                match create {
                    MigrationOperation::CreateTable {
                        entity_name,
                        details,
                    } => MigrationOperation::DropTable {
                        entity_name,
                        details: DropTableOperation {
                            table_name: details.table_name.clone(),
                            definition: Some(details),
                        },
                    },
                    other => other,
                }
            }));
        }

        for warning in &warnings {
            warn!("{}", warning);
        }
        finish(up, warnings)
    }

    fn order(&self, snapshot: &ModelSnapshot, warnings: &mut Vec<String>) -> Vec<String> {
        let graph = DependencyGraph::from_snapshot(snapshot);
        match graph.try_topological_sort() {
            Ok(order) => order,
            Err(report) => {
                warnings.push(format!("{}; using registration order", report));
                graph.nodes().to_vec()
            }
        }
    }
}

/// Down operations: the reverse of `up`, each inverted.
pub fn reverse_operations(up: &[MigrationOperation]) -> MigrateResult<Vec<MigrationOperation>> {
    up.iter()
        .rev()
        .map(|op| {
            op.inverse().ok_or_else(|| {
                MigrationError::rollback_failed(format!("operation '{}' cannot be reversed", op))
            })
        })
        .collect()
}

fn finish(up: Vec<MigrationOperation>, warnings: Vec<String>) -> MigrateResult<PlannedMigration> {
    let down = reverse_operations(&up)?;
    debug!(up = up.len(), down = down.len(), "planned operations");
    Ok(PlannedMigration { up, down, warnings })
}

fn create_table(entity: &EntitySnapshot, snapshot: &ModelSnapshot) -> MigrationOperation {
    MigrationOperation::CreateTable {
        entity_name: entity.name.clone(),
        details: CreateTableOperation {
            table_name: entity.table_name.clone(),
            columns: entity
                .fields
                .values()
                .map(|f| column(f, snapshot))
                .collect(),
            indexes: entity
                .indexes
                .iter()
                .map(|i| IndexDefinition {
                    name: i.name.clone(),
                    columns: i.columns.clone(),
                    unique: i.unique,
                })
                .collect(),
        },
    }
}

fn alter(
    entity: &str,
    table: &str,
    old: &FieldSnapshot,
    new: &FieldSnapshot,
    previous: &ModelSnapshot,
    current: &ModelSnapshot,
) -> MigrationOperation {
    let mut from = column(old, previous);
    // The column already carries its new name when a rename precedes this.
    from.name = new.column_name.clone();
    MigrationOperation::AlterColumn {
        entity_name: entity.to_string(),
        details: AlterColumnOperation {
            table_name: table.to_string(),
            from,
            to: column(new, current),
        },
    }
}

fn column(field: &FieldSnapshot, snapshot: &ModelSnapshot) -> ColumnDefinition {
    ColumnDefinition::from_field(field, resolve_reference(field, snapshot))
}

/// Resolve a field's reference to the target table and primary-key column.
fn resolve_reference(field: &FieldSnapshot, snapshot: &ModelSnapshot) -> Option<ForeignKeyReference> {
    let target = field
        .references
        .as_deref()
        .or_else(|| field.conventional_reference())?;
    let entity = snapshot
        .entities
        .values()
        .find(|e| e.name.eq_ignore_ascii_case(target))?;
    Some(ForeignKeyReference {
        entity: entity.name.clone(),
        table: entity.table_name.clone(),
        column: entity.primary_key_column()?.to_string(),
    })
}
