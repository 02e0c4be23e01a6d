//! Integration tests for migration generation and application.
//!
//! These tests drive the engine end to end through the umbrella crate: entity
//! descriptors in, artifacts and snapshots on disk, statements out.

use pretty_assertions::assert_eq;
use strata::migrate::{
    DependencyGraph, MemoryHistory, MigrationConfig, MigrationEngine, MigrationError,
    MigrationOperation, ModelSnapshot, OperationKind, RenameDetection, SnapshotChange, compare,
};
use strata::query::testing::MemoryExecutor;
use strata::schema::{EntityModel, EntityRegistry, FieldType, TypeDescriptor};
use tempfile::TempDir;

fn engine(dir: &TempDir) -> MigrationEngine<MemoryExecutor, MemoryHistory> {
    MigrationEngine::new(
        MigrationConfig::new().migrations_dir(dir.path()),
        MemoryExecutor::new(),
        MemoryHistory::new(),
    )
}

fn registry(descs: &[TypeDescriptor]) -> EntityRegistry {
    EntityRegistry::from_descriptors(descs).expect("valid descriptors")
}

fn snapshot(descs: &[TypeDescriptor]) -> ModelSnapshot {
    let models: Vec<EntityModel> = descs
        .iter()
        .map(|d| EntityModel::from_descriptor(d).expect("valid descriptor"))
        .collect();
    ModelSnapshot::new(&models)
}

fn user() -> TypeDescriptor {
    TypeDescriptor::new("User")
        .field("Id", FieldType::Uuid, "primary_key")
        .field("Email", FieldType::String, "unique")
}

/// Init then AddAge: one CreateTable, then exactly one AddColumn, with
/// different snapshot checksums.
#[tokio::test]
async fn test_init_then_add_column() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.initialize().await.unwrap();

    let init = engine.add_migration("Init", &registry(&[user()])).await.unwrap();
    assert_eq!(init.artifact.up.len(), 1);
    match &init.artifact.up[0] {
        MigrationOperation::CreateTable {
            entity_name,
            details,
        } => {
            assert_eq!(entity_name, "User");
            assert_eq!(details.table_name, "users");
            assert_eq!(details.primary_key(), vec!["Id"]);
        }
        other => panic!("expected CreateTable, got {}", other),
    }
    let c1 = engine.snapshots().load().await.unwrap().unwrap();
    assert!(c1.verify_checksum());

    let with_age = user().field("Age", FieldType::Int32, "");
    let add_age = engine
        .add_migration("AddAge", &registry(&[with_age]))
        .await
        .unwrap();
    assert_eq!(add_age.artifact.up.len(), 1);
    match &add_age.artifact.up[0] {
        MigrationOperation::AddColumn {
            entity_name,
            details,
        } => {
            assert_eq!(entity_name, "User");
            assert_eq!(details.column.name, "Age");
        }
        other => panic!("expected AddColumn, got {}", other),
    }
    let c2 = engine.snapshots().load().await.unwrap().unwrap();
    assert_ne!(c1.checksum, c2.checksum);
    assert_eq!(c2.version, 2);

    let ids: Vec<String> = engine
        .list_migrations()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids[0].ends_with("_init"));
    assert!(ids[1].ends_with("_add_age"));
}

#[test]
fn test_checksum_is_order_independent() {
    let order = TypeDescriptor::new("Order")
        .field("Id", FieldType::Uuid, "primary_key")
        .field("UserId", FieldType::Uuid, "");

    let a = snapshot(&[user(), order.clone()]);
    let b = snapshot(&[order, user()]);
    assert_eq!(a.checksum, b.checksum);
}

#[test]
fn test_compare_with_itself_is_empty() {
    let s = snapshot(&[user()]);
    let comparison = compare(&s, Some(&s));
    assert!(!comparison.has_changes);
    assert!(comparison.changes.is_empty());
}

#[test]
fn test_explicit_rename() {
    let previous = snapshot(&[TypeDescriptor::new("User")
        .field("Id", FieldType::Uuid, "primary_key")
        .field("OldName", FieldType::String, "")]);
    let current = snapshot(&[TypeDescriptor::new("User")
        .field("Id", FieldType::Uuid, "primary_key")
        .field("NewName", FieldType::String, "old_name:OldName")]);

    let comparison = compare(&current, Some(&previous));
    assert_eq!(comparison.changes.len(), 1);
    match &comparison.changes[0] {
        SnapshotChange::FieldRenamed {
            old,
            new,
            detection,
            ..
        } => {
            assert_eq!(old.name, "OldName");
            assert_eq!(new.name, "NewName");
            assert_eq!(*detection, RenameDetection::Explicit);
        }
        other => panic!("expected FieldRenamed, got {}", other),
    }
}

#[test]
fn test_ambiguous_heuristic_rename_yields_one_rename() {
    let previous = snapshot(&[TypeDescriptor::new("User")
        .field("Id", FieldType::Uuid, "primary_key")
        .field("Name", FieldType::String, "")]);
    let current = snapshot(&[TypeDescriptor::new("User")
        .field("Id", FieldType::Uuid, "primary_key")
        .field("FirstName", FieldType::String, "")
        .field("LastName", FieldType::String, "")]);

    let comparison = compare(&current, Some(&previous));
    let renames: Vec<_> = comparison
        .changes
        .iter()
        .filter(|c| matches!(c, SnapshotChange::FieldRenamed { .. }))
        .collect();
    assert_eq!(renames.len(), 1);
    assert!(
        !comparison
            .changes
            .iter()
            .any(|c| matches!(c, SnapshotChange::FieldRemoved { .. }))
    );
    let added = comparison
        .changes
        .iter()
        .filter(|c| matches!(c, SnapshotChange::FieldAdded { .. }))
        .count();
    assert_eq!(added, 1);
}

#[tokio::test]
async fn test_initial_migration_orders_dependencies() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);

    let order = TypeDescriptor::new("Order")
        .field("Id", FieldType::Uuid, "primary_key")
        .field("UserId", FieldType::Uuid, "");
    let user = TypeDescriptor::new("User").field("Id", FieldType::Uuid, "primary_key");
    let generated = engine
        .add_migration("Init", &registry(&[order, user]))
        .await
        .unwrap();

    let entities: Vec<&str> = generated.artifact.up.iter().map(|op| op.entity_name()).collect();
    assert_eq!(entities, vec!["User", "Order"]);
}

#[tokio::test]
async fn test_cycle_falls_back_to_some_order() {
    let a = TypeDescriptor::new("A")
        .field("Id", FieldType::Uuid, "primary_key")
        .field("BId", FieldType::Uuid, "");
    let b = TypeDescriptor::new("B")
        .field("Id", FieldType::Uuid, "primary_key")
        .field("AId", FieldType::Uuid, "");
    let reg = registry(&[a, b]);

    let graph = DependencyGraph::from_models(reg.iter());
    assert!(graph.try_topological_sort().is_err());
    let mut order = graph.order_or_fallback();
    order.sort();
    assert_eq!(order, vec!["A", "B"]);

    let dir = TempDir::new().unwrap();
    let generated = engine(&dir).add_migration("Init", &reg).await.unwrap();
    assert_eq!(generated.artifact.up.len(), 2);
    assert!(
        generated
            .artifact
            .up
            .iter()
            .all(|op| op.kind() == OperationKind::CreateTable)
    );
    assert_eq!(generated.warnings.len(), 1);
}

#[tokio::test]
async fn test_apply_and_revert_everything() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);

    engine.add_migration("Init", &registry(&[user()])).await.unwrap();
    engine
        .add_migration(
            "RenameEmail",
            &registry(&[TypeDescriptor::new("User")
                .field("Id", FieldType::Uuid, "primary_key")
                .field("Mail", FieldType::String, "unique;old_name:Email")]),
        )
        .await
        .unwrap();

    let applied = engine.update().await.unwrap();
    assert_eq!(applied.applied_count(), 2);
    let sql = engine.executor().committed_sql();
    assert_eq!(sql.len(), 4);
    assert_eq!(
        sql[2],
        "ALTER TABLE \"users\" RENAME COLUMN \"Email\" TO \"Mail\";"
    );
    assert!(sql[3].starts_with("INSERT INTO \"_strata_migrations\""));

    let reverted = engine.rollback(2).await.unwrap();
    assert_eq!(reverted.rolled_back_migrations.len(), 2);
    let sql = engine.executor().committed_sql();
    assert_eq!(
        &sql[4..],
        &[
            "ALTER TABLE \"users\" RENAME COLUMN \"Mail\" TO \"Email\";".to_string(),
            "DELETE FROM \"_strata_migrations\" WHERE id = $1;".to_string(),
            "DROP TABLE IF EXISTS \"users\" CASCADE;".to_string(),
            "DELETE FROM \"_strata_migrations\" WHERE id = $1;".to_string(),
        ]
    );
    assert_eq!(engine.status().await.unwrap().total_pending, 2);
}

#[tokio::test]
async fn test_no_changes_is_recoverable() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.add_migration("Init", &registry(&[user()])).await.unwrap();

    let err = engine
        .add_migration("Again", &registry(&[user()]))
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::NoChanges));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_corrupt_snapshot_is_fatal() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    tokio::fs::write(dir.path().join("ModelSnapshot.json"), "{ broken")
        .await
        .unwrap();

    let err = engine
        .add_migration("Init", &registry(&[user()]))
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Serialization(_)));
    assert!(engine.file_manager().list().await.unwrap().is_empty());
}
