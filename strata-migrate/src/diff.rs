//! Snapshot comparison with rename detection.
//!
//! [`compare`] classifies the difference between the current and previous
//! [`ModelSnapshot`] into entity and field changes. Fields are compared in
//! three passes per entity so that a renamed field is reported once as
//! [`SnapshotChange::FieldRenamed`] rather than as a removal plus an
//! addition:
//!
//! 1. Rename pass: every field that disappeared by name looks for a rename
//!    target, first through an explicit `old_name` hint, then heuristically
//!    among new fields with an identical type, nullability, uniqueness and
//!    default. Both names are consumed.
//! 2. Modify/add pass over the remaining current fields.
//! 3. Remove pass over the remaining previous fields.
//!
//! Changes are ordered: added entities, then per entity renames followed by
//! modifications and additions, then removed fields, then removed entities.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::snapshot::{EntitySnapshot, FieldSnapshot, ModelSnapshot};

/// Kind of a snapshot change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A new entity.
    EntityAdded,
    /// An entity that no longer exists.
    EntityRemoved,
    /// A new field.
    FieldAdded,
    /// A field that no longer exists.
    FieldRemoved,
    /// A field whose descriptor changed.
    FieldModified,
    /// A field that now has a different name.
    FieldRenamed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EntityAdded => "EntityAdded",
            Self::EntityRemoved => "EntityRemoved",
            Self::FieldAdded => "FieldAdded",
            Self::FieldRemoved => "FieldRemoved",
            Self::FieldModified => "FieldModified",
            Self::FieldRenamed => "FieldRenamed",
        };
        f.write_str(s)
    }
}

/// How a rename was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenameDetection {
    /// The new field carries `old_name:<previous>`.
    Explicit,
    /// The only (or most similar) field with an identical shape.
    Heuristic,
    /// Same field, different `column` tag.
    ColumnName,
}

/// One classified change.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotChange {
    /// Entity present only in the current snapshot.
    EntityAdded {
        /// The new entity.
        entity: EntitySnapshot,
    },
    /// Entity present only in the previous snapshot.
    EntityRemoved {
        /// The removed entity as it was.
        entity: EntitySnapshot,
    },
    /// Field added to an existing entity.
    FieldAdded {
        /// Owning entity name.
        entity: String,
        /// The new field.
        field: FieldSnapshot,
    },
    /// Field removed from an existing entity.
    FieldRemoved {
        /// Owning entity name.
        entity: String,
        /// The removed field as it was.
        field: FieldSnapshot,
    },
    /// Field whose type, primary, nullable, unique or default changed.
    FieldModified {
        /// Owning entity name.
        entity: String,
        /// Previous descriptor.
        old: FieldSnapshot,
        /// Current descriptor.
        new: FieldSnapshot,
    },
    /// Field renamed.
    FieldRenamed {
        /// Owning entity name.
        entity: String,
        /// Previous field.
        old: FieldSnapshot,
        /// Current field.
        new: FieldSnapshot,
        /// How the rename was found.
        detection: RenameDetection,
    },
}

impl SnapshotChange {
    /// Kind tag.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::EntityAdded { .. } => ChangeKind::EntityAdded,
            Self::EntityRemoved { .. } => ChangeKind::EntityRemoved,
            Self::FieldAdded { .. } => ChangeKind::FieldAdded,
            Self::FieldRemoved { .. } => ChangeKind::FieldRemoved,
            Self::FieldModified { .. } => ChangeKind::FieldModified,
            Self::FieldRenamed { .. } => ChangeKind::FieldRenamed,
        }
    }

    /// Owning entity name.
    pub fn entity_name(&self) -> &str {
        match self {
            Self::EntityAdded { entity } | Self::EntityRemoved { entity } => &entity.name,
            Self::FieldAdded { entity, .. }
            | Self::FieldRemoved { entity, .. }
            | Self::FieldModified { entity, .. }
            | Self::FieldRenamed { entity, .. } => entity,
        }
    }

    /// Field name for field-level changes; the new name for renames.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::EntityAdded { .. } | Self::EntityRemoved { .. } => None,
            Self::FieldAdded { field, .. } | Self::FieldRemoved { field, .. } => Some(&field.name),
            Self::FieldModified { new, .. } | Self::FieldRenamed { new, .. } => Some(&new.name),
        }
    }
}

impl fmt::Display for SnapshotChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldRenamed { entity, old, new, .. } => {
                write!(f, "FieldRenamed {}.{} -> {}", entity, old.name, new.name)
            }
            other => match other.field_name() {
                Some(field) => write!(f, "{} {}.{}", other.kind(), other.entity_name(), field),
                None => write!(f, "{} {}", other.kind(), other.entity_name()),
            },
        }
    }
}

/// The ordered result of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotComparison {
    /// Whether anything changed.
    pub has_changes: bool,
    /// Changes in emission order.
    pub changes: Vec<SnapshotChange>,
}

impl SnapshotComparison {
    fn from_changes(changes: Vec<SnapshotChange>) -> Self {
        Self {
            has_changes: !changes.is_empty(),
            changes,
        }
    }

    /// Whether the comparison is empty.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Number of changes of one kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind() == kind).count()
    }

    /// Changes for one entity.
    pub fn for_entity<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a SnapshotChange> {
        self.changes.iter().filter(move |c| c.entity_name() == entity)
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        let labels = [
            (ChangeKind::EntityAdded, "entities added"),
            (ChangeKind::EntityRemoved, "entities removed"),
            (ChangeKind::FieldAdded, "fields added"),
            (ChangeKind::FieldRemoved, "fields removed"),
            (ChangeKind::FieldModified, "fields modified"),
            (ChangeKind::FieldRenamed, "fields renamed"),
        ];

        let parts: Vec<String> = labels
            .iter()
            .filter_map(|(kind, label)| {
                let n = self.count(*kind);
                (n > 0).then(|| format!("{} {}", n, label))
            })
            .collect();

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Compare the current snapshot against the previous one.
///
/// Without a previous snapshot every current entity is reported as added and
/// no field-level comparison runs.
pub fn compare(current: &ModelSnapshot, previous: Option<&ModelSnapshot>) -> SnapshotComparison {
    let Some(previous) = previous else {
        let changes = current
            .entities
            .values()
            .map(|e| SnapshotChange::EntityAdded { entity: e.clone() })
            .collect();
        return SnapshotComparison::from_changes(changes);
    };

    let mut changes = Vec::new();
    let mut removed_fields = Vec::new();

    for (name, entity) in &current.entities {
        if !previous.entities.contains_key(name) {
            changes.push(SnapshotChange::EntityAdded {
                entity: entity.clone(),
            });
        }
    }

    for (name, entity) in &current.entities {
        if let Some(prev) = previous.entities.get(name) {
            let fields = compare_fields(entity, prev);
            changes.extend(fields.changes);
            removed_fields.extend(fields.removed);
        }
    }

    changes.extend(removed_fields);

    for (name, entity) in &previous.entities {
        if !current.entities.contains_key(name) {
            changes.push(SnapshotChange::EntityRemoved {
                entity: entity.clone(),
            });
        }
    }

    SnapshotComparison::from_changes(changes)
}

struct FieldChanges {
    changes: Vec<SnapshotChange>,
    removed: Vec<SnapshotChange>,
}

fn compare_fields(current: &EntitySnapshot, previous: &EntitySnapshot) -> FieldChanges {
    let entity = current.name.as_str();
    let mut changes = Vec::new();
    // Previous names consumed as rename sources, current names as targets.
    let mut consumed_old: HashSet<&str> = HashSet::new();
    let mut consumed_new: HashSet<&str> = HashSet::new();

    let disappeared: Vec<&FieldSnapshot> = previous
        .fields
        .values()
        .filter(|f| !current.fields.contains_key(&f.name))
        .collect();

    // Pass 1a: explicit hints.
    for old in &disappeared {
        let target = current.fields.values().find(|f| {
            !previous.fields.contains_key(&f.name)
                && !consumed_new.contains(f.name.as_str())
                && f.old_name
                    .as_deref()
                    .is_some_and(|hint| hint == old.name || hint == old.column_name)
        });
        if let Some(new) = target {
            debug!(entity, from = %old.name, to = %new.name, "explicit rename");
            consumed_old.insert(&old.name);
            consumed_new.insert(&new.name);
            changes.push(renamed(entity, old, new, RenameDetection::Explicit));
        }
    }

    // Pass 1b: heuristic matches for what is left.
    for old in &disappeared {
        if consumed_old.contains(old.name.as_str()) {
            continue;
        }
        let candidates: Vec<&FieldSnapshot> = current
            .fields
            .values()
            .filter(|f| {
                !previous.fields.contains_key(&f.name)
                    && !consumed_new.contains(f.name.as_str())
                    && old.rename_compatible(f)
            })
            .collect();
        if let Some(new) = best_candidate(&old.name, &candidates) {
            debug!(
                entity,
                from = %old.name,
                to = %new.name,
                candidates = candidates.len(),
                "heuristic rename"
            );
            consumed_old.insert(&old.name);
            consumed_new.insert(&new.name);
            changes.push(renamed(entity, old, new, RenameDetection::Heuristic));
        }
    }

    // Pass 2: modified and added.
    for new in current.fields.values() {
        if consumed_new.contains(new.name.as_str()) {
            continue;
        }
        match previous.fields.get(&new.name) {
            Some(old) if old.column_name != new.column_name => {
                changes.push(renamed(entity, old, new, RenameDetection::ColumnName));
            }
            Some(old) if !old.same_descriptor(new) => {
                changes.push(SnapshotChange::FieldModified {
                    entity: entity.to_string(),
                    old: old.clone(),
                    new: new.clone(),
                });
            }
            Some(_) => {}
            None => changes.push(SnapshotChange::FieldAdded {
                entity: entity.to_string(),
                field: new.clone(),
            }),
        }
    }

    // Pass 3: removed.
    let removed = disappeared
        .into_iter()
        .filter(|old| !consumed_old.contains(old.name.as_str()))
        .map(|old| SnapshotChange::FieldRemoved {
            entity: entity.to_string(),
            field: old.clone(),
        })
        .collect();

    FieldChanges { changes, removed }
}

fn renamed(
    entity: &str,
    old: &FieldSnapshot,
    new: &FieldSnapshot,
    detection: RenameDetection,
) -> SnapshotChange {
    SnapshotChange::FieldRenamed {
        entity: entity.to_string(),
        old: old.clone(),
        new: new.clone(),
        detection,
    }
}

/// Pick the rename target among shape-compatible candidates.
///
/// A single candidate wins outright. Otherwise the candidate most similar to
/// the old name wins; the first candidate wins a total tie.
fn best_candidate<'a>(old_name: &str, candidates: &[&'a FieldSnapshot]) -> Option<&'a FieldSnapshot> {
    let mut best: Option<(&'a FieldSnapshot, (u8, usize))> = None;
    for &candidate in candidates {
        let score = similarity(old_name, &candidate.name);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((candidate, score)),
        }
    }
    best.map(|(c, _)| c)
}

/// Containment rank (prefix 2, substring 1, none 0), then common prefix length.
fn similarity(a: &str, b: &str) -> (u8, usize) {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    let rank = if a.starts_with(&b) || b.starts_with(&a) {
        2
    } else if a.contains(&b) || b.contains(&a) {
        1
    } else {
        0
    };
    let prefix = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count();
    (rank, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strata_schema::{EntityModel, FieldType, TypeDescriptor};

    fn snapshot(descs: &[TypeDescriptor]) -> ModelSnapshot {
        let models: Vec<EntityModel> = descs
            .iter()
            .map(|d| EntityModel::from_descriptor(d).unwrap())
            .collect();
        ModelSnapshot::new(&models)
    }

    fn kinds(cmp: &SnapshotComparison) -> Vec<ChangeKind> {
        cmp.changes.iter().map(SnapshotChange::kind).collect()
    }

    #[test]
    fn test_no_previous_reports_all_added() {
        let current = snapshot(&[
            TypeDescriptor::new("User").field("Id", FieldType::Uuid, "primary_key"),
            TypeDescriptor::new("Post").field("Id", FieldType::Uuid, "primary_key"),
        ]);
        let cmp = compare(&current, None);
        assert!(cmp.has_changes);
        assert_eq!(kinds(&cmp), vec![ChangeKind::EntityAdded; 2]);
    }

    #[test]
    fn test_compare_with_itself_is_empty() {
        let s = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Email", FieldType::String, "unique")]);
        let cmp = compare(&s, Some(&s));
        assert!(!cmp.has_changes);
        assert!(cmp.changes.is_empty());
        assert_eq!(cmp.summary(), "No changes");
    }

    #[test]
    fn test_entity_added_and_removed() {
        let previous = snapshot(&[
            TypeDescriptor::new("User").field("Id", FieldType::Uuid, "primary_key"),
            TypeDescriptor::new("Legacy").field("Id", FieldType::Uuid, "primary_key"),
        ]);
        let current = snapshot(&[
            TypeDescriptor::new("User").field("Id", FieldType::Uuid, "primary_key"),
            TypeDescriptor::new("Post").field("Id", FieldType::Uuid, "primary_key"),
        ]);
        let cmp = compare(&current, Some(&previous));
        assert_eq!(
            kinds(&cmp),
            vec![ChangeKind::EntityAdded, ChangeKind::EntityRemoved]
        );
        assert_eq!(cmp.changes[0].entity_name(), "Post");
        assert_eq!(cmp.changes[1].entity_name(), "Legacy");
    }

    #[test]
    fn test_explicit_rename() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("OldName", FieldType::String, "")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("NewName", FieldType::String, "old_name:OldName")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(cmp.len(), 1);
        match &cmp.changes[0] {
            SnapshotChange::FieldRenamed {
                old, new, detection, ..
            } => {
                assert_eq!(old.name, "OldName");
                assert_eq!(new.name, "NewName");
                assert_eq!(*detection, RenameDetection::Explicit);
            }
            other => panic!("expected rename, got {:?}", other),
        }
        assert_eq!(cmp.count(ChangeKind::FieldAdded), 0);
        assert_eq!(cmp.count(ChangeKind::FieldRemoved), 0);
    }

    #[test]
    fn test_explicit_rename_wins_over_heuristic() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Nick", FieldType::String, "")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Nickname", FieldType::String, "")
            .field("Handle", FieldType::String, "old_name:Nick")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(
            kinds(&cmp),
            vec![ChangeKind::FieldRenamed, ChangeKind::FieldAdded]
        );
        assert_eq!(cmp.changes[0].field_name(), Some("Handle"));
        assert_eq!(cmp.changes[1].field_name(), Some("Nickname"));
    }

    #[test]
    fn test_explicit_rename_with_changed_descriptor() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Age", FieldType::Int32, "")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Years", FieldType::Int64, "old_name:Age")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(kinds(&cmp), vec![ChangeKind::FieldRenamed]);
    }

    #[test]
    fn test_heuristic_single_candidate() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Mail", FieldType::String, "unique")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Email", FieldType::String, "unique")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(kinds(&cmp), vec![ChangeKind::FieldRenamed]);
        match &cmp.changes[0] {
            SnapshotChange::FieldRenamed { detection, .. } => {
                assert_eq!(*detection, RenameDetection::Heuristic)
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_heuristic_requires_identical_shape() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Mail", FieldType::String, "unique")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Email", FieldType::String, "")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(
            kinds(&cmp),
            vec![ChangeKind::FieldAdded, ChangeKind::FieldRemoved]
        );
    }

    #[test]
    fn test_heuristic_ambiguity_yields_one_rename() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Name", FieldType::String, "")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Title", FieldType::String, "")
            .field("FullName", FieldType::String, "")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(cmp.count(ChangeKind::FieldRenamed), 1);
        assert_eq!(cmp.count(ChangeKind::FieldRemoved), 0);
        assert_eq!(cmp.count(ChangeKind::FieldAdded), 1);
        // Containment beats no relation.
        assert_eq!(cmp.changes[0].field_name(), Some("FullName"));
    }

    #[test]
    fn test_heuristic_total_tie_takes_first() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Flag", FieldType::Bool, "")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Alpha", FieldType::Bool, "")
            .field("Beta", FieldType::Bool, "")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(cmp.count(ChangeKind::FieldRenamed), 1);
        assert_eq!(cmp.changes[0].field_name(), Some("Alpha"));
        assert_eq!(cmp.changes[1].field_name(), Some("Beta"));
    }

    #[test]
    fn test_modified_added_removed_order() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Age", FieldType::Int32, "")
            .field("Legacy", FieldType::Json, "")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Age", FieldType::Int64, "")
            .field("Score", FieldType::Float64, "")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(
            kinds(&cmp),
            vec![
                ChangeKind::FieldModified,
                ChangeKind::FieldAdded,
                ChangeKind::FieldRemoved
            ]
        );
        assert_eq!(cmp.summary(), "1 fields added, 1 fields removed, 1 fields modified");
    }

    #[test]
    fn test_default_change_is_modification() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Age", FieldType::Int32, "")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Age", FieldType::Int32, "default:18")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(kinds(&cmp), vec![ChangeKind::FieldModified]);
    }

    #[test]
    fn test_column_tag_change_is_rename() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Name", FieldType::String, "")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("Name", FieldType::String, "column:display_name")]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(kinds(&cmp), vec![ChangeKind::FieldRenamed]);
    }

    #[test]
    fn test_removed_fields_come_after_all_entity_changes() {
        let previous = snapshot(&[
            TypeDescriptor::new("A")
                .field("Id", FieldType::Uuid, "primary_key")
                .field("Gone", FieldType::Json, ""),
            TypeDescriptor::new("B").field("Id", FieldType::Uuid, "primary_key"),
        ]);
        let current = snapshot(&[
            TypeDescriptor::new("A").field("Id", FieldType::Uuid, "primary_key"),
            TypeDescriptor::new("B")
                .field("Id", FieldType::Uuid, "primary_key")
                .field("New", FieldType::Int32, ""),
        ]);

        let cmp = compare(&current, Some(&previous));
        assert_eq!(
            kinds(&cmp),
            vec![ChangeKind::FieldAdded, ChangeKind::FieldRemoved]
        );
        assert_eq!(cmp.changes[0].entity_name(), "B");
        assert_eq!(cmp.changes[1].entity_name(), "A");
        assert_eq!(cmp.for_entity("A").count(), 1);
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("Name", "name_full").0, 2);
        assert_eq!(similarity("Name", "FullName").0, 1);
        assert_eq!(similarity("Name", "Title").0, 0);
        assert!(similarity("Street", "StreetLine") > similarity("Street", "MainStreet"));
    }

    #[test]
    fn test_change_display() {
        let previous = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("OldName", FieldType::String, "")]);
        let current = snapshot(&[TypeDescriptor::new("User")
            .field("Id", FieldType::Uuid, "primary_key")
            .field("NewName", FieldType::String, "old_name:OldName")]);
        let cmp = compare(&current, Some(&previous));
        assert_eq!(cmp.changes[0].to_string(), "FieldRenamed User.OldName -> NewName");
    }
}
