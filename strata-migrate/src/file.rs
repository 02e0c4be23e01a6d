//! Migration artifact files.
//!
//! One JSON document per migration, named `<YYYYmmddHHMMSS>_<slug>.json`,
//! holding the Up and Down operation lists and the snapshot the migration
//! produces.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{MigrateResult, MigrationError};
use crate::operation::MigrationOperation;
use crate::snapshot::ModelSnapshot;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const TIMESTAMP_LEN: usize = 14;

/// A generated migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationArtifact {
    /// `<timestamp>_<slug>`.
    pub id: String,
    /// Name as given by the user.
    pub name: String,
    /// Snapshot version this migration produces.
    pub version: u32,
    /// When the artifact was generated.
    pub created_at: DateTime<Utc>,
    /// SHA-256 over the rendered operations.
    pub checksum: String,
    /// Operations that apply the migration.
    pub up: Vec<MigrationOperation>,
    /// Operations that revert it.
    pub down: Vec<MigrationOperation>,
    /// Model snapshot after this migration.
    pub snapshot: ModelSnapshot,
}

impl MigrationArtifact {
    /// Create an artifact and compute its checksum.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        up: Vec<MigrationOperation>,
        down: Vec<MigrationOperation>,
        snapshot: ModelSnapshot,
    ) -> Self {
        let checksum = compute_checksum(&up, &down);
        Self {
            id: id.into(),
            name: name.into(),
            version: snapshot.version,
            created_at: Utc::now(),
            checksum,
            up,
            down,
            snapshot,
        }
    }

    /// The timestamp prefix of the id.
    pub fn timestamp(&self) -> &str {
        self.id.get(..TIMESTAMP_LEN).unwrap_or(&self.id)
    }

    /// Whether the stored checksum matches the operations.
    pub fn verify_checksum(&self) -> bool {
        self.checksum == compute_checksum(&self.up, &self.down)
    }
}

/// SHA-256 over the JSON rendering of the Up and Down lists.
pub fn compute_checksum(up: &[MigrationOperation], down: &[MigrationOperation]) -> String {
    let mut hasher = Sha256::new();
    for ops in [up, down] {
        if let Ok(bytes) = serde_json::to_vec(ops) {
            hasher.update(&bytes);
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Reads and writes migration artifacts in a directory.
#[derive(Debug, Clone)]
pub struct MigrationFileManager {
    migrations_dir: PathBuf,
}

impl MigrationFileManager {
    /// Create a new file manager.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Path of the artifact with the given id.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.migrations_dir.join(format!("{}.json", id))
    }

    /// Ensure the migrations directory exists.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir).await?;
        Ok(())
    }

    /// All artifacts, oldest first.
    ///
    /// Files that do not look like artifacts (the snapshot document, editor
    /// leftovers) are skipped. An artifact that fails to parse or whose
    /// checksum does not match is an error.
    pub async fn list(&self) -> MigrateResult<Vec<MigrationArtifact>> {
        let mut entries = match tokio::fs::read_dir(&self.migrations_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MigrationError::Io(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(id) = artifact_id(&path) else {
                debug!(path = %path.display(), "skipping non-migration file");
                continue;
            };
            ids.push(id.to_string());
        }
        ids.sort();

        let mut artifacts = Vec::with_capacity(ids.len());
        for id in ids {
            artifacts.push(self.read(&id).await?);
        }
        Ok(artifacts)
    }

    /// Read a single artifact.
    pub async fn read(&self, id: &str) -> MigrateResult<MigrationArtifact> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MigrationError::NotFound(id.to_string()));
            }
            Err(e) => return Err(MigrationError::Io(e)),
        };

        let artifact: MigrationArtifact = serde_json::from_str(&content)?;
        if artifact.id != id {
            return Err(MigrationError::invalid(format!(
                "file '{}' contains migration '{}'",
                path.display(),
                artifact.id
            )));
        }
        let actual = compute_checksum(&artifact.up, &artifact.down);
        if actual != artifact.checksum {
            return Err(MigrationError::ChecksumMismatch {
                id: artifact.id,
                expected: artifact.checksum,
                actual,
            });
        }
        Ok(artifact)
    }

    /// Write an artifact to disk.
    pub async fn write(&self, artifact: &MigrationArtifact) -> MigrateResult<PathBuf> {
        self.ensure_dir().await?;
        let path = self.path_for(&artifact.id);
        let json = serde_json::to_string_pretty(artifact)?;
        tokio::fs::write(&path, json).await?;
        info!(migration = %artifact.id, path = %path.display(), "wrote migration");
        Ok(path)
    }

    /// Delete an artifact.
    pub async fn delete(&self, id: &str) -> MigrateResult<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MigrationError::NotFound(id.to_string()))
            }
            Err(e) => Err(MigrationError::Io(e)),
        }
    }

    /// A new migration id, later than every artifact already on disk.
    pub async fn next_id(&self, name: &str) -> MigrateResult<String> {
        let latest = self.list().await?.pop().map(|a| a.id);
        generate_id(name, Utc::now(), latest.as_deref())
    }
}

/// Build `<timestamp>_<slug>` for `name`.
///
/// The timestamp is `now`, or one second past the timestamp of `latest` when
/// `now` would not sort after it.
pub fn generate_id(name: &str, now: DateTime<Utc>, latest: Option<&str>) -> MigrateResult<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(MigrationError::invalid(format!(
            "migration name '{}' has no usable characters",
            name
        )));
    }

    let mut stamp = now.naive_utc();
    if let Some(latest) = latest.and_then(|id| id.get(..TIMESTAMP_LEN))
        && let Ok(previous) = NaiveDateTime::parse_from_str(latest, TIMESTAMP_FORMAT)
        && stamp.format(TIMESTAMP_FORMAT).to_string().as_str() <= latest
    {
        stamp = previous + Duration::seconds(1);
    }
    Ok(format!("{}_{}", stamp.format(TIMESTAMP_FORMAT), slug))
}

fn slugify(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.trim().to_case(Case::Snake)
}

/// Id of an artifact file, if the path names one.
fn artifact_id(path: &Path) -> Option<&str> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (stamp, slug) = stem.split_once('_')?;
    if stamp.len() != TIMESTAMP_LEN || !stamp.chars().all(|c| c.is_ascii_digit()) || slug.is_empty()
    {
        return None;
    }
    Some(stem)
}
