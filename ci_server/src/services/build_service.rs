//! Build ledger — append-only JSON build history, one collection per repository.
//!
//! Layout: `<root>/<owner>/<repo>/builds.json`, a pretty-printed JSON array
//! of [`BuildRecord`]s in append order.

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;

use crate::models::build::{BuildRecord, BuildSummary};

pub const BUILDS_FILENAME: &str = "builds.json";

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt build collection at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize build collection: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("invalid repository name '{0}'")]
    InvalidPartition(String),
    #[error("ledger write task failed: {0}")]
    Interrupted(#[source] tokio::task::JoinError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> LedgerError + '_ {
    move |source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File-backed build history. One lock serializes every read and write.
#[derive(Debug)]
pub struct BuildLedger {
    root: PathBuf,
    lock: Mutex<()>,
}

impl BuildLedger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    /// Collection file for a repository full name (`owner/repo`).
    pub fn collection_path(&self, repository_full_name: &str) -> Result<PathBuf, LedgerError> {
        let partition = Path::new(repository_full_name);
        let plain = !repository_full_name.is_empty()
            && partition
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(LedgerError::InvalidPartition(
                repository_full_name.to_string(),
            ));
        }
        Ok(self.root.join(partition).join(BUILDS_FILENAME))
    }

    /// Append a record to its repository's collection.
    pub async fn append(
        &self,
        repository_full_name: &str,
        record: &BuildRecord,
    ) -> Result<(), LedgerError> {
        let path = self.collection_path(repository_full_name)?;
        let _guard = self.lock.lock().await;

        let mut records = read_collection(&path).await?;
        records.push(record.clone());
        write_collection(&path, &records).await?;

        tracing::info!(
            build_id = %record.id,
            repo = repository_full_name,
            total = records.len(),
            "Build recorded"
        );
        Ok(())
    }

    /// Summaries of every recorded build, most recent `buildDate` first.
    pub async fn list_summaries(&self) -> Result<Vec<BuildSummary>, LedgerError> {
        let _guard = self.lock.lock().await;
        let mut summaries: Vec<BuildSummary> = self
            .load_all()
            .await?
            .iter()
            .map(BuildSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.build_date.cmp(&a.build_date));
        Ok(summaries)
    }

    /// Find a build by id across all repositories.
    pub async fn get_by_id(&self, build_id: &str) -> Result<Option<BuildRecord>, LedgerError> {
        if build_id.is_empty() {
            return Ok(None);
        }
        let _guard = self.lock.lock().await;
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|record| record.id == build_id))
    }

    async fn load_all(&self) -> Result<Vec<BuildRecord>, LedgerError> {
        let mut builds = Vec::new();
        for path in find_collections(&self.root).await? {
            builds.extend(read_collection(&path).await?);
        }
        Ok(builds)
    }
}

/// Every collection file under `root`, in sorted path order.
async fn find_collections(root: &Path) -> Result<Vec<PathBuf>, LedgerError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(io_error(&dir)(e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&dir))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(io_error(&path))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if entry.file_name().to_str() == Some(BUILDS_FILENAME) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

async fn read_collection(path: &Path) -> Result<Vec<BuildRecord>, LedgerError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(path)(e)),
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|source| LedgerError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_collection(path: &Path, records: &[BuildRecord]) -> Result<(), LedgerError> {
    let body = serde_json::to_vec_pretty(records).map_err(LedgerError::Serialize)?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, &body))
        .await
        .map_err(LedgerError::Interrupted)?
}

/// Write `body` to a temp file beside `path`, sync it, then rename it into place.
fn write_atomic(path: &Path, body: &[u8]) -> Result<(), LedgerError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(io_error(parent))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(io_error(parent))?;
    temp_file.write_all(body).map_err(io_error(path))?;
    temp_file.as_file().sync_all().map_err(io_error(path))?;
    temp_file.persist(path).map_err(|e| io_error(path)(e.error))?;
    Ok(())
}
