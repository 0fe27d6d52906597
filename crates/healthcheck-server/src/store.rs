//! Persistence boundary for check definitions.

use async_trait::async_trait;
use common::{Error, Result};
use healthcheck::{CheckDefinition, CheckId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Durable storage for check definitions
#[async_trait]
pub trait CheckStore: Send + Sync {
    /// All stored definitions, ordered by id
    async fn load_all(&self) -> Result<Vec<CheckDefinition>>;

    /// Insert or replace a definition
    async fn save(&self, check: &CheckDefinition) -> Result<()>;

    /// Delete a definition; missing ids are not an error
    async fn remove(&self, id: CheckId) -> Result<()>;
}

/// Volatile store, the default
#[derive(Debug, Default)]
pub struct MemoryStore {
    checks: RwLock<BTreeMap<CheckId, CheckDefinition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<CheckDefinition>> {
        Ok(self.checks.read().await.values().cloned().collect())
    }

    async fn save(&self, check: &CheckDefinition) -> Result<()> {
        self.checks.write().await.insert(check.id, check.clone());
        Ok(())
    }

    async fn remove(&self, id: CheckId) -> Result<()> {
        self.checks.write().await.remove(&id);
        Ok(())
    }
}

/// YAML file store.
///
/// Every mutation rewrites the whole set to a temporary file next to the
/// target and renames it into place, so readers never see a partial file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    checks: Mutex<BTreeMap<CheckId, CheckDefinition>>,
}

impl FileStore {
    /// Open a store, reading existing definitions if the file exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let checks = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                let list: Vec<CheckDefinition> = serde_yaml::from_str(&contents).map_err(|e| {
                    Error::storage(format!("failed to parse {}: {}", path.display(), e))
                })?;
                list.into_iter().map(|check| (check.id, check)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(Error::storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        info!(path = %path.display(), checks = checks.len(), "Opened check store");
        Ok(Self {
            path,
            checks: Mutex::new(checks),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, checks: &BTreeMap<CheckId, CheckDefinition>) -> Result<()> {
        let list: Vec<&CheckDefinition> = checks.values().collect();
        let yaml = serde_yaml::to_string(&list)
            .map_err(|e| Error::storage(format!("failed to encode checks: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let tmp = self.path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml)
            .await
            .map_err(|e| Error::storage(format!("failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::storage(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), checks = checks.len(), "Persisted checks");
        Ok(())
    }
}

#[async_trait]
impl CheckStore for FileStore {
    async fn load_all(&self) -> Result<Vec<CheckDefinition>> {
        Ok(self.checks.lock().await.values().cloned().collect())
    }

    async fn save(&self, check: &CheckDefinition) -> Result<()> {
        let mut checks = self.checks.lock().await;
        let mut next = checks.clone();
        next.insert(check.id, check.clone());

        self.persist(&next).await?;
        *checks = next;
        Ok(())
    }

    async fn remove(&self, id: CheckId) -> Result<()> {
        let mut checks = self.checks.lock().await;
        if !checks.contains_key(&id) {
            return Ok(());
        }
        let mut next = checks.clone();
        next.remove(&id);

        self.persist(&next).await?;
        *checks = next;
        Ok(())
    }
}
