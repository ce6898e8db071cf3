//! Loads, caches, and hot-replaces region checklists.
//!
//! The cache is the engine's only process-wide mutable state. Concurrent
//! loads coalesce on a single file read; `replace` holds the write lock
//! for the whole rewrite so it excludes loads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{Checklist, ChecklistError, Region};

pub struct ChecklistStore {
    dir: PathBuf,
    cache: RwLock<HashMap<Region, Arc<Checklist>>>,
}

impl ChecklistStore {
    pub fn new(dir: PathBuf) -> Self {
        tracing::info!(dir = %dir.display(), "checklist directory resolved");
        Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Three-step directory resolution: explicit configuration, the
    /// conventional container path, then a path next to the executable.
    pub fn resolve_dir(explicit: Option<&Path>) -> PathBuf {
        if let Some(dir) = explicit {
            return dir.to_path_buf();
        }

        let container_path = Path::new("/app/checklists");
        if container_path.is_dir() {
            return container_path.to_path_buf();
        }

        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("checklists")))
            .unwrap_or_else(|| PathBuf::from("checklists"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, region: Region) -> PathBuf {
        self.dir.join(region.checklist_filename())
    }

    /// Load the checklist for a region, reading the file on first use and
    /// serving the cache afterwards.
    pub async fn load(&self, region: Region) -> Result<Arc<Checklist>, ChecklistError> {
        if let Some(cached) = self.cache.read().await.get(&region) {
            return Ok(cached.clone());
        }

        let mut cache = self.cache.write().await;
        // A concurrent load may have filled the entry while we waited.
        if let Some(cached) = cache.get(&region) {
            return Ok(cached.clone());
        }

        let path = self.path_for(region);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChecklistError::NotFound { region, path });
            }
            Err(e) => return Err(e.into()),
        };

        let checklist: Checklist =
            serde_json::from_slice(&raw).map_err(|e| ChecklistError::Parse(e.to_string()))?;

        if checklist.region != region {
            return Err(ChecklistError::RegionMismatch {
                expected: region,
                found: checklist.region,
            });
        }
        checklist.validate()?;

        tracing::info!(
            region = %region,
            header_checks = checklist.header_checks().len(),
            valuation_checks = checklist.valuation_checks().len(),
            "loaded checklist"
        );

        let checklist = Arc::new(checklist);
        cache.insert(region, checklist.clone());
        Ok(checklist)
    }

    /// Replace a region's checklist with editor-supplied content.
    ///
    /// The content is validated first, written to a sibling temp file,
    /// renamed over the original, and the cache entry evicted so the next
    /// load re-reads the file. A failed replace leaves file and cache
    /// untouched.
    pub async fn replace(
        &self,
        region: Region,
        content: serde_json::Value,
    ) -> Result<(), ChecklistError> {
        let checklist: Checklist =
            serde_json::from_value(content).map_err(|e| ChecklistError::Parse(e.to_string()))?;

        if checklist.region != region {
            return Err(ChecklistError::RegionMismatch {
                expected: region,
                found: checklist.region,
            });
        }
        checklist.validate()?;

        let mut cache = self.cache.write().await;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(region);
        let temp_path = self.dir.join(format!("{}.tmp", region.checklist_filename()));

        let body = serde_json::to_vec_pretty(&checklist)
            .map_err(|e| ChecklistError::Parse(e.to_string()))?;
        tokio::fs::write(&temp_path, body).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        cache.remove(&region);
        tracing::info!(region = %region, path = %path.display(), "checklist replaced");
        Ok(())
    }
}
