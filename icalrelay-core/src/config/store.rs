//! Shared, persisted configuration.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use super::RelayConfig;
use crate::cleanup::{ExpiredModule, expire_modules};
use crate::error::RelayResult;

/// The configuration and the file it lives in.
///
/// Readers work on snapshots. Writers change a copy, persist it, and only
/// then make it visible, so a failed write leaves the old state in place.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<RelayConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf, config: RelayConfig) -> Self {
        ConfigStore {
            path,
            config: RwLock::new(config),
        }
    }

    pub fn open(path: &Path) -> RelayResult<Self> {
        let config = RelayConfig::load(path)?;
        Ok(Self::new(path.to_path_buf(), config))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> RelayConfig {
        self.config.read().await.clone()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&RelayConfig) -> R) -> R {
        f(&*self.config.read().await)
    }

    /// Apply `f` and persist the result.
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut RelayConfig) -> RelayResult<R>,
    ) -> RelayResult<R> {
        let mut guard = self.config.write().await;
        let mut next = guard.clone();

        let result = f(&mut next)?;
        next.save(&self.path)?;
        *guard = next;

        Ok(result)
    }

    /// Drop expired modules from every profile, persisting only when
    /// something was removed.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> RelayResult<Vec<ExpiredModule>> {
        let mut guard = self.config.write().await;
        let mut next = guard.clone();

        let expired = expire_modules(&mut next, now);
        if expired.is_empty() {
            return Ok(expired);
        }

        next.save(&self.path)?;
        *guard = next;

        for module in &expired {
            info!(
                profile = %module.profile,
                position = module.index + 1,
                module = %module.module.name,
                "Removed expired module"
            );
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::config::Profile;
    use crate::error::RelayError;
    use crate::modules::ModuleInvocation;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        let mut config = RelayConfig::default();
        config.profiles.insert("p".into(), Profile::default());
        ConfigStore::new(dir.path().join("config.toml"), config)
    }

    #[tokio::test]
    async fn test_update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .update(|c| c.add_module("p", ModuleInvocation::new("delete-duplicates")))
            .await
            .unwrap();

        let on_disk = RelayConfig::load(store.path()).unwrap();
        assert_eq!(on_disk.profiles["p"].modules.len(), 1);
        assert_eq!(store.read(|c| c.profiles["p"].modules.len()).await, 1);
    }

    #[tokio::test]
    async fn test_failed_update_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let result = store
            .update(|c| c.add_module("missing", ModuleInvocation::new("delete-duplicates")))
            .await;

        assert!(matches!(result, Err(RelayError::NotFound(_))));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_cleanup_without_expired_modules_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(store.cleanup_expired(now).await.unwrap().is_empty());
        assert!(!store.path().exists());
    }
}
