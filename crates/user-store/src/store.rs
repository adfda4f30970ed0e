use std::path::PathBuf;

use persistence::{PersistenceStore, UserStatistics};
use tracing::warn;

use crate::error::UserStoreError;
use crate::types::{SettingsPatch, UserConfig};

/// One directory per user under `users_dir`, holding `config.json` and the
/// per-user SQLite file `training_history.db` that `persistence` owns (§4.5).
pub struct UserStore {
    users_dir: PathBuf,
}

impl UserStore {
    pub fn new(users_dir: impl Into<PathBuf>) -> Self {
        Self {
            users_dir: users_dir.into(),
        }
    }

    fn user_dir(&self, username: &str) -> PathBuf {
        self.users_dir.join(username)
    }

    fn config_path(&self, username: &str) -> PathBuf {
        self.user_dir(username).join("config.json")
    }

    fn db_path(&self, username: &str) -> PathBuf {
        self.user_dir(username).join("training_history.db")
    }

    /// `list_users` — directory scan, sorted.
    pub fn list_users(&self) -> Result<Vec<String>, UserStoreError> {
        if !self.users_dir.exists() {
            return Ok(Vec::new());
        }
        let mut users = Vec::new();
        for entry in std::fs::read_dir(&self.users_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    users.push(name.to_string());
                }
            }
        }
        users.sort();
        Ok(users)
    }

    pub fn exists(&self, username: &str) -> bool {
        self.user_dir(username).is_dir()
    }

    /// `create(username)` — make the user directory, write a default
    /// `config.json`, and initialise P's schema so reads never race a
    /// lazily-created database file.
    pub async fn create(&self, username: &str) -> Result<(), UserStoreError> {
        if username.trim().is_empty() {
            return Err(UserStoreError::EmptyUsername);
        }
        if self.exists(username) {
            return Err(UserStoreError::AlreadyExists(username.to_string()));
        }
        std::fs::create_dir_all(self.user_dir(username))?;
        let config = UserConfig::new(username);
        let body = serde_json::to_string_pretty(&config)?;
        std::fs::write(self.config_path(username), body)?;
        PersistenceStore::open(self.db_path(username)).await?;
        Ok(())
    }

    /// `delete(username)` — recursively remove the user's directory,
    /// including its database files.
    pub fn delete(&self, username: &str) -> Result<bool, UserStoreError> {
        let dir = self.user_dir(username);
        if !dir.is_dir() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        Ok(true)
    }

    pub fn get_config(&self, username: &str) -> Result<UserConfig, UserStoreError> {
        let path = self.config_path(username);
        if !path.exists() {
            return Err(UserStoreError::UserNotFound(username.to_string()));
        }
        let body = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// `update_config` — applies a partial settings patch and stamps
    /// `last_updated`.
    pub fn update_config(
        &self,
        username: &str,
        patch: SettingsPatch,
    ) -> Result<UserConfig, UserStoreError> {
        let mut config = self.get_config(username)?;
        config.apply_patch(patch);
        let body = serde_json::to_string_pretty(&config)?;
        std::fs::write(self.config_path(username), body)?;
        Ok(config)
    }

    /// Statistics routing delegates to P, opening (or reusing, if S already
    /// has it cached) the user's own database.
    pub async fn statistics(&self, username: &str) -> Result<UserStatistics, UserStoreError> {
        if !self.exists(username) {
            return Err(UserStoreError::UserNotFound(username.to_string()));
        }
        let store = PersistenceStore::open(self.db_path(username)).await?;
        match store.user_statistics(username).await {
            Ok(stats) => Ok(stats),
            Err(err) => {
                warn!(%username, %err, "failed to load user statistics");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_list_and_delete_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path());

        assert!(store.list_users().unwrap().is_empty());
        store.create("alice").await.unwrap();
        assert!(store.exists("alice"));
        assert_eq!(store.list_users().unwrap(), vec!["alice".to_string()]);

        let config = store.get_config("alice").unwrap();
        assert_eq!(config.settings.commission_rate, 0.0003);
        assert_eq!(config.settings.adjustment_mode, core_types::AdjustmentMode::DynamicForward);
        assert!(config.last_updated.is_none());

        assert!(store.delete("alice").unwrap());
        assert!(!store.exists("alice"));
        assert!(!store.delete("alice").unwrap());
    }

    #[tokio::test]
    async fn create_rejects_empty_or_duplicate_username() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path());

        assert!(matches!(
            store.create("").await,
            Err(UserStoreError::EmptyUsername)
        ));

        store.create("bob").await.unwrap();
        assert!(matches!(
            store.create("bob").await,
            Err(UserStoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn update_config_applies_partial_patch_and_stamps_last_updated() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        store.create("carol").await.unwrap();

        let patch = SettingsPatch {
            min_commission: Some(8.0),
            playback_speed: Some(2.0),
            ..Default::default()
        };
        let updated = store.update_config("carol", patch).unwrap();
        assert_eq!(updated.settings.min_commission, 8.0);
        assert_eq!(updated.settings.commission_rate, 0.0003);
        assert_eq!(updated.preferences.playback_speed, 2.0);
        assert!(updated.last_updated.is_some());

        let reloaded = store.get_config("carol").unwrap();
        assert_eq!(reloaded.settings.min_commission, 8.0);
    }

    #[tokio::test]
    async fn statistics_default_to_zero_for_a_fresh_user() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        store.create("dave").await.unwrap();

        let stats = store.statistics("dave").await.unwrap();
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.completed_sessions, 0);
    }

    #[tokio::test]
    async fn statistics_unknown_user_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        assert!(matches!(
            store.statistics("ghost").await,
            Err(UserStoreError::UserNotFound(_))
        ));
    }
}
