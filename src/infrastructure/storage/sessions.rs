//! Session index: one JSON index plus one credential file per session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::json_file::{read_json_tolerant, write_json_atomic};
use crate::application::errors::StorageError;

/// Index entry for one stored session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionIndex {
    #[serde(default)]
    sessions: BTreeMap<String, SessionInfo>,
    #[serde(default)]
    default_session: Option<String>,
    created_at: DateTime<Utc>,
}

impl Default for SessionIndex {
    fn default() -> Self {
        Self {
            sessions: BTreeMap::new(),
            default_session: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Serialize)]
struct SessionBackup<'a> {
    index: &'a SessionIndex,
    sessions: BTreeMap<String, String>,
    backup_created: DateTime<Utc>,
}

/// Persistent session credentials
pub struct SessionStorage {
    data_dir: PathBuf,
    sessions_dir: PathBuf,
    index_path: PathBuf,
    index: Mutex<SessionIndex>,
}

impl SessionStorage {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let sessions_dir = data_dir.join("sessions");
        tokio::fs::create_dir_all(&sessions_dir).await?;
        let index_path = sessions_dir.join("index.json");

        let index = match read_json_tolerant::<SessionIndex>(&index_path).await {
            Ok(Some(index)) => index,
            Ok(None) => {
                let index = SessionIndex::default();
                write_json_atomic(&index_path, &index).await?;
                index
            }
            Err(e) => {
                tracing::error!("Session index unreadable, starting empty: {}", e);
                SessionIndex::default()
            }
        };

        Ok(Self {
            data_dir,
            sessions_dir,
            index_path,
            index: Mutex::new(index),
        })
    }

    async fn save_index(&self, index: &SessionIndex) -> Result<(), StorageError> {
        write_json_atomic(&self.index_path, index).await
    }

    /// Store a credential string and index it, returning the new session id.
    pub async fn save_session(
        &self,
        credentials: &str,
        user_id: Option<i64>,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<String, StorageError> {
        let session_id = uuid::Uuid::new_v4().simple().to_string()[..16].to_string();

        let base = match (user_id, username, first_name) {
            (Some(id), _, _) => format!("argent_{}", id),
            (None, Some(name), _) => format!("argent_{}", name),
            (None, None, Some(name)) => format!("argent_{}", name),
            _ => format!("argent_{}", &session_id[..8]),
        };
        let file_name = self.free_file_name(&base).await;

        tokio::fs::write(self.sessions_dir.join(&file_name), credentials).await?;

        let now = Utc::now();
        let info = SessionInfo {
            session_id: session_id.clone(),
            user_id,
            username: username.map(str::to_string),
            first_name: first_name.map(str::to_string),
            created_at: now,
            last_used: now,
            file_name,
        };

        let mut index = self.index.lock().await;
        index.sessions.insert(session_id.clone(), info);
        if index.default_session.is_none() {
            index.default_session = Some(session_id.clone());
        }
        self.save_index(&index).await?;

        tracing::info!("Session saved: {}", session_id);
        Ok(session_id)
    }

    async fn free_file_name(&self, base: &str) -> String {
        let mut candidate = format!("{}.session", base);
        let mut n = 1;
        while tokio::fs::try_exists(self.sessions_dir.join(&candidate))
            .await
            .unwrap_or(false)
        {
            candidate = format!("{}_{}.session", base, n);
            n += 1;
        }
        candidate
    }

    /// Credentials of `session_id`, or of the default session when `None`.
    pub async fn load_session(&self, session_id: Option<&str>) -> Result<Option<String>, StorageError> {
        let mut index = self.index.lock().await;
        let Some(id) = session_id
            .map(str::to_string)
            .or_else(|| index.default_session.clone())
        else {
            return Ok(None);
        };
        let Some(info) = index.sessions.get_mut(&id) else {
            return Ok(None);
        };

        let path = self.sessions_dir.join(&info.file_name);
        let credentials = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Session file missing: {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        info.last_used = Utc::now();
        self.save_index(&index).await?;
        Ok(Some(credentials))
    }

    pub async fn get_session_info(&self, session_id: Option<&str>) -> Option<SessionInfo> {
        let index = self.index.lock().await;
        let id = session_id
            .map(str::to_string)
            .or_else(|| index.default_session.clone())?;
        index.sessions.get(&id).cloned()
    }

    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        self.index.lock().await.sessions.values().cloned().collect()
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, StorageError> {
        let mut index = self.index.lock().await;
        let Some(info) = index.sessions.remove(session_id) else {
            return Ok(false);
        };

        let path = self.sessions_dir.join(&info.file_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if index.default_session.as_deref() == Some(session_id) {
            index.default_session = index.sessions.keys().next().cloned();
        }
        self.save_index(&index).await?;

        tracing::info!("Session deleted: {}", session_id);
        Ok(true)
    }

    pub async fn set_default_session(&self, session_id: &str) -> Result<bool, StorageError> {
        let mut index = self.index.lock().await;
        if !index.sessions.contains_key(session_id) {
            return Ok(false);
        }
        index.default_session = Some(session_id.to_string());
        self.save_index(&index).await?;
        tracing::info!("Default session set: {}", session_id);
        Ok(true)
    }

    pub async fn default_session(&self) -> Option<String> {
        self.index.lock().await.default_session.clone()
    }

    pub async fn has_sessions(&self) -> bool {
        !self.index.lock().await.sessions.is_empty()
    }

    /// Drop index entries whose credential file disappeared.
    pub async fn cleanup_invalid_sessions(&self) -> Result<usize, StorageError> {
        let mut index = self.index.lock().await;

        let mut invalid = Vec::new();
        for (id, info) in &index.sessions {
            let exists = tokio::fs::try_exists(self.sessions_dir.join(&info.file_name))
                .await
                .unwrap_or(false);
            if !exists {
                invalid.push(id.clone());
            }
        }

        if invalid.is_empty() {
            return Ok(0);
        }

        for id in &invalid {
            tracing::warn!("Removing invalid session: {}", id);
            index.sessions.remove(id);
        }
        if index
            .default_session
            .as_ref()
            .is_some_and(|d| invalid.contains(d))
        {
            index.default_session = index.sessions.keys().next().cloned();
        }
        self.save_index(&index).await?;
        Ok(invalid.len())
    }

    /// Write every session and the index into one JSON bundle.
    pub async fn backup_sessions(&self, backup_path: Option<PathBuf>) -> Result<PathBuf, StorageError> {
        let index = self.index.lock().await;
        let path = backup_path.unwrap_or_else(|| {
            self.data_dir.join(format!(
                "sessions_backup_{}.json",
                Utc::now().format("%Y%m%d_%H%M%S")
            ))
        });

        let mut sessions = BTreeMap::new();
        for (id, info) in &index.sessions {
            if let Ok(content) = tokio::fs::read_to_string(self.sessions_dir.join(&info.file_name)).await {
                sessions.insert(id.clone(), content);
            }
        }

        let backup = SessionBackup {
            index: &*index,
            sessions,
            backup_created: Utc::now(),
        };
        write_json_atomic(&path, &backup).await?;

        tracing::info!("Session backup written: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_saved_session_becomes_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::open(dir.path()).await.unwrap();

        let first = storage.save_session("cred-a", Some(1001), None, None).await.unwrap();
        let second = storage.save_session("cred-b", Some(1001), None, None).await.unwrap();

        assert_eq!(storage.default_session().await, Some(first.clone()));
        assert_eq!(storage.load_session(None).await.unwrap().as_deref(), Some("cred-a"));
        assert_eq!(
            storage.load_session(Some(&second)).await.unwrap().as_deref(),
            Some("cred-b")
        );

        let infos = storage.list_sessions().await;
        assert_eq!(infos.len(), 2);
        assert_ne!(infos[0].file_name, infos[1].file_name);
    }

    #[tokio::test]
    async fn deleting_default_reassigns_it() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::open(dir.path()).await.unwrap();

        let first = storage.save_session("a", None, Some("alice"), None).await.unwrap();
        let second = storage.save_session("b", None, Some("bob"), None).await.unwrap();

        assert!(storage.delete_session(&first).await.unwrap());
        assert!(!storage.delete_session(&first).await.unwrap());
        assert_eq!(storage.default_session().await, Some(second));
    }

    #[tokio::test]
    async fn cleanup_drops_entries_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::open(dir.path()).await.unwrap();

        let id = storage.save_session("a", Some(5000), None, None).await.unwrap();
        let info = storage.get_session_info(Some(&id)).await.unwrap();
        std::fs::remove_file(dir.path().join("sessions").join(info.file_name)).unwrap();

        assert_eq!(storage.cleanup_invalid_sessions().await.unwrap(), 1);
        assert!(!storage.has_sessions().await);
        assert_eq!(storage.default_session().await, None);
    }

    #[tokio::test]
    async fn backup_contains_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::open(dir.path()).await.unwrap();
        let id = storage.save_session("secret", Some(5000), None, None).await.unwrap();

        let path = storage.backup_sessions(None).await.unwrap();
        let bundle: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(bundle["sessions"][&id], "secret");
        assert_eq!(bundle["index"]["default_session"], id.as_str());
    }
}
