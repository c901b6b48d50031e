//! Owner registry - durable owner set with a write-once primary owner

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::entities::owner::is_plausible_principal;
use crate::domain::entities::{OwnerChange, OwnerConfig, OwnerState};
use crate::infrastructure::storage::{read_json_tolerant, write_json_atomic};

pub const OWNER_FILE: &str = "owner_config.json";
pub const CLAIM_FILE: &str = "owner_config.claim";

/// Diagnostics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerConfigInfo {
    pub has_primary_owner: bool,
    pub primary_owner: Option<i64>,
    pub total_owners: usize,
    pub setup_completed: bool,
    pub config_file_exists: bool,
}

/// File-backed owner set shared by the agent and the control-panel bot.
///
/// Mutations are serialized by `write_lock` and always re-read the file
/// first. The very first claim is arbitrated by exclusively creating
/// `owner_config.claim`, so two processes racing to claim cannot both win.
pub struct OwnerRegistry {
    config_path: PathBuf,
    claim_path: PathBuf,
    min_principal_id: i64,
    state: RwLock<OwnerConfig>,
    /// Set while the last write failed; memory stays authoritative.
    dirty: AtomicBool,
    write_lock: Mutex<()>,
}

impl OwnerRegistry {
    pub async fn open(data_dir: impl AsRef<Path>, min_principal_id: i64) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;

        let registry = Self {
            config_path: data_dir.join(OWNER_FILE),
            claim_path: data_dir.join(CLAIM_FILE),
            min_principal_id,
            state: RwLock::new(OwnerConfig::default()),
            dirty: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        };
        registry.refresh().await;
        Ok(registry)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn snapshot(&self) -> OwnerConfig {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn replace(&self, config: OwnerConfig) {
        match self.state.write() {
            Ok(mut state) => *state = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }

    async fn read_claim(&self) -> Option<i64> {
        let content = tokio::fs::read_to_string(&self.claim_path).await.ok()?;
        content.trim().parse().ok()
    }

    async fn read_disk(&self) -> Result<OwnerConfig, StorageError> {
        let mut config = read_json_tolerant::<OwnerConfig>(&self.config_path)
            .await?
            .unwrap_or_default();

        if config.primary_owner.is_none() {
            if let Some(id) = self.read_claim().await {
                if config.restore_primary(id) {
                    tracing::warn!("Primary owner {} restored from claim file", id);
                }
            }
        }
        Ok(config)
    }

    /// Pull the on-disk state into memory unless an unsaved change is pending.
    async fn refresh(&self) {
        if self.dirty.load(Ordering::SeqCst) {
            tracing::debug!("Owner state has unsaved changes; keeping in-memory view");
            return;
        }
        match self.read_disk().await {
            Ok(config) => self.replace(config),
            Err(e) => tracing::error!("Failed to read owner config, keeping in-memory view: {}", e),
        }
    }

    async fn persist(&self, config: &OwnerConfig) {
        match write_json_atomic(&self.config_path, config).await {
            Ok(()) => self.dirty.store(false, Ordering::SeqCst),
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                tracing::error!("Failed to save owner config: {}", e);
            }
        }
    }

    /// Publish the claim file with its content already in place.
    ///
    /// The id is written to a private temp file which is then hard-linked to
    /// the claim path; the link fails if any claim file exists, empty or not.
    /// `Ok(false)` means someone else holds the claim. A claim file this
    /// process did not create is never removed here.
    async fn create_claim(&self, id: i64) -> Result<bool, StorageError> {
        let tmp = self.claim_path.with_file_name(format!(
            "{}.{}.{}.tmp",
            CLAIM_FILE,
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));

        let linked = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(id.to_string().as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::hard_link(&tmp, &self.claim_path).await
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            tracing::debug!("Claim temp file {} not removed: {}", tmp.display(), e);
        }

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if self.read_claim().await.is_none() {
                    tracing::warn!(
                        "Claim file {} exists but holds no id; run `argent reset-owners --yes` if no claim is in progress",
                        self.claim_path.display()
                    );
                }
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Claim the primary slot. Succeeds at most once per fresh store.
    pub async fn set_primary_owner(&self, id: i64) -> bool {
        if !is_plausible_principal(id, self.min_principal_id) {
            tracing::error!("Rejected implausible principal id {}", id);
            return false;
        }

        let _guard = self.write_lock.lock().await;
        self.refresh().await;

        let mut config = self.snapshot();
        if config.state() == OwnerState::Claimed {
            tracing::warn!("Primary owner already set; refusing claim by {}", id);
            return false;
        }

        match self.create_claim(id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Claim by {} lost to another process", id);
                self.dirty.store(false, Ordering::SeqCst);
                self.refresh().await;
                return false;
            }
            Err(e) => {
                tracing::error!("Could not arbitrate owner claim: {}", e);
                return false;
            }
        }

        let change = config.claim(id, self.min_principal_id);
        if !change.applied() {
            return false;
        }
        self.replace(config.clone());
        self.persist(&config).await;

        tracing::info!("Primary owner set: {}", id);
        true
    }

    pub fn is_owner(&self, id: i64) -> bool {
        self.state
            .read()
            .map(|s| s.is_owner(id))
            .unwrap_or(false)
    }

    pub fn state(&self) -> OwnerState {
        self.snapshot().state()
    }

    pub fn has_primary_owner(&self) -> bool {
        self.state() == OwnerState::Claimed
    }

    pub fn get_primary_owner(&self) -> Option<i64> {
        self.snapshot().primary_owner
    }

    pub fn get_all_owners(&self) -> Vec<i64> {
        self.snapshot().owners
    }

    pub fn is_setup_completed(&self) -> bool {
        self.snapshot().setup_completed
    }

    async fn mutate(&self, describe: &str, apply: impl FnOnce(&mut OwnerConfig) -> OwnerChange) -> bool {
        let _guard = self.write_lock.lock().await;
        self.refresh().await;

        let mut config = self.snapshot();
        let change = apply(&mut config);
        if !change.applied() {
            tracing::warn!("Owner change refused ({}): {:?}", describe, change);
            return false;
        }

        self.replace(config.clone());
        self.persist(&config).await;
        tracing::info!("Owner change applied: {}", describe);
        true
    }

    pub async fn add_owner(&self, id: i64, acting: i64) -> bool {
        self.mutate(&format!("add {} by {}", id, acting), |c| c.add(id, acting))
            .await
    }

    pub async fn remove_owner(&self, id: i64, acting: i64) -> bool {
        self.mutate(&format!("remove {} by {}", id, acting), |c| c.remove(id, acting))
            .await
    }

    /// Re-read the backing file so changes made by the other process show up.
    pub async fn reload(&self) {
        let _guard = self.write_lock.lock().await;
        self.refresh().await;
    }

    pub async fn get_config_info(&self) -> OwnerConfigInfo {
        let config = self.snapshot();
        OwnerConfigInfo {
            has_primary_owner: config.state() == OwnerState::Claimed,
            primary_owner: config.primary_owner,
            total_owners: config.owners.len(),
            setup_completed: config.setup_completed,
            config_file_exists: tokio::fs::try_exists(&self.config_path).await.unwrap_or(false),
        }
    }

    /// Forget every owner, including the primary. Only reachable from the CLI.
    pub async fn emergency_reset(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        for path in [&self.config_path, &self.claim_path] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.replace(OwnerConfig::default());
        self.dirty.store(false, Ordering::SeqCst);
        tracing::warn!("Owner configuration reset");
        Ok(())
    }
}
