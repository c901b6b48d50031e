//! Startup checks run before the agent is allowed to come up

use std::path::PathBuf;
use std::sync::Arc;

use super::owners::{OwnerConfigInfo, OwnerRegistry};

pub struct StartupSecurity {
    owners: Arc<OwnerRegistry>,
    data_dir: PathBuf,
}

impl StartupSecurity {
    pub fn new(owners: Arc<OwnerRegistry>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            owners,
            data_dir: data_dir.into(),
        }
    }

    /// Problems with the data directory or owner file; empty when healthy.
    pub async fn validate_environment(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if let Err(e) = tokio::fs::create_dir_all(&self.data_dir).await {
            issues.push(format!(
                "Cannot create data directory {}: {}",
                self.data_dir.display(),
                e
            ));
            return issues;
        }

        let probe = self.data_dir.join(".write_probe");
        match tokio::fs::write(&probe, b"ok").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&probe).await;
            }
            Err(e) => issues.push(format!(
                "Data directory {} is not writable: {}",
                self.data_dir.display(),
                e
            )),
        }

        let owner_file = self.owners.config_path();
        if tokio::fs::try_exists(owner_file).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::read(owner_file).await {
                issues.push(format!(
                    "Owner file {} is unreadable: {}",
                    owner_file.display(),
                    e
                ));
            }
        }

        for issue in &issues {
            tracing::warn!("Environment check: {}", issue);
        }
        issues
    }

    /// Whether an owner is claimed; prints how to claim one when not.
    pub fn require_owner_setup(&self, app_name: &str) -> bool {
        if self.owners.has_primary_owner() {
            return true;
        }

        tracing::error!("{} refused to start: no owner configured", app_name);
        println!();
        println!("  {} has no owner yet.", app_name);
        println!();
        println!("  Every command runs with full account privileges, so an owner");
        println!("  must be claimed before the agent starts:");
        println!();
        println!("      argent claim <your-account-id>");
        println!();
        println!("  Owner file: {}", self.owners.config_path().display());
        println!();
        false
    }

    pub async fn owner_info(&self) -> OwnerConfigInfo {
        self.owners.get_config_info().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gate_opens_after_claim() {
        let dir = tempfile::tempdir().unwrap();
        let owners = Arc::new(OwnerRegistry::open(dir.path(), 1000).await.unwrap());
        let security = StartupSecurity::new(owners.clone(), dir.path());

        assert!(security.validate_environment().await.is_empty());
        assert!(!security.require_owner_setup("test"));

        owners.set_primary_owner(1001).await;
        assert!(security.require_owner_setup("test"));
        assert_eq!(security.owner_info().await.primary_owner, Some(1001));
    }
}
