//! Shared fixtures for the integration tests

use std::sync::{Arc, Once};

use argent::domain::traits::AccountInfo;
use argent::infrastructure::adapters::MemoryTransport;
use argent::{Config, Runtime};

pub const OWNER: i64 = 424242;
pub const STRANGER: i64 = 777777;
pub const CHAT: i64 = 1;

static INIT: Once = Once::new();

pub fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn config_in(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().join("data");
    config.modules.directory = dir.path().join("modules");
    config.modules.auto_load = false;
    config.account.id = OWNER;
    config
}

pub fn transport() -> Arc<MemoryTransport> {
    Arc::new(MemoryTransport::new(AccountInfo {
        id: OWNER,
        name: "Tester".to_string(),
        username: None,
    }))
}

/// Runtime over a fresh data directory with `OWNER` already claimed
pub async fn claimed_runtime(dir: &tempfile::TempDir) -> (Runtime, Arc<MemoryTransport>) {
    ensure_init();
    let transport = transport();
    let runtime = Runtime::build(config_in(dir), transport.clone()).await.unwrap();
    assert!(runtime.owners.set_primary_owner(OWNER).await);
    (runtime, transport)
}
