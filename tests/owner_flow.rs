//! Owner registry lifecycle as seen from the outside

mod common;

use argent::application::messaging::Dispatch;
use argent::domain::entities::OwnerState;
use argent::infrastructure::security::{OwnerRegistry, StartupSecurity};
use common::{claimed_runtime, CHAT, OWNER, STRANGER};

#[tokio::test]
async fn first_claim_wins_and_primary_is_permanent() {
    common::ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let owners = OwnerRegistry::open(dir.path(), 1000).await.unwrap();
    assert_eq!(owners.state(), OwnerState::Unclaimed);
    assert!(!owners.is_owner(5555));

    assert!(!owners.set_primary_owner(12).await);
    assert!(owners.set_primary_owner(5555).await);
    assert!(!owners.set_primary_owner(6666).await);

    assert!(owners.add_owner(6666, 5555).await);
    assert!(!owners.add_owner(7777, 8888).await);
    assert!(!owners.remove_owner(5555, 5555).await);
    assert!(!owners.remove_owner(5555, 6666).await);
    assert!(owners.remove_owner(6666, 5555).await);

    assert_eq!(owners.get_all_owners(), vec![5555]);
    assert_eq!(owners.get_primary_owner(), Some(5555));
}

#[tokio::test]
async fn second_process_sees_changes_after_reload() {
    common::ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let agent = OwnerRegistry::open(dir.path(), 1000).await.unwrap();
    let panel = OwnerRegistry::open(dir.path(), 1000).await.unwrap();

    assert!(panel.set_primary_owner(5555).await);
    assert!(!agent.is_owner(5555));

    agent.reload().await;
    assert!(agent.is_owner(5555));
    assert!(agent.is_setup_completed());
}

#[tokio::test]
async fn startup_gate_follows_claim() {
    common::ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let owners = std::sync::Arc::new(OwnerRegistry::open(dir.path(), 1000).await.unwrap());
    let security = StartupSecurity::new(owners.clone(), dir.path().to_path_buf());

    assert!(security.validate_environment().await.is_empty());
    assert!(!security.require_owner_setup("Tester"));

    owners.set_primary_owner(5555).await;
    assert!(security.require_owner_setup("Tester"));
}

#[tokio::test]
async fn owners_command_grants_access() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;

    let denied = transport.post(CHAT, STRANGER, ".ping");
    assert_eq!(runtime.dispatcher.dispatch(denied).await, Dispatch::Denied);

    let add = transport.post(CHAT, OWNER, &format!(".owners add {}", STRANGER));
    assert_eq!(runtime.dispatcher.dispatch(add.clone()).await, Dispatch::Builtin);
    assert!(transport.edits_of(add.id)[0].contains("Owner added"));

    let allowed = transport.post(CHAT, STRANGER, ".ping");
    assert_eq!(runtime.dispatcher.dispatch(allowed).await, Dispatch::Builtin);

    let remove_primary = transport.post(CHAT, STRANGER, &format!(".owners remove {}", OWNER));
    runtime.dispatcher.dispatch(remove_primary.clone()).await;
    assert!(transport.edits_of(remove_primary.id)[0].contains("Could not remove"));
    assert!(runtime.owners.is_owner(OWNER));
}
