//! `.restart` leaves a marker that the next start reports on

mod common;

use argent::application::services::RunOutcome;
use argent::Runtime;
use common::{claimed_runtime, CHAT, OWNER};
use std::time::Duration;

#[tokio::test]
async fn restart_stops_the_loop_and_next_start_reports() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;

    let msg = transport.post(CHAT, OWNER, ".restart");
    let sender = transport.clone();
    let event = msg.clone();
    tokio::spawn(async move {
        sender.inject(event).await.unwrap();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), runtime.service.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, RunOutcome::Restart);
    assert_eq!(transport.edits_of(msg.id), vec!["🔄 <b>Restarting...</b>".to_string()]);
    drop(runtime);

    let next = common::transport();
    let runtime = Runtime::build(common::config_in(&dir), next.clone()).await.unwrap();
    let marker = runtime.service.finish_pending_restart().await.unwrap();
    assert_eq!(marker.message_id, msg.id);
    assert_eq!(marker.chat_id, CHAT);

    let report = next.edits_of(msg.id);
    assert_eq!(report.len(), 1);
    assert!(report[0].contains("restarted"));

    // Marker is consumed.
    assert!(runtime.service.finish_pending_restart().await.is_none());
}

#[tokio::test]
async fn incoming_messages_are_never_dispatched() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;

    let msg = transport.post(CHAT, OWNER, ".restart").incoming();

    let sender = transport.clone();
    let event = msg.clone();
    tokio::spawn(async move {
        sender.inject(event).await.unwrap();
    });

    // Nothing requests a restart, so the loop is still running when the timer fires.
    let outcome = tokio::time::timeout(Duration::from_millis(300), runtime.service.run()).await;
    assert!(outcome.is_err());
    assert!(transport.edits_of(msg.id).is_empty());
}
