//! End-to-end command routing over the in-memory transport

mod common;

use argent::application::messaging::{Dispatch, DENIED_TEXT};
use common::{claimed_runtime, CHAT, OWNER, STRANGER};

#[tokio::test]
async fn stranger_gets_denied_and_nothing_runs() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;
    runtime.registry.load("hello").await.unwrap();

    let msg = transport.post(CHAT, STRANGER, ".hello");
    assert_eq!(runtime.dispatcher.dispatch(msg.clone()).await, Dispatch::Denied);
    assert_eq!(transport.edits_of(msg.id), vec![DENIED_TEXT.to_string()]);
}

#[tokio::test]
async fn unclaimed_agent_denies_everyone() {
    let dir = tempfile::tempdir().unwrap();
    common::ensure_init();
    let transport = common::transport();
    let runtime = argent::Runtime::build(common::config_in(&dir), transport.clone())
        .await
        .unwrap();

    let msg = transport.post(CHAT, OWNER, ".ping");
    assert_eq!(runtime.dispatcher.dispatch(msg.clone()).await, Dispatch::Denied);
    assert_eq!(transport.edits_of(msg.id), vec![DENIED_TEXT.to_string()]);
}

#[tokio::test]
async fn unknown_command_and_plain_text_stay_silent() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;

    let unknown = transport.post(CHAT, OWNER, ".nosuchthing a b");
    assert_eq!(runtime.dispatcher.dispatch(unknown.clone()).await, Dispatch::Unknown);
    assert!(transport.edits_of(unknown.id).is_empty());

    let plain = transport.post(CHAT, OWNER, "just chatting");
    assert_eq!(runtime.dispatcher.dispatch(plain.clone()).await, Dispatch::Ignored);
    assert!(transport.edits_of(plain.id).is_empty());

    let bare = transport.post(CHAT, OWNER, ".");
    assert_eq!(runtime.dispatcher.dispatch(bare).await, Dispatch::Ignored);
}

#[tokio::test]
async fn load_run_unload_through_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;

    let load = transport.post(CHAT, OWNER, ".load hello");
    assert_eq!(runtime.dispatcher.dispatch(load.clone()).await, Dispatch::Builtin);
    let edits = transport.edits_of(load.id);
    assert!(edits.last().unwrap().contains("Module loaded"));
    assert!(runtime.registry.get("hello").is_some());

    let hello = transport.post(CHAT, OWNER, ".hello there");
    assert_eq!(runtime.dispatcher.dispatch(hello.clone()).await, Dispatch::Module);
    assert_eq!(transport.edits_of(hello.id), vec!["👋 Hello, there!".to_string()]);

    let unload = transport.post(CHAT, OWNER, ".unload hello");
    assert_eq!(runtime.dispatcher.dispatch(unload.clone()).await, Dispatch::Builtin);
    let report = &transport.edits_of(unload.id)[0];
    assert!(report.contains("Module unloaded"));
    assert!(report.contains("v1.0.0"));
    assert!(report.contains("Commands removed:</b> 1"));

    let again = transport.post(CHAT, OWNER, ".hello");
    assert_eq!(runtime.dispatcher.dispatch(again.clone()).await, Dispatch::Unknown);
    assert!(transport.edits_of(again.id).is_empty());
}

#[tokio::test]
async fn failed_load_is_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;

    let load = transport.post(CHAT, OWNER, ".load missing_module");
    assert_eq!(runtime.dispatcher.dispatch(load.clone()).await, Dispatch::Builtin);
    assert!(transport.edits_of(load.id).last().unwrap().contains("Failed to load"));
    assert!(runtime.registry.list_all().is_empty());
}

#[tokio::test]
async fn commands_are_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;
    runtime.registry.load("hello").await.unwrap();

    let msg = transport.post(CHAT, OWNER, ".HeLLo");
    assert_eq!(runtime.dispatcher.dispatch(msg.clone()).await, Dispatch::Module);
    assert_eq!(transport.edits_of(msg.id), vec!["👋 Hello, World!".to_string()]);
}

#[tokio::test]
async fn ping_edits_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;

    let msg = transport.post(CHAT, OWNER, ".ping");
    assert_eq!(runtime.dispatcher.dispatch(msg.clone()).await, Dispatch::Builtin);
    let edits = transport.edits_of(msg.id);
    assert_eq!(edits.len(), 2);
    assert!(edits[1].contains("Ping:"));
    assert_eq!(runtime.dispatcher.stats().invocations(), 1);
}

#[tokio::test]
async fn explicit_startup_list_loads_only_named_modules() {
    let dir = tempfile::tempdir().unwrap();
    common::ensure_init();
    let mut config = common::config_in(&dir);
    config.modules.load_on_startup = vec!["hello".to_string(), "absent".to_string()];
    let runtime = argent::Runtime::build(config, common::transport()).await.unwrap();

    assert_eq!(runtime.start_modules().await, 1);
    assert!(runtime.registry.get("hello").is_some());
    assert!(runtime.registry.get("core_utils").is_none());
}

#[tokio::test]
async fn discovery_loads_every_builtin_module() {
    let dir = tempfile::tempdir().unwrap();
    common::ensure_init();
    let mut config = common::config_in(&dir);
    config.modules.auto_load = true;
    let runtime = argent::Runtime::build(config, common::transport()).await.unwrap();

    assert_eq!(runtime.start_modules().await, 2);
    assert!(runtime.registry.command_names().contains(&".echo".to_string()));
}

#[tokio::test]
async fn prefixed_prose_is_untouched_after_quota_runs_out() {
    let dir = tempfile::tempdir().unwrap();
    common::ensure_init();
    let mut config = common::config_in(&dir);
    config.security.rate_limit.max_requests = 1;
    let transport = common::transport();
    let runtime = argent::Runtime::build(config, transport.clone()).await.unwrap();
    assert!(runtime.owners.set_primary_owner(OWNER).await);

    let ping = transport.post(CHAT, OWNER, ".ping");
    assert_eq!(runtime.dispatcher.dispatch(ping).await, Dispatch::Builtin);

    let prose = transport.post(CHAT, OWNER, "...anyway, see you tomorrow");
    assert_eq!(runtime.dispatcher.dispatch(prose.clone()).await, Dispatch::Unknown);
    assert!(transport.edits_of(prose.id).is_empty());
    assert_eq!(runtime.dispatcher.stats().invocations(), 1);

    let limited = transport.post(CHAT, OWNER, ".ping");
    assert_eq!(runtime.dispatcher.dispatch(limited.clone()).await, Dispatch::Denied);
    assert_eq!(transport.edits_of(limited.id), vec![argent::application::messaging::SLOW_DOWN_TEXT.to_string()]);
}

#[tokio::test]
async fn stranger_prose_is_not_answered() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, transport) = claimed_runtime(&dir).await;

    let prose = transport.post(CHAT, STRANGER, ".. well then");
    assert_eq!(runtime.dispatcher.dispatch(prose.clone()).await, Dispatch::Unknown);
    assert!(transport.edits_of(prose.id).is_empty());
}
