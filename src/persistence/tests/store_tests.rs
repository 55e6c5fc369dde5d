//! Tests for the on-disk snapshot store.

use crate::persistence::{
    Conversation, ConversationCatalog, ConversationMessage, FocusCatalog, FocusChain,
    GzipJsonSerializer, MessageRole, PersistenceError, PersistenceStore, Session, SessionCatalog,
    SnapshotSource, Subsystem,
};
use crate::test_support::ManualClock;
use camino::Utf8PathBuf;
use eyre::{WrapErr, ensure};
use rstest::{fixture, rstest};
use std::sync::{Arc, Mutex};

struct StoreDir {
    _dir: tempfile::TempDir,
    path: Utf8PathBuf,
}

#[fixture]
fn store_dir() -> StoreDir {
    let dir = tempfile::tempdir().expect("temporary directory");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("snapshots")).expect("UTF-8 temp path");
    StoreDir { _dir: dir, path }
}

#[fixture]
fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new())
}

struct Managers {
    sessions: SessionCatalog<ManualClock>,
    conversations: ConversationCatalog<ManualClock>,
    focus: FocusCatalog<ManualClock>,
}

fn managers(
    store: &PersistenceStore<ManualClock>,
    clock: &Arc<ManualClock>,
) -> eyre::Result<Managers> {
    let registered = Managers {
        sessions: SessionCatalog::new(Arc::clone(clock)),
        conversations: ConversationCatalog::new(Arc::clone(clock)),
        focus: FocusCatalog::new(Arc::clone(clock)),
    };
    store.register(Subsystem::Sessions, Arc::new(registered.sessions.clone()))?;
    store.register(
        Subsystem::Conversations,
        Arc::new(registered.conversations.clone()),
    )?;
    store.register(Subsystem::Focus, Arc::new(registered.focus.clone()))?;
    Ok(registered)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn save_clear_load_reproduces_every_subsystem(
    store_dir: StoreDir,
    clock: Arc<ManualClock>,
) -> eyre::Result<()> {
    let store = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    let before = managers(&store, &clock)?;
    let session = Session::new("refactor parser", &*clock)
        .with_id("session-a")
        .with_project("proj-1")
        .with_tag("parser")
        .with_metadata("branch", "main");
    let mut conversation = Conversation::new("design chat", &*clock)
        .with_id("conv-a")
        .with_session("session-a")
        .with_tag("design");
    conversation.push_message(ConversationMessage::new(
        MessageRole::User,
        "split the lexer",
        &*clock,
    ));
    let mut chain = FocusChain::new("parser focus", &*clock)
        .with_id("chain-a")
        .with_description("files under review");
    chain.push_focus("src/lexer.rs", &*clock);
    before.sessions.insert(session.clone())?;
    before.conversations.insert(conversation.clone())?;
    before.focus.insert(chain.clone())?;

    let saved = store.save_all().await?;
    ensure!(saved.items() == 3, "expected 3 saved items, got {}", saved.items());
    ensure!(saved.size() > 0, "nothing written");

    let fresh = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    let after = managers(&fresh, &clock)?;
    let loaded = fresh.load_all().await?;
    ensure!(loaded.items() == 3, "expected 3 loaded items, got {}", loaded.items());
    ensure!(after.sessions.get("session-a")? == Some(session), "session differs");
    ensure!(
        after.conversations.get("conv-a")? == Some(conversation),
        "conversation differs"
    );
    ensure!(after.focus.get("chain-a")? == Some(chain), "focus chain differs");

    store.clear().await?;
    let empty = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    let cleared = managers(&empty, &clock)?;
    ensure!(empty.load_all().await?.items() == 0, "clear left snapshots");
    ensure!(cleared.sessions.is_empty()?, "sessions survived clear");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn load_from_missing_directory_yields_nothing(
    store_dir: StoreDir,
    clock: Arc<ManualClock>,
) -> eyre::Result<()> {
    let store = PersistenceStore::new(store_dir.path.join("never-created"), Arc::clone(&clock));
    managers(&store, &clock)?;

    let loaded = store.load_all().await?;
    ensure!(loaded.items() == 0, "loaded {} items", loaded.items());
    ensure!(loaded.size() == 0, "read {} bytes", loaded.size());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn damaged_files_are_skipped_and_reported(
    store_dir: StoreDir,
    clock: Arc<ManualClock>,
) -> eyre::Result<()> {
    let store = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    let registered = managers(&store, &clock)?;
    registered
        .sessions
        .insert(Session::new("kept", &*clock).with_id("session-kept"))?;
    store.save_all().await?;

    let sessions_dir = store_dir.path.join("sessions");
    std::fs::write(sessions_dir.join("broken.json"), b"{\"item\": ")?;
    std::fs::write(sessions_dir.join("wrong-shape.json"), b"{\"unrelated\": true}")?;
    std::fs::write(sessions_dir.join("session-half.json.tmp"), b"{")?;

    let fresh = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    fresh.on_error(move |err: &PersistenceError| {
        if let Ok(mut errors) = sink.lock() {
            errors.push(err.to_string());
        }
    })?;
    let after = managers(&fresh, &clock)?;

    let loaded = fresh.load_all().await?;
    ensure!(loaded.items() == 1, "expected one good snapshot, got {}", loaded.items());
    ensure!(after.sessions.get("session-kept")?.is_some(), "good snapshot lost");
    let errors = reported.lock().map(|errors| errors.clone()).unwrap_or_default();
    ensure!(errors.len() == 2, "expected two reported skips, got {errors:?}");
    ensure!(
        errors
            .iter()
            .all(|message| !message.contains("session-half.json.tmp")),
        "temporary file was read: {errors:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unsafe_snapshot_ids_are_not_written(
    store_dir: StoreDir,
    clock: Arc<ManualClock>,
) -> eyre::Result<()> {
    let store = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    let registered = managers(&store, &clock)?;
    registered
        .sessions
        .insert(Session::new("escape", &*clock).with_id("../outside"))?;
    registered
        .sessions
        .insert(Session::new("hidden", &*clock).with_id(".hidden"))?;
    registered
        .sessions
        .insert(Session::new("fine", &*clock).with_id("session-ok"))?;

    let validation_failures = Arc::new(Mutex::new(0_usize));
    let counter = Arc::clone(&validation_failures);
    store.on_error(move |err: &PersistenceError| {
        let Ok(mut count) = counter.lock() else {
            return;
        };
        if err.is_validation() {
            *count += 1;
        }
    })?;

    let saved = store.save_all().await?;
    ensure!(saved.items() == 1, "expected only the safe id, got {}", saved.items());
    ensure!(
        !store_dir.path.join("outside.json").exists(),
        "snapshot escaped the subsystem directory"
    );
    let failures = validation_failures.lock().map(|count| *count).unwrap_or_default();
    ensure!(failures == 2, "expected two validation failures, got {failures}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unregistered_subsystems_are_left_alone(
    store_dir: StoreDir,
    clock: Arc<ManualClock>,
) -> eyre::Result<()> {
    let store = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    let sessions = SessionCatalog::new(Arc::clone(&clock));
    sessions.insert(Session::new("only", &*clock).with_id("session-only"))?;
    store.register(Subsystem::Sessions, Arc::new(sessions.clone()))?;

    store.save_all().await?;
    ensure!(store_dir.path.join("sessions").is_dir(), "sessions not written");
    ensure!(
        !store_dir.path.join("conversations").exists(),
        "unregistered subsystem written"
    );

    ensure!(store.unregister(Subsystem::Sessions)?, "sessions were registered");
    ensure!(!store.unregister(Subsystem::Sessions)?, "second unregister succeeded");
    ensure!(store.save_all().await?.items() == 0, "unregistered source saved");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn switching_to_gzip_replaces_plain_files(
    store_dir: StoreDir,
    clock: Arc<ManualClock>,
) -> eyre::Result<()> {
    let store = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    let registered = managers(&store, &clock)?;
    registered
        .focus
        .insert(FocusChain::new("chain", &*clock).with_id("chain-1"))?;

    store.save_all().await?;
    store.set_serializer(Arc::new(GzipJsonSerializer::new()))?;
    let saved = store.save_all().await?;

    let focus_dir = store_dir.path.join("focus");
    ensure!(focus_dir.join("chain-1.json.gz").is_file(), "gzip file missing");
    ensure!(!focus_dir.join("chain-1.json").exists(), "stale plain file kept");
    ensure!(
        saved.format() == crate::persistence::SnapshotFormat::GzipJson,
        "metadata reports {}",
        saved.format()
    );

    let fresh = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    let after = managers(&fresh, &clock)?;
    fresh.load_all().await.wrap_err("gzip snapshot should load")?;
    ensure!(after.focus.len()? == 1, "gzip snapshot not imported");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn save_records_time_and_notifies(
    store_dir: StoreDir,
    clock: Arc<ManualClock>,
) -> eyre::Result<()> {
    let store = PersistenceStore::new(store_dir.path.clone(), Arc::clone(&clock));
    managers(&store, &clock)?;
    let notified = Arc::new(Mutex::new(Vec::new()));
    let save_sink = Arc::clone(&notified);
    store.on_save(move |metadata| {
        if let Ok(mut seen) = save_sink.lock() {
            seen.push(("save", metadata.items()));
        }
    })?;
    let load_sink = Arc::clone(&notified);
    store.on_load(move |metadata| {
        if let Ok(mut seen) = load_sink.lock() {
            seen.push(("load", metadata.items()));
        }
    })?;

    ensure!(store.last_save_time()?.is_none(), "fresh store reports a save");
    let saved = store.save().await?;
    ensure!(
        store.last_save_time()? == Some(saved.timestamp()),
        "last save time not recorded"
    );
    store.load().await?;

    let seen = notified.lock().map(|seen| seen.clone()).unwrap_or_default();
    ensure!(seen == vec![("save", 0), ("load", 0)], "unexpected callbacks {seen:?}");
    Ok(())
}

#[rstest]
fn catalog_export_wraps_the_entity(clock: Arc<ManualClock>) -> eyre::Result<()> {
    let sessions = SessionCatalog::new(Arc::clone(&clock));
    sessions.insert(Session::new("named", &*clock).with_id("session-x"))?;

    let document = sessions.export("session-x")?;
    ensure!(
        document.pointer("/item/name").and_then(serde_json::Value::as_str) == Some("named"),
        "unexpected document {document}"
    );
    ensure!(document.get("exported_at").is_some(), "export time missing");
    ensure!(sessions.export("missing").is_err(), "unknown id exported");
    Ok(())
}
