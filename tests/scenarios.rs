use std::sync::Arc;
use std::time::Duration;

use tokenscope_lib::agents::SessionEvent;
use tokenscope_lib::commands;
use tokenscope_lib::config::AppConfig;
use tokenscope_lib::detection::{
    ContextId, DetectionKind, DetectionSource, FeedEvent, Header, ObservedEvent, PolicySettings,
    StorageItem, StorageKind,
};
use tokenscope_lib::engine::{IngestOutcome, ShutdownOutcome, ShutdownSignal};
use tokenscope_lib::security::Sanitizer;
use tokenscope_lib::session::Session;
use tokenscope_lib::sources::MemorySnapshotSource;
use tokenscope_lib::store::{FileMirror, MemoryMirror, MirrorStore};

const ACTIVE: ContextId = ContextId(1);

struct Harness {
    session: Session,
    source: Arc<MemorySnapshotSource>,
}

async fn harness(max_entries: usize, source_kind: DetectionSource) -> Harness {
    let config = AppConfig {
        policy: PolicySettings {
            detection_kind: DetectionKind::BearerHeader,
            detection_source: source_kind,
            max_entries,
            auto_cleanup: true,
        },
        scan_interval_secs: 0,
        scan_on_start: false,
        ..AppConfig::default()
    };
    let source = Arc::new(MemorySnapshotSource::new());
    let session = Session::new(&config, source.clone(), Arc::new(MemoryMirror::new())).await;
    session.tracker().on_context_changed(ACTIVE, None).await;
    Harness { session, source }
}

fn bearer(url: &str, token: &str) -> ObservedEvent {
    ObservedEvent::Headers {
        url: url.to_string(),
        headers: vec![Header::new("Authorization", format!("Bearer {}", token))],
    }
}

#[tokio::test]
async fn scenario_single_bearer_token() {
    let h = harness(5, DetectionSource::RequestHeaders).await;
    let collector = h.session.collector();

    let outcome = collector
        .ingest(&bearer("https://api.example.com/v1/me", "abc123xyz789"))
        .await;
    assert_eq!(outcome, IngestOutcome::Accepted);

    let entries = collector.list().await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].token == "abc123xyz789");
    assert_eq!(entries[0].representative_source, "https://api.example.com/v1/me");
}

#[tokio::test]
async fn scenario_duplicate_keeps_first_source() {
    let h = harness(5, DetectionSource::RequestHeaders).await;
    let collector = h.session.collector();

    collector
        .ingest(&bearer("https://api.example.com/first", "abc123xyz789"))
        .await;
    let second = collector
        .ingest(&bearer("https://api.example.com/second", "abc123xyz789"))
        .await;

    assert_eq!(second, IngestOutcome::DuplicateIgnored);
    let entries = collector.list().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].representative_source, "https://api.example.com/first");
}

#[tokio::test]
async fn scenario_capacity_reached() {
    let h = harness(2, DetectionSource::RequestHeaders).await;
    let collector = h.session.collector();

    let outcomes = [
        collector.ingest(&bearer("https://a.test", "token-one")).await,
        collector.ingest(&bearer("https://a.test", "token-two")).await,
        collector.ingest(&bearer("https://a.test", "token-three")).await,
    ];

    assert_eq!(
        outcomes,
        [
            IngestOutcome::Accepted,
            IngestOutcome::Accepted,
            IngestOutcome::CapacityReached
        ]
    );
    let entries = collector.list().await;
    assert_eq!(entries.len(), 2);
    assert!(entries[0].token == "token-one");
    assert!(entries[1].token == "token-two");
}

#[tokio::test]
async fn scenario_context_change_empties_collection() {
    let h = harness(5, DetectionSource::RequestHeaders).await;
    let collector = h.session.collector();
    collector.ingest(&bearer("https://a.test", "token-one")).await;
    collector.ingest(&bearer("https://a.test", "token-two")).await;
    assert_eq!(collector.current_size().await, 2);

    h.session.tracker().on_context_changed(ContextId(2), None).await;
    assert!(collector.list().await.is_empty());
}

#[tokio::test]
async fn scenario_storage_plausibility_threshold() {
    let h = harness(5, DetectionSource::BrowserStorage).await;
    h.source
        .set_storage(
            ACTIVE,
            vec![
                StorageItem::new(StorageKind::Local, "auth_token_v2", "12345678"),
                StorageItem::new(
                    StorageKind::Session,
                    "auth_token_v2b",
                    "abcdefghijklmnopqrstuvwxyz0123",
                ),
            ],
        )
        .await;

    let view = commands::request_scan(&h.session).await.unwrap();
    assert_eq!(view.entries.len(), 1);
    assert_eq!(view.entries[0].display_source, "sessionStorage:auth_token_v2b");

    let entries = h.session.collector().list().await;
    assert!(entries[0].token == "abcdefghijklmnopqrstuvwxyz0123");
}

#[tokio::test]
async fn policy_change_isolates_entries() {
    let h = harness(5, DetectionSource::RequestHeaders).await;
    h.session
        .collector()
        .ingest(&bearer("https://a.test", "token-one"))
        .await;

    commands::set_policy(
        &h.session,
        PolicySettings {
            detection_kind: DetectionKind::SessionHeader,
            ..PolicySettings::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(h.session.collector().current_size().await, 0);
}

#[tokio::test]
async fn size_never_exceeds_capacity() {
    for k in 1..=5 {
        let h = harness(k, DetectionSource::RequestHeaders).await;
        for i in 0..12 {
            let token = format!("token-{:02}-{}", i % 8, "x".repeat(i));
            h.session
                .collector()
                .ingest(&bearer("https://a.test", &token))
                .await;
            assert!(h.session.collector().current_size().await <= k);
        }
        assert_eq!(h.session.collector().current_size().await, k);
    }
}

#[tokio::test]
async fn masking_reveals_only_edges() {
    let token = "abcdEFGHIJKLMNOPwxyz";
    let masked = Sanitizer::mask_token(token);
    assert!(masked.starts_with("abcd"));
    assert!(masked.ends_with("wxyz"));
    assert!(!masked.contains("EFGH"));

    let short = Sanitizer::mask_token("abcdefghijk");
    assert_eq!(short, Sanitizer::mask_token("zzzzzzzzzzz"));
    assert!(!short.contains('a'));
}

#[tokio::test]
async fn feed_events_from_inactive_context_never_collected() {
    let h = harness(5, DetectionSource::RequestHeaders).await;
    h.session.start().await.unwrap();
    let feed = h.session.feed();

    feed.send(SessionEvent::Feed(FeedEvent::RequestObserved {
        context_id: ContextId(9),
        url: "https://other.test".into(),
        headers: vec![Header::new("Authorization", "Bearer other-token-123")],
    }))
    .await
    .unwrap();
    feed.send(SessionEvent::Feed(FeedEvent::RequestObserved {
        context_id: ACTIVE,
        url: "https://active.test".into(),
        headers: vec![Header::new("Authorization", "Bearer active-token-123")],
    }))
    .await
    .unwrap();

    let mut changes = h.session.collector().subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        while changes.borrow_and_update().size < 1 {
            changes.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    let entries = h.session.collector().list().await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].token == "active-token-123");

    h.session.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_removes_file_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = Arc::new(FileMirror::new(dir.path().join("mirror.json")));
    let session = Session::new(
        &AppConfig::default(),
        Arc::new(MemorySnapshotSource::new()),
        mirror.clone(),
    )
    .await;
    session.tracker().on_context_changed(ACTIVE, None).await;
    session.start().await.unwrap();

    session
        .collector()
        .ingest(&bearer("https://a.test/?sig=1", "abc123xyz789"))
        .await;

    let mut written = false;
    for _ in 0..200 {
        if mirror.read().await.unwrap().is_some() {
            written = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(written);
    let content = std::fs::read_to_string(mirror.path()).unwrap();
    assert!(!content.contains("abc123xyz789"));

    let deferred = session
        .shutdown(ShutdownSignal {
            remaining_contexts: 1,
        })
        .await
        .unwrap();
    assert_eq!(deferred, ShutdownOutcome::Deferred);
    assert!(mirror.path().exists());

    let wiped = session.shutdown(ShutdownSignal::last_window()).await.unwrap();
    assert_eq!(wiped, ShutdownOutcome::Wiped);
    assert!(!mirror.path().exists());
    assert!(commands::get_collection(&session).await.is_empty());

    session.stop().await.unwrap();
}

#[tokio::test]
async fn clear_all_wipes_even_without_auto_cleanup() {
    let h = harness(5, DetectionSource::RequestHeaders).await;
    commands::set_policy(
        &h.session,
        PolicySettings {
            auto_cleanup: false,
            ..PolicySettings::default()
        },
    )
    .await
    .unwrap();
    h.session
        .collector()
        .ingest(&bearer("https://a.test", "abc123xyz789"))
        .await;

    let outcome = h
        .session
        .shutdown(ShutdownSignal::last_window())
        .await
        .unwrap();
    assert_eq!(outcome, ShutdownOutcome::AutoCleanupDisabled);
    assert_eq!(h.session.collector().current_size().await, 1);

    commands::clear_all(&h.session).await.unwrap();
    assert_eq!(h.session.collector().current_size().await, 0);
}
