mod common;

use async_trait::async_trait;
use common::{auth_machine, response, season, CannedHttp, RecordingWriter};
use core_auth::{AuthError, ProviderKind};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_sync::{
    ReconciliationEngine, RemoteTrackerClient, RemoteTrackerEntry, RemoteViewer, Result, SkipReason,
    SyncDecision, SyncError, SyncOrchestrator, SyncOutcome, TrackedTitle, TrackerStatus,
};
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Tracker {}

    #[async_trait]
    impl RemoteTrackerClient for Tracker {
        fn provider(&self) -> ProviderKind;
        async fn fetch_entry(&self, access_token: &str, title: &TrackedTitle) -> Result<Option<RemoteTrackerEntry>>;
        async fn write_entry(&self, access_token: &str, remote_id: u64, watched_count: u32, status: TrackerStatus) -> Result<()>;
        async fn fetch_viewer(&self, access_token: &str) -> Result<RemoteViewer>;
    }
}

fn tracker_for(provider: ProviderKind) -> MockTracker {
    let mut tracker = MockTracker::new();
    tracker.expect_provider().return_const(provider);
    tracker
}

fn title() -> TrackedTitle {
    TrackedTitle::new("series-7", "Ping Pong the Animation")
}

fn orchestrator(writer: Arc<RecordingWriter>, bus: EventBus) -> SyncOrchestrator {
    SyncOrchestrator::new(ReconciliationEngine::new(writer), bus)
}

#[tokio::test]
async fn unauthorized_provider_is_skipped_without_network() {
    let http = CannedHttp::replying(vec![]);
    let auth = auth_machine(ProviderKind::AniList, http.clone(), None).await;
    let mut tracker = tracker_for(ProviderKind::AniList);
    tracker.expect_fetch_entry().never();

    let orchestrator = orchestrator(Arc::new(RecordingWriter::default()), EventBus::default())
        .with_provider(auth, Arc::new(tracker));

    let outcome = orchestrator
        .sync(ProviderKind::AniList, &title(), &season(&[true]), false)
        .await;

    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NotAuthorized));
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn unregistered_provider_is_not_configured() {
    let orchestrator = orchestrator(Arc::new(RecordingWriter::default()), EventBus::default());

    let outcome = orchestrator
        .sync(ProviderKind::MyAnimeList, &title(), &season(&[true]), false)
        .await;

    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NotConfigured));
}

#[tokio::test]
async fn rejected_refresh_skips_with_auth_failure() {
    let http = CannedHttp::replying(vec![response(
        400,
        r#"{"error":"invalid_grant"}"#,
    )]);
    let auth = auth_machine(ProviderKind::MyAnimeList, http.clone(), Some(-60)).await;
    let mut tracker = tracker_for(ProviderKind::MyAnimeList);
    tracker.expect_fetch_entry().never();

    let orchestrator = orchestrator(Arc::new(RecordingWriter::default()), EventBus::default())
        .with_provider(auth, Arc::new(tracker));

    let outcome = orchestrator
        .sync(ProviderKind::MyAnimeList, &title(), &season(&[true]), false)
        .await;

    match outcome {
        SyncOutcome::Skipped(SkipReason::AuthFailed(AuthError::RefreshRejected(_))) => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(http.calls(), 1);
}

#[tokio::test]
async fn untracked_title_is_skipped() {
    let auth = auth_machine(ProviderKind::AniList, CannedHttp::replying(vec![]), Some(3600)).await;
    let mut tracker = tracker_for(ProviderKind::AniList);
    tracker
        .expect_fetch_entry()
        .times(1)
        .returning(|_, _| Ok(None));
    tracker.expect_write_entry().never();

    let orchestrator = orchestrator(Arc::new(RecordingWriter::default()), EventBus::default())
        .with_provider(auth, Arc::new(tracker));

    let outcome = orchestrator
        .sync(ProviderKind::AniList, &title(), &season(&[true]), false)
        .await;

    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NotTracked));
}

#[tokio::test]
async fn push_uses_current_token_and_emits_events() {
    let auth = auth_machine(ProviderKind::AniList, CannedHttp::replying(vec![]), Some(3600)).await;
    let mut tracker = tracker_for(ProviderKind::AniList);
    tracker
        .expect_fetch_entry()
        .withf(|token, title| token == "anilist-token" && title.series_id == "series-7")
        .times(1)
        .returning(|_, _| {
            Ok(Some(RemoteTrackerEntry {
                remote_id: 21,
                watched_count: 1,
                status: TrackerStatus::InProgress,
            }))
        });
    tracker
        .expect_write_entry()
        .withf(|token, id, count, status| {
            token == "anilist-token" && *id == 21 && *count == 3 && *status == TrackerStatus::Completed
        })
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let orchestrator = orchestrator(Arc::new(RecordingWriter::default()), bus)
        .with_provider(auth, Arc::new(tracker));

    let outcome = orchestrator
        .sync(ProviderKind::AniList, &title(), &season(&[true, true, true]), true)
        .await;

    assert_eq!(
        outcome,
        SyncOutcome::Applied(SyncDecision::PushLocalToRemote {
            new_count: 3,
            new_status: TrackerStatus::Completed,
        })
    );

    let mut seen = Vec::new();
    while let Ok(CoreEvent::Sync(event)) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(SyncEvent::Started { .. })));
    assert!(matches!(
        seen.last(),
        Some(SyncEvent::Applied { action, affected: 3, .. }) if action == "push"
    ));
}

#[tokio::test]
async fn pull_marks_local_episodes() {
    let auth = auth_machine(ProviderKind::MyAnimeList, CannedHttp::replying(vec![]), Some(3600)).await;
    let mut tracker = tracker_for(ProviderKind::MyAnimeList);
    tracker.expect_fetch_entry().returning(|_, _| {
        Ok(Some(RemoteTrackerEntry {
            remote_id: 5,
            watched_count: 2,
            status: TrackerStatus::InProgress,
        }))
    });
    tracker.expect_write_entry().never();

    let writer = Arc::new(RecordingWriter::default());
    let orchestrator = orchestrator(writer.clone(), EventBus::default())
        .with_provider(auth, Arc::new(tracker));

    let outcome = orchestrator
        .sync(ProviderKind::MyAnimeList, &title(), &season(&[false, false, false]), false)
        .await;

    assert_eq!(
        outcome,
        SyncOutcome::Applied(SyncDecision::PullRemoteToLocal {
            episodes_to_mark_watched: vec![1, 2],
        })
    );
    assert_eq!(writer.marked_ordinals(), vec![1, 2]);
}

#[tokio::test]
async fn remote_write_failure_is_reported_as_failed() {
    let auth = auth_machine(ProviderKind::AniList, CannedHttp::replying(vec![]), Some(3600)).await;
    let mut tracker = tracker_for(ProviderKind::AniList);
    tracker
        .expect_fetch_entry()
        .returning(|_, _| Ok(Some(RemoteTrackerEntry::unlisted(8))));
    tracker
        .expect_write_entry()
        .times(1)
        .returning(|_, _, _, _| Err(SyncError::RemoteWriteFailed("HTTP 500".to_string())));

    let orchestrator = orchestrator(Arc::new(RecordingWriter::default()), EventBus::default())
        .with_provider(auth, Arc::new(tracker));

    let outcome = orchestrator
        .sync(ProviderKind::AniList, &title(), &season(&[true]), false)
        .await;

    match outcome {
        SyncOutcome::Failed(err) => {
            assert_eq!(err, SyncError::RemoteWriteFailed("HTTP 500".to_string()));
            assert!(err.is_recoverable());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn sync_all_isolates_provider_failures() {
    let mal_auth =
        auth_machine(ProviderKind::MyAnimeList, CannedHttp::replying(vec![]), Some(3600)).await;
    let mut mal = tracker_for(ProviderKind::MyAnimeList);
    mal.expect_fetch_entry()
        .returning(|_, _| Err(SyncError::RemoteFetchFailed("timeout".to_string())));

    let anilist_auth =
        auth_machine(ProviderKind::AniList, CannedHttp::replying(vec![]), Some(3600)).await;
    let mut anilist = tracker_for(ProviderKind::AniList);
    anilist.expect_fetch_entry().returning(|_, _| {
        Ok(Some(RemoteTrackerEntry {
            remote_id: 3,
            watched_count: 1,
            status: TrackerStatus::InProgress,
        }))
    });

    let orchestrator = orchestrator(Arc::new(RecordingWriter::default()), EventBus::default())
        .with_provider(mal_auth, Arc::new(mal))
        .with_provider(anilist_auth, Arc::new(anilist));

    let outcomes = orchestrator
        .sync_all(&title(), &season(&[true, false]), false)
        .await;

    assert_eq!(outcomes.len(), 2);
    for (provider, outcome) in outcomes {
        match provider {
            ProviderKind::MyAnimeList => assert!(matches!(
                outcome,
                SyncOutcome::Failed(SyncError::RemoteFetchFailed(_))
            )),
            ProviderKind::AniList => assert_eq!(outcome, SyncOutcome::Applied(SyncDecision::NoOp)),
        }
    }
}

#[tokio::test]
async fn concurrent_syncs_share_one_refresh() {
    let http = CannedHttp::replying(vec![response(
        200,
        r#"{"access_token":"fresh","refresh_token":"r2","expires_in":3600}"#,
    )]);
    let auth = auth_machine(ProviderKind::AniList, http.clone(), Some(-5)).await;
    let mut tracker = tracker_for(ProviderKind::AniList);
    tracker
        .expect_fetch_entry()
        .withf(|token, _| token == "fresh")
        .times(8)
        .returning(|_, _| {
            Ok(Some(RemoteTrackerEntry {
                remote_id: 1,
                watched_count: 1,
                status: TrackerStatus::InProgress,
            }))
        });

    let orchestrator = Arc::new(
        orchestrator(Arc::new(RecordingWriter::default()), EventBus::default())
            .with_provider(auth, Arc::new(tracker)),
    );

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            let title = TrackedTitle::new(format!("series-{i}"), "Shared");
            orchestrator
                .sync(ProviderKind::AniList, &title, &season(&[true]), false)
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), SyncOutcome::Applied(SyncDecision::NoOp));
    }
    assert_eq!(http.calls(), 1);
}

#[tokio::test]
async fn viewer_is_fetched_with_current_token() {
    let auth = auth_machine(ProviderKind::AniList, CannedHttp::replying(vec![]), Some(3600)).await;
    let mut tracker = tracker_for(ProviderKind::AniList);
    tracker
        .expect_fetch_viewer()
        .withf(|token| token == "anilist-token")
        .times(1)
        .returning(|_| {
            Ok(RemoteViewer {
                id: 5,
                name: "yuki".to_string(),
                avatar_url: None,
            })
        });

    let orchestrator = orchestrator(Arc::new(RecordingWriter::default()), EventBus::default())
        .with_provider(auth, Arc::new(tracker));

    let viewer = orchestrator.viewer(ProviderKind::AniList).await.unwrap();
    assert_eq!(viewer.name, "yuki");
}

#[tokio::test]
async fn viewer_requires_authorization() {
    let http = CannedHttp::replying(vec![]);
    let auth = auth_machine(ProviderKind::MyAnimeList, http.clone(), None).await;
    let mut tracker = tracker_for(ProviderKind::MyAnimeList);
    tracker.expect_fetch_viewer().never();

    let orchestrator = orchestrator(Arc::new(RecordingWriter::default()), EventBus::default())
        .with_provider(auth, Arc::new(tracker));

    assert_eq!(
        orchestrator.viewer(ProviderKind::MyAnimeList).await,
        Err(SyncError::Auth(AuthError::Unauthorized))
    );
    assert_eq!(
        orchestrator.viewer(ProviderKind::AniList).await,
        Err(SyncError::NotConfigured("anilist".to_string()))
    );
    assert_eq!(http.calls(), 0);
}
