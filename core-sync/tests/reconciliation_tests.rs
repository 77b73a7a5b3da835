mod common;

use common::{season, RecordingWriter};
use core_sync::{
    EpisodeProgress, ReconciliationEngine, RemoteTrackerEntry, SyncDecision, SyncError,
    TrackedTitle, TrackerStatus,
};
use mockall::mock;
use std::sync::Arc;

use async_trait::async_trait;
use core_auth::ProviderKind;
use core_sync::{RemoteTrackerClient, RemoteViewer, Result};

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

fn remote(count: u32, status: TrackerStatus) -> RemoteTrackerEntry {
    RemoteTrackerEntry {
        remote_id: 99,
        watched_count: count,
        status,
    }
}

fn watched_count(episodes: &[EpisodeProgress]) -> u32 {
    episodes.iter().filter(|e| e.is_considered_watched()).count() as u32
}

#[test]
fn eleven_of_twelve_watched_pushes_without_completing() {
    let mut flags = vec![true; 12];
    flags[11] = false;

    let decision = ReconciliationEngine::decide(
        &season(&flags),
        true,
        &remote(10, TrackerStatus::InProgress),
    );

    assert_eq!(
        decision,
        SyncDecision::PushLocalToRemote {
            new_count: 11,
            new_status: TrackerStatus::InProgress,
        }
    );
}

#[test]
fn fully_watched_final_season_keeps_completed() {
    let decision = ReconciliationEngine::decide(
        &season(&[true; 12]),
        true,
        &remote(5, TrackerStatus::Completed),
    );

    assert_eq!(
        decision,
        SyncDecision::PushLocalToRemote {
            new_count: 12,
            new_status: TrackerStatus::Completed,
        }
    );
}

#[test]
fn fully_watched_final_season_flips_in_progress_to_completed() {
    let decision = ReconciliationEngine::decide(
        &season(&[true; 4]),
        true,
        &remote(3, TrackerStatus::InProgress),
    );

    assert_eq!(
        decision,
        SyncDecision::PushLocalToRemote {
            new_count: 4,
            new_status: TrackerStatus::Completed,
        }
    );
}

#[test]
fn remote_ahead_pulls_exactly_the_gap() {
    // 10 episodes: 3 watched, 7 unwatched; remote says 7 watched.
    let flags = [true, false, true, false, false, true, false, false, false, false];
    let decision =
        ReconciliationEngine::decide(&season(&flags), false, &remote(7, TrackerStatus::InProgress));

    assert_eq!(
        decision,
        SyncDecision::PullRemoteToLocal {
            episodes_to_mark_watched: vec![2, 4, 5, 7],
        }
    );
}

#[test]
fn decisions_never_lose_progress() {
    let statuses = [
        TrackerStatus::NotStarted,
        TrackerStatus::InProgress,
        TrackerStatus::Completed,
        TrackerStatus::Rewatching,
        TrackerStatus::Paused,
        TrackerStatus::Dropped,
    ];

    for mask in 0u32..(1 << 6) {
        let flags: Vec<bool> = (0..6).map(|bit| mask & (1 << bit) != 0).collect();
        let local = season(&flags);
        let local_watched = watched_count(&local);
        let unwatched = local.len() as u32 - local_watched;

        for remote_count in 0..9 {
            for status in statuses {
                for final_season in [false, true] {
                    let entry = remote(remote_count, status);
                    let decision = ReconciliationEngine::decide(&local, final_season, &entry);

                    match &decision {
                        SyncDecision::NoOp => {
                            assert!(
                                local_watched == remote_count
                                    || (remote_count > local_watched && unwatched == 0)
                            );
                        }
                        SyncDecision::PushLocalToRemote { new_count, .. } => {
                            assert!(*new_count > remote_count);
                            assert_eq!(*new_count, local_watched);
                        }
                        SyncDecision::PullRemoteToLocal {
                            episodes_to_mark_watched,
                        } => {
                            let expected = (remote_count - local_watched).min(unwatched);
                            assert_eq!(episodes_to_mark_watched.len() as u32, expected);
                            assert!(episodes_to_mark_watched.windows(2).all(|w| w[0] < w[1]));
                            for ordinal in episodes_to_mark_watched {
                                let episode = local.iter().find(|e| e.ordinal == *ordinal).unwrap();
                                assert!(!episode.is_considered_watched());
                            }
                        }
                    }

                    if local_watched == remote_count {
                        assert_eq!(decision, SyncDecision::NoOp);
                    }
                }
            }
        }
    }
}

#[tokio::test]
async fn applying_a_pull_twice_converges() {
    let writer = Arc::new(RecordingWriter::default());
    let engine = ReconciliationEngine::new(writer.clone());
    let tracker = MockTracker::new();
    let title = TrackedTitle::new("series-1", "Mushishi");
    let entry = remote(3, TrackerStatus::InProgress);

    let mut local = season(&[true, false, false, false]);
    let decision = ReconciliationEngine::decide(&local, false, &entry);
    engine
        .apply(&decision, &tracker, "token", &title, &entry)
        .await
        .unwrap();

    // Host persists what the writer marked.
    for episode in local.iter_mut() {
        if writer.marked_ordinals().contains(&episode.ordinal) {
            episode.mark_fully_watched();
        }
    }
    engine
        .apply(&decision, &tracker, "token", &title, &entry)
        .await
        .unwrap();

    assert_eq!(writer.marked_ordinals(), vec![2, 2, 3, 3]);
    assert_eq!(watched_count(&local), 3);
    assert_eq!(
        ReconciliationEngine::decide(&local, false, &entry),
        SyncDecision::NoOp
    );
    assert!(writer
        .marked
        .lock()
        .unwrap()
        .iter()
        .all(|(series, _)| series == "series-1"));
}

#[tokio::test]
async fn push_writes_once_and_reaches_noop() {
    let writer = Arc::new(RecordingWriter::default());
    let engine = ReconciliationEngine::new(writer.clone());
    let mut tracker = MockTracker::new();
    tracker.expect_provider().return_const(ProviderKind::AniList);
    tracker
        .expect_write_entry()
        .withf(|token, id, count, status| {
            token == "token" && *id == 99 && *count == 2 && *status == TrackerStatus::InProgress
        })
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let title = TrackedTitle::new("series-1", "Mushishi");
    let local = season(&[true, true, false]);
    let entry = remote(0, TrackerStatus::NotStarted);

    let decision = ReconciliationEngine::decide(&local, false, &entry);
    engine
        .apply(&decision, &tracker, "token", &title, &entry)
        .await
        .unwrap();

    let updated = remote(2, TrackerStatus::InProgress);
    assert_eq!(
        ReconciliationEngine::decide(&local, false, &updated),
        SyncDecision::NoOp
    );
    assert!(writer.marked_ordinals().is_empty());
}

#[tokio::test]
async fn remote_write_failure_is_reported() {
    let engine = ReconciliationEngine::new(Arc::new(RecordingWriter::default()));
    let mut tracker = MockTracker::new();
    tracker.expect_provider().return_const(ProviderKind::MyAnimeList);
    tracker
        .expect_write_entry()
        .times(1)
        .returning(|_, _, _, _| Err(SyncError::RemoteFetchFailed("503".to_string())));

    let entry = remote(0, TrackerStatus::InProgress);
    let decision = SyncDecision::PushLocalToRemote {
        new_count: 1,
        new_status: TrackerStatus::InProgress,
    };

    let err = engine
        .apply(&decision, &tracker, "token", &TrackedTitle::new("s", "t"), &entry)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::RemoteWriteFailed(_)));
}

#[tokio::test]
async fn partial_local_failure_keeps_successful_writes() {
    let writer = Arc::new(RecordingWriter::failing_on(&[3]));
    let engine = ReconciliationEngine::new(writer.clone());
    let tracker = MockTracker::new();
    let decision = SyncDecision::PullRemoteToLocal {
        episodes_to_mark_watched: vec![1, 2, 3],
    };

    let err = engine
        .apply(
            &decision,
            &tracker,
            "token",
            &TrackedTitle::new("s", "t"),
            &remote(3, TrackerStatus::InProgress),
        )
        .await
        .unwrap_err();

    match err {
        SyncError::PartialLocalWriteFailure { written, failed, .. } => {
            assert_eq!(written, vec![1, 2]);
            assert_eq!(failed, vec![3]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(writer.marked_ordinals(), vec![1, 2]);
}

#[tokio::test]
async fn total_local_failure() {
    let writer = Arc::new(RecordingWriter::failing_on(&[1, 2]));
    let engine = ReconciliationEngine::new(writer);
    let tracker = MockTracker::new();
    let decision = SyncDecision::PullRemoteToLocal {
        episodes_to_mark_watched: vec![1, 2],
    };

    let err = engine
        .apply(
            &decision,
            &tracker,
            "token",
            &TrackedTitle::new("s", "t"),
            &remote(2, TrackerStatus::InProgress),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::LocalWriteFailed { ref failed, .. } if failed == &vec![1, 2]));
}
