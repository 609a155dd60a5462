use super::*;
use crate::config::VideoConfig;
use crate::types::{FileId, TaskId, VideoJob, VideoStatus};
use tokio_util::sync::CancellationToken;

fn fast_config() -> VideoConfig {
    VideoConfig {
        poll_interval: Duration::from_millis(5),
        max_wait: Duration::from_secs(5),
        ..Default::default()
    }
}

fn job_manager(
    video: &Arc<FakeVideo>,
    config: &VideoConfig,
) -> (VideoJobManager, broadcast::Receiver<Event>) {
    let (tx, rx) = broadcast::channel(64);
    (VideoJobManager::new(video.clone(), config, tx), rx)
}

fn prompt() -> Prompt {
    Prompt::from_topic(&topic("lighthouses"), "video about {topic}")
}

#[tokio::test]
async fn success_after_three_polls() {
    let video = Arc::new(FakeVideo::new("task-1").statuses(&[
        ("Queueing", None),
        ("Processing", None),
        ("Success", Some("f1")),
    ]));
    let (manager, mut rx) = job_manager(&video, &fast_config());

    let mut job = manager.submit(&prompt()).await.unwrap();
    let file_id = manager
        .wait_for_completion(&mut job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(file_id, FileId("f1".into()));
    assert_eq!(video.polls(), 3);
    assert_eq!(job.polls, 3);
    assert!(matches!(job.state, JobState::Succeeded { .. }));

    let polls: Vec<u32> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            Event::VideoStatus { poll, .. } => Some(poll),
            _ => None,
        })
        .collect();
    assert_eq!(polls, vec![1, 2, 3]);
}

#[tokio::test]
async fn fail_status_stops_polling_without_retrieval() {
    let video =
        Arc::new(FakeVideo::new("task-2").statuses(&[("Queueing", None), ("Fail", None)]));
    let (manager, _rx) = job_manager(&video, &fast_config());

    let mut job = manager.submit(&prompt()).await.unwrap();
    let err = manager
        .wait_for_completion(&mut job, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::VideoGenerationFailed { task_id, status } => {
            assert_eq!(task_id, "task-2");
            assert_eq!(status, "Fail");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(video.polls(), 2);
    assert_eq!(video.resolves(), 0);
    assert_eq!(video.downloads(), 0);
}

#[tokio::test]
async fn unknown_and_unrecognized_statuses_are_terminal() {
    for raw in ["Unknown", "Rendering", ""] {
        let video = Arc::new(FakeVideo::new("task-3").forever(raw));
        let (manager, _rx) = job_manager(&video, &fast_config());

        let mut job = manager.submit(&prompt()).await.unwrap();
        let err = manager
            .wait_for_completion(&mut job, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::VideoGenerationFailed { .. }),
            "{raw:?} gave {err:?}"
        );
        assert_eq!(video.polls(), 1, "{raw:?} must not be polled again");
    }
}

#[tokio::test]
async fn success_without_file_id_fails_closed() {
    let video = Arc::new(FakeVideo::new("task-4").statuses(&[("Success", None)]));
    let (manager, _rx) = job_manager(&video, &fast_config());

    let mut job = manager.submit(&prompt()).await.unwrap();
    let err = manager
        .wait_for_completion(&mut job, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::VideoGenerationFailed { .. }));
    assert_eq!(
        job.state,
        JobState::Failed {
            status: VideoStatus::Success
        }
    );
}

#[tokio::test]
async fn bounded_wait_times_out() {
    let video = Arc::new(FakeVideo::new("task-5").forever("Processing"));
    let config = VideoConfig {
        poll_interval: Duration::from_millis(5),
        max_wait: Duration::from_millis(40),
        ..Default::default()
    };
    let (manager, _rx) = job_manager(&video, &config);

    let mut job = manager.submit(&prompt()).await.unwrap();
    let err = manager
        .wait_for_completion(&mut job, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Timeout { task_id, waited } => {
            assert_eq!(task_id, "task-5");
            assert!(waited >= Duration::from_millis(40));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(video.polls() >= 1);
    assert!(!job.state.is_terminal());
}

#[tokio::test]
async fn cancellation_interrupts_polling() {
    let video = Arc::new(FakeVideo::new("task-6").forever("Queueing"));
    let (manager, _rx) = job_manager(&video, &fast_config());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let mut job = manager.submit(&prompt()).await.unwrap();
    let err = manager
        .wait_for_completion(&mut job, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    let polls_at_cancel = video.polls();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(video.polls(), polls_at_cancel, "no polls after cancellation");
}

#[tokio::test]
async fn deadline_between_polls_times_out_without_another_poll() {
    let video = Arc::new(
        FakeVideo::new("task-d").statuses(&[("Processing", None), ("Success", Some("late"))]),
    );
    let config = VideoConfig {
        poll_interval: Duration::from_millis(60),
        max_wait: Duration::from_millis(80),
        ..Default::default()
    };
    let (manager, _rx) = job_manager(&video, &config);

    let mut job = manager.submit(&prompt()).await.unwrap();
    let err = manager
        .wait_for_completion(&mut job, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Timeout { waited, .. } => assert!(waited >= Duration::from_millis(80)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(video.polls(), 1, "the success after the deadline must not be seen");
    assert!(!job.state.is_terminal());
}

#[tokio::test]
async fn slow_status_query_is_cut_off_at_deadline() {
    let video = Arc::new(
        FakeVideo::new("task-q")
            .forever("Processing")
            .slow_queries(Duration::from_millis(400)),
    );
    let config = VideoConfig {
        poll_interval: Duration::from_millis(5),
        max_wait: Duration::from_millis(50),
        ..Default::default()
    };
    let (manager, _rx) = job_manager(&video, &config);

    let mut job = manager.submit(&prompt()).await.unwrap();
    let started = std::time::Instant::now();
    let err = manager
        .wait_for_completion(&mut job, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(job.polls, 0, "the unfinished query is not applied");
}

#[tokio::test]
async fn cancellation_interrupts_status_query_in_flight() {
    let video = Arc::new(
        FakeVideo::new("task-x")
            .forever("Processing")
            .slow_queries(Duration::from_millis(500)),
    );
    let (manager, _rx) = job_manager(&video, &fast_config());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let mut job = manager.submit(&prompt()).await.unwrap();
    let started = std::time::Instant::now();
    let err = manager
        .wait_for_completion(&mut job, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(
        started.elapsed() < Duration::from_millis(300),
        "cancel took {:?}",
        started.elapsed()
    );
    assert_eq!(video.polls(), 1);
}

#[tokio::test]
async fn terminal_job_is_not_polled_again() {
    let video = Arc::new(FakeVideo::new("task-7").statuses(&[("Success", Some("f7"))]));
    let (manager, _rx) = job_manager(&video, &fast_config());

    let mut job = VideoJob::submitted(TaskId("task-7".into()));
    let state = manager.poll_once(&mut job).await.unwrap();
    assert!(state.is_terminal());

    let again = manager.poll_once(&mut job).await.unwrap();
    assert_eq!(again, state);
    assert_eq!(video.polls(), 1);
    assert_eq!(job.polls, 1);
}

#[tokio::test]
async fn submission_errors_are_classified() {
    let video = Arc::new(FakeVideo::new("task-8").submit_fails(500));
    let (manager, _rx) = job_manager(&video, &fast_config());
    let err = manager.submit(&prompt()).await.unwrap_err();
    assert!(matches!(err, Error::Submission(_)));

    let video = Arc::new(FakeVideo::new(""));
    let (manager, mut rx) = job_manager(&video, &fast_config());
    let err = manager.submit(&prompt()).await.unwrap_err();
    assert!(matches!(err, Error::Submission(_)));
    assert!(drain(&mut rx).is_empty(), "no VideoSubmitted for a rejected task");
}

#[tokio::test]
async fn retrieve_downloads_into_store() {
    let (_temp, store) = temp_store().await;
    let video = Arc::new(FakeVideo::new("task-9"));
    let (manager, mut rx) = job_manager(&video, &fast_config());

    let artifact = manager
        .retrieve(&FileId("f9".into()), &store)
        .await
        .unwrap();

    assert_eq!(artifact.path, store.video_path());
    assert_eq!(std::fs::read(store.video_path()).unwrap(), b"mp4-frames");
    assert_eq!(artifact.bytes, 10);

    let events = drain(&mut rx);
    let ready = position(&events, |e| {
        matches!(e, Event::VideoReady { download_url } if download_url.ends_with("f9.mp4"))
    });
    let downloaded = position(&events, |e| matches!(e, Event::VideoDownloaded { .. }));
    assert!(ready < downloaded);
}

#[tokio::test]
async fn resolve_failure_is_retrieval_error() {
    let (_temp, store) = temp_store().await;
    let video = Arc::new(FakeVideo::new("task-10").resolve_fails());
    let (manager, _rx) = job_manager(&video, &fast_config());

    let err = manager
        .retrieve(&FileId("f10".into()), &store)
        .await
        .unwrap_err();

    match err {
        Error::Retrieval { file_id, .. } => assert_eq!(file_id, "f10"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(video.downloads(), 0);
    assert!(!store.video_path().exists());
}
