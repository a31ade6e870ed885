//! Session integration tests against a scripted in-process remover.
//!
//! The fake counts calls, records every file it was handed, and can hold a
//! submission open until the test releases it. That last part is what lets
//! these tests reset or start a new job while a call is still pending.

use async_trait::async_trait;
use edgequake_bgremove::{
    BackgroundRemover, ErrorKind, ImageData, ImageFile, JobId, JobState, ProcessingError,
    RemovalConfig, Session, SessionError, SessionObserver, Tool, UploadProgress,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

// ── Test helpers ─────────────────────────────────────────────────────────────

enum Step {
    Ok(ImageData),
    Fail(ProcessingError),
    /// Signal `entered`, then wait for `release` before answering.
    Hold(ImageData),
}

#[derive(Default)]
struct FakeRemover {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<ImageFile>>,
    entered: Notify,
    release: Notify,
}

impl FakeRemover {
    fn scripted(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<ImageFile> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackgroundRemover for FakeRemover {
    async fn submit(
        &self,
        file: &ImageFile,
        progress: &dyn UploadProgress,
    ) -> Result<ImageData, ProcessingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(file.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Ok(cutout(0)));
        progress.on_request_sent();
        match step {
            Step::Ok(data) => Ok(data),
            Step::Fail(err) => Err(err),
            Step::Hold(data) => {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(data)
            }
        }
    }
}

#[derive(Default)]
struct RecordingObserver {
    transitions: Mutex<Vec<(JobState, JobState)>>,
    stored: AtomicUsize,
    evicted: Mutex<Vec<String>>,
}

impl SessionObserver for RecordingObserver {
    fn on_transition(&self, _job: JobId, from: JobState, to: JobState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn on_result_stored(&self, _filename: &str, _history_len: usize) {
        self.stored.fetch_add(1, Ordering::SeqCst);
    }

    fn on_history_evicted(&self, filename: &str) {
        self.evicted.lock().unwrap().push(filename.to_string());
    }
}

fn photo(name: &str) -> ImageFile {
    ImageFile::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3])
}

fn cutout(tag: u8) -> ImageData {
    ImageData::new(vec![0x89, b'P', b'N', b'G', tag], "image/png")
}

fn session_with(remover: Arc<FakeRemover>) -> Session {
    Session::new(RemovalConfig::default(), remover)
}

fn network_error() -> ProcessingError {
    ProcessingError::network(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "connection reset by peer",
    ))
}

// ── Intake ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_image_is_rejected_without_network_call() {
    let remover = FakeRemover::scripted(vec![]);
    let session = session_with(remover.clone());

    let file = ImageFile::new("notes.txt", "text/plain", b"hello".to_vec());
    let job = assert_ok!(session.select_file(file).await);

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error.as_ref().unwrap().kind, ErrorKind::InvalidInput);
    assert!(!job.can_retry());
    assert_eq!(remover.calls(), 0);
}

#[tokio::test]
async fn oversized_file_is_rejected_without_network_call() {
    let remover = FakeRemover::scripted(vec![]);
    let session = session_with(remover.clone());

    let file = ImageFile::new("huge.png", "image/png", vec![0u8; 11 * 1024 * 1024]);
    let job = session.select_file(file).await.unwrap();

    let detail = job.error.unwrap();
    assert_eq!(detail.kind, ErrorKind::InvalidInput);
    assert_eq!(detail.message, "File size should be less than 10MB");
    assert_eq!(remover.calls(), 0);
    assert_eq!(session.live_resources(), 0);
}

// ── Success and history ──────────────────────────────────────────────────────

#[tokio::test]
async fn success_prepends_to_history() {
    let remover = FakeRemover::scripted(vec![Step::Ok(cutout(1)), Step::Ok(cutout(2))]);
    let session = session_with(remover.clone());

    let job = session.select_file(photo("vacation.jpg")).await.unwrap();
    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.result, Some(cutout(1)));
    assert_eq!(job.download_name().as_deref(), Some("vacation_no_bg.png"));
    assert_eq!(session.history().len(), 1);

    session.select_file(photo("beach.jpg")).await.unwrap();
    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].filename, "beach.jpg");
    assert_eq!(history[1].filename, "vacation.jpg");
    assert_eq!(history[0].processed, cutout(2));
    assert_eq!(history[0].original, photo("beach.jpg").data);
}

#[tokio::test]
async fn eleven_successes_keep_the_latest_ten() {
    let remover = FakeRemover::scripted((0..11).map(|i| Step::Ok(cutout(i))).collect());
    let observer = Arc::new(RecordingObserver::default());
    let session = session_with(remover.clone()).with_observer(observer.clone());

    for i in 0..11 {
        let job = session.select_file(photo(&format!("img{i}.jpg"))).await.unwrap();
        assert_eq!(job.state, JobState::Succeeded);
    }

    let history = session.history();
    assert_eq!(history.len(), 10);
    assert_eq!(history[0].filename, "img10.jpg");
    assert_eq!(history[9].filename, "img1.jpg");
    assert!(history.iter().all(|e| e.filename != "img0.jpg"));
    assert_eq!(*observer.evicted.lock().unwrap(), vec!["img0.jpg".to_string()]);
    assert_eq!(observer.stored.load(Ordering::SeqCst), 11);

    // The current job shares its images with the newest record.
    assert_eq!(session.live_resources(), 20);
    session.reset();
    session.clear_history();
    assert_eq!(session.live_resources(), 0);
}

#[tokio::test]
async fn identical_images_are_not_deduplicated() {
    let remover = FakeRemover::scripted(vec![]);
    let session = session_with(remover);
    session.select_file(photo("same.jpg")).await.unwrap();
    session.select_file(photo("same.jpg")).await.unwrap();
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn observer_sees_every_transition_in_order() {
    let remover = FakeRemover::scripted(vec![Step::Ok(cutout(1))]);
    let observer = Arc::new(RecordingObserver::default());
    let session = session_with(remover).with_observer(observer.clone());

    session.select_file(photo("a.jpg")).await.unwrap();

    assert_eq!(
        *observer.transitions.lock().unwrap(),
        vec![
            (JobState::Idle, JobState::Validating),
            (JobState::Validating, JobState::Uploading),
            (JobState::Uploading, JobState::Processing),
            (JobState::Processing, JobState::Succeeded),
        ]
    );
}

// ── Failure and retry ────────────────────────────────────────────────────────

#[tokio::test]
async fn retry_after_network_error_resubmits_the_same_file() {
    let remover = FakeRemover::scripted(vec![Step::Fail(network_error()), Step::Ok(cutout(7))]);
    let session = session_with(remover.clone());

    let job = session.select_file(photo("cat.jpg")).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    let detail = job.error.clone().unwrap();
    assert_eq!(detail.kind, ErrorKind::NetworkError);
    assert!(detail.cause.unwrap().contains("connection reset"));
    assert!(job.can_retry());
    let source_before = job.source.clone().unwrap();

    let job = assert_ok!(session.retry().await);
    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.attempt, 1);
    assert_eq!(job.source.unwrap(), source_before);

    let seen = remover.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
    // Shared, not copied.
    assert_eq!(seen[0].data.bytes.as_ptr(), seen[1].data.bytes.as_ptr());
}

#[tokio::test]
async fn server_error_message_is_shown_and_retryable() {
    let remover = FakeRemover::scripted(vec![Step::Fail(ProcessingError::Server {
        status: 402,
        message: "Insufficient credits".into(),
    })]);
    let session = session_with(remover);

    let job = session.select_file(photo("a.jpg")).await.unwrap();
    let detail = job.error.clone().unwrap();
    assert_eq!(detail.kind, ErrorKind::ServerError);
    assert_eq!(detail.message, "Insufficient credits");
    assert!(job.can_retry());
    assert_eq!(session.history().len(), 0);
}

#[tokio::test]
async fn invalid_input_cannot_be_retried() {
    let remover = FakeRemover::scripted(vec![]);
    let session = session_with(remover.clone());
    let file = ImageFile::new("doc.pdf", "application/pdf", vec![1u8]);
    session.select_file(file).await.unwrap();

    let err = assert_err!(session.retry().await);
    assert_eq!(
        err,
        SessionError::NotRetryable {
            kind: ErrorKind::InvalidInput
        }
    );
    assert_eq!(remover.calls(), 0);
}

#[tokio::test]
async fn missing_api_key_with_real_client_is_configuration_error() {
    let session = Session::with_client(RemovalConfig::default()).unwrap();

    let job = session.select_file(photo("a.jpg")).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error.unwrap().kind, ErrorKind::ConfigurationError);
    assert!(matches!(
        session.retry().await,
        Err(SessionError::NotRetryable {
            kind: ErrorKind::ConfigurationError
        })
    ));
}

// ── Concurrency: busy slot and stale results ─────────────────────────────────

#[tokio::test]
async fn new_selection_and_retry_refused_while_in_flight() {
    let remover = FakeRemover::scripted(vec![Step::Hold(cutout(1))]);
    let session = session_with(remover.clone());

    let (first, ()) = tokio::join!(session.select_file(photo("a.jpg")), async {
        remover.entered.notified().await;
        assert_eq!(session.snapshot().state, JobState::Processing);
        assert!(!session.snapshot().can_select_file());
        assert_eq!(
            session.select_file(photo("b.jpg")).await.unwrap_err(),
            SessionError::Busy {
                state: JobState::Processing
            }
        );
        assert!(matches!(
            session.retry().await,
            Err(SessionError::Busy { .. })
        ));
        remover.release.notify_one();
    });

    assert_eq!(first.unwrap().state, JobState::Succeeded);
    assert_eq!(remover.calls(), 1);
}

#[tokio::test]
async fn reset_while_in_flight_discards_late_result() {
    let remover = FakeRemover::scripted(vec![Step::Hold(cutout(1))]);
    let session = session_with(remover.clone());

    let (job, ()) = tokio::join!(session.select_file(photo("a.jpg")), async {
        remover.entered.notified().await;
        session.reset();
        remover.release.notify_one();
    });

    let job = job.unwrap();
    assert_eq!(job.state, JobState::Idle);
    assert!(job.result.is_none());
    assert!(session.history().is_empty());
    assert_eq!(session.live_resources(), 0);
}

#[tokio::test]
async fn late_result_does_not_overwrite_newer_job() {
    let remover = FakeRemover::scripted(vec![Step::Hold(cutout(1)), Step::Ok(cutout(2))]);
    let session = session_with(remover.clone());

    let (_, second) = tokio::join!(session.select_file(photo("old.jpg")), async {
        remover.entered.notified().await;
        session.reset();
        let second = session.select_file(photo("new.jpg")).await;
        remover.release.notify_one();
        second
    });

    assert_eq!(second.unwrap().state, JobState::Succeeded);
    let now = session.snapshot();
    assert_eq!(now.filename.as_deref(), Some("new.jpg"));
    assert_eq!(now.result, Some(cutout(2)));

    let history = session.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].filename, "new.jpg");
    assert_eq!(session.generation(), 2);
}

// ── Tools ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn placeholder_tool_refuses_files() {
    let remover = FakeRemover::scripted(vec![]);
    let session = session_with(remover.clone());

    session.select_tool(Tool::ImageResizer);
    assert_eq!(session.active_tool(), Tool::ImageResizer);
    assert!(matches!(
        session.select_file(photo("a.jpg")).await,
        Err(SessionError::ToolUnavailable { .. })
    ));

    session.select_tool(Tool::BackgroundRemover);
    assert_ok!(session.select_file(photo("a.jpg")).await);
    assert_eq!(remover.calls(), 1);
}
