//! Realtime loop and webcam session tests over scripted collaborators.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;

use common::{
    fire, smoke, LimitedPartSink, RecordingMailer, ScriptedBackend, ScriptedDetector,
    ScriptedSource,
};
use firewatch_models::{StartStatus, StopStatus};
use firewatch_pipeline::{
    AlertConfig, AlertDispatcher, FireLogWriter, LoopExit, RealtimeConfig,
    RealtimeLoop, RealtimeService, ScreenshotGate, ALERT_SUBJECT,
};
use firewatch_store::{FireLogStore, MemoryLogStore};

struct Harness {
    dir: tempfile::TempDir,
    mailer: Arc<RecordingMailer>,
    store: Arc<MemoryLogStore>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            mailer: Arc::new(RecordingMailer::default()),
            store: Arc::new(MemoryLogStore::new()),
        }
    }

    fn realtime_loop(&self, detector: ScriptedDetector) -> RealtimeLoop {
        let config = RealtimeConfig {
            fps_limit: 0.0,
            ..RealtimeConfig::default()
        };
        let alert_config = AlertConfig {
            recipients: vec!["ops@example.com".into(), "bad@example.com".into()],
            ..AlertConfig::default()
        };
        RealtimeLoop::new(
            Arc::new(detector),
            ScreenshotGate::new(self.dir.path().join("shots"), config.screenshot_cooldown),
            AlertDispatcher::new(self.mailer.clone(), alert_config, config.email_cooldown),
            FireLogWriter::new(self.store.clone()),
            config,
        )
    }

    fn screenshots(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("shots"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

async fn run_loop(
    realtime_loop: RealtimeLoop,
    mut source: ScriptedSource,
    stop: watch::Receiver<bool>,
    mut sink: LimitedPartSink,
) -> (LoopExit, LimitedPartSink) {
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || {
        let exit = realtime_loop.run(&mut source, &stop, &mut sink, &handle);
        (exit, sink)
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_repeated_fire_alerts_once_per_cooldown() {
    let harness = Harness::new();
    let releases = Arc::new(AtomicUsize::new(0));
    let (_stop_tx, stop_rx) = watch::channel(false);

    let (exit, sink) = run_loop(
        harness.realtime_loop(ScriptedDetector::always(vec![fire(0.95), fire(0.97)])),
        ScriptedSource::finite(5, 30.0, releases.clone()),
        stop_rx,
        LimitedPartSink::new(usize::MAX),
    )
    .await;

    assert_eq!(exit, LoopExit::EndOfStream);
    assert_eq!(sink.parts.len(), 5);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert_eq!(harness.screenshots(), 1);

    // one dispatch: both recipients attempted, one failed
    let sent = harness.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.subject == ALERT_SUBJECT));
    assert!(sent.iter().all(|m| m.attachment.is_some()));

    let logs = harness.store.list_fire_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!((logs[0].confidence - 0.97).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_low_confidence_and_smoke_never_alert() {
    let harness = Harness::new();
    let releases = Arc::new(AtomicUsize::new(0));
    let (_stop_tx, stop_rx) = watch::channel(false);

    let (exit, _) = run_loop(
        harness.realtime_loop(ScriptedDetector::always(vec![fire(0.9), smoke(0.99)])),
        ScriptedSource::finite(3, 30.0, releases),
        stop_rx,
        LimitedPartSink::new(usize::MAX),
    )
    .await;

    assert_eq!(exit, LoopExit::EndOfStream);
    assert_eq!(harness.screenshots(), 0);
    assert!(harness.mailer.sent().is_empty());
    assert_eq!(harness.store.fire_log_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_signal_ends_loop_and_releases_once() {
    let harness = Harness::new();
    let releases = Arc::new(AtomicUsize::new(0));
    let (stop_tx, stop_rx) = watch::channel(false);
    stop_tx.send(true).unwrap();

    let (exit, sink) = run_loop(
        harness.realtime_loop(ScriptedDetector::default()),
        ScriptedSource::endless(releases.clone()),
        stop_rx,
        LimitedPartSink::new(usize::MAX),
    )
    .await;

    assert_eq!(exit, LoopExit::Stopped);
    assert!(sink.parts.is_empty());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_read_failure_ends_loop() {
    let harness = Harness::new();
    let releases = Arc::new(AtomicUsize::new(0));
    let (_stop_tx, stop_rx) = watch::channel(false);

    let (exit, sink) = run_loop(
        harness.realtime_loop(ScriptedDetector::default()),
        ScriptedSource::endless(releases.clone()).failing_at(3),
        stop_rx,
        LimitedPartSink::new(usize::MAX),
    )
    .await;

    assert_eq!(exit, LoopExit::ReadFailed);
    assert_eq!(sink.parts.len(), 2);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_disconnect_ends_loop() {
    let harness = Harness::new();
    let releases = Arc::new(AtomicUsize::new(0));
    let (_stop_tx, stop_rx) = watch::channel(false);

    let (exit, sink) = run_loop(
        harness.realtime_loop(ScriptedDetector::default()),
        ScriptedSource::endless(releases.clone()),
        stop_rx,
        LimitedPartSink::new(2),
    )
    .await;

    assert_eq!(exit, LoopExit::ClientDisconnected);
    assert_eq!(sink.parts.len(), 2);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_service_start_feed_stop() {
    let harness = Harness::new();
    let backend = Arc::new(ScriptedBackend::new(0, 30.0));
    let service = RealtimeService::new(
        backend.clone(),
        harness.realtime_loop(ScriptedDetector::default()),
    );

    assert_eq!(service.start().unwrap(), StartStatus::Started);
    assert_eq!(service.start().unwrap(), StartStatus::AlreadyRunning);
    assert_eq!(backend.camera_opens.load(Ordering::SeqCst), 1);

    let mut rx = service.open_feed().unwrap();
    assert!(service.open_feed().is_none());
    for _ in 0..3 {
        assert!(rx.recv().await.is_some());
    }

    assert_eq!(service.stop(), StopStatus::Stopped);
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok());

    assert_eq!(backend.releases(), 1);
    assert!(!service.is_running());
    assert_eq!(service.stop(), StopStatus::NotRunning);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_when_not_running_releases_nothing() {
    let harness = Harness::new();
    let backend = Arc::new(ScriptedBackend::new(0, 30.0));
    let service = RealtimeService::new(
        backend.clone(),
        harness.realtime_loop(ScriptedDetector::default()),
    );

    assert_eq!(service.stop(), StopStatus::NotRunning);
    assert!(service.open_feed().is_none());
    assert_eq!(backend.camera_opens.load(Ordering::SeqCst), 0);
    assert_eq!(backend.releases(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_before_feed_releases_unclaimed_device() {
    let harness = Harness::new();
    let backend = Arc::new(ScriptedBackend::new(0, 30.0));
    let service = RealtimeService::new(
        backend.clone(),
        harness.realtime_loop(ScriptedDetector::default()),
    );

    service.start().unwrap();
    assert_eq!(service.stop(), StopStatus::Stopped);
    assert_eq!(backend.releases(), 1);
    assert!(service.open_feed().is_none());
}
