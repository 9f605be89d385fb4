//! VOD pipeline tests over scripted collaborators.

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;

use common::{fire, smoke, LimitedPartSink, ScriptedBackend, ScriptedDetector, ScriptedSource};
use firewatch_media::MediaError;
use firewatch_pipeline::{
    PipelineError, PipelineResult, UploadRegistry, VodJob, VodOperation, VodOutcome, VodPipeline,
    CSV_HEADER,
};
use firewatch_store::{MemoryLogStore, VideoLogStore};

struct Fixture {
    _dir: tempfile::TempDir,
    job: VodJob,
    backend: Arc<ScriptedBackend>,
    store: Arc<MemoryLogStore>,
    pipeline: Arc<VodPipeline>,
}

fn fixture(backend: ScriptedBackend, detector: ScriptedDetector) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let registry = UploadRegistry::new(dir.path().join("uploads"), dir.path().join("processed"), 8);
    let staged = registry.stage("clip.mp4").unwrap();
    std::fs::create_dir_all(staged.upload_path.parent().unwrap()).unwrap();
    std::fs::write(&staged.upload_path, b"not really a video").unwrap();

    let backend = Arc::new(backend);
    let store = Arc::new(MemoryLogStore::new());
    let pipeline = Arc::new(VodPipeline::new(
        Arc::new(detector),
        backend.clone(),
        store.clone(),
        0.25,
    ));
    Fixture {
        job: VodJob::for_upload(&staged),
        _dir: dir,
        backend,
        store,
        pipeline,
    }
}

fn csv_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

/// Run the pipeline on a blocking thread with a scripted source.
async fn run_direct(
    fx: &Fixture,
    source: ScriptedSource,
    mut sink: LimitedPartSink,
) -> PipelineResult<VodOutcome> {
    let pipeline = fx.pipeline.clone();
    let job = fx.job.clone();
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || pipeline.run(&job, Box::new(source), &mut sink, &handle))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_fire_detection_produces_one_row_and_one_record() {
    let detector = ScriptedDetector::default()
        .on_call(3, vec![smoke(0.1)])
        .on_call(5, vec![fire(0.95)]);
    let fx = fixture(ScriptedBackend::new(10, 10.0), detector);

    let mut rx = fx.pipeline.start(fx.job.clone()).await.unwrap();
    let mut parts = 0;
    while let Some(part) = rx.recv().await {
        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
        parts += 1;
    }

    assert_eq!(parts, 10);
    assert_eq!(
        csv_lines(&fx.job.log),
        vec![CSV_HEADER.to_string(), "5,0.50,fire,0.95".to_string()]
    );
    assert!(fx.job.output.exists());
    assert_eq!(fx.backend.frames_written.load(Ordering::SeqCst), 10);
    assert_eq!(fx.backend.releases(), 1);

    let logs = fx.store.list_video_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].video_path.ends_with("processed_clip.mp4"));
    assert!(logs[0].csv_path.ends_with("detection_log_clip.csv"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_threshold_compares_ceiled_confidence() {
    let detector = ScriptedDetector::default()
        .on_call(2, vec![fire(0.25), smoke(0.2401), fire(0.2)])
        .on_call(3, vec![fire(0.951)]);
    let fx = fixture(ScriptedBackend::new(3, 30.0), detector);

    let mut rx = fx.pipeline.start(fx.job.clone()).await.unwrap();
    while rx.recv().await.is_some() {}

    assert_eq!(
        csv_lines(&fx.job.log),
        vec![
            CSV_HEADER.to_string(),
            "2,0.07,fire,0.25".to_string(),
            "2,0.07,smoke,0.25".to_string(),
            "3,0.10,fire,0.96".to_string(),
        ]
    );
    assert!(fx.pipeline.reports(0.2401));
    assert!(!fx.pipeline.reports(0.2));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_writes_no_record() {
    let detector = ScriptedDetector::always(vec![fire(0.8)]);
    let fx = fixture(ScriptedBackend::new(10, 10.0), detector);
    let releases = Arc::new(AtomicUsize::new(0));

    let outcome = run_direct(
        &fx,
        ScriptedSource::finite(10, 10.0, releases.clone()),
        LimitedPartSink::new(3),
    )
    .await
    .unwrap();

    assert_eq!(outcome, VodOutcome::Interrupted { frames: 4 });
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert_eq!(fx.store.video_log_count(), 0);
    // artifacts hold whatever was processed
    assert_eq!(csv_lines(&fx.job.log).len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_read_failure_is_end_of_stream() {
    let mut backend = ScriptedBackend::new(10, 10.0);
    backend.file_fail_at = Some(4);
    let fx = fixture(backend, ScriptedDetector::default().on_call(1, vec![fire(0.6)]));

    let mut rx = fx.pipeline.start(fx.job.clone()).await.unwrap();
    let mut parts = 0;
    while rx.recv().await.is_some() {
        parts += 1;
    }

    assert_eq!(parts, 3);
    assert_eq!(fx.store.video_log_count(), 1);
    assert_eq!(csv_lines(&fx.job.log)[1], "1,0.10,fire,0.60");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unopenable_source_leaves_no_artifacts() {
    let fx = fixture(ScriptedBackend::new(10, 10.0), ScriptedDetector::default());
    let mut job = fx.job.clone();
    job.input = job.input.with_file_name("missing.mp4");

    let err = fx.pipeline.start(job).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Media(MediaError::FileNotFound(_))
    ));
    assert!(!fx.job.output.exists());
    assert!(!fx.job.log.exists());
    assert_eq!(fx.store.video_log_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_store_failure_still_completes() {
    let fx = fixture(
        ScriptedBackend::new(2, 10.0),
        ScriptedDetector::always(vec![fire(0.9)]),
    );
    fx.store.set_available(false);
    let releases = Arc::new(AtomicUsize::new(0));

    let outcome = run_direct(
        &fx,
        ScriptedSource::finite(2, 10.0, releases),
        LimitedPartSink::new(usize::MAX),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        VodOutcome::Completed {
            frames: 2,
            rows: 2,
            record_id: None
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_replay_writes_new_outputs() {
    let fx = fixture(
        ScriptedBackend::new(4, 20.0),
        ScriptedDetector::default().on_call(4, vec![smoke(0.7)]),
    );
    let processed = fx.job.output.parent().unwrap().to_path_buf();
    let (output, log) = firewatch_pipeline::uploads::replay_paths(&processed, &fx.job.input);
    let replay = VodJob::replay(fx.job.input.clone(), output.clone(), log.clone());
    assert_eq!(replay.operation, VodOperation::Replay);

    let mut rx = fx.pipeline.start(replay).await.unwrap();
    while rx.recv().await.is_some() {}

    assert!(output.exists());
    assert_eq!(csv_lines(&log)[1], "4,0.20,smoke,0.70");
    assert_eq!(fx.store.video_log_count(), 1);
}
