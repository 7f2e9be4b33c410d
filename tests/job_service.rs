mod common;

use crossbeam_channel::{bounded, Receiver};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::{sized_file, ScriptedBackend, MB};
use pdf_compress::report::JobEvent;
use pdf_compress::service::{JobPool, JobRegistry};
use pdf_compress::{
    Backend, BackendError, BackendFactory, BackendKind, CompressRequest, CompressionStep,
    ServiceError,
};

fn pool_with(backend: &ScriptedBackend, workers: usize) -> JobPool {
    let registry = Arc::new(JobRegistry::new(Some(Duration::from_secs(3600))));
    JobPool::with_factory(workers, backend.factory(), registry)
        .unwrap()
        .with_poll_interval(Duration::from_millis(10))
}

#[test]
fn test_stream_emits_progress_then_done() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("upload.pdf");
    sized_file(&input, 100 * MB);

    let backend = ScriptedBackend::new(BackendKind::External, [Some(20 * MB); 6]);
    let pool = pool_with(&backend, 2);
    let handle = pool
        .submit(CompressRequest::new(&input).with_target_mb(30.0))
        .unwrap();
    let id = handle.id();

    let mut events = Vec::new();
    let result = handle.stream(|event| events.push(event)).unwrap();

    assert!(result.success);
    assert!(result.target_reached);
    assert!(events.len() > 1);
    assert!(events[..events.len() - 1].iter().all(|e| !e.is_done()));
    assert!(events
        .iter()
        .any(|e| *e == JobEvent::progress("Target reached!")));

    let expected_url = format!("/download/{}", id);
    match events.last().unwrap() {
        JobEvent::Done {
            success,
            final_size,
            step_used,
            download_url,
            error,
            ..
        } => {
            assert!(*success);
            assert_eq!(*final_size, 20 * MB);
            assert_eq!(step_used, "moderate");
            assert_eq!(download_url.as_deref(), Some(expected_url.as_str()));
            assert!(error.is_none());
        }
        other => panic!("expected done event, got {:?}", other),
    }

    let registered = pool.registry().get(&id).unwrap();
    assert_eq!(registered, dir.path().join("upload.compressed.pdf"));
    assert_eq!(pool.registry().get_str(&id.to_string()), Some(registered));
}

#[test]
fn test_done_event_serializes_for_sse() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("missing.pdf");

    let backend = ScriptedBackend::new(BackendKind::External, [None; 6]);
    let pool = pool_with(&backend, 1);
    let mut events = Vec::new();
    let result = pool
        .submit(CompressRequest::new(&input))
        .unwrap()
        .stream(|event| events.push(event))
        .unwrap();

    assert!(!result.success);
    let frame = events.last().unwrap().to_sse().unwrap();
    assert!(frame.starts_with("data: {\"type\":\"done\""));
    assert!(frame.ends_with("\n\n"));
    assert!(frame.contains("\"downloadUrl\":null"));
    assert!(frame.contains("Input file not found"));
    assert!(pool.registry().is_empty());
}

#[test]
fn test_upload_limit() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("huge.pdf");
    sized_file(&input, 2 * MB);

    let backend = ScriptedBackend::new(BackendKind::External, [Some(MB); 6]);
    let pool = pool_with(&backend, 1).with_max_upload_bytes(MB);

    let err = pool.submit(CompressRequest::new(&input)).err().unwrap();
    assert!(matches!(err, ServiceError::TooLarge { limit_mb: 1 }));
    assert_eq!(err.to_string(), "File too large (max 1 MB)");
    assert!(backend.calls().is_empty());
}

#[test]
fn test_jobs_run_concurrently_and_independently() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new(BackendKind::External, [Some(5 * MB); 6]);
    let pool = pool_with(&backend, 2);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let input = dir.path().join(format!("doc{}.pdf", i));
            sized_file(&input, 20 * MB);
            pool.submit(CompressRequest::new(&input).with_target_mb(10.0))
                .unwrap()
        })
        .collect();

    for handle in handles {
        let result = handle.wait().unwrap();
        assert!(result.success);
        assert_eq!(result.final_size_bytes, 5 * MB);
    }
    assert_eq!(pool.registry().len(), 4);
}

/// Blocks inside its first step until released
struct GatedBackend {
    gate: Receiver<()>,
}

impl Backend for GatedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::External
    }

    fn recompress(
        &self,
        _input: &Path,
        output: &Path,
        _step: &CompressionStep,
    ) -> Result<u64, BackendError> {
        let _ = self.gate.recv_timeout(Duration::from_secs(10));
        sized_file(output, MB);
        Ok(MB)
    }
}

#[test]
fn test_cancel_queued_job() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.pdf");
    let second = dir.path().join("second.pdf");
    sized_file(&first, 10 * MB);
    sized_file(&second, 10 * MB);

    let (release, gate) = bounded::<()>(1);
    let factory: BackendFactory = Arc::new(move || {
        Box::new(GatedBackend { gate: gate.clone() }) as Box<dyn Backend>
    });
    let registry = Arc::new(JobRegistry::new(None));
    let pool = JobPool::with_factory(1, factory, registry).unwrap();

    let running = pool
        .submit(CompressRequest::new(&first).with_target_mb(5.0))
        .unwrap();
    let queued = pool
        .submit(CompressRequest::new(&second).with_target_mb(5.0))
        .unwrap();
    queued.cancel();
    release.send(()).unwrap();

    let first_result = running.wait().unwrap();
    assert!(first_result.success);

    let second_result = queued.wait().unwrap();
    assert!(!second_result.success);
    assert_eq!(
        second_result.error_message.as_deref(),
        Some("Compression cancelled.")
    );
    assert!(!dir.path().join("second.compressed.pdf").exists());
}

#[test]
fn test_worker_panic_reports_lost_worker() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("boom.pdf");
    sized_file(&input, 10 * MB);

    let factory: BackendFactory = Arc::new(|| -> Box<dyn Backend> { panic!("backend exploded") });
    let pool = JobPool::with_factory(1, factory, Arc::new(JobRegistry::default()))
        .unwrap()
        .with_poll_interval(Duration::from_millis(10));

    let err = pool
        .submit(CompressRequest::new(&input).with_target_mb(1.0))
        .unwrap()
        .stream(|_| {})
        .unwrap_err();
    assert!(matches!(err, ServiceError::WorkerLost));

    // The worker survives and keeps serving jobs
    let small = dir.path().join("small.pdf");
    sized_file(&small, 100);
    let result = pool
        .submit(CompressRequest::new(&small).with_target_mb(1.0))
        .unwrap()
        .wait()
        .unwrap();
    assert!(result.success);
}

#[test]
fn test_pool_registry_expires_finished_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let settings = pdf_compress::Settings {
        workers: 1,
        registry_ttl: Some(Duration::from_millis(50)),
        poll_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let pool = JobPool::new(&settings).unwrap();
    assert_eq!(pool.registry().ttl(), settings.registry_ttl);

    // Files under the target are copied without building a backend
    let run = |name: &str| {
        let input = dir.path().join(name);
        sized_file(&input, 100);
        let result = pool
            .submit(CompressRequest::new(&input).with_target_mb(1.0))
            .unwrap()
            .wait()
            .unwrap();
        assert!(result.success);
    };

    run("first.pdf");
    run("second.pdf");
    assert_eq!(pool.registry().len(), 2);

    std::thread::sleep(Duration::from_millis(120));
    run("third.pdf");
    assert_eq!(pool.registry().len(), 1);
}
