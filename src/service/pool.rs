//! Fixed-size worker pool running compressions off the caller's thread.
//!
//! At most `size` searches run at once. Each job reports progress over its
//! own channel; the submitting side drains that channel on a poll interval
//! while waiting for the result, so a slow search never blocks the consumer
//! and a slow consumer never blocks the search.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

use super::registry::JobRegistry;
use crate::backend::{self, BackendFactory};
use crate::config::defaults::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_POLL_INTERVAL};
use crate::config::Settings;
use crate::engine::{CancelToken, ChannelSink, CompressRequest, Compressor};
use crate::error::ServiceError;
use crate::model::CompressionResult;
use crate::report::JobEvent;

const BYTES_PER_MB: u64 = 1024 * 1024;

struct Job {
    id: Uuid,
    request: CompressRequest,
    progress: Sender<String>,
    done: Sender<CompressionResult>,
    cancel: CancelToken,
}

pub struct JobPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    registry: Arc<JobRegistry>,
    max_upload_bytes: u64,
    poll_interval: Duration,
}

impl JobPool {
    /// Pool configured from settings, with backends chosen per run and a
    /// registry that expires finished jobs after `settings.registry_ttl`
    pub fn new(settings: &Settings) -> Result<Self, ServiceError> {
        let factory = backend::factory(settings.backend, settings.tool_overrides());
        let registry = Arc::new(JobRegistry::new(settings.registry_ttl));
        let mut pool = Self::with_factory(settings.workers, factory, registry)?;
        pool.max_upload_bytes = settings.max_upload_bytes;
        pool.poll_interval = settings.poll_interval;
        Ok(pool)
    }

    /// Pool with an explicit backend factory
    pub fn with_factory(
        size: usize,
        factory: BackendFactory,
        registry: Arc<JobRegistry>,
    ) -> Result<Self, ServiceError> {
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);

        for index in 0..size.max(1) {
            let receiver = receiver.clone();
            let factory = Arc::clone(&factory);
            let registry = Arc::clone(&registry);
            let handle = thread::Builder::new()
                .name(format!("compress-worker-{}", index))
                .spawn(move || worker_loop(index, receiver, factory, registry))?;
            workers.push(handle);
        }
        log::info!("Started {} compression workers", workers.len());

        Ok(Self {
            sender: Some(sender),
            workers,
            registry,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Queue a compression. Inputs over the upload limit are rejected here;
    /// everything else (including a missing input) is reported through the
    /// job's result.
    pub fn submit(&self, request: CompressRequest) -> Result<JobHandle, ServiceError> {
        if let Ok(meta) = fs::metadata(&request.input) {
            if meta.len() > self.max_upload_bytes {
                return Err(ServiceError::TooLarge {
                    limit_mb: self.max_upload_bytes / BYTES_PER_MB,
                });
            }
        }

        let sender = self.sender.as_ref().ok_or(ServiceError::PoolClosed)?;
        let (progress_tx, progress_rx) = unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let id = Uuid::new_v4();
        let cancel = CancelToken::new();

        sender
            .send(Job {
                id,
                request,
                progress: progress_tx,
                done: done_tx,
                cancel: cancel.clone(),
            })
            .map_err(|_| ServiceError::PoolClosed)?;

        Ok(JobHandle {
            id,
            progress: progress_rx,
            done: done_rx,
            cancel,
            registry: Arc::clone(&self.registry),
            poll_interval: self.poll_interval,
        })
    }
}

impl Drop for JobPool {
    fn drop(&mut self) {
        // Closing the queue lets idle workers exit; queued jobs still finish
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Compression worker panicked during shutdown");
            }
        }
    }
}

fn worker_loop(
    index: usize,
    receiver: Receiver<Job>,
    factory: BackendFactory,
    registry: Arc<JobRegistry>,
) {
    while let Ok(job) = receiver.recv() {
        log::info!(
            "Worker {} started job {} ({})",
            index,
            job.id,
            job.request.input.display()
        );

        let compressor = Compressor::new(Arc::clone(&factory)).with_cancel(job.cancel.clone());
        let sink = ChannelSink::new(job.progress.clone());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            compressor.compress(&job.request, &sink)
        }));

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                // Dropping the job's senders tells the handle the worker was lost
                log::error!("Worker {} panicked on job {}", index, job.id);
                continue;
            }
        };

        if result.success {
            if let Some(ref path) = result.output_path {
                registry.insert(job.id, path.clone());
            }
        }
        log::info!(
            "Worker {} finished job {}: success={} step={}",
            index,
            job.id,
            result.success,
            result.step_used
        );
        let _ = job.done.send(result);
    }
}

/// Caller's side of a queued job
pub struct JobHandle {
    id: Uuid,
    progress: Receiver<String>,
    done: Receiver<CompressionResult>,
    cancel: CancelToken,
    registry: Arc<JobRegistry>,
    poll_interval: Duration,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the search to stop before its next ladder step
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Progress lines produced since the last call, without blocking
    pub fn poll_progress(&self) -> Vec<String> {
        self.progress.try_iter().collect()
    }

    /// Download location for a finished job, if its output is registered
    pub fn download_url(&self) -> Option<String> {
        self.registry
            .get(&self.id)
            .map(|_| format!("/download/{}", self.id))
    }

    /// Wait for the job, emitting progress events every poll interval and a
    /// final done event. Progress still queued when the job finishes is
    /// emitted before the done event.
    pub fn stream(
        self,
        mut emit: impl FnMut(JobEvent),
    ) -> Result<CompressionResult, ServiceError> {
        loop {
            match self.done.recv_timeout(self.poll_interval) {
                Ok(result) => {
                    for message in self.poll_progress() {
                        emit(JobEvent::progress(message));
                    }
                    let url = if result.success {
                        self.download_url()
                    } else {
                        None
                    };
                    emit(JobEvent::done(&result, url));
                    return Ok(result);
                }
                Err(RecvTimeoutError::Timeout) => {
                    for message in self.poll_progress() {
                        emit(JobEvent::progress(message));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    for message in self.poll_progress() {
                        emit(JobEvent::progress(message));
                    }
                    return Err(ServiceError::WorkerLost);
                }
            }
        }
    }

    /// Wait for the result, discarding progress
    pub fn wait(self) -> Result<CompressionResult, ServiceError> {
        self.done.recv().map_err(|_| ServiceError::WorkerLost)
    }
}
