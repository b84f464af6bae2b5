//! End-to-end job pipelines exposed to the UI layer.
//!
//! Each call spawns one task that runs upload, polling and result loading in
//! sequence and reports progress as [`JobEvent`]s on a [`JobHandle`]. Jobs for
//! different kinds/slots never share state; a new job for a kind/slot that
//! already has one running cancels the older job.

pub mod messages;

use futures::Stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::JobError;
use crate::models::event::{GeneratedImage, JobEvent};
use crate::models::job::{Job, JobKind, MemorySlot};
use crate::services::poller::PollResult;
use crate::services::submitter::kind_label;
use messages::WaitingMessages;

type JobOutcome = Result<GeneratedImage, JobError>;

#[derive(Default)]
struct ActiveJobs {
    next_generation: AtomicU64,
    tokens: Mutex<HashMap<JobKind, (u64, CancellationToken)>>,
}

impl ActiveJobs {
    /// Register `token` for `kind`, cancelling whatever was running there before.
    fn register(&self, kind: JobKind, token: CancellationToken) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(kind, (generation, token));

        if let Some((_, previous)) = previous {
            tracing::info!(kind = %kind, "Replacing running job");
            previous.cancel();
        }
        generation
    }

    fn release(&self, kind: JobKind, generation: u64) {
        let mut tokens = self
            .tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if tokens.get(&kind).is_some_and(|(g, _)| *g == generation) {
            tokens.remove(&kind);
        }
    }

    fn cancel(&self, kind: JobKind) {
        let tokens = self
            .tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((_, token)) = tokens.get(&kind) {
            token.cancel();
        }
    }

    fn cancel_all(&self) {
        let tokens = self
            .tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, token) in tokens.values() {
            token.cancel();
        }
    }

    fn is_active(&self, kind: JobKind) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&kind)
    }
}

/// Entry point for the UI: turns photos into generated images.
#[derive(Clone)]
pub struct JobOrchestrator {
    state: AppState,
    active: Arc<ActiveJobs>,
}

impl JobOrchestrator {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            active: Arc::new(ActiveJobs::default()),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Generate the memorial photo. Emits status text for every phase, rotating
    /// waiting messages while the backend is generating.
    pub fn process_primary_photo(&self, image: Vec<u8>) -> JobHandle {
        self.spawn(JobKind::PetPhoto, image)
    }

    /// Stylize a memory photo for `slot`. Emits busy/idle markers instead of text.
    pub fn process_memory_photo(&self, image: Vec<u8>, slot: MemorySlot) -> JobHandle {
        self.spawn(JobKind::MemoryPhoto { slot }, image)
    }

    /// Cancel the running job for `kind`, if any.
    pub fn cancel(&self, kind: JobKind) {
        self.active.cancel(kind);
    }

    pub fn cancel_all(&self) {
        self.active.cancel_all();
    }

    pub fn is_active(&self, kind: JobKind) -> bool {
        self.active.is_active(kind)
    }

    fn spawn(&self, kind: JobKind, image: Vec<u8>) -> JobHandle {
        let cancel = CancellationToken::new();
        let generation = self.active.register(kind, cancel.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        let pipeline = Pipeline {
            state: self.state.clone(),
            kind,
            cancel: cancel.clone(),
            events: EventSink {
                tx,
                cancel: cancel.clone(),
            },
        };
        let active = self.active.clone();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let _registration = Registration {
                active,
                kind,
                generation,
            };
            tokio::select! {
                biased;
                _ = task_cancel.cancelled() => {
                    metrics::counter!("petecho_jobs_cancelled_total", "kind" => kind_label(kind))
                        .increment(1);
                    tracing::info!(kind = %kind, "Job cancelled");
                }
                _ = pipeline.run(image) => {}
            }
        });

        JobHandle {
            kind,
            cancel,
            events: rx,
            task,
        }
    }
}

/// Removes the job from the registry when its task exits, including by panic.
struct Registration {
    active: Arc<ActiveJobs>,
    kind: JobKind,
    generation: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.active.release(self.kind, self.generation);
    }
}

/// Caller's side of a running job.
///
/// Dropping the handle detaches the job; it keeps running until it finishes.
pub struct JobHandle {
    kind: JobKind,
    cancel: CancellationToken,
    events: UnboundedReceiver<JobEvent>,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Stop the job. Safe to call any number of times; no event is yielded afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, or `None` once the job has finished or been cancelled.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event.filter(|_| !self.cancel.is_cancelled()),
        }
    }

    /// Drain events until the terminal one. `None` if the job was cancelled.
    pub async fn outcome(mut self) -> Option<Result<GeneratedImage, JobError>> {
        while let Some(event) = self.next_event().await {
            if let JobEvent::Finished(outcome) = event {
                return Some(outcome);
            }
        }
        None
    }

    pub fn into_stream(self) -> impl Stream<Item = JobEvent> {
        futures::stream::unfold(self, |mut handle| async move {
            handle.next_event().await.map(|event| (event, handle))
        })
    }

    /// Wait for the job task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(kind = %self.kind, error = %e, "Job task aborted");
        }
    }
}

struct EventSink {
    tx: UnboundedSender<JobEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    fn emit(&self, event: JobEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        // A dropped handle means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

struct Pipeline {
    state: AppState,
    kind: JobKind,
    cancel: CancellationToken,
    events: EventSink,
}

impl Pipeline {
    fn is_primary(&self) -> bool {
        self.kind == JobKind::PetPhoto
    }

    async fn run(self, image: Vec<u8>) {
        let started = Instant::now();

        if self.is_primary() {
            self.events.emit(JobEvent::status(messages::UPLOADING));
        } else {
            self.events.emit(JobEvent::Processing { active: true });
        }

        let Some(outcome) = self.execute(image).await else {
            return;
        };

        let kind = kind_label(self.kind);
        metrics::histogram!("petecho_job_duration_seconds", "kind" => kind)
            .record(started.elapsed().as_secs_f64());

        match &outcome {
            Ok(image) => {
                metrics::counter!("petecho_jobs_completed_total", "kind" => kind).increment(1);
                tracing::info!(
                    kind = %self.kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    url = %image.source_url,
                    "Job finished"
                );
            }
            Err(e) => {
                metrics::counter!(
                    "petecho_jobs_failed_total",
                    "kind" => kind,
                    "reason" => e.reason()
                )
                .increment(1);
                tracing::warn!(kind = %self.kind, error = %e, "Job finished with error");
            }
        }

        if self.is_primary() {
            let text = match &outcome {
                Ok(_) => messages::COMPLETED,
                Err(e) => e.user_message(),
            };
            self.events.emit(JobEvent::status(text));
        } else {
            self.events.emit(JobEvent::Processing { active: false });
        }
        self.events.emit(JobEvent::Finished(outcome));
    }

    /// Submit, poll and load. `None` means the job was cancelled.
    async fn execute(&self, image: Vec<u8>) -> Option<JobOutcome> {
        let original = self.state.cache.as_ref().map(|_| image.clone());

        let mut job = match self.state.submitter.submit(self.kind, image).await {
            Ok(job) => job,
            Err(e) => return Some(Err(e)),
        };

        if let Some(bytes) = original {
            self.cache_best_effort(&self.upload_cache_name(), &bytes).await;
        }

        if self.is_primary() {
            self.events.emit(JobEvent::status(messages::GENERATING));
        }

        match self.poll(&mut job).await {
            PollResult::Completed => {}
            PollResult::Failed => return Some(Err(JobError::JobFailed { job_id: job.id })),
            PollResult::TimedOut { attempts } => {
                return Some(Err(JobError::JobTimedOut {
                    job_id: job.id,
                    attempts,
                }))
            }
            PollResult::Cancelled => return None,
        }

        let loaded = self.state.loader.load(&job).await;
        if let Ok(generated) = &loaded {
            let name = format!("generated-{}.{}", Uuid::new_v4(), generated.extension());
            self.cache_best_effort(&name, &generated.bytes).await;
        }
        Some(loaded)
    }

    /// Poll the job; for the memorial photo, rotate waiting messages until the
    /// poll returns. The ticker lives only as long as this call. A zero period
    /// disables the rotation.
    async fn poll(&self, job: &mut Job) -> PollResult {
        let period = self.state.waiting_message_period;
        if !self.is_primary() || period.is_zero() {
            return self.state.poller.poll(job, &self.cancel).await;
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut waiting = WaitingMessages::new();

        let poll = self.state.poller.poll(job, &self.cancel);
        tokio::pin!(poll);

        loop {
            tokio::select! {
                biased;
                result = &mut poll => return result,
                _ = ticker.tick() => self.events.emit(JobEvent::status(waiting.advance())),
            }
        }
    }

    fn upload_cache_name(&self) -> String {
        match self.kind {
            JobKind::PetPhoto => format!("pet-{}.jpg", Uuid::new_v4()),
            JobKind::MemoryPhoto { slot } => format!("memory-{slot}-{}.jpg", Uuid::new_v4()),
        }
    }

    async fn cache_best_effort(&self, file_name: &str, bytes: &[u8]) {
        let Some(cache) = &self.state.cache else {
            return;
        };
        if let Err(e) = cache.save(file_name, bytes).await {
            tracing::warn!(kind = %self.kind, file_name, error = %e, "Failed to cache image locally");
        }
    }
}
