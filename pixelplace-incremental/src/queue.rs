//! One FIFO render worker per scope.
//!
//! Jobs for a scope run one at a time, in submission order, on the blocking
//! pool. Scopes are independent: a slow or failing scope never delays
//! another, and nothing here ever blocks the caller.

use crate::accumulator::BatchSink;
use crate::metrics::FlushMetrics;
use dashmap::DashMap;
use pixelplace_render::ScopeRenderer;
use pixelplace_types::PixelDelta;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, warn};

/// Work for a scope's render worker.
#[derive(Debug, Clone)]
pub enum RenderJob {
    /// Paint a flushed batch at every scale.
    Deltas(Vec<PixelDelta>),
    /// Rebuild every scale from reconstructed state.
    Regenerate,
}

struct Shared<R> {
    renderer: Arc<R>,
    scales: Vec<u32>,
    grid: bool,
    metrics: Arc<FlushMetrics>,
    in_flight: AtomicUsize,
    idle: Notify,
}

pub struct RenderQueue<R: ScopeRenderer> {
    shared: Arc<Shared<R>>,
    workers: DashMap<R::Scope, mpsc::UnboundedSender<RenderJob>>,
    runtime: Handle,
}

impl<R: ScopeRenderer> RenderQueue<R> {
    pub fn new(
        renderer: Arc<R>,
        scales: Vec<u32>,
        grid: bool,
        metrics: Arc<FlushMetrics>,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                renderer,
                scales,
                grid,
                metrics,
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
            workers: DashMap::new(),
            runtime,
        }
    }

    /// Queue `job` behind every earlier job for `scope`.
    pub fn enqueue(&self, scope: &R::Scope, job: RenderJob) {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);

        let mut sender = self
            .workers
            .entry(scope.clone())
            .or_insert_with(|| self.spawn_worker(scope.clone()));
        if let Err(mpsc::error::SendError(job)) = sender.send(job) {
            // The worker is gone (its task panicked); start a fresh one.
            warn!(scope = %scope, "Render worker stopped, restarting");
            *sender = self.spawn_worker(scope.clone());
            if sender.send(job).is_err() {
                self.shared.finish_job();
            }
        }
    }

    fn spawn_worker(&self, scope: R::Scope) -> mpsc::UnboundedSender<RenderJob> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.runtime
            .spawn(run_worker(self.shared.clone(), scope, rx));
        tx
    }

    /// Jobs queued or running.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once every queued job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Number of scopes with a live worker.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Drop every worker handle. Workers finish what is queued, then exit;
    /// a later `enqueue` starts a fresh worker.
    pub fn close(&self) {
        self.workers.clear();
    }
}

impl<R: ScopeRenderer> BatchSink<R::Scope> for RenderQueue<R> {
    fn submit(&self, scope: &R::Scope, batch: Vec<PixelDelta>) {
        self.enqueue(scope, RenderJob::Deltas(batch));
    }
}

impl<R> Shared<R> {
    fn finish_job(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

async fn run_worker<R: ScopeRenderer>(
    shared: Arc<Shared<R>>,
    scope: R::Scope,
    mut rx: mpsc::UnboundedReceiver<RenderJob>,
) {
    while let Some(job) = rx.recv().await {
        let task_shared = shared.clone();
        let task_scope = scope.clone();
        let outcome =
            tokio::task::spawn_blocking(move || run_job(&task_shared, &task_scope, job)).await;
        if let Err(e) = outcome {
            error!(scope = %scope, error = %e, "Render job panicked");
        }
        shared.finish_job();
    }
    debug!(scope = %scope, "Render worker stopped");
}

/// Run one job; failures are logged, never returned.
fn run_job<R: ScopeRenderer>(shared: &Shared<R>, scope: &R::Scope, job: RenderJob) {
    let deltas = match job {
        RenderJob::Deltas(deltas) => deltas,
        RenderJob::Regenerate => {
            regenerate(shared, scope);
            return;
        }
    };

    for &scale in &shared.scales {
        let started = Instant::now();
        match shared
            .renderer
            .update(scope, &deltas, scale, shared.grid)
        {
            Ok(()) => shared.metrics.record_render(started.elapsed()),
            Err(e) => {
                warn!(
                    scope = %scope,
                    scale,
                    error = %e,
                    "Incremental render failed, regenerating"
                );
                shared.metrics.record_render_failure();
                regenerate(shared, scope);
                return;
            }
        }
    }
}

fn regenerate<R: ScopeRenderer>(shared: &Shared<R>, scope: &R::Scope) {
    for &scale in &shared.scales {
        match shared.renderer.regenerate_full(scope, scale, shared.grid) {
            Ok(()) => shared.metrics.record_regeneration(true),
            Err(e) => {
                // The previous raster, if any, keeps serving.
                error!(scope = %scope, scale, error = %e, "Raster regeneration failed");
                shared.metrics.record_regeneration(false);
            }
        }
    }
}
