use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::scheduler::{JobScheduler, ScheduledJob};
use scenesync_arbiter::{Arbiter, AspectPostman, ChangeArbiter, SharedAspect};
use scenesync_backend::Aspect;
use scenesync_common::AspectId;
use scenesync_kernel::NodeTree;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Summary of one [`AspectEngine::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    /// Frontend records delivered to the backend this frame.
    pub changes_synced: usize,
    pub jobs_run: usize,
    /// Backend-originated changes queued for the frontend.
    pub backend_changes: usize,
}

struct RegisteredAspect {
    id: AspectId,
    name: String,
    aspect: SharedAspect,
}

/// Hosts the backend aspects of one scene.
///
/// The engine owns the scene's arbiter and postman. Each frame it drains the
/// arbiter into the aspects' registries, runs the aspects' jobs on the worker
/// pool and queues the jobs' write-backs on the arbiter's frontend channel.
pub struct AspectEngine {
    config: EngineConfig,
    postman: Arc<AspectPostman>,
    arbiter: Arc<ChangeArbiter>,
    aspects: Vec<RegisteredAspect>,
    scheduler: JobScheduler,
    frame: u64,
    elapsed: Duration,
}

impl AspectEngine {
    pub fn new(config: EngineConfig) -> Self {
        let postman = Arc::new(AspectPostman::new(config.log_unrouted_changes));
        let arbiter = Arc::new(ChangeArbiter::new(postman.clone()));
        let scheduler = JobScheduler::new(config.worker_threads);
        tracing::info!(workers = scheduler.workers(), "aspect engine created");
        Self {
            config,
            postman,
            arbiter,
            aspects: Vec::new(),
            scheduler,
            frame: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn arbiter(&self) -> &Arc<ChangeArbiter> {
        &self.arbiter
    }

    /// The arbiter as a scene delivery target, for [`NodeTree::set_arbiter`].
    pub fn scene_arbiter(&self) -> Arc<dyn Arbiter> {
        self.arbiter.clone()
    }

    pub fn postman(&self) -> &Arc<AspectPostman> {
        &self.postman
    }

    /// Register an aspect. The returned handle stays usable for inspection
    /// and for feeding the aspect external state.
    pub fn register_aspect<A: Aspect + 'static>(&mut self, aspect: A) -> (AspectId, Arc<Mutex<A>>) {
        let id = AspectId(self.aspects.len() as u32);
        let shared = Arc::new(Mutex::new(aspect));
        let name = {
            let mut aspect = shared.lock().unwrap_or_else(PoisonError::into_inner);
            aspect.on_registered(id);
            aspect.name().to_owned()
        };
        let erased: SharedAspect = shared.clone();
        self.postman.add_aspect(id, erased.clone());
        tracing::info!(%id, %name, "aspect registered");
        self.aspects.push(RegisteredAspect {
            id,
            name,
            aspect: erased,
        });
        (id, shared)
    }

    /// `(id, name)` of every registered aspect, in registration order.
    pub fn aspects(&self) -> Vec<(AspectId, &str)> {
        self.aspects
            .iter()
            .map(|a| (a.id, a.name.as_str()))
            .collect()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Drain pending frontend records into the aspects now.
    pub fn sync(&self) -> usize {
        self.arbiter.sync_changes()
    }

    /// Advance one frame of `delta`.
    pub fn step(&mut self, delta: Duration) -> Result<FrameReport, EngineError> {
        self.frame += 1;
        self.elapsed += delta;
        let _span = tracing::info_span!("frame", frame = self.frame).entered();

        let mut changes_synced = 0;
        if self.config.drain_before_jobs {
            changes_synced += self.arbiter.sync_changes();
        }

        let mut jobs = Vec::new();
        for registered in &self.aspects {
            let mut aspect = registered
                .aspect
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            jobs.extend(
                aspect
                    .jobs_to_execute(self.elapsed)
                    .into_iter()
                    .map(|job| ScheduledJob::new(registered.id, job)),
            );
        }

        let outputs = self.scheduler.execute(jobs)?;
        let jobs_run = outputs.len();
        let mut backend_changes = 0;
        for output in outputs {
            if output.writes.is_empty() {
                continue;
            }
            backend_changes += self
                .arbiter
                .post_to_frontend(output.writes.into_changes(output.aspect));
        }

        if !self.config.drain_before_jobs {
            changes_synced += self.arbiter.sync_changes();
        }

        let report = FrameReport {
            frame: self.frame,
            changes_synced,
            jobs_run,
            backend_changes,
        };
        tracing::debug!(?report, "frame complete");
        Ok(report)
    }

    /// Apply the backend write-backs queued so far to `tree`.
    pub fn apply_backend_changes(&self, tree: &mut NodeTree) -> usize {
        tree.apply_backend_changes(self.arbiter.take_frontend_changes())
    }
}
