use crate::errors::SchedulerError;
use crossbeam_deque::{Injector, Steal};
use scenesync_backend::{BackendWrites, Job};
use scenesync_common::AspectId;
use std::thread;

/// A job tagged with the aspect that produced it.
pub struct ScheduledJob {
    pub aspect: AspectId,
    pub job: Box<dyn Job>,
}

impl ScheduledJob {
    pub fn new(aspect: AspectId, job: Box<dyn Job>) -> Self {
        Self { aspect, job }
    }
}

/// What a finished job handed back.
#[derive(Debug)]
pub struct JobOutput {
    pub aspect: AspectId,
    pub name: &'static str,
    pub writes: BackendWrites,
}

/// Runs a frame's jobs on a pool of scoped worker threads.
///
/// Jobs are grouped into waves: a wave holds every job whose dependencies
/// all ran in earlier waves. Each wave is pushed onto an injector queue that
/// the workers drain; the next wave starts once the current one finished.
/// Outputs come back in submission order whatever the interleaving.
#[derive(Debug, Clone)]
pub struct JobScheduler {
    workers: usize,
}

impl JobScheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Group job indices into dependency waves.
    ///
    /// A dependency names another job of the same aspect. Names that match
    /// nothing are ignored with a warning.
    pub fn plan(jobs: &[ScheduledJob]) -> Result<Vec<Vec<usize>>, SchedulerError> {
        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); jobs.len()];
        for (index, scheduled) in jobs.iter().enumerate() {
            for dependency in scheduled.job.dependencies() {
                let before = deps[index].len();
                deps[index].extend(jobs.iter().enumerate().filter_map(|(other, candidate)| {
                    (other != index
                        && candidate.aspect == scheduled.aspect
                        && candidate.job.name() == *dependency)
                        .then_some(other)
                }));
                if deps[index].len() == before {
                    tracing::warn!(
                        job = scheduled.job.name(),
                        dependency,
                        aspect = %scheduled.aspect,
                        "ignoring unknown job dependency"
                    );
                }
            }
        }

        let mut done = vec![false; jobs.len()];
        let mut remaining = jobs.len();
        let mut waves = Vec::new();
        while remaining > 0 {
            let wave: Vec<usize> = (0..jobs.len())
                .filter(|i| !done[*i] && deps[*i].iter().all(|d| done[*d]))
                .collect();
            if wave.is_empty() {
                let stuck = (0..jobs.len())
                    .filter(|i| !done[*i])
                    .map(|i| jobs[i].job.name().to_owned())
                    .collect();
                return Err(SchedulerError::DependencyCycle { jobs: stuck });
            }
            for i in &wave {
                done[*i] = true;
            }
            remaining -= wave.len();
            waves.push(wave);
        }
        Ok(waves)
    }

    /// Run every job, respecting dependencies. Outputs are in submission order.
    pub fn execute(&self, jobs: Vec<ScheduledJob>) -> Result<Vec<JobOutput>, SchedulerError> {
        let waves = Self::plan(&jobs)?;
        let _span =
            tracing::info_span!("execute_jobs", jobs = jobs.len(), waves = waves.len()).entered();

        let mut outputs: Vec<Option<JobOutput>> = jobs.iter().map(|_| None).collect();
        let mut slots: Vec<Option<ScheduledJob>> = jobs.into_iter().map(Some).collect();
        for wave in waves {
            let batch: Vec<(usize, ScheduledJob)> = wave
                .iter()
                .filter_map(|i| slots[*i].take().map(|job| (*i, job)))
                .collect();
            for (index, output) in self.run_wave(batch) {
                outputs[index] = Some(output);
            }
        }
        Ok(outputs.into_iter().flatten().collect())
    }

    fn run_wave(&self, batch: Vec<(usize, ScheduledJob)>) -> Vec<(usize, JobOutput)> {
        let threads = self.workers.min(batch.len());
        if threads <= 1 {
            return batch
                .into_iter()
                .map(|(index, job)| (index, run_job(job)))
                .collect();
        }

        let injector = Injector::new();
        for item in batch {
            injector.push(item);
        }
        thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        let mut finished = Vec::new();
                        loop {
                            match injector.steal() {
                                Steal::Success((index, job)) => {
                                    finished.push((index, run_job(job)));
                                }
                                Steal::Retry => continue,
                                Steal::Empty => break,
                            }
                        }
                        finished
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(finished) => finished,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

fn run_job(scheduled: ScheduledJob) -> JobOutput {
    let ScheduledJob { aspect, mut job } = scheduled;
    let mut writes = BackendWrites::new();
    tracing::trace!(%aspect, job = job.name(), "running job");
    job.run(&mut writes);
    JobOutput {
        aspect,
        name: job.name(),
        writes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenesync_common::{NodeId, NodeType};
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: &'static str,
        deps: Vec<&'static str>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Job for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn dependencies(&self) -> &[&'static str] {
            &self.deps
        }

        fn run(&mut self, writes: &mut BackendWrites) {
            self.log.lock().unwrap().push(self.name);
            writes.write(NodeId(1), NodeType::new("Node"), self.name, 1);
        }
    }

    fn job(
        aspect: u32,
        name: &'static str,
        deps: &[&'static str],
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> ScheduledJob {
        ScheduledJob::new(
            AspectId(aspect),
            Box::new(Recorder {
                name,
                deps: deps.to_vec(),
                log: Arc::clone(log),
            }),
        )
    }

    #[test]
    fn dependencies_run_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let jobs = vec![
            job(0, "collect", &["transform"], &log),
            job(0, "transform", &[], &log),
        ];
        let outputs = JobScheduler::new(4).execute(jobs).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["transform", "collect"]);
        let names: Vec<&str> = outputs.iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["collect", "transform"]);
    }

    #[test]
    fn waves_group_independent_jobs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let jobs = vec![
            job(0, "a", &[], &log),
            job(0, "b", &[], &log),
            job(0, "c", &["a", "b"], &log),
            job(1, "a", &[], &log),
        ];
        let waves = JobScheduler::plan(&jobs).unwrap();
        assert_eq!(waves, vec![vec![0, 1, 3], vec![2]]);
    }

    #[test]
    fn dependencies_do_not_cross_aspects() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let jobs = vec![job(0, "a", &[], &log), job(1, "b", &["a"], &log)];
        // "a" of aspect 0 is invisible to aspect 1; the dependency is dropped.
        assert_eq!(JobScheduler::plan(&jobs).unwrap(), vec![vec![0, 1]]);
    }

    #[test]
    fn cycles_are_reported() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let jobs = vec![
            job(0, "a", &["b"], &log),
            job(0, "b", &["a"], &log),
            job(0, "c", &[], &log),
        ];
        let err = JobScheduler::new(2).execute(jobs).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::DependencyCycle {
                jobs: vec!["a".into(), "b".into()]
            }
        );
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn parallel_outputs_keep_submission_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let names: [&'static str; 8] = ["j0", "j1", "j2", "j3", "j4", "j5", "j6", "j7"];
        let jobs: Vec<ScheduledJob> = names.into_iter().map(|n| job(0, n, &[], &log)).collect();
        let outputs = JobScheduler::new(4).execute(jobs).unwrap();
        let seen: Vec<&str> = outputs.iter().map(|o| o.name).collect();
        assert_eq!(seen, names.to_vec());
        assert!(outputs.iter().all(|o| o.writes.len() == 1));
        assert_eq!(log.lock().unwrap().len(), 8);
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(JobScheduler::new(0).workers(), 1);
    }
}
