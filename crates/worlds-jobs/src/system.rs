//! Worker pool owning a fixed set of job list slots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use crate::error::{JobError, Result};
use crate::job::Job;
use crate::list::{self, JobList, ListState};

/// Configuration for the job system.
#[derive(Debug, Clone)]
pub struct JobSystemConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Number of job list slots that can be in flight at once.
    pub job_lists: usize,
}

impl Default for JobSystemConfig {
    fn default() -> Self {
        let cores = thread::available_parallelism().map_or(2, std::num::NonZeroUsize::get);
        Self {
            workers: cores.saturating_sub(1).max(1),
            job_lists: 4,
        }
    }
}

impl JobSystemConfig {
    /// Set the worker thread count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the number of job list slots.
    #[must_use]
    pub const fn with_job_lists(mut self, job_lists: usize) -> Self {
        self.job_lists = job_lists;
        self
    }
}

/// "New work available" signal shared by all workers.
///
/// An epoch counter makes wakeups sticky: a worker that scanned the lists at
/// epoch `n` only sleeps while the epoch is still `n`.
pub(crate) struct WorkSignal {
    epoch: Mutex<u64>,
    cv: Condvar,
}

impl WorkSignal {
    fn new() -> Self {
        Self {
            epoch: Mutex::new(0),
            cv: Condvar::new(),
        }
    }

    fn epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    pub(crate) fn notify(&self) {
        let mut epoch = self.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        self.cv.notify_all();
    }

    fn wait_past(&self, seen: u64) {
        let mut epoch = self.epoch.lock();
        while *epoch == seen {
            self.cv.wait(&mut epoch);
        }
    }
}

struct Shared {
    executing: AtomicBool,
    signal: Arc<WorkSignal>,
    lists: Box<[JobList]>,
}

impl Shared {
    fn find_job(&self) -> Option<(&JobList, Job)> {
        self.lists
            .iter()
            .filter(|list| list.job_count() > 0)
            .find_map(|list| list.try_pop().map(|job| (list, job)))
    }
}

/// Fixed pool of worker threads draining job lists.
///
/// Dropping the system stops the workers and joins them. Jobs still queued at
/// that point are discarded.
pub struct JobSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Spawn the worker threads.
    pub fn new(config: JobSystemConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(JobError::NoWorkers);
        }

        let signal = Arc::new(WorkSignal::new());
        let lists = (0..config.job_lists.max(1))
            .map(|index| JobList::new(index, Arc::clone(&signal)))
            .collect();

        let mut system = Self {
            shared: Arc::new(Shared {
                executing: AtomicBool::new(true),
                signal,
                lists,
            }),
            workers: Vec::with_capacity(config.workers),
        };

        for index in 0..config.workers {
            let shared = Arc::clone(&system.shared);
            // On failure `system` is dropped, which joins the workers spawned so far
            let handle = thread::Builder::new()
                .name(format!("worlds-worker-{index}"))
                .spawn(move || worker_loop(index, &shared))?;
            system.workers.push(handle);
        }

        info!(
            workers = config.workers,
            job_lists = system.shared.lists.len(),
            "Job system started"
        );
        Ok(system)
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of job list slots.
    pub fn job_list_count(&self) -> usize {
        self.shared.lists.len()
    }

    /// Number of job list slots with no batch in flight.
    pub fn free_job_lists(&self) -> usize {
        self.shared
            .lists
            .iter()
            .filter(|list| list.state() == ListState::Complete)
            .count()
    }

    /// Claim a job list slot with no batch in flight.
    pub fn get_free_job_list(&self) -> Result<&JobList> {
        self.shared
            .lists
            .iter()
            .find(|list| list.try_claim())
            .ok_or(JobError::NoFreeJobLists(self.shared.lists.len()))
    }

    /// Wake every idle worker.
    pub fn signal_job_list_available(&self) {
        self.shared.signal.notify();
    }

    /// Wait for every batch currently being drained.
    ///
    /// All lists are waited on even if one reports an error; the first error
    /// is returned.
    pub fn complete_frame_jobs(&self) -> Result<()> {
        let mut result = Ok(());
        for list in self.shared.lists.iter() {
            if list.state() == ListState::Draining {
                let waited = list.wait();
                if result.is_ok() {
                    result = waited;
                }
            }
        }
        result
    }

    /// Run a batch of jobs on a free list and wait for all of them.
    pub fn run_batch<I>(&self, jobs: I) -> Result<()>
    where
        I: IntoIterator<Item = Job>,
    {
        let list = self.get_free_job_list()?;
        list.begin()?;
        for job in jobs {
            list.add_job(job);
        }
        list.end();
        list.wait()
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.shared.executing.store(false, Ordering::Release);
        self.shared.signal.notify();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("Job system stopped");
    }
}

impl std::fmt::Debug for JobSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSystem")
            .field("workers", &self.workers.len())
            .field("lists", &self.shared.lists)
            .finish()
    }
}

fn worker_loop(index: usize, shared: &Shared) {
    list::mark_worker_thread();
    debug!(worker = index, "worker started");

    while shared.executing.load(Ordering::Acquire) {
        let epoch = shared.signal.epoch();

        if let Some((list, job)) = shared.find_job() {
            list.run_job(job);
            continue;
        }

        // Shutdown bumps the epoch too, so this returns once executing is cleared
        shared.signal.wait_past(epoch);
    }

    debug!(worker = index, "worker stopped");
}
