//! Job batches with a shared completion latch.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use tracing::{error, trace};

use crate::error::{JobError, Result};
use crate::job::Job;
use crate::system::WorkSignal;

thread_local! {
    static ON_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Mark the current thread as a pool worker.
pub(crate) fn mark_worker_thread() {
    ON_WORKER.with(|flag| flag.set(true));
}

fn on_worker_thread() -> bool {
    ON_WORKER.with(Cell::get)
}

/// Lifecycle of a job list slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListState {
    /// No batch in flight; the slot can be claimed.
    Complete = 0,
    /// Claimed and accepting jobs.
    Filling = 1,
    /// Ended; workers are pulling jobs.
    Draining = 2,
}

impl ListState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Filling,
            2 => Self::Draining,
            _ => Self::Complete,
        }
    }
}

/// A batch of jobs with one completion barrier.
///
/// Usage: [`begin`](Self::begin), any number of [`add_job`](Self::add_job),
/// [`end`](Self::end), then [`wait`](Self::wait). Workers only pull from a list
/// once it has been ended.
pub struct JobList {
    index: usize,
    state: AtomicU8,
    jobs: SegQueue<Job>,
    outstanding: AtomicUsize,
    panicked: AtomicUsize,
    /// Guards state transitions into and out of `Draining`.
    complete_lock: Mutex<()>,
    complete_cv: Condvar,
    signal: Arc<WorkSignal>,
}

impl JobList {
    pub(crate) fn new(index: usize, signal: Arc<WorkSignal>) -> Self {
        Self {
            index,
            state: AtomicU8::new(ListState::Complete as u8),
            jobs: SegQueue::new(),
            outstanding: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
            complete_lock: Mutex::new(()),
            complete_cv: Condvar::new(),
            signal,
        }
    }

    /// Slot index of this list within the job system.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListState {
        ListState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of jobs added but not yet finished.
    pub fn job_count(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Claim a complete list for filling. Returns false if it is in use.
    pub(crate) fn try_claim(&self) -> bool {
        let claimed = self
            .state
            .compare_exchange(
                ListState::Complete as u8,
                ListState::Filling as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if claimed {
            self.panicked.store(0, Ordering::Release);
        }
        claimed
    }

    /// Start a new batch.
    ///
    /// Lists returned by `get_free_job_list` are already claimed; calling
    /// `begin` on them resets the batch's panic count. A list whose previous
    /// batch is still draining is refused.
    pub fn begin(&self) -> Result<()> {
        let _guard = self.complete_lock.lock();
        match self.state() {
            ListState::Draining => return Err(JobError::Busy(self.index)),
            ListState::Complete => {
                self.state.store(ListState::Filling as u8, Ordering::Release);
            }
            ListState::Filling => {}
        }
        self.panicked.store(0, Ordering::Release);
        Ok(())
    }

    /// Add a job to the batch.
    pub fn add_job(&self, job: Job) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        self.jobs.push(job);
    }

    /// Finish filling and hand the batch to the workers.
    pub fn end(&self) {
        {
            let _guard = self.complete_lock.lock();
            if self.outstanding.load(Ordering::Acquire) == 0 {
                self.state.store(ListState::Complete as u8, Ordering::Release);
                self.complete_cv.notify_all();
                return;
            }
            self.state.store(ListState::Draining as u8, Ordering::Release);
        }
        trace!(list = self.index, jobs = self.job_count(), "job list ready");
        self.signal.notify();
    }

    /// Block until every job in the batch has finished.
    ///
    /// Returns immediately for an empty batch, handing a claimed but unused
    /// list back to the pool. When called from a worker thread the caller runs
    /// jobs from this list itself instead of only blocking.
    pub fn wait(&self) -> Result<()> {
        match self.state() {
            ListState::Complete => return self.batch_result(),
            ListState::Filling if self.job_count() == 0 => {
                let _guard = self.complete_lock.lock();
                if self.state() == ListState::Filling && self.job_count() == 0 {
                    self.state.store(ListState::Complete as u8, Ordering::Release);
                    self.complete_cv.notify_all();
                }
                return Ok(());
            }
            ListState::Filling => return Err(JobError::NotEnded(self.index)),
            ListState::Draining => {}
        }

        if on_worker_thread() {
            while let Some(job) = self.try_pop() {
                self.run_job(job);
            }
        }

        let mut guard = self.complete_lock.lock();
        while self.state() == ListState::Draining {
            self.complete_cv.wait(&mut guard);
        }
        drop(guard);

        self.batch_result()
    }

    fn batch_result(&self) -> Result<()> {
        match self.panicked.load(Ordering::Acquire) {
            0 => Ok(()),
            count => Err(JobError::Panicked {
                list: self.index,
                count,
            }),
        }
    }

    /// Pop a job if this list is being drained.
    pub(crate) fn try_pop(&self) -> Option<Job> {
        if self.state() != ListState::Draining {
            return None;
        }
        self.jobs.pop()
    }

    /// Run a job pulled from this list and count it down.
    pub(crate) fn run_job(&self, job: Job) {
        if panic::catch_unwind(AssertUnwindSafe(|| job.run())).is_err() {
            self.panicked.fetch_add(1, Ordering::AcqRel);
            error!(list = self.index, "job panicked");
        }

        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.complete_lock.lock();
            // A list still filling is completed by `end`
            if self.state() == ListState::Draining {
                self.state.store(ListState::Complete as u8, Ordering::Release);
                self.complete_cv.notify_all();
            }
        }
    }
}

impl std::fmt::Debug for JobList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobList")
            .field("index", &self.index)
            .field("state", &self.state())
            .field("job_count", &self.job_count())
            .finish_non_exhaustive()
    }
}
