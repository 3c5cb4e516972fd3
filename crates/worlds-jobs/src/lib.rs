//! Job system for the Worlds frame core.
//!
//! A fixed pool of worker threads drains batches of closures. Each batch lives
//! in a [`JobList`] slot with its own completion latch, so a caller can wait on
//! one batch without waiting on unrelated ones.
//!
//! ```ignore
//! let jobs = JobSystem::new(JobSystemConfig::default())?;
//! let list = jobs.get_free_job_list()?;
//! list.begin()?;
//! for face in 0..6 {
//!     list.add_job(Job::new(move || decode_face(face)));
//! }
//! list.end();
//! list.wait()?;
//! ```

pub mod error;
pub mod job;
pub mod list;
pub mod system;

pub use error::{JobError, Result};
pub use job::Job;
pub use list::{JobList, ListState};
pub use system::{JobSystem, JobSystemConfig};
