//! A single unit of work.

use std::fmt;

type JobFn = Box<dyn FnOnce() + Send + 'static>;

/// A closure plus an optional completion callback.
///
/// The callback runs on the same worker right after the closure, before the
/// batch's outstanding count is decremented.
pub struct Job {
    pub(crate) function: JobFn,
    pub(crate) on_complete: Option<JobFn>,
}

impl Job {
    /// Create a job from a closure.
    pub fn new<F>(function: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            function: Box::new(function),
            on_complete: None,
        }
    }

    /// Attach a completion callback.
    #[must_use]
    pub fn with_completion<F>(mut self, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(on_complete));
        self
    }

    /// Run the closure and then the completion callback.
    pub(crate) fn run(self) {
        (self.function)();
        if let Some(on_complete) = self.on_complete {
            on_complete();
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("function", &"<closure>")
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}
