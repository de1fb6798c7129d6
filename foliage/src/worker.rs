//! Background generation task with an explicit lifecycle.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use bevy::tasks::futures_lite::future;
use bevy::tasks::{AsyncComputeTaskPool, Task};
use thiserror::Error;

/// A generation cycle that panicked instead of returning.
#[derive(Debug, Clone, Error)]
#[error("generation cycle panicked: {message}")]
pub struct WorkerPanic {
    pub message: String,
}

impl WorkerPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self { message }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// No task in flight.
    Idle,
    Running,
    /// Done; the result is waiting in [`GenerationWorker::try_take`].
    Finished,
}

/// Owns at most one in-flight task on the async compute pool.
pub struct GenerationWorker<T> {
    task: Option<Task<Result<T, WorkerPanic>>>,
}

impl<T> Default for GenerationWorker<T> {
    fn default() -> Self {
        Self { task: None }
    }
}

impl<T: Send + 'static> GenerationWorker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `job` unless a task is already in flight. Returns whether it started.
    pub fn start(&mut self, job: impl FnOnce() -> T + Send + 'static) -> bool {
        if self.task.is_some() {
            return false;
        }
        let task = AsyncComputeTaskPool::get().spawn(async move {
            panic::catch_unwind(AssertUnwindSafe(job)).map_err(WorkerPanic::from_payload)
        });
        self.task = Some(task);
        true
    }

    /// Takes the finished task's result without blocking; `None` while idle or running.
    pub fn try_take(&mut self) -> Option<Result<T, WorkerPanic>> {
        let task = self.task.as_mut()?;
        let result = future::block_on(future::poll_once(task))?;
        self.task = None;
        Some(result)
    }
}

impl<T> GenerationWorker<T> {
    pub fn status(&self) -> WorkerStatus {
        match &self.task {
            None => WorkerStatus::Idle,
            Some(task) if task.is_finished() => WorkerStatus::Finished,
            Some(_) => WorkerStatus::Running,
        }
    }

    /// Cancels the in-flight task and waits for it to stop.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            // A running cycle cannot be interrupted; cancel waits for it.
            future::block_on(task.cancel());
        }
    }
}

impl<T> Drop for GenerationWorker<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use bevy::tasks::TaskPool;

    use super::*;

    fn pool() {
        AsyncComputeTaskPool::get_or_init(TaskPool::new);
    }

    fn wait<T: Send + 'static>(worker: &mut GenerationWorker<T>) -> Result<T, WorkerPanic> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(result) = worker.try_take() {
                return result;
            }
            assert!(Instant::now() < deadline, "worker never finished");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn runs_one_job_at_a_time() {
        pool();
        let (release, gate) = mpsc::channel::<()>();
        let mut worker = GenerationWorker::new();
        assert_eq!(worker.status(), WorkerStatus::Idle);

        assert!(worker.start(move || {
            gate.recv().ok();
            41
        }));
        assert_eq!(worker.status(), WorkerStatus::Running);
        assert!(!worker.start(|| 0));
        assert!(worker.try_take().is_none());

        release.send(()).unwrap();
        assert_eq!(wait(&mut worker).unwrap(), 41);
        assert_eq!(worker.status(), WorkerStatus::Idle);
        assert!(worker.start(|| 1));
        assert_eq!(wait(&mut worker).unwrap(), 1);
    }

    #[test]
    fn panics_fail_only_that_job() {
        pool();
        let mut worker: GenerationWorker<u32> = GenerationWorker::new();
        worker.start(|| panic!("bad chunk"));
        let err = wait(&mut worker).unwrap_err();
        assert!(err.message.contains("bad chunk"));

        assert_eq!(worker.status(), WorkerStatus::Idle);
        worker.start(|| 5);
        assert_eq!(wait(&mut worker).unwrap(), 5);
    }

    #[test]
    fn shutdown_leaves_the_worker_idle() {
        pool();
        let mut worker = GenerationWorker::new();
        worker.start(|| std::thread::sleep(Duration::from_millis(20)));
        worker.shutdown();
        assert_eq!(worker.status(), WorkerStatus::Idle);
        assert!(worker.start(|| ()));
        wait(&mut worker).unwrap();
    }
}
