use bevy::tasks::{
    AsyncComputeTaskPool,
    Task,
    TaskPool,
    block_on,
    futures_lite::future,
};


#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
)]
pub enum StageState {
    Idle,
    Busy,
}


/// One asynchronous worker with at most one request in flight.
///
/// The worker is moved into the task together with the job and handed back
/// with the result, so it is never shared while a request runs.
pub struct Stage<W, T> {
    name: &'static str,
    worker: Option<W>,
    task: Option<Task<(W, T)>>,
}

impl<W, T> Stage<W, T>
where
    W: Send + 'static,
    T: Send + 'static,
{
    pub fn new(name: &'static str, worker: W) -> Self {
        Self {
            name,
            worker: Some(worker),
            task: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> StageState {
        if self.task.is_some() {
            StageState::Busy
        } else {
            StageState::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == StageState::Idle
    }

    /// `None` while a request is in flight.
    pub fn worker(&self) -> Option<&W> {
        self.worker.as_ref()
    }

    pub fn worker_mut(&mut self) -> Option<&mut W> {
        self.worker.as_mut()
    }

    /// Starts `job` on the async compute pool. Returns `false` without
    /// touching the worker when a request is already in flight.
    pub fn try_submit<F>(&mut self, job: F) -> bool
    where
        F: FnOnce(&mut W) -> T + Send + 'static,
    {
        let Some(mut worker) = self.worker.take() else {
            return false;
        };

        let pool = AsyncComputeTaskPool::get_or_init(TaskPool::default);
        self.task = Some(pool.spawn(async move {
            let output = job(&mut worker);
            (worker, output)
        }));

        true
    }

    /// Non-blocking; yields the result once and returns the stage to idle.
    pub fn poll(&mut self) -> Option<T> {
        let task = self.task.as_mut()?;
        let (worker, output) = block_on(future::poll_once(task))?;

        self.task = None;
        self.worker = Some(worker);
        Some(output)
    }

    /// Blocks until the in-flight request, if any, completes.
    pub fn wait(&mut self) -> Option<T> {
        let task = self.task.take()?;
        let (worker, output) = block_on(task);

        self.worker = Some(worker);
        Some(output)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn busy_stage_rejects_submissions() {
        let (release, gate) = mpsc::channel::<()>();
        let mut stage = Stage::new("test", 0u32);

        assert!(stage.try_submit(move |count| {
            let _ = gate.recv();
            *count += 1;
            *count
        }));
        assert_eq!(stage.state(), StageState::Busy);
        assert!(stage.worker().is_none());

        assert!(!stage.try_submit(|count| *count + 100));

        release.send(()).unwrap();
        assert_eq!(stage.wait(), Some(1));
        assert!(stage.is_idle());
        assert_eq!(stage.worker(), Some(&1));
    }

    #[test]
    fn poll_eventually_returns_once() {
        let mut stage = Stage::new("test", String::from("a"));
        assert!(stage.poll().is_none());

        assert!(stage.try_submit(|name| {
            name.push('b');
            name.len()
        }));

        let result = loop {
            if let Some(result) = stage.poll() {
                break result;
            }
            std::thread::yield_now();
        };

        assert_eq!(result, 2);
        assert!(stage.poll().is_none());
        assert_eq!(stage.worker().map(String::as_str), Some("ab"));
    }
}
