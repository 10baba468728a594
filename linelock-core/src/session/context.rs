use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::models::error::HarnessError;
use crate::models::scenario::ContextId;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Process-wide UI-affine context, created on first use and never torn down.
static UI_AFFINE: Mutex<Option<Arc<ExecutionContext>>> = Mutex::new(None);

/// A thread with a private FIFO queue of operations.
///
/// `submit` blocks the caller until the job has run on the context's thread.
/// Dropping a context closes its queue and joins the thread once queued jobs
/// have drained.
pub struct ExecutionContext {
    id: ContextId,
    thread_name: String,
    sender: Option<mpsc::Sender<Job>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ExecutionContext {
    /// Allocate a dedicated worker thread.
    pub fn worker(n: u32) -> Result<Self, HarnessError> {
        Self::spawn(ContextId::Worker(n), format!("linelock-worker-{}", n))
    }

    /// The single UI-affine context shared by the whole process.
    pub fn ui_affine() -> Result<Arc<Self>, HarnessError> {
        let mut slot = UI_AFFINE.lock();
        if let Some(context) = slot.as_ref() {
            return Ok(Arc::clone(context));
        }
        let context = Arc::new(Self::spawn(ContextId::UiAffine, "linelock-ui".into())?);
        *slot = Some(Arc::clone(&context));
        Ok(context)
    }

    fn spawn(id: ContextId, thread_name: String) -> Result<Self, HarnessError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let name = thread_name.clone();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                log::debug!("Context thread {} started", name);
                while let Ok(job) = receiver.recv() {
                    // Keep the context alive if an operation panics; the
                    // submitter sees the dropped reply channel.
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!("Operation panicked on {}", name);
                    }
                }
                log::debug!("Context thread {} stopped", name);
            })
            .map_err(|e| HarnessError::Backend(format!("failed to spawn {}: {}", thread_name, e)))?;

        Ok(Self {
            id,
            thread_name,
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Run `job` on this context and wait for its result.
    pub fn submit<T, F>(&self, job: F) -> Result<T, HarnessError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let closed = || HarnessError::ContextClosed(self.thread_name.clone());
        let sender = self.sender.as_ref().ok_or_else(closed)?;

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        sender
            .send(Box::new(move || {
                let _ = reply_tx.send(job());
            }))
            .map_err(|_| closed())?;

        reply_rx.recv().map_err(|_| closed())
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Context thread {} panicked during shutdown", self.thread_name);
            }
        }
    }
}

/// A value produced on some context, with where and when it ran.
#[derive(Debug)]
pub struct Executed<T> {
    pub value: T,
    pub thread_name: String,
    pub started: Instant,
    pub finished: Instant,
    pub started_at: DateTime<Utc>,
}

pub(crate) fn timed<T>(job: impl FnOnce() -> T) -> Executed<T> {
    let started_at = Utc::now();
    let started = Instant::now();
    let value = job();
    let finished = Instant::now();
    Executed {
        value,
        thread_name: thread::current().name().unwrap_or("unnamed").to_string(),
        started,
        finished,
        started_at,
    }
}

/// The contexts of one scenario run.
///
/// Workers live as long as the pool; the UI-affine context is borrowed from
/// the process-wide singleton. `Coordinator` jobs run inline on the calling
/// thread.
#[derive(Default)]
pub struct ContextPool {
    workers: BTreeMap<u32, ExecutionContext>,
    ui: Option<Arc<ExecutionContext>>,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create every context in `ids` up front.
    pub fn for_contexts(ids: &[ContextId]) -> Result<Self, HarnessError> {
        let mut pool = Self::new();
        for id in ids {
            pool.ensure(*id)?;
        }
        Ok(pool)
    }

    pub fn ensure(&mut self, id: ContextId) -> Result<(), HarnessError> {
        match id {
            ContextId::Worker(n) => {
                if !self.workers.contains_key(&n) {
                    self.workers.insert(n, ExecutionContext::worker(n)?);
                }
            }
            ContextId::UiAffine => {
                if self.ui.is_none() {
                    self.ui = Some(ExecutionContext::ui_affine()?);
                }
            }
            ContextId::Coordinator => {}
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run `job` on context `id`, blocking until it completes there.
    pub fn run<T, F>(&self, id: ContextId, job: F) -> Result<Executed<T>, HarnessError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let context = match id {
            ContextId::Coordinator => return Ok(timed(job)),
            ContextId::Worker(n) => self.workers.get(&n),
            ContextId::UiAffine => self.ui.as_deref(),
        };
        let context =
            context.ok_or_else(|| HarnessError::ContextClosed(format!("{} (not created)", id)))?;
        context.submit(move || timed(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn worker_runs_jobs_on_its_own_thread() {
        let context = ExecutionContext::worker(1).unwrap();
        let name = context
            .submit(|| thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(name.as_deref(), Some("linelock-worker-1"));
        assert_eq!(context.id(), ContextId::Worker(1));
    }

    #[test]
    fn jobs_run_in_submission_order() {
        let context = Arc::new(ExecutionContext::worker(1).unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let log = Arc::clone(&log);
            context.submit(move || log.lock().push(i)).unwrap();
        }
        assert_eq!(*log.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn fifo_order_with_concurrent_submitters() {
        let context = Arc::new(ExecutionContext::worker(1).unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let context = Arc::clone(&context);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    for i in 0..10 {
                        let seen = Arc::clone(&seen);
                        context.submit(move || seen.lock().push((t, i))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // jobs are serialized and each submitter's order is preserved
        let seen = seen.lock();
        assert_eq!(seen.len(), 40);
        for t in 0..4 {
            let per_thread: Vec<_> = seen.iter().filter(|(s, _)| *s == t).map(|(_, i)| *i).collect();
            assert_eq!(per_thread, (0..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn distinct_workers_use_distinct_threads() {
        let pool = ContextPool::for_contexts(&[ContextId::Worker(1), ContextId::Worker(2)]).unwrap();
        let a = pool.run(ContextId::Worker(1), || thread::current().id()).unwrap();
        let b = pool.run(ContextId::Worker(2), || thread::current().id()).unwrap();
        assert_ne!(a.value, b.value);
        assert_eq!(a.thread_name, "linelock-worker-1");
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn ui_affine_is_a_singleton() {
        let first = ExecutionContext::ui_affine().unwrap();
        let second = ExecutionContext::ui_affine().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let pool = ContextPool::for_contexts(&[ContextId::UiAffine]).unwrap();
        let ran = pool.run(ContextId::UiAffine, || thread::current().id()).unwrap();
        assert_eq!(ran.thread_name, "linelock-ui");
        assert_eq!(first.submit(|| thread::current().id()).unwrap(), ran.value);
    }

    #[test]
    fn coordinator_runs_inline() {
        let pool = ContextPool::new();
        let ran = pool.run(ContextId::Coordinator, || thread::current().id()).unwrap();
        assert_eq!(ran.value, thread::current().id());
    }

    #[test]
    fn timing_covers_the_job() {
        let pool = ContextPool::for_contexts(&[ContextId::Worker(3)]).unwrap();
        let ran = pool
            .run(ContextId::Worker(3), || thread::sleep(Duration::from_millis(20)))
            .unwrap();
        assert!(ran.finished.duration_since(ran.started) >= Duration::from_millis(20));
    }

    struct ExitRecorder {
        exited: Arc<Mutex<Vec<String>>>,
    }

    impl Drop for ExitRecorder {
        fn drop(&mut self) {
            let name = thread::current().name().unwrap_or("unnamed").to_string();
            self.exited.lock().push(name);
        }
    }

    thread_local! {
        static EXIT_RECORDER: std::cell::RefCell<Option<ExitRecorder>> =
            const { std::cell::RefCell::new(None) };
    }

    #[test]
    fn dropping_the_pool_joins_its_workers() {
        let pool = ContextPool::for_contexts(&[ContextId::Worker(1), ContextId::Worker(2)]).unwrap();
        let exited = Arc::new(Mutex::new(Vec::new()));

        for n in [1, 2] {
            let exited = Arc::clone(&exited);
            pool.run(ContextId::Worker(n), move || {
                EXIT_RECORDER.with(|slot| *slot.borrow_mut() = Some(ExitRecorder { exited }));
            })
            .unwrap();
        }
        assert!(exited.lock().is_empty());

        drop(pool);

        let mut exited = exited.lock().clone();
        exited.sort();
        assert_eq!(exited, vec!["linelock-worker-1", "linelock-worker-2"]);
    }

    #[test]
    fn unknown_context_is_reported() {
        let pool = ContextPool::new();
        assert!(matches!(
            pool.run(ContextId::Worker(9), || ()),
            Err(HarnessError::ContextClosed(_))
        ));
    }

    #[test]
    fn panicking_job_does_not_kill_the_context() {
        let context = ExecutionContext::worker(1).unwrap();
        assert!(matches!(
            context.submit(|| panic!("boom")),
            Err::<(), _>(HarnessError::ContextClosed(_))
        ));
        assert_eq!(context.submit(|| 7).unwrap(), 7);
    }
}
