//! Bounded worker pool with keyed jobs.
//!
//! Jobs carry a [`JobKey`]. Two jobs whose keys share a pod and application
//! never run at the same time, and a key that is already waiting in the
//! queue is not queued a second time.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::domain::value_objects::AppName;

/// What a job works on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey {
    pub pod: String,
    /// `None` for jobs covering every application of the pod
    pub app: Option<AppName>,
    /// Subdirectory of the checkout, when the job covers only one
    pub dir: Option<String>,
}

impl JobKey {
    pub fn pod(pod: impl Into<String>) -> Self {
        Self {
            pod: pod.into(),
            app: None,
            dir: None,
        }
    }

    pub fn app(pod: impl Into<String>, app: AppName) -> Self {
        Self {
            pod: pod.into(),
            app: Some(app),
            dir: None,
        }
    }

    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    fn exclusion(&self) -> (String, Option<AppName>) {
        (self.pod.clone(), self.app)
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Queued {
    key: JobKey,
    job: Job,
}

#[derive(Default)]
struct Shared {
    queued: Mutex<HashSet<JobKey>>,
    exclusive: Mutex<HashMap<(String, Option<AppName>), Arc<Mutex<()>>>>,
    in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl Shared {
    fn queued(&self) -> MutexGuard<'_, HashSet<JobKey>> {
        lock(&self.queued)
    }

    fn exclusion_lock(&self, key: &JobKey) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.exclusive);
        Arc::clone(locks.entry(key.exclusion()).or_default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct WorkerPool {
    sender: Option<Sender<Queued>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Pool with `size` worker threads (at least one)
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Queued>();
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(Shared::default());

        let workers = (0..size.max(1))
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(&receiver, &shared))
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
            shared,
        }
    }

    /// Queue `job` under `key`.
    ///
    /// Returns `false` when an identical key is already waiting; the new job
    /// is dropped since the queued one will observe the same state.
    pub fn submit<F>(&self, key: JobKey, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return false;
        };
        if !self.shared.queued().insert(key.clone()) {
            tracing::debug!(pod = %key.pod, "job already queued, coalescing");
            return false;
        }
        let queued = Queued {
            key: key.clone(),
            job: Box::new(job),
        };
        if sender.send(queued).is_err() {
            self.shared.queued().remove(&key);
            return false;
        }
        true
    }

    /// Jobs waiting for a worker
    pub fn pending(&self) -> usize {
        self.shared.queued().len()
    }

    /// Jobs currently running
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Jobs finished so far, including ones that panicked
    pub fn completed(&self) -> usize {
        self.shared.completed.load(Ordering::SeqCst)
    }

    /// Stop accepting work, finish everything queued and wait for the workers
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Queued>>, shared: &Shared) {
    loop {
        let next = lock(receiver).recv();
        let Ok(Queued { key, job }) = next else {
            break;
        };

        // Dequeued before running so that changes made during the run queue
        // a fresh job.
        shared.queued().remove(&key);

        let exclusion = shared.exclusion_lock(&key);
        let _held = lock(&exclusion);

        shared.in_flight.fetch_add(1, Ordering::SeqCst);
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(pod = %key.pod, "sync job panicked");
        }
        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        shared.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn runs_every_job_before_join_returns() {
        let pool = WorkerPool::new(3);
        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(JobKey::pod(format!("pod-{i}")), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.join();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn same_key_is_coalesced_while_queued() {
        let pool = WorkerPool::new(1);
        let gate = Arc::new(Mutex::new(()));
        let blocker = gate.lock().unwrap();

        // Occupy the only worker so the following jobs stay queued.
        let held = Arc::clone(&gate);
        pool.submit(JobKey::pod("busy"), move || {
            let _wait = held.lock();
        });
        while pool.in_flight() == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        let key = JobKey::app("dev-onezone-0", AppName::OzWorker).with_dir("src");
        assert!(pool.submit(key.clone(), || {}));
        assert!(!pool.submit(key.clone(), || {}));
        assert!(pool.submit(key.clone().with_dir("priv"), || {}));
        assert_eq!(pool.pending(), 2);

        drop(blocker);
        pool.join();
    }

    #[test]
    fn same_pod_and_app_never_overlap() {
        let pool = WorkerPool::new(4);
        let busy = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));

        for dir in ["_build", "priv", "src", "include"] {
            let busy = Arc::clone(&busy);
            let overlapped = Arc::clone(&overlapped);
            let key = JobKey::app("dev-onezone-0", AppName::OzWorker).with_dir(dir);
            pool.submit(key, move || {
                if busy.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_millis(10));
                busy.store(false, Ordering::SeqCst);
            });
        }
        pool.join();
        assert!(!overlapped.load(Ordering::SeqCst));
    }

    #[test]
    fn panicking_job_does_not_kill_the_pool() {
        let pool = WorkerPool::new(1);
        let ran = Arc::new(AtomicBool::new(false));
        pool.submit(JobKey::pod("a"), || panic!("boom"));
        let flag = Arc::clone(&ran);
        pool.submit(JobKey::pod("b"), move || flag.store(true, Ordering::SeqCst));
        pool.join();
        assert!(ran.load(Ordering::SeqCst));
    }
}
