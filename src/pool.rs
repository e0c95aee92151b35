use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_utils::CachePadded;

use crate::error::{bail, ErrorKind, PoolError, Result};
use crate::hook_arg::HookArg;
use crate::logging;
use crate::passport::{Passport, PassportInner};
use crate::queue::{Job, JobQueue};
use crate::state::PoolState;
use crate::unwind;
use crate::worker::{self, WorkerHandle, WorkerMeta};

/// How often `init`/`shutdown`/`destroy` poll their respective atomic
/// counters while waiting for them to settle (§5, §9: the design
/// explicitly allows short-sleep polling in place of a condvar here).
const POLL_INTERVAL: Duration = Duration::from_micros(200);

pub(crate) type StartEndHook = dyn Fn(&WorkerHandle) + Send + Sync;

/// An opaque, `Copy` identity for a pool that outlives the pool itself:
/// the diagnostic API surface accepts this instead of a live pool
/// reference, so a call made after the pool was destroyed never needs to
/// dereference anything (§4.5, §9).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PoolId(usize);

pub(crate) struct PoolInner {
    id: AtomicUsize,
    name_prefix: String,
    num_threads: usize,

    // Every worker touches these on every job; padding them keeps that
    // traffic off the cache line the mostly-read-only config fields above
    // sit on.
    num_threads_alive: CachePadded<AtomicUsize>,
    num_threads_working: CachePadded<AtomicUsize>,

    queue: Mutex<JobQueue>,
    get_job_cv: Condvar,
    put_job_cv: Condvar,

    idle_mutex: Mutex<()>,
    all_idle_cv: Condvar,

    threads_keepalive: AtomicBool,
    threads_active: AtomicBool,

    start_hook: Option<Box<StartEndHook>>,
    end_hook: Option<Box<StartEndHook>>,

    passport: Arc<PassportInner>,

    join_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PoolInner {
    pub(crate) fn id(&self) -> PoolId {
        PoolId(self.id.load(Ordering::Relaxed))
    }

    pub(crate) fn num_threads_alive(&self) -> usize {
        self.num_threads_alive.load(Ordering::Acquire)
    }

    pub(crate) fn num_threads_working(&self) -> usize {
        self.num_threads_working.load(Ordering::Acquire)
    }

    fn is_current_thread_self(&self) -> bool {
        worker::current_thread_is_worker_of(self.id())
    }

    /// §4.3 `put_job`.
    fn put_job(&self, job: Job) -> Result<()> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            let keepalive = self.threads_keepalive.load(Ordering::SeqCst);
            let active = self.threads_active.load(Ordering::SeqCst);
            if keepalive && (!active || queue.is_full()) {
                queue = self.put_job_cv.wait(queue).unwrap();
                continue;
            }
            break;
        }
        if !self.threads_keepalive.load(Ordering::SeqCst) {
            bail!(ErrorKind::Canceled, "pool is shutting down");
        }
        let was_empty = queue.len() == 0;
        queue.push(job);
        if was_empty {
            self.get_job_cv.notify_all();
        }
        Ok(())
    }

    /// §4.3 `get_job`. Returns `None` on a canceled (shutting down) queue.
    fn get_job(&self) -> Option<Job> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            let keepalive = self.threads_keepalive.load(Ordering::SeqCst);
            let active = self.threads_active.load(Ordering::SeqCst);
            if keepalive && (queue.len() == 0 || !active) {
                queue = self.get_job_cv.wait(queue).unwrap();
                continue;
            }
            break;
        }
        if !self.threads_keepalive.load(Ordering::SeqCst) {
            return None;
        }
        let was_full = queue.is_full();
        let job = queue.pop();
        if was_full {
            self.put_job_cv.notify_all();
        }
        job
    }

    pub(crate) fn add_work(&self, job: Job) -> Result<()> {
        self.passport.gate(|| self.put_job(job))
    }

    /// §4.4 `wait`.
    pub(crate) fn wait(&self) -> Result<()> {
        self.passport.gate(|| {
            if self.is_current_thread_self() {
                bail!(ErrorKind::Inval, "a pool's own worker may not call wait() on it");
            }
            let mut idle_guard = self.idle_mutex.lock().unwrap();
            loop {
                let queue = self.queue.lock().unwrap();
                let drained = queue.len() == 0 && self.num_threads_working() == 0;
                if drained {
                    // Flip `active` while still holding the very lock we
                    // just read `len`/`working` under, so no worker can
                    // slip a dequeue in between observing idle and
                    // quiescing taking effect (§4.4).
                    self.threads_active.store(false, Ordering::SeqCst);
                    drop(queue);
                    break;
                }
                drop(queue);
                idle_guard = self.all_idle_cv.wait(idle_guard).unwrap();
            }
            drop(idle_guard);
            Ok(())
        })
    }

    /// §4.4 `reactivate`.
    pub(crate) fn reactivate(&self) -> Result<()> {
        self.passport.gate(|| {
            let _queue = self.queue.lock().unwrap();
            self.threads_active.store(true, Ordering::SeqCst);
            self.get_job_cv.notify_all();
            self.put_job_cv.notify_all();
            Ok(())
        })
    }

    /// §4.1 `shutdown`.
    pub(crate) fn shutdown(&self) -> Result<()> {
        if self.is_current_thread_self() {
            bail!(ErrorKind::Inval, "a pool's own worker may not call shutdown() on it");
        }
        self.passport
            .transition(PoolState::Alive, PoolState::ShuttingDown)
            .map_err(|observed| {
                PoolError::new(
                    ErrorKind::Inval,
                    format!("shutdown requires ALIVE, observed {}", observed.describe()),
                )
            })?;

        {
            let guard = unwind::AbortIfPanic;
            let _queue = self.queue.lock().unwrap();
            self.threads_keepalive.store(false, Ordering::SeqCst);
            self.threads_active.store(false, Ordering::SeqCst);
            self.get_job_cv.notify_all();
            self.put_job_cv.notify_all();
            std::mem::forget(guard);
        }

        while self.num_threads_alive() > 0 {
            thread::sleep(POLL_INTERVAL);
        }
        // `shutdown` itself is not gated (it runs outside `passport.gate`),
        // so it holds no in-flight slot of its own: wait for every other
        // already-admitted `add_work`/`wait`/`reactivate` call to finish.
        while self.passport.num_api_use() > 0 {
            thread::sleep(POLL_INTERVAL);
        }

        self.queue.lock().unwrap().clear();

        self.passport
            .transition(PoolState::ShuttingDown, PoolState::Shutdown)
            .unwrap_or_else(|observed| {
                logging::fatal(format_args!(
                    "shutdown: expected to land in SHUTTING_DOWN, observed {}",
                    observed.describe()
                ))
            });
        Ok(())
    }

    /// §4.1 `destroy`.
    pub(crate) fn destroy(self: Arc<Self>) -> Result<()> {
        if self.is_current_thread_self() {
            bail!(ErrorKind::Inval, "a pool's own worker may not call destroy() on it");
        }

        loop {
            match self.passport.state() {
                PoolState::Alive => {
                    log::warn!(
                        "corethpool: destroy() called on an ALIVE pool; shutting down implicitly"
                    );
                    self.shutdown()?;
                }
                PoolState::ShuttingDown => thread::sleep(POLL_INTERVAL),
                PoolState::Shutdown => break,
                other => bail!(
                    ErrorKind::Inval,
                    "destroy requires SHUTDOWN (or ALIVE/SHUTTING_DOWN to auto-shutdown), observed {}",
                    other.describe()
                ),
            }
        }

        self.passport
            .transition(PoolState::Shutdown, PoolState::Destroying)
            .map_err(|observed| {
                PoolError::new(
                    ErrorKind::Inval,
                    format!("destroy lost the race into DESTROYING, observed {}", observed.describe()),
                )
            })?;

        let guard = unwind::AbortIfPanic;
        let handles = std::mem::take(&mut *self.join_handles.lock().unwrap());
        std::mem::forget(guard);
        for handle in handles {
            let _ = handle.join();
        }

        self.passport.transition_or_fatal(PoolState::Destroying, PoolState::Destroyed);
        Ok(())
    }
}

/// The main worker loop (§4.2).
fn main_loop(pool: Arc<PoolInner>, meta: WorkerMeta) {
    pool.num_threads_alive.fetch_add(1, Ordering::AcqRel);

    let handle = meta.handle();
    if let Some(ref hook) = pool.start_hook {
        if let Err(payload) = unwind::halt_unwinding(|| hook(&handle)) {
            log_hook_panic("start_hook", &handle, payload);
        }
    }

    while pool.threads_keepalive.load(Ordering::SeqCst) {
        let job = match pool.get_job() {
            Some(job) => job,
            None => break,
        };

        pool.num_threads_working.fetch_add(1, Ordering::AcqRel);
        let handle = meta.handle();
        if let Err(payload) = unwind::halt_unwinding(|| job.run(&handle)) {
            log_hook_panic("task", &handle, payload);
        }
        let new = pool.num_threads_working.fetch_sub(1, Ordering::AcqRel) - 1;

        if new == 0 {
            let _idle_guard = pool.idle_mutex.lock().unwrap();
            pool.all_idle_cv.notify_all();
        }
    }

    let handle = meta.handle();
    if let Some(ref hook) = pool.end_hook {
        if let Err(payload) = unwind::halt_unwinding(|| hook(&handle)) {
            log_hook_panic("end_hook", &handle, payload);
        }
    }

    pool.num_threads_alive.fetch_sub(1, Ordering::AcqRel);
}

fn log_hook_panic(where_: &str, handle: &WorkerHandle<'_>, _payload: unwind::PanicPayload) {
    log::error!(
        "corethpool: {} panicked on worker {} ({}); the pool continues",
        where_,
        handle.id(),
        handle.name()
    );
}

fn worker_display_name(prefix: &str, id: usize) -> String {
    let full = format!("{}-{:x}", prefix, id);
    if full.chars().count() > 15 {
        full.chars().take(15).collect()
    } else {
        full
    }
}

/// Configuration accepted by `Pool::new`, built with `PoolBuilder`.
pub struct PoolConfig {
    pub(crate) name_prefix: String,
    pub(crate) num_threads: usize,
    pub(crate) work_num_max: usize,
    pub(crate) start_hook: Option<Box<StartEndHook>>,
    pub(crate) end_hook: Option<Box<StartEndHook>>,
    pub(crate) hook_arg: Option<Box<dyn std::any::Any + Send + Sync>>,
    pub(crate) hook_arg_destructor:
        Option<Box<dyn Fn(&(dyn std::any::Any + Send + Sync)) + Send + Sync>>,
    pub(crate) passport: Option<Passport>,
}

/// A handle to a running pool (`init`'s return value in the design). Not
/// `Clone`: the pool's workers, queue, and synchronization primitives have
/// exactly one owner, matching §3 ("Pool exclusively owns ...").
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// `thpool_init` (§6). Blocks until every successfully-created worker
    /// reports alive.
    pub fn new(config: PoolConfig) -> Result<Pool> {
        let PoolConfig {
            name_prefix,
            num_threads,
            work_num_max,
            start_hook,
            end_hook,
            hook_arg,
            hook_arg_destructor,
            passport,
        } = config;

        if num_threads == 0 {
            bail!(ErrorKind::Inval, "num_threads must be > 0");
        }

        let passport = match passport {
            Some(p) => p,
            None => Passport::new(),
        };
        let passport_inner = Arc::clone(&passport.inner);

        let hook_arg_shared = hook_arg.map(|value| HookArg::new(value, hook_arg_destructor));

        let inner = Arc::new(PoolInner {
            id: AtomicUsize::new(0),
            name_prefix: name_prefix.clone(),
            num_threads,
            num_threads_alive: CachePadded::new(AtomicUsize::new(0)),
            num_threads_working: CachePadded::new(AtomicUsize::new(0)),
            queue: Mutex::new(JobQueue::new(work_num_max)),
            get_job_cv: Condvar::new(),
            put_job_cv: Condvar::new(),
            idle_mutex: Mutex::new(()),
            all_idle_cv: Condvar::new(),
            threads_keepalive: AtomicBool::new(true),
            threads_active: AtomicBool::new(true),
            start_hook,
            end_hook,
            passport: passport_inner.clone(),
            join_handles: Mutex::new(Vec::with_capacity(num_threads)),
        });

        let id = PoolId(Arc::as_ptr(&inner) as usize);
        inner.id.store(id.0, Ordering::Relaxed);

        if let Err(err) = passport_inner.bind(id, Arc::downgrade(&inner), name_prefix.clone()) {
            return Err(err);
        }

        let mut spawned = 0usize;
        let mut handles = Vec::with_capacity(num_threads);
        for worker_id in 0..num_threads {
            let name = worker_display_name(&name_prefix, worker_id);
            let meta = WorkerMeta::new(worker_id, name.clone(), hook_arg_shared.clone());
            let pool_clone = Arc::clone(&inner);
            let spawn_result = thread::Builder::new().name(name).spawn(move || {
                worker::run_as_worker_of(id, || main_loop(pool_clone, meta));
            });
            match spawn_result {
                Ok(handle) => {
                    handles.push(handle);
                    spawned += 1;
                }
                Err(err) => {
                    log::warn!("corethpool: failed to spawn worker {}: {}", worker_id, err);
                }
            }
        }

        if spawned == 0 {
            passport_inner.rollback_to_unbind();
            bail!(ErrorKind::NoMem, "no worker thread could be started");
        }

        *inner.join_handles.lock().unwrap() = handles;

        // Drop our own "+1" hook-arg reference now that we've committed to
        // success (§4.6): each spawned worker holds its own clone via its
        // `WorkerMeta`, so this function's local clone is no longer needed.
        drop(hook_arg_shared);

        while inner.num_threads_alive() < spawned {
            thread::sleep(POLL_INTERVAL);
        }

        Ok(Pool { inner })
    }

    /// An opaque, `Copy` identity for this pool, usable with the
    /// diagnostic `*_debug_conc` surface after the pool itself is gone.
    pub fn id(&self) -> PoolId {
        self.inner.id()
    }

    pub fn add_work(&self, job: Job) -> Result<()> {
        self.inner.add_work(job)
    }

    pub fn wait(&self) -> Result<()> {
        self.inner.wait()
    }

    pub fn reactivate(&self) -> Result<()> {
        self.inner.reactivate()
    }

    /// Not gated: a pure read of an atomic counter has no illegal-state
    /// failure mode to report. The gated diagnostic twin is
    /// `Passport::num_threads_working_debug_conc`.
    pub fn num_threads_working(&self) -> usize {
        self.inner.num_threads_working()
    }

    pub fn num_threads_alive(&self) -> usize {
        self.inner.num_threads_alive()
    }

    pub fn shutdown(&self) -> Result<()> {
        self.inner.shutdown()
    }

    /// `thpool_destroy` (§6). Consumes the handle: after this returns,
    /// there is no `Pool` value left to misuse.
    pub fn destroy(self) -> Result<()> {
        self.inner.destroy()
    }

    pub fn add_work_debug_conc(&self, passport: &Passport, job: Job) -> Result<()> {
        passport.add_work_debug_conc(self.id(), job)
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name_prefix", &self.inner.name_prefix)
            .field("num_threads", &self.inner.num_threads)
            .field("num_threads_alive", &self.num_threads_alive())
            .field("num_threads_working", &self.num_threads_working())
            .field("state", &self.inner.passport.state())
            .finish()
    }
}

