use std::any::Any;
use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::hook_arg::HookArg;
use crate::pool::PoolId;

thread_local! {
    /// Identifies which pool, if any, the current OS thread is a worker
    /// of. Used only to forbid a worker from calling `wait`/`shutdown`/
    /// `destroy` on its own pool (§4.1, §4.4), mirroring the teacher's own
    /// `WORKER_THREAD_STATE` thread-local used for the analogous
    /// same-registry check in `in_worker`.
    static CURRENT_WORKER_POOL: Cell<Option<PoolId>> = Cell::new(None);
}

/// Marks the current OS thread as a worker of `pool` for the lifetime of
/// the closure `f`. Only ever called once, from inside the worker's own
/// `main_loop`.
pub(crate) fn run_as_worker_of<R>(pool: PoolId, f: impl FnOnce() -> R) -> R {
    CURRENT_WORKER_POOL.with(|cell| cell.set(Some(pool)));
    let result = f();
    CURRENT_WORKER_POOL.with(|cell| cell.set(None));
    result
}

/// True if the calling thread is itself a worker of `pool`.
pub(crate) fn current_thread_is_worker_of(pool: PoolId) -> bool {
    CURRENT_WORKER_POOL.with(|cell| cell.get() == Some(pool))
}

/// Per-worker metadata: numeric id, display name, an opaque user context
/// slot, and the worker's own clone of the shared hook argument (if any).
/// Created during pool init, destroyed only during pool destroy after the
/// thread has exited (§3). No back-reference to the owning pool: a worker
/// that needs to reach the pool already receives one directly through its
/// `&WorkerHandle` parameter (§9's "pass a capability, not a reach-back
/// pointer").
pub(crate) struct WorkerMeta {
    id: usize,
    name: String,
    context: RefCell<Option<Box<dyn Any + Send>>>,
    hook_arg: RefCell<Option<Arc<HookArg>>>,
}

impl WorkerMeta {
    pub(crate) fn new(id: usize, name: String, hook_arg: Option<Arc<HookArg>>) -> Self {
        WorkerMeta {
            id,
            name,
            context: RefCell::new(None),
            hook_arg: RefCell::new(hook_arg),
        }
    }

    pub(crate) fn handle(&self) -> WorkerHandle<'_> {
        WorkerHandle { meta: self }
    }
}

impl Drop for WorkerMeta {
    fn drop(&mut self) {
        // If the worker never called `unref_hook_arg` itself, its clone is
        // released here, matching §4.6 ("worker-metadata destruction
        // performs the same unref if still held").
        self.hook_arg.borrow_mut().take();
    }
}

/// The capability handle passed to start/end hooks and to every task: it
/// is the only way hook/task code can reach this worker's identity,
/// context slot, or hook-argument clone (§9: "pass a direct worker handle
/// ... capability, not arithmetic").
pub struct WorkerHandle<'w> {
    meta: &'w WorkerMeta,
}

impl<'w> WorkerHandle<'w> {
    /// The worker's dense, 0-based id.
    pub fn id(&self) -> usize {
        self.meta.id
    }

    /// The worker's display name (`"<prefix>-<hex_id>"`, best-effort).
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Reads the worker's context slot as `T`, if it currently holds a
    /// `T`. Non-synchronized: only ever called on this worker's own
    /// thread (§4.7).
    pub fn get_context<T: 'static>(&self) -> Option<std::cell::Ref<'_, T>> {
        let borrow = self.meta.context.borrow();
        std::cell::Ref::filter_map(borrow, |opt| {
            opt.as_ref().and_then(|boxed| boxed.downcast_ref::<T>())
        })
        .ok()
    }

    /// Overwrites the worker's context slot.
    pub fn set_context<T: Send + 'static>(&self, value: T) {
        *self.meta.context.borrow_mut() = Some(Box::new(value));
    }

    /// Clears the worker's context slot.
    pub fn unset_context(&self) {
        self.meta.context.borrow_mut().take();
    }

    /// Reads the shared hook argument as `T`, if this worker still holds a
    /// reference to it and it is a `T`.
    pub fn hook_arg<T: 'static>(&self) -> Option<std::cell::Ref<'_, T>> {
        let borrow = self.meta.hook_arg.borrow();
        std::cell::Ref::filter_map(borrow, |opt| {
            opt.as_ref().and_then(|arg| arg.get::<T>())
        })
        .ok()
    }

    /// Releases this worker's reference to the shared hook argument early.
    /// If this was the last outstanding reference, the destructor runs
    /// here, inline, on this thread (§4.6).
    pub fn unref_hook_arg(&self) {
        self.meta.hook_arg.borrow_mut().take();
    }
}
