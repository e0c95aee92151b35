use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::{bail, ErrorKind, Result};
use crate::pool::{PoolId, PoolInner};
use crate::state::{AtomicPoolState, PoolState};

/// The small, separately-lifetimed block the design calls the
/// "concurrency passport" (`ConcStateBlock`): it carries the pool's
/// lifecycle state and an in-flight API-use counter, so that a call made
/// after the pool itself is gone can be detected and rejected instead of
/// touching freed memory (§2, §4.5).
pub(crate) struct PassportInner {
    state: AtomicPoolState,
    num_api_use: AtomicUsize,
    bound: Mutex<Option<BoundPool>>,
}

struct BoundPool {
    id: PoolId,
    pool: Weak<PoolInner>,
    #[cfg(debug_assertions)]
    #[allow(dead_code)]
    name: String,
}

impl PassportInner {
    fn new() -> Arc<Self> {
        Arc::new(PassportInner {
            state: AtomicPoolState::new(PoolState::Unbind),
            num_api_use: AtomicUsize::new(0),
            bound: Mutex::new(None),
        })
    }

    pub(crate) fn state(&self) -> PoolState {
        self.state.load()
    }

    pub(crate) fn num_api_use(&self) -> usize {
        self.num_api_use.load(Ordering::Acquire)
    }

    /// `UNBIND -> ALIVE`, called once by `init`. Fails with `Rebind` if the
    /// passport was already bound to a (possibly different) pool.
    pub(crate) fn bind(&self, id: PoolId, pool: Weak<PoolInner>, name: String) -> Result<()> {
        self.state
            .transition(PoolState::Unbind, PoolState::Alive)
            .map_err(|_observed| {
                crate::error::PoolError::new(ErrorKind::Rebind, "passport already bound to a pool")
            })?;
        *self.bound.lock().unwrap() = Some(BoundPool {
            id,
            pool,
            #[cfg(debug_assertions)]
            name,
        });
        #[cfg(not(debug_assertions))]
        let _ = name;
        Ok(())
    }

    /// Rolls a just-bound passport back to `UNBIND`. Only ever called from
    /// `init`'s own failure-unwind path, before the passport has been
    /// observed `ALIVE` by anyone else (§4.8).
    pub(crate) fn rollback_to_unbind(&self) {
        self.state.store(PoolState::Unbind);
        self.bound.lock().unwrap().take();
    }

    pub(crate) fn transition(&self, from: PoolState, to: PoolState) -> std::result::Result<(), PoolState> {
        self.state.transition(from, to)
    }

    pub(crate) fn transition_or_fatal(&self, from: PoolState, to: PoolState) {
        self.state.transition_or_fatal(from, to);
    }

    /// The default API gate (§4.5): bumps the in-flight counter, runs `op`
    /// only while `ALIVE`, then decrements.
    pub(crate) fn gate<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        self.num_api_use.fetch_add(1, Ordering::AcqRel);
        let result = if self.state.load() != PoolState::Alive {
            Err(crate::error::PoolError::new(
                ErrorKind::Inval,
                "pool is not ALIVE",
            ))
        } else {
            op()
        };
        self.num_api_use.fetch_sub(1, Ordering::AcqRel);
        result
    }

    /// The diagnostic surface's gate: additionally verifies that `pool_id`
    /// is the pool this passport is bound to, and never dereferences the
    /// pool itself to make that check (§4.5).
    fn gate_for<T>(&self, pool_id: PoolId, op: impl FnOnce(Arc<PoolInner>) -> Result<T>) -> Result<T> {
        self.num_api_use.fetch_add(1, Ordering::AcqRel);
        let result = (|| {
            if self.state.load() != PoolState::Alive {
                bail!(ErrorKind::Inval, "pool is not ALIVE");
            }
            let bound = self.bound.lock().unwrap();
            let bound = match bound.as_ref() {
                Some(b) => b,
                None => bail!(ErrorKind::Inval, "passport is not bound to any pool"),
            };
            if bound.id != pool_id {
                bail!(ErrorKind::Inval, "passport is not bound to the given pool");
            }
            // `upgrade` is always memory-safe regardless of whether the
            // pool's allocation has already been freed: it returns `None`
            // rather than ever touching freed memory.
            match bound.pool.upgrade() {
                Some(pool) => op(pool),
                None => bail!(ErrorKind::Inval, "pool has been destroyed"),
            }
        })();
        self.num_api_use.fetch_sub(1, Ordering::AcqRel);
        result
    }
}

/// A handle to a passport. May be created by the user and supplied to
/// `PoolBuilder::passport` (outliving the pool is then the caller's
/// responsibility), or left unset, in which case `Pool::new` allocates one
/// internally and it is never observable outside the pool.
pub struct Passport {
    pub(crate) inner: Arc<PassportInner>,
}

impl Passport {
    pub fn new() -> Self {
        Passport {
            inner: PassportInner::new(),
        }
    }

    /// The pool lifecycle state as last observed through this passport.
    pub fn state(&self) -> PoolState {
        self.inner.state()
    }

    /// The diagnostic surface: safe to call even after the pool this
    /// passport was bound to has been destroyed. `pool` is the `PoolId`
    /// obtained from `Pool::id` while the pool was alive; it carries no
    /// borrow and keeps nothing alive.
    pub fn add_work_debug_conc(&self, pool: PoolId, job: crate::queue::Job) -> Result<()> {
        self.inner.gate_for(pool, |p| p.add_work(job))
    }

    pub fn wait_debug_conc(&self, pool: PoolId) -> Result<()> {
        self.inner.gate_for(pool, |p| p.wait())
    }

    pub fn reactivate_debug_conc(&self, pool: PoolId) -> Result<()> {
        self.inner.gate_for(pool, |p| p.reactivate())
    }

    pub fn num_threads_working_debug_conc(&self, pool: PoolId) -> Result<usize> {
        self.inner.gate_for(pool, |p| Ok(p.num_threads_working()))
    }

    pub fn shutdown_debug_conc(&self, pool: PoolId) -> Result<()> {
        self.inner.gate_for(pool, |p| p.shutdown())
    }
}

impl Default for Passport {
    fn default() -> Self {
        Passport::new()
    }
}

/// Cheap: clones the `Arc` around the shared passport state. A caller
/// keeps one clone to supply to `PoolBuilder::passport` and another to
/// keep using after the pool is destroyed (§4.5, §4.8).
impl Clone for Passport {
    fn clone(&self) -> Self {
        Passport {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for Passport {
    fn drop(&mut self) {
        // §4.8: "Passport destroy when bound-pool state is not UNBIND or
        // DESTROYED logs an error warning of likely UAF but proceeds (user
        // contract violation)." A well-behaved caller only drops its
        // passport after the pool has been shut down and destroyed.
        let state = self.inner.state();
        if state != PoolState::Unbind && state != PoolState::Destroyed {
            log::warn!(
                "corethpool: passport dropped while bound pool is still {:?}; likely a use-after-free waiting to happen",
                state
            );
        }
    }
}
