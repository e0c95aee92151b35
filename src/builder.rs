use std::any::Any;

use crate::error::Result;
use crate::passport::Passport;
use crate::pool::{Pool, PoolConfig, StartEndHook};

/// Fluent builder for a [`Pool`], mirroring the teacher's own
/// `ThreadPoolBuilder`: every knob defaults to something reasonable, and
/// `build()` is the only place that can fail.
#[derive(Default)]
pub struct PoolBuilder {
    name_prefix: Option<String>,
    num_threads: usize,
    work_num_max: usize,
    start_hook: Option<Box<StartEndHook>>,
    end_hook: Option<Box<StartEndHook>>,
    hook_arg: Option<Box<dyn Any + Send + Sync>>,
    hook_arg_destructor: Option<Box<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>>,
    passport: Option<Passport>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        PoolBuilder::default()
    }

    /// The prefix used to derive each worker's display name
    /// (`"<prefix>-<hex_id>"`, §4.7). Defaults to `"pool"`.
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// The fixed number of worker threads. Required: `build()` fails with
    /// `ErrorKind::Inval` if this is left at `0`.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// The job queue's maximum length. `0` (the default) means unbounded
    /// (§3, §4.3).
    pub fn work_num_max(mut self, max: usize) -> Self {
        self.work_num_max = max;
        self
    }

    /// A hook run once by each worker before it starts pulling jobs (§4.2).
    pub fn start_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&crate::worker::WorkerHandle) + Send + Sync + 'static,
    {
        self.start_hook = Some(Box::new(hook));
        self
    }

    /// A hook run once by each worker after its last job, just before it
    /// exits (§4.2).
    pub fn end_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&crate::worker::WorkerHandle) + Send + Sync + 'static,
    {
        self.end_hook = Some(Box::new(hook));
        self
    }

    /// A value shared read-only across every worker and reachable from
    /// hooks/tasks via [`crate::worker::WorkerHandle::hook_arg`] (§4.6). An
    /// optional `destructor` runs exactly once, when the last reference
    /// (the pool's own, or a worker's, whichever drops last) is released.
    pub fn hook_arg<T, D>(mut self, value: T, destructor: Option<D>) -> Self
    where
        T: Any + Send + Sync + 'static,
        D: Fn(&T) + Send + Sync + 'static,
    {
        self.hook_arg = Some(Box::new(value));
        self.hook_arg_destructor = destructor.map(|d| {
            let boxed: Box<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync> =
                Box::new(move |any: &(dyn Any + Send + Sync)| {
                    if let Some(value) = any.downcast_ref::<T>() {
                        d(value)
                    }
                });
            boxed
        });
        self
    }

    /// Supplies an externally-owned passport instead of letting `build()`
    /// allocate one internally. Needed only when the caller wants to keep
    /// using the diagnostic `*_debug_conc` surface after the pool itself
    /// has been destroyed (§4.5, §4.8).
    pub fn passport(mut self, passport: Passport) -> Self {
        self.passport = Some(passport);
        self
    }

    /// `thpool_init` (§6): builds and starts the pool.
    pub fn build(self) -> Result<Pool> {
        let config = PoolConfig {
            name_prefix: self.name_prefix.unwrap_or_else(|| "pool".to_string()),
            num_threads: self.num_threads,
            work_num_max: self.work_num_max,
            start_hook: self.start_hook,
            end_hook: self.end_hook,
            hook_arg: self.hook_arg,
            hook_arg_destructor: self.hook_arg_destructor,
            passport: self.passport,
        };
        Pool::new(config)
    }
}
