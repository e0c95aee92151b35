use std::any::Any;
use std::sync::Arc;

/// The user-supplied hook argument, plus its optional destructor.
///
/// §4.6 asks for a hand-rolled refcount that reaches zero exactly once and
/// then runs a destructor. Rust's `Arc` already provides exactly that
/// bookkeeping via its strong count and `Drop` glue, so this wraps the
/// value in a type whose `Drop` impl runs the destructor, and lets `Arc`'s
/// own refcount do the counting: during init the pool holds one transient
/// clone (dropped once all workers are spawned) while each worker takes its
/// own, so the count settles at exactly `num_threads` after `Pool::new`
/// returns, one reference per worker and none held by the pool itself.
/// `unref_hook_arg` is simply "drop my clone early," and the last worker to
/// do so (or to exit) runs the destructor inline, on its own thread.
pub(crate) struct HookArg {
    value: Box<dyn Any + Send + Sync>,
    destructor: Option<Box<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>>,
}

impl HookArg {
    pub(crate) fn new(
        value: Box<dyn Any + Send + Sync>,
        destructor: Option<Box<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>>,
    ) -> Arc<HookArg> {
        Arc::new(HookArg { value, destructor })
    }

    pub(crate) fn get<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl Drop for HookArg {
    fn drop(&mut self) {
        if let Some(destructor) = &self.destructor {
            destructor(&*self.value);
        }
    }
}
