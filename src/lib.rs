//! A fixed-size worker-thread pool around a bounded, shared FIFO job queue.
//!
//! The pool is a single allocation (`Pool`) exclusively owning its workers,
//! its queue, and its synchronization primitives. Jobs are plain closures;
//! backpressure on a bounded queue blocks the submitter rather than growing
//! without limit. The pool moves through a six-state lifecycle —
//! `UNBIND -> ALIVE -> SHUTTING_DOWN -> SHUTDOWN -> DESTROYING -> DESTROYED`
//! — tracked by a [`Passport`], which can optionally be kept around after
//! the pool itself is destroyed to diagnose use-after-free-shaped misuse
//! through the `*_debug_conc` methods.
//!
//! This is deliberately not a work-stealing pool, does not resize at
//! runtime, and carries no task priorities, deadlines, or per-task result
//! channels: see the crate's design notes for the full list of what is out
//! of scope.

mod builder;
mod error;
mod hook_arg;
mod logging;
mod passport;
mod pool;
mod queue;
mod state;
mod unwind;
mod worker;

pub use builder::PoolBuilder;
pub use error::{ErrorKind, PoolError, Result};
pub use passport::Passport;
pub use pool::{Pool, PoolId};
pub use queue::Job;
pub use state::PoolState;
pub use worker::WorkerHandle;
