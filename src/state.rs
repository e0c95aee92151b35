use std::sync::atomic::{AtomicU8, Ordering};

use crate::logging;

/// The pool/passport lifecycle, a single tagged sum type rather than a set
/// of independent booleans (§9: "do not encode it as independent
/// booleans").
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PoolState {
    /// A passport not yet bound to any pool.
    Unbind = 0,
    Alive = 1,
    ShuttingDown = 2,
    Shutdown = 3,
    Destroying = 4,
    Destroyed = 5,
}

impl PoolState {
    fn from_u8(v: u8) -> PoolState {
        match v {
            0 => PoolState::Unbind,
            1 => PoolState::Alive,
            2 => PoolState::ShuttingDown,
            3 => PoolState::Shutdown,
            4 => PoolState::Destroying,
            5 => PoolState::Destroyed,
            other => logging::fatal(format_args!("observed impossible pool state tag {}", other)),
        }
    }

    fn name(self) -> &'static str {
        match self {
            PoolState::Unbind => "UNBIND",
            PoolState::Alive => "ALIVE",
            PoolState::ShuttingDown => "SHUTTING_DOWN",
            PoolState::Shutdown => "SHUTDOWN",
            PoolState::Destroying => "DESTROYING",
            PoolState::Destroyed => "DESTROYED",
        }
    }
}

/// Atomic storage for `PoolState` with the monotonic CAS transitions the
/// lifecycle state machine requires (§4.1).
pub(crate) struct AtomicPoolState(AtomicU8);

impl AtomicPoolState {
    pub(crate) fn new(initial: PoolState) -> Self {
        AtomicPoolState(AtomicU8::new(initial as u8))
    }

    pub(crate) fn load(&self) -> PoolState {
        PoolState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Attempts `from -> to`. Retries only while the CAS observes `from`
    /// itself (a spurious failure); if it observes any other state, that is
    /// reported back as `Err` with the state actually observed rather than
    /// retried, per §4.1's tie-break rule.
    pub(crate) fn transition(&self, from: PoolState, to: PoolState) -> Result<(), PoolState> {
        loop {
            match self
                .0
                .compare_exchange_weak(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Ok(()),
                Err(observed) if observed == from as u8 => continue,
                Err(observed) => return Err(PoolState::from_u8(observed)),
            }
        }
    }

    /// Like `transition`, but an unexpected observed state is a fatal
    /// invariant violation (used for transitions the core itself drives
    /// under an exclusive section, where any other observed state can only
    /// mean corrupted bookkeeping).
    pub(crate) fn transition_or_fatal(&self, from: PoolState, to: PoolState) {
        if let Err(observed) = self.transition(from, to) {
            logging::fatal(format_args!(
                "illegal lifecycle transition: expected {}, observed {}",
                from.name(),
                observed.name()
            ));
        }
    }

    pub(crate) fn store(&self, to: PoolState) {
        self.0.store(to as u8, Ordering::SeqCst);
    }
}

impl PoolState {
    pub(crate) fn describe(self) -> &'static str {
        self.name()
    }
}
