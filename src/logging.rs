//! The four leveled sinks the design calls for (`debug`/`info`/`warn`/
//! `error`/`fatal`) are not implemented here: they are resolved by the host
//! through the `log` crate's façade, exactly as an externally supplied sink
//! would be. This module only adds the one sink the core itself must
//! guarantee the behavior of: `fatal`, which terminates the process.

use std::fmt;

/// Logs `message` at error level tagged as fatal, then terminates the
/// process. Used for internal invariant violations only (e.g. a CAS that
/// should have landed in one state landing in another) — never for
/// ordinary user-facing errors, which are returned as a `PoolError`.
#[cold]
pub(crate) fn fatal(message: impl fmt::Display) -> ! {
    log::error!("corethpool: FATAL: {}", message);
    std::process::abort();
}
