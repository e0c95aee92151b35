use std::fmt;

/// The kind of failure reported by a `corethpool` operation.
///
/// Mirrors the error taxonomy in the design: every public fallible
/// operation reports one of these, never a raw panic or an unchecked
/// invariant violation (those are logged at `fatal` and abort instead).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad argument, illegal lifecycle state, passport/pool mismatch, or a
    /// pool-owned thread invoking an operation forbidden on its own pool.
    Inval,
    /// A queue operation was interrupted by `shutdown`.
    Canceled,
    /// Allocation failed during `init` or while enqueuing a job.
    NoMem,
    /// The passport passed to `init` was already bound to another pool.
    Rebind,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Inval => "invalid argument or illegal state",
            ErrorKind::Canceled => "operation canceled by shutdown",
            ErrorKind::NoMem => "allocation failed",
            ErrorKind::Rebind => "passport already bound to another pool",
        }
    }
}

/// The error type returned by every fallible `corethpool` operation.
#[derive(Debug)]
pub struct PoolError {
    kind: ErrorKind,
    message: String,
}

impl PoolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        PoolError {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for PoolError {}

pub type Result<T> = std::result::Result<T, PoolError>;

macro_rules! bail {
    ($kind:expr, $($arg:tt)*) => {
        return Err($crate::error::PoolError::new($kind, format!($($arg)*)))
    };
}

pub(crate) use bail;
