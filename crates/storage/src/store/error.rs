#![forbid(unsafe_code)]

use rusqlite::ErrorCode;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidInput(&'static str),
    /// The database lock was not acquired within the busy timeout.
    Busy,
    /// The increment would leave the i64 range; the stored value is untouched.
    Overflow {
        name: String,
    },
    /// An in-process store lock was poisoned by a panicking writer.
    Poisoned,
}

/// Whether a failed mutation may have been applied by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The store rejected the call before committing anything. Safe to retry.
    NotApplied,
    /// The call may or may not have committed. Retrying an increment can over-count.
    Unknown,
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQL",
            Self::InvalidInput(message) if message.starts_with("RESET_REQUIRED") => {
                "RESET_REQUIRED"
            }
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Busy => "BUSY",
            Self::Overflow { .. } => "OVERFLOW",
            Self::Poisoned => "POISONED",
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::InvalidInput(_) | Self::Busy | Self::Overflow { .. } | Self::Poisoned => {
                Outcome::NotApplied
            }
            Self::Io(_) | Self::Sql(_) => Outcome::Unknown,
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Busy => write!(f, "store busy (lock not acquired within busy timeout)"),
            Self::Overflow { name } => write!(f, "sequence overflow (name={name})"),
            Self::Poisoned => write!(f, "store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if is_busy(&value) {
            return Self::Busy;
        }
        Self::Sql(value)
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => matches!(
            code.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}

pub(crate) fn is_check_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_CHECK
                || (code.code == ErrorCode::ConstraintViolation
                    && message
                        .as_deref()
                        .is_some_and(|value| value.contains("CHECK constraint failed")))
        }
        _ => false,
    }
}
