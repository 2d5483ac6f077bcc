use std::fmt::{Display, Formatter};
use std::sync::{mpsc, PoisonError};

use config::ConfigError;
use tokio::sync::oneshot;

use crate::storage::page::PageId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Internal(String),
    /// The caller handed in something the callee can't work with,
    /// e.g., a frame id beyond the replacer capacity.
    InvalidArgument(String),
    /// The operation is not allowed in the current state of the target,
    /// e.g., removing a non-evictable frame from the replacer.
    InvalidState(String),
    Io(String),
    PageNotFound(PageId),
    SchedulerClosed,
    Config(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Internal(s) | Error::Config(s) => write!(f, "{}", s),
            Error::InvalidArgument(s) => write!(f, "invalid argument: {}", s),
            Error::InvalidState(s) => write!(f, "invalid state: {}", s),
            Error::Io(s) => write!(f, "I/O error: {}", s),
            Error::PageNotFound(page_id) => write!(f, "page {} not found", page_id),
            Error::SchedulerClosed => write!(f, "disk scheduler is closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::Internal(err.to_string())
    }
}

// the only thing we ever send is to the disk scheduler worker, a send
// failure means the worker is gone.
impl<T> From<mpsc::SendError<T>> for Error {
    fn from(_: mpsc::SendError<T>) -> Self {
        Error::SchedulerClosed
    }
}

impl From<oneshot::error::RecvError> for Error {
    fn from(_: oneshot::error::RecvError) -> Self {
        Error::SchedulerClosed
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<log::ParseLevelError> for Error {
    fn from(err: log::ParseLevelError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<log::SetLoggerError> for Error {
    fn from(err: log::SetLoggerError) -> Self {
        Error::Internal(err.to_string())
    }
}
