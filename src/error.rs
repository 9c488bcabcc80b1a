use std::net::Ipv4Addr;

use thiserror::Error as ThisError;

pub type OpaqueError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(ThisError, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("truncated frame: expected at least {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },
    #[error("no local interface has a subnet containing {0}")]
    NoInterfaceFound(Ipv4Addr),
    #[error("failed to bind interface {interface}, reason: {source}")]
    BindError {
        interface: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to send request on {interface}, reason: {reason}")]
    SendError { interface: String, reason: String },
    #[error("all capture loops have stopped")]
    CaptureClosed,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Opaque(#[from] OpaqueError),
}

pub type Result<T> = std::result::Result<T, Error>;
