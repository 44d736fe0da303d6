//! ABY3 error types.

use serde::{Deserialize, Serialize};

/// Common error type used throughout.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, thiserror::Error)]
pub enum Error {
    #[error("Invalid party id {0}, expected 0, 1, or 2")]
    InvalidParty(usize),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Networking error: {0}")]
    Networking(String),

    #[error("PRNG stream {0} has not been seeded")]
    UnseededStream(usize),

    #[error("Mpc protocol name is not initialized")]
    ProtocolNameUninitialized,

    #[error("Unrecognized mpc protocol: {0}")]
    UnknownProtocol(String),

    #[error("Mpc instance is not initialized")]
    Uninitialized,

    #[error("Mpc instance already initialized with a different configuration")]
    AlreadyInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Kernel error: {0}")]
    KernelError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
