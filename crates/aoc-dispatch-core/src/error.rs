//! Error types for aoc-dispatch-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for aoc-dispatch-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in aoc-dispatch-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Year/day/part outside the accepted range.
    #[error("invalid solver key: {0}")]
    InvalidKey(String),

    /// Solver module could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Failed to start an execution context.
    #[error("failed to start execution context: {0}")]
    Spawn(String),

    /// The execution context died or stopped accepting messages.
    #[error("execution context lost: {0}")]
    ContextLost(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IPC communication error with the worker process.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// A message exceeds the IPC frame limit. Nothing was sent.
    #[error("IPC message too large: {size} bytes (limit {limit})")]
    MessageTooLarge { size: usize, limit: usize },

    /// Message encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A run is already in flight.
    #[error("execution already in progress")]
    ExecutionInProgress,

    /// Intent not valid in the current state (e.g. stop while idle).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Why a solver module could not be made ready.
///
/// Cloneable so that every caller joined on the same in-flight load
/// receives an identical error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No artifact exists for the key.
    #[error("module not found: {artifact}")]
    NotFound { artifact: String },

    /// The artifact exists but could not be instantiated.
    #[error("failed to instantiate {artifact}: {message}")]
    Instantiate { artifact: String, message: String },

    /// The module's initialization entry point reported failure.
    #[error("initialization of {artifact} failed with code {code}")]
    Init { artifact: String, code: i32 },

    /// The module does not export the invocation capability.
    #[error("{artifact} does not export `{symbol}`")]
    MissingCapability { artifact: String, symbol: String },
}

/// Which side of the solver boundary a failed run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The module could not be loaded.
    Load,
    /// The solver ran and failed (error return or panic).
    Runtime,
}
