//! Inter-process communication with `aoc-worker` processes.
//!
//! This module provides the request/response protocol spoken by every
//! execution context and the handle used to drive a worker process.

pub mod protocol;
mod worker;

pub use protocol::{Request, Response, read_message, write_message};
pub use worker::WorkerHandle;
