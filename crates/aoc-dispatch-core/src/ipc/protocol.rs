//! Messages exchanged between the coordinator and an execution context.
//!
//! Messages are JSON objects tagged by `event`. Over the worker process pipe
//! each message is framed as a 4-byte length (u32 LE) followed by the JSON
//! body.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, FailureKind, Result};
use crate::key::{Part, SolverKey};

/// Largest accepted message body (100MB).
const MAX_MESSAGE_LEN: usize = 100 * 1024 * 1024;

/// Intent sent to an execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Request {
    /// Warm the module cache for a key; the result is discarded.
    Load { key: SolverKey },

    /// Load if needed, then invoke the solver.
    Run { key: SolverKey, input: String },

    /// Handshake. Unknown events decode to this as well, so it must stay
    /// the last variant.
    #[serde(other)]
    Init,
}

/// Notification sent back by an execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Response {
    /// Reply to [`Request::Init`].
    Ready,

    /// The solver produced an answer.
    #[serde(rename = "result")]
    Solved {
        part: Part,
        result: String,
        #[serde(rename = "elapsedMillis")]
        elapsed_ms: u64,
        language: String,
    },

    /// The run failed, either loading or inside the solver.
    #[serde(rename = "error")]
    Failed {
        part: Part,
        kind: FailureKind,
        message: String,
    },

    /// A preload failed. Informational only.
    LoadFailed { key: SolverKey, message: String },
}

/// Write a length-prefixed JSON message.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let bytes = serde_json::to_vec(message)
        .map_err(|e| Error::Serialization(format!("Failed to encode IPC message: {}", e)))?;

    let len = frame_len(bytes.len())?;

    writer
        .write_all(&len.to_le_bytes())
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message length: {}", e)))?;
    writer
        .write_all(&bytes)
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message body: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Ipc(format!("Failed to flush IPC stream: {}", e)))?;

    Ok(())
}

/// Length prefix for a body of `len` bytes.
///
/// Rejection happens before anything is written, so the stream stays usable.
fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|len| *len as usize <= MAX_MESSAGE_LEN)
        .ok_or(Error::MessageTooLarge {
            size: len,
            limit: MAX_MESSAGE_LEN,
        })
}

/// Read a length-prefixed JSON message.
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message length: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_LEN {
        return Err(Error::MessageTooLarge {
            size: len,
            limit: MAX_MESSAGE_LEN,
        });
    }

    let mut bytes = vec![0u8; len];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message body: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Serialization(format!("Failed to decode IPC message: {}", e)))
}
