//! Execution contexts.
//!
//! ```text
//!  Coordinator ──Request──▶ ExecutionContext ──▶ ContextRuntime ──▶ ModuleCache
//!       ▲                   (thread | process)                         │
//!       └──────────── Envelope { generation, event } ◀────────────────┘
//! ```
//!
//! Two flavours exist. [`ThreadContext`] runs the loop on a dedicated
//! thread inside the host; [`ProcessContext`] runs it in an `aoc-worker`
//! process that can be killed outright.

mod context;
mod process;
mod runtime;
mod thread;

pub use context::{ContextEvent, ContextFactory, Envelope, EventSender, ExecutionContext, Generation};
pub use process::{ProcessContext, ProcessContextFactory, factory_for};
pub use runtime::ContextRuntime;
pub use thread::{ThreadContext, ThreadContextFactory};
