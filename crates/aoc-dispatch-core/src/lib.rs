//! Dispatch engine for per-day puzzle solvers.
//!
//! This crate provides:
//! - Solver identity and artifact naming
//! - Dynamic module loading with a single-flight cache
//! - Isolated execution contexts (worker thread or worker process)
//! - The request/response protocol between coordinator and context
//! - The part 1 → part 2 dispatch coordinator with stop and respawn

pub mod config;
pub mod coordinator;
pub mod error;
pub mod execute;
pub mod ipc;
pub mod key;
pub mod module;

pub use config::{DispatchConfig, Isolation};
pub use coordinator::{Coordinator, Phase, Severity, SlotState, Surface};
pub use error::{Error, FailureKind, LoadError, Result};
pub use execute::{
    ContextEvent, ContextFactory, ContextRuntime, Envelope, EventSender, ExecutionContext,
    Generation, ProcessContextFactory, ThreadContextFactory, factory_for,
};
pub use ipc::{Request, Response};
pub use key::{Part, Selection, SolverKey};
pub use module::{DylibLoader, ModuleCache, ModuleLoader, Solver, SolverHandle};
