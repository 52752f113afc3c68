//! Execution context abstraction.
//!
//! An execution context is a sandbox that owns a module cache and answers
//! [`Request`]s with [`Response`]s. The coordinator talks to whichever
//! context is live through [`ExecutionContext`] and receives everything any
//! of its contexts emit on a single channel of [`Envelope`]s, each tagged
//! with the generation of the context that produced it.

use std::fmt;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::ipc::{Request, Response};

/// Identity of one context instance within a session.
///
/// Strictly increasing; a message whose generation differs from the live
/// context's is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub const FIRST: Generation = Generation(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a context can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEvent {
    /// A protocol response.
    Response(Response),
    /// The sandbox itself failed; the context is dead.
    Lost { reason: String },
}

/// A context event tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub generation: Generation,
    pub event: ContextEvent,
}

impl Envelope {
    pub fn response(generation: Generation, response: Response) -> Self {
        Self {
            generation,
            event: ContextEvent::Response(response),
        }
    }

    pub fn lost(generation: Generation, reason: impl Into<String>) -> Self {
        Self {
            generation,
            event: ContextEvent::Lost {
                reason: reason.into(),
            },
        }
    }
}

/// Sender half every context reports through.
pub type EventSender = mpsc::UnboundedSender<Envelope>;

/// A live execution context.
pub trait ExecutionContext: Send {
    fn generation(&self) -> Generation;

    /// Queue a request. Fails with `Error::ContextLost` if the sandbox is gone.
    fn send(&mut self, request: Request) -> Result<()>;

    /// Destroy the sandbox, abandoning any in-flight invocation. Idempotent.
    fn terminate(&mut self);

    fn is_alive(&mut self) -> bool;
}

/// Creates execution contexts.
pub trait ContextFactory: Send {
    fn spawn(&self, generation: Generation, events: EventSender)
    -> Result<Box<dyn ExecutionContext>>;
}

impl<F: ContextFactory + ?Sized> ContextFactory for Box<F> {
    fn spawn(
        &self,
        generation: Generation,
        events: EventSender,
    ) -> Result<Box<dyn ExecutionContext>> {
        (**self).spawn(generation, events)
    }
}
