//! Dispatch coordinator.
//!
//! Translates surface intents into requests for the live execution context
//! and turns the context's responses into slot updates. Runs on the
//! surface's thread and consumes one [`Envelope`] at a time:
//!
//! ```text
//! Idle ──run──▶ Part1Running ──result──▶ Part2Running ──result──▶ Completed
//!                   │  │                     │  │
//!                   │  └──────error──────────┼──┴──▶ Errored
//!                   └─────────stop───────────┴─────▶ Stopped
//! ```
//!
//! Part 2 is only dispatched once part 1 has succeeded, so at most one run
//! request is outstanding per session.

mod session;
mod state;
mod surface;

pub use session::Session;
pub use state::{
    CANCELLED_TEXT, PROCESSING_TEXT, Phase, QUEUED_TEXT, STOPPED_TEXT, Severity, SlotState,
};
pub use surface::Surface;

use crate::error::{Error, FailureKind, Result};
use crate::execute::{ContextEvent, ContextFactory, Envelope, EventSender, Generation};
use crate::ipc::{Request, Response};
use crate::key::{Part, Selection};

/// Selection and input captured when a run was accepted.
#[derive(Debug, Clone)]
struct ActiveRun {
    selection: Selection,
    input: String,
}

/// Drives one session's run pipeline.
pub struct Coordinator<S, F> {
    surface: S,
    session: Session<F>,
    phase: Phase,
    slots: [SlotState; 2],
    active: Option<ActiveRun>,
}

impl<S: Surface, F: ContextFactory> Coordinator<S, F> {
    /// Every context spawned for this session reports through `events`;
    /// feed what arrives on the other end to [`handle`](Self::handle).
    pub fn new(surface: S, factory: F, events: EventSender) -> Self {
        Self {
            surface,
            session: Session::new(factory, events),
            phase: Phase::Idle,
            slots: Default::default(),
            active: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn slot(&self, part: Part) -> &SlotState {
        &self.slots[part.index()]
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn live_generation(&self) -> Option<Generation> {
        self.session.live_generation()
    }

    /// Spawn the first context and warm the cache for the current selection.
    pub fn start(&mut self) -> Result<()> {
        self.session.ensure_context()?;
        self.preload()
    }

    /// Load both parts of the current selection ahead of a run.
    pub fn preload(&mut self) -> Result<()> {
        let selection = self.surface.selection();
        for part in Part::ALL {
            let key = selection.key(part)?;
            tracing::debug!("Preloading {}", key);
            self.session.send(Request::Load { key })?;
        }
        Ok(())
    }

    pub fn on_selection_changed(&mut self) -> Result<()> {
        self.preload()
    }

    /// Start the pipeline with part 1.
    pub fn on_run(&mut self) -> Result<()> {
        if self.phase.is_running() {
            return Err(Error::ExecutionInProgress);
        }

        let selection = self.surface.selection();
        let key = selection.key(Part::One)?;
        let input = self.surface.input();

        self.active = Some(ActiveRun {
            selection,
            input: input.clone(),
        });
        self.phase = Phase::Part1Running;
        self.set_slot(Part::One, SlotState::Running);
        self.set_slot(Part::Two, SlotState::Queued);

        tracing::info!("Running {}", selection_label(selection));
        if let Err(e) = self.session.send(Request::Run { key, input }) {
            self.abort_run(&e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Destroy the running context and start a fresh one.
    ///
    /// The replacement starts with an empty cache and loads modules when a
    /// run asks for them. The stop takes effect even if the replacement
    /// fails to spawn; that error is returned and the next intent retries.
    pub fn on_stop(&mut self) -> Result<()> {
        if !self.phase.is_running() {
            return Err(Error::InvalidOperation("nothing is running".to_string()));
        }

        for part in Part::ALL {
            if self.slot(part).is_pending() {
                self.set_slot(part, SlotState::Stopped);
            }
        }
        self.phase = Phase::Stopped;
        self.active = None;

        tracing::info!("Stopping execution");
        self.session.respawn()
    }

    /// Clear both slots. The context and its cache are left alone.
    pub fn on_reset(&mut self) -> Result<()> {
        if self.phase.is_running() {
            return Err(Error::InvalidOperation(
                "cannot reset while running".to_string(),
            ));
        }

        for part in Part::ALL {
            self.set_slot(part, SlotState::Empty);
        }
        self.phase = Phase::Idle;
        self.active = None;
        Ok(())
    }

    /// End the session permanently.
    pub fn shutdown(&mut self) {
        self.session.close();
        self.active = None;
    }

    /// Consume one event from any context of this session.
    pub fn handle(&mut self, envelope: Envelope) {
        if !self.session.is_live(envelope.generation) {
            tracing::debug!(
                "Discarding message from stale context {}",
                envelope.generation
            );
            return;
        }

        match envelope.event {
            ContextEvent::Response(response) => self.handle_response(response),
            ContextEvent::Lost { reason } => self.handle_lost(envelope.generation, &reason),
        }
    }

    fn handle_response(&mut self, response: Response) {
        match response {
            Response::Ready => self.surface.render_ready(),
            Response::LoadFailed { key, message } => {
                tracing::warn!("Preload of {} failed: {}", key, message);
            }
            Response::Solved {
                part,
                result,
                elapsed_ms,
                language,
            } => {
                if self.phase.running_part() != Some(part) {
                    tracing::warn!("Ignoring unexpected result for part {}", part);
                    return;
                }
                self.set_slot(part, SlotState::Done(result));
                self.surface.render_details(part, elapsed_ms, &language);

                match part {
                    Part::One => self.dispatch_part_two(),
                    Part::Two => {
                        self.phase = Phase::Completed;
                        self.active = None;
                    }
                }
            }
            Response::Failed {
                part,
                kind,
                message,
            } => {
                if self.phase.running_part() != Some(part) {
                    tracing::warn!("Ignoring unexpected error for part {}", part);
                    return;
                }
                self.fail_run(part, kind, &message);
            }
        }
    }

    fn dispatch_part_two(&mut self) {
        let Some(active) = self.active.clone() else {
            return;
        };

        let key = match active.selection.key(Part::Two) {
            Ok(key) => key,
            Err(e) => {
                self.abort_run(&e.to_string());
                return;
            }
        };

        self.phase = Phase::Part2Running;
        self.set_slot(Part::Two, SlotState::Running);
        if let Err(e) = self.session.send(Request::Run {
            key,
            input: active.input,
        }) {
            self.abort_run(&e.to_string());
        }
    }

    fn fail_run(&mut self, part: Part, kind: FailureKind, message: &str) {
        self.set_slot(part, SlotState::failed(kind, message));
        if part == Part::One {
            self.set_slot(Part::Two, SlotState::Cancelled);
        }
        self.phase = Phase::Errored;
        self.active = None;
    }

    /// Fail every pending slot with a dispatch-level message.
    fn abort_run(&mut self, message: &str) {
        for part in Part::ALL {
            if self.slot(part).is_pending() {
                self.set_slot(part, SlotState::failed(FailureKind::Runtime, message));
            }
        }
        self.phase = Phase::Errored;
        self.active = None;
    }

    fn handle_lost(&mut self, generation: Generation, reason: &str) {
        tracing::error!("Execution context {} lost: {}", generation, reason);
        if self.phase.is_running() {
            self.abort_run(&format!("Execution context {} lost: {}", generation, reason));
        }

        // Successors load on demand and are never preloaded.
        if let Err(e) = self.session.respawn() {
            tracing::warn!("Context stays down until the next intent: {}", e);
        }
    }

    fn set_slot(&mut self, part: Part, state: SlotState) {
        self.surface
            .render_status(part, state.text(), state.severity());
        self.slots[part.index()] = state;
    }
}

fn selection_label(selection: Selection) -> String {
    format!("{} day {}", selection.year, selection.day)
}
