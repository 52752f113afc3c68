//! Run state: the pipeline phase and what each part slot shows.

use crate::error::FailureKind;
use crate::key::Part;

pub const PROCESSING_TEXT: &str = "Processing...";
pub const QUEUED_TEXT: &str = "Queued";
pub const STOPPED_TEXT: &str = "Execution stopped";
pub const CANCELLED_TEXT: &str = "Cancelled";

/// Where the part 1 → part 2 pipeline is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Part1Running,
    Part2Running,
    Completed,
    Errored,
    Stopped,
}

impl Phase {
    pub fn is_running(self) -> bool {
        self.running_part().is_some()
    }

    /// The part whose outcome is awaited, if any.
    pub fn running_part(self) -> Option<Part> {
        match self {
            Phase::Part1Running => Some(Part::One),
            Phase::Part2Running => Some(Part::Two),
            _ => None,
        }
    }
}

/// How the surface should style a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Contents of one part's result slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Empty,
    Queued,
    Running,
    Done(String),
    Failed(String),
    Cancelled,
    Stopped,
}

impl SlotState {
    /// Failure text for a run outcome.
    pub fn failed(kind: FailureKind, message: &str) -> Self {
        let text = match kind {
            FailureKind::Load => format!("Solver module unavailable.\n{}", message),
            FailureKind::Runtime => format!(
                "An error has occurred while running the program.\n\
                 Please check that the provided input is correct.\n{}",
                message
            ),
        };
        SlotState::Failed(text)
    }

    /// Waiting on this slot: either dispatched or next in line.
    pub fn is_pending(&self) -> bool {
        matches!(self, SlotState::Queued | SlotState::Running)
    }

    pub fn text(&self) -> &str {
        match self {
            SlotState::Empty => "",
            SlotState::Queued => QUEUED_TEXT,
            SlotState::Running => PROCESSING_TEXT,
            SlotState::Done(text) | SlotState::Failed(text) => text,
            SlotState::Cancelled => CANCELLED_TEXT,
            SlotState::Stopped => STOPPED_TEXT,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            SlotState::Empty | SlotState::Queued | SlotState::Running => Severity::Info,
            SlotState::Done(_) => Severity::Success,
            SlotState::Cancelled | SlotState::Stopped => Severity::Warning,
            SlotState::Failed(_) => Severity::Error,
        }
    }
}
