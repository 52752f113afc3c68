use crate::key::{Part, Selection};

use super::state::Severity;

/// The interactive surface the coordinator reads from and renders into.
pub trait Surface {
    /// Currently selected year and day.
    fn selection(&self) -> Selection;

    /// Current puzzle input text.
    fn input(&self) -> String;

    /// Replace the status line of one part.
    fn render_status(&mut self, part: Part, text: &str, severity: Severity);

    /// The live execution context finished its handshake.
    fn render_ready(&mut self);

    /// Extra detail for a successful part.
    fn render_details(&mut self, _part: Part, _elapsed_ms: u64, _language: &str) {}
}
