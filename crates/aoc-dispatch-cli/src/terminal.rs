//! Terminal surface for the dispatch coordinator.

use tokio::sync::mpsc;

use aoc_dispatch_core::{
    ContextFactory, Coordinator, DispatchConfig, Envelope, Part, Selection, Severity, Surface,
    factory_for,
};

use crate::colors;

pub type TerminalCoordinator = Coordinator<TerminalSurface, Box<dyn ContextFactory>>;

/// Prints status lines as they change.
pub struct TerminalSurface {
    pub selection: Selection,
    pub input: String,
}

impl TerminalSurface {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            input: String::new(),
        }
    }
}

impl Surface for TerminalSurface {
    fn selection(&self) -> Selection {
        self.selection
    }

    fn input(&self) -> String {
        self.input.clone()
    }

    fn render_status(&mut self, part: Part, text: &str, severity: Severity) {
        if text.is_empty() {
            return;
        }
        println!(
            "{}Part {}:{} {}{}{}",
            colors::BOLD,
            part,
            colors::RESET,
            colors::for_severity(severity),
            text,
            colors::RESET
        );
    }

    fn render_ready(&mut self) {
        tracing::debug!("Execution context ready");
    }

    fn render_details(&mut self, part: Part, elapsed_ms: u64, language: &str) {
        println!(
            "{}        part {} took {} ms ({}){}",
            colors::DIM,
            part,
            elapsed_ms,
            language,
            colors::RESET
        );
    }
}

/// Build a coordinator for `config` and start its first context.
pub fn open(
    config: &DispatchConfig,
    surface: TerminalSurface,
) -> anyhow::Result<(TerminalCoordinator, mpsc::UnboundedReceiver<Envelope>)> {
    let factory = factory_for(config)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let mut coordinator = Coordinator::new(surface, factory, tx);
    coordinator.start()?;
    Ok((coordinator, rx))
}
