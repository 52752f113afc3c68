//! Run command implementation.
//!
//! Runs both parts of one day headlessly. Ctrl+C stops the run.

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use aoc_dispatch_core::{DispatchConfig, Phase, Selection};

use crate::colors;
use crate::terminal::{self, TerminalSurface};

/// Execute both parts and fail if either did.
pub async fn execute(
    config: &DispatchConfig,
    selection: Selection,
    input_path: Option<&Path>,
) -> anyhow::Result<()> {
    let input = match input_path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read input {}: {}", path.display(), e))?,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        }
    };

    println!(
        "\n{}Running{} {}{} day {}{}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        selection.year,
        selection.day,
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    let start = Instant::now();
    let mut surface = TerminalSurface::new(selection);
    surface.input = input;
    let (mut coordinator, mut events) = terminal::open(config, surface)?;
    coordinator.on_run()?;

    while coordinator.phase().is_running() {
        tokio::select! {
            envelope = events.recv() => match envelope {
                Some(envelope) => coordinator.handle(envelope),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if let Err(e) = coordinator.on_stop() {
                    tracing::warn!("Stopped without a replacement context: {}", e);
                }
            }
        }
    }
    coordinator.shutdown();

    println!("{}", "─".repeat(50));
    match coordinator.phase() {
        Phase::Completed => {
            println!(
                "{}Completed{} in {:.2}s",
                colors::GREEN,
                colors::RESET,
                start.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Phase::Stopped => anyhow::bail!("Execution stopped"),
        _ => anyhow::bail!("Run failed"),
    }
}
