//! Interactive shell.
//!
//! A line-driven surface: each line is an intent for the coordinator, while
//! context events are rendered as they arrive.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use aoc_dispatch_core::{DispatchConfig, Error, Part, Selection};

use crate::colors;
use crate::terminal::{self, TerminalCoordinator, TerminalSurface};

const HELP: &str = "\
Commands:
  run [FILE]          run both parts (FILE replaces the current input)
  input FILE          load puzzle input without running
  select YEAR DAY     switch day and preload its modules
  stop                stop the current run
  reset               clear results
  status              show the current state
  help                show this message
  quit                exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Run(Option<PathBuf>),
    Input(PathBuf),
    Select(Selection),
    Stop,
    Reset,
    Status,
    Help,
    Quit,
}

fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (name, args.as_slice()) {
        ("run", []) => Command::Run(None),
        ("run", [file]) => Command::Run(Some(PathBuf::from(file))),
        ("input", [file]) => Command::Input(PathBuf::from(file)),
        ("select", [year, day]) => {
            let year = year
                .parse()
                .map_err(|_| format!("invalid year: {}", year))?;
            let day = day.parse().map_err(|_| format!("invalid day: {}", day))?;
            Command::Select(Selection::new(year, day))
        }
        ("stop", []) => Command::Stop,
        ("reset", []) => Command::Reset,
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(format!("unrecognized command: {}", line.trim())),
    };
    Ok(Some(command))
}

/// Execute the shell until `quit` or end of input.
pub async fn execute(config: &DispatchConfig, selection: Selection) -> anyhow::Result<()> {
    println!(
        "\n{}aoc shell{} - {}{} day {}{}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        selection.year,
        selection.day,
        colors::RESET
    );
    println!("{}Type `help` for commands.{}", colors::DIM, colors::RESET);

    let (mut coordinator, mut events) = terminal::open(config, TerminalSurface::new(selection))?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt();
    loop {
        tokio::select! {
            envelope = events.recv() => match envelope {
                Some(envelope) => {
                    let was_running = coordinator.phase().is_running();
                    coordinator.handle(envelope);
                    if was_running && !coordinator.phase().is_running() {
                        prompt();
                    }
                }
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => apply(&mut coordinator, command),
                    Ok(None) => {}
                    Err(message) => report(&message),
                }
                prompt();
            }
        }
    }

    coordinator.shutdown();
    Ok(())
}

fn apply(coordinator: &mut TerminalCoordinator, command: Command) {
    let result = match command {
        Command::Run(file) => {
            if let Some(file) = file
                && let Err(message) = load_input(coordinator, file)
            {
                report(&message);
                return;
            }
            coordinator.on_run()
        }
        Command::Input(file) => {
            if let Err(message) = load_input(coordinator, file) {
                report(&message);
            }
            Ok(())
        }
        Command::Select(selection) => {
            if let Err(e) = selection.key(Part::One) {
                report(&e.to_string());
                return;
            }
            coordinator.surface_mut().selection = selection;
            coordinator.on_selection_changed()
        }
        Command::Stop => coordinator.on_stop(),
        Command::Reset => coordinator.on_reset(),
        Command::Status => {
            print_status(coordinator);
            Ok(())
        }
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    match result {
        Ok(()) => {}
        Err(Error::ExecutionInProgress) => report("a run is already in progress; `stop` it first"),
        Err(e) => report(&e.to_string()),
    }
}

fn load_input(coordinator: &mut TerminalCoordinator, file: PathBuf) -> Result<(), String> {
    let input = std::fs::read_to_string(&file)
        .map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
    println!(
        "{}Loaded {} bytes from {}{}",
        colors::DIM,
        input.len(),
        file.display(),
        colors::RESET
    );
    coordinator.surface_mut().input = input;
    Ok(())
}

fn print_status(coordinator: &TerminalCoordinator) {
    let selection = coordinator.surface().selection;
    println!(
        "{} day {} - {:?} (context {})",
        selection.year,
        selection.day,
        coordinator.phase(),
        coordinator
            .live_generation()
            .map(|generation| generation.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    for part in Part::ALL {
        let slot = coordinator.slot(part);
        println!(
            "  Part {}: {}{}{}",
            part,
            colors::for_severity(slot.severity()),
            slot.text(),
            colors::RESET
        );
    }
}

fn report(message: &str) {
    println!("{}error:{} {}", colors::RED, colors::RESET, message);
}

fn prompt() {
    print!("{}aoc>{} ", colors::BOLD, colors::RESET);
    colors::flush_stdout();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("run"), Ok(Some(Command::Run(None))));
        assert_eq!(
            parse("run inputs/day01.txt"),
            Ok(Some(Command::Run(Some(PathBuf::from("inputs/day01.txt")))))
        );
        assert_eq!(
            parse("  select 2022 7 "),
            Ok(Some(Command::Select(Selection::new(2022, 7))))
        );
        assert_eq!(parse("exit"), Ok(Some(Command::Quit)));
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(parse("select 2022").is_err());
        assert!(parse("select year 7").is_err());
        assert!(parse("stop now").is_err());
        assert!(parse("launch").is_err());
    }
}
