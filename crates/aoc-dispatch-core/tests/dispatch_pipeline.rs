//! End-to-end tests of the dispatch pipeline with in-process contexts.
//!
//! The coordinator drives real thread contexts backed by an in-memory
//! loader that records every load and invocation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use aoc_dispatch_core::coordinator::{Coordinator, Phase, Severity, SlotState, Surface};
use aoc_dispatch_core::execute::{Envelope, Generation, ThreadContextFactory};
use aoc_dispatch_core::module::{ModuleLoader, Solver, SolverHandle};
use aoc_dispatch_core::{LoadError, Part, Selection, SolverKey};

#[derive(Default)]
struct Journal {
    loads: Vec<SolverKey>,
    invocations: Vec<(SolverKey, String)>,
}

/// Loader whose solvers answer from a fixed table and record what they did.
#[derive(Clone, Default)]
struct ScriptedLoader {
    journal: Arc<Mutex<Journal>>,
    /// Holds part 1 inside `invoke` until set.
    release: Arc<AtomicBool>,
    hanging: Arc<AtomicBool>,
}

impl ScriptedLoader {
    fn loads_of(&self, key: SolverKey) -> usize {
        self.journal
            .lock()
            .unwrap()
            .loads
            .iter()
            .filter(|k| **k == key)
            .count()
    }

    fn invoked_parts(&self) -> Vec<Part> {
        self.journal
            .lock()
            .unwrap()
            .invocations
            .iter()
            .map(|(key, _)| key.part)
            .collect()
    }
}

struct ScriptedSolver {
    key: SolverKey,
    loader: ScriptedLoader,
}

impl Solver for ScriptedSolver {
    fn invoke(&self, input: &str) -> Result<String, String> {
        self.loader
            .journal
            .lock()
            .unwrap()
            .invocations
            .push((self.key, input.to_string()));

        if input == "hang" {
            self.loader.hanging.store(true, Ordering::SeqCst);
            while !self.loader.release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(10));
            }
            return Ok("late".to_string());
        }

        match (input, self.key.part) {
            ("abc", Part::One) => Ok("42".to_string()),
            ("abc", Part::Two) => Ok("1337".to_string()),
            ("blank", Part::One) => Ok(String::new()),
            ("blank", Part::Two) => Ok("0".to_string()),
            _ => Err(format!("cannot parse {:?}", input)),
        }
    }

    fn language(&self) -> &str {
        "Rust"
    }
}

impl ModuleLoader for ScriptedLoader {
    fn load(&self, key: SolverKey) -> Result<SolverHandle, LoadError> {
        self.journal.lock().unwrap().loads.push(key);
        // Day 2 has no part 1 module.
        if key.day == 2 && key.part == Part::One {
            return Err(LoadError::NotFound {
                artifact: key.artifact_name(),
            });
        }
        Ok(Arc::new(ScriptedSolver {
            key,
            loader: self.clone(),
        }))
    }
}

#[derive(Default)]
struct RecordingSurface {
    selection: Option<Selection>,
    input: String,
    statuses: Vec<(Part, String, Severity)>,
    details: Vec<(Part, String)>,
}

impl Surface for RecordingSurface {
    fn selection(&self) -> Selection {
        self.selection.unwrap_or(Selection::new(2023, 1))
    }

    fn input(&self) -> String {
        self.input.clone()
    }

    fn render_status(&mut self, part: Part, text: &str, severity: Severity) {
        self.statuses.push((part, text.to_string(), severity));
    }

    fn render_ready(&mut self) {}

    fn render_details(&mut self, part: Part, _elapsed_ms: u64, language: &str) {
        self.details.push((part, language.to_string()));
    }
}

type TestCoordinator = Coordinator<RecordingSurface, ThreadContextFactory>;

struct Harness {
    coordinator: TestCoordinator,
    events: mpsc::UnboundedReceiver<Envelope>,
    loader: ScriptedLoader,
}

impl Harness {
    fn start(selection: Selection, input: &str) -> Self {
        let loader = ScriptedLoader::default();
        let factory = ThreadContextFactory::new(Arc::new(loader.clone()));
        let (tx, events) = mpsc::unbounded_channel();
        let surface = RecordingSurface {
            selection: Some(selection),
            input: input.to_string(),
            ..RecordingSurface::default()
        };

        let mut coordinator = Coordinator::new(surface, factory, tx);
        coordinator.start().unwrap();
        Self {
            coordinator,
            events,
            loader,
        }
    }

    /// Feed events to the coordinator until `done` holds.
    async fn drive_until(&mut self, done: impl Fn(&TestCoordinator) -> bool) {
        let coordinator = &mut self.coordinator;
        let events = &mut self.events;
        tokio::time::timeout(Duration::from_secs(10), async {
            while !done(coordinator) {
                let envelope = events.recv().await.expect("event channel closed");
                coordinator.handle(envelope);
            }
        })
        .await
        .expect("timed out waiting for the coordinator");
    }

    async fn drive_until_settled(&mut self) {
        self.drive_until(|c| !c.phase().is_running()).await;
    }

    /// Drain whatever arrives within `window`.
    async fn drain_for(&mut self, window: Duration) {
        let _ = tokio::time::timeout(window, async {
            while let Some(envelope) = self.events.recv().await {
                self.coordinator.handle(envelope);
            }
        })
        .await;
    }

    async fn wait_for_hang(&self) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !self.loader.hanging.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("solver never started");
    }
}

fn key(year: u16, day: u8, part: Part) -> SolverKey {
    SolverKey::new(year, day, part).unwrap()
}

#[tokio::test]
async fn test_successful_part_one_dispatches_part_two() {
    let mut harness = Harness::start(Selection::new(2023, 1), "abc");
    harness.coordinator.on_run().unwrap();

    harness
        .drive_until(|c| c.phase() != Phase::Part1Running)
        .await;
    assert_eq!(
        harness.coordinator.slot(Part::One),
        &SlotState::Done("42".to_string())
    );
    assert_eq!(harness.coordinator.phase(), Phase::Part2Running);

    harness.drive_until_settled().await;
    assert_eq!(harness.coordinator.phase(), Phase::Completed);
    assert_eq!(
        harness.coordinator.slot(Part::Two),
        &SlotState::Done("1337".to_string())
    );
    assert_eq!(harness.loader.invoked_parts(), vec![Part::One, Part::Two]);
    assert_eq!(
        harness.coordinator.surface().details,
        vec![(Part::One, "Rust".to_string()), (Part::Two, "Rust".to_string())]
    );
}

#[tokio::test]
async fn test_part_two_follows_empty_part_one_answer() {
    let mut harness = Harness::start(Selection::new(2023, 1), "blank");
    harness.coordinator.on_run().unwrap();
    harness.drive_until_settled().await;

    assert_eq!(harness.coordinator.phase(), Phase::Completed);
    assert_eq!(harness.coordinator.slot(Part::One), &SlotState::Done(String::new()));
    assert_eq!(harness.coordinator.slot(Part::Two), &SlotState::Done("0".to_string()));
}

#[tokio::test]
async fn test_part_one_runtime_failure_skips_part_two() {
    let mut harness = Harness::start(Selection::new(2023, 1), "hello");
    harness.coordinator.on_run().unwrap();
    harness.drive_until_settled().await;

    // Part 1 failed to parse, so part 2 never ran.
    assert_eq!(harness.coordinator.phase(), Phase::Errored);
    assert_eq!(harness.loader.invoked_parts(), vec![Part::One]);
    assert!(
        harness
            .coordinator
            .slot(Part::One)
            .text()
            .starts_with("An error has occurred while running the program.")
    );
}

#[tokio::test]
async fn test_missing_module_cancels_part_two() {
    let mut harness = Harness::start(Selection::new(2023, 2), "abc");
    harness.coordinator.on_run().unwrap();
    harness.drive_until_settled().await;

    assert_eq!(harness.coordinator.phase(), Phase::Errored);
    assert!(
        harness
            .coordinator
            .slot(Part::One)
            .text()
            .contains("module not found")
    );
    assert_eq!(harness.coordinator.slot(Part::Two), &SlotState::Cancelled);
    assert!(harness.loader.invoked_parts().is_empty());

    let cancelled = harness
        .coordinator
        .surface()
        .statuses
        .iter()
        .any(|(part, text, _)| *part == Part::Two && text == "Cancelled");
    assert!(cancelled);
}

#[tokio::test]
async fn test_stop_then_run_uses_fresh_context() {
    let mut harness = Harness::start(Selection::new(2023, 1), "hang");
    harness.coordinator.on_run().unwrap();
    harness.wait_for_hang().await;

    harness.coordinator.on_stop().unwrap();
    assert_eq!(harness.coordinator.phase(), Phase::Stopped);
    assert_eq!(harness.coordinator.slot(Part::One), &SlotState::Stopped);
    assert_eq!(harness.coordinator.slot(Part::Two), &SlotState::Stopped);
    assert_eq!(
        harness.coordinator.live_generation(),
        Some(Generation::new(2))
    );

    // Let the abandoned solver finish; nothing it produces is rendered.
    harness.loader.release.store(true, Ordering::SeqCst);
    harness.drain_for(Duration::from_millis(200)).await;
    assert_eq!(harness.coordinator.slot(Part::One), &SlotState::Stopped);

    harness.coordinator.surface_mut().input = "abc".to_string();
    harness.coordinator.on_run().unwrap();
    harness.drive_until_settled().await;

    assert_eq!(harness.coordinator.phase(), Phase::Completed);
    assert_eq!(
        harness.coordinator.slot(Part::Two),
        &SlotState::Done("1337".to_string())
    );
}

#[tokio::test]
async fn test_preload_then_run_loads_once() {
    let mut harness = Harness::start(Selection::new(2023, 1), "abc");

    // start() already preloaded both parts; run right away.
    harness.coordinator.on_run().unwrap();
    harness.drive_until_settled().await;

    assert_eq!(harness.coordinator.phase(), Phase::Completed);
    assert_eq!(harness.loader.loads_of(key(2023, 1, Part::One)), 1);
    assert_eq!(harness.loader.loads_of(key(2023, 1, Part::Two)), 1);
}

#[tokio::test]
async fn test_selection_change_preloads_new_day() {
    let mut harness = Harness::start(Selection::new(2023, 1), "abc");
    harness.coordinator.surface_mut().selection = Some(Selection::new(2024, 5));
    harness.coordinator.on_selection_changed().unwrap();

    let loader = harness.loader.clone();
    tokio::time::timeout(Duration::from_secs(10), async {
        while loader.loads_of(key(2024, 5, Part::Two)) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("preload never happened");

    harness.coordinator.on_run().unwrap();
    harness.drive_until_settled().await;
    assert_eq!(harness.loader.loads_of(key(2024, 5, Part::One)), 1);
    assert_eq!(harness.loader.loads_of(key(2024, 5, Part::Two)), 1);
}

#[tokio::test]
async fn test_input_edits_during_run_do_not_reach_part_two() {
    let mut harness = Harness::start(Selection::new(2023, 1), "abc");
    harness.coordinator.on_run().unwrap();
    harness.coordinator.surface_mut().input = "edited".to_string();
    harness.drive_until_settled().await;

    assert_eq!(harness.coordinator.phase(), Phase::Completed);
    let journal = harness.loader.journal.lock().unwrap();
    assert!(journal.invocations.iter().all(|(_, input)| input == "abc"));
}

#[tokio::test]
async fn test_reset_after_completion() {
    let mut harness = Harness::start(Selection::new(2023, 1), "abc");
    harness.coordinator.on_run().unwrap();
    harness.drive_until_settled().await;

    harness.coordinator.on_reset().unwrap();
    assert_eq!(harness.coordinator.phase(), Phase::Idle);
    assert_eq!(harness.coordinator.slot(Part::One), &SlotState::Empty);
    assert_eq!(
        harness.coordinator.live_generation(),
        Some(Generation::FIRST)
    );
}
