//! Process contexts driving the real `aoc-worker` binary.
//!
//! The modules directory is always empty, so every run fails to load. That
//! is enough to exercise the pipe and process teardown.

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use aoc_dispatch_core::coordinator::{Coordinator, Phase, Severity, SlotState, Surface};
use aoc_dispatch_core::execute::{
    ContextEvent, ContextFactory, Envelope, ExecutionContext, Generation, ProcessContext,
};
use aoc_dispatch_core::{
    DispatchConfig, FailureKind, Isolation, Part, ProcessContextFactory, Request, Response,
    Selection, SolverKey,
};

const WORKER: &str = env!("CARGO_BIN_EXE_aoc-worker");

fn config(modules: &TempDir) -> DispatchConfig {
    DispatchConfig {
        modules_dir: modules.path().to_path_buf(),
        isolation: Isolation::Process,
        worker_path: Some(WORKER.into()),
    }
}

fn key(part: Part) -> SolverKey {
    SolverKey::new(2023, 1, part).unwrap()
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Option<Envelope> {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("worker went quiet")
}

/// Everything still delivered until the channel closes.
async fn drain(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<Envelope> {
    let mut events = Vec::new();
    while let Some(envelope) = next_event(rx).await {
        events.push(envelope);
    }
    events
}

#[tokio::test]
async fn test_worker_answers_handshake() {
    let modules = TempDir::new().unwrap();
    let factory = ProcessContextFactory::new(&config(&modules)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let generation = Generation::new(7);
    let mut context = factory.spawn(generation, tx).unwrap();
    assert!(context.is_alive());

    context.send(Request::Init).unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        Some(Envelope::response(generation, Response::Ready))
    );

    context.terminate();
    assert!(!context.is_alive());
}

#[tokio::test]
async fn test_missing_module_run_fails_with_load_kind() {
    let modules = TempDir::new().unwrap();
    let factory = ProcessContextFactory::new(&config(&modules)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut context = factory.spawn(Generation::FIRST, tx).unwrap();

    context.send(Request::Init).unwrap();
    context
        .send(Request::Run {
            key: key(Part::Two),
            input: "abc".to_string(),
        })
        .unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        Some(Envelope::response(Generation::FIRST, Response::Ready))
    );
    match next_event(&mut rx).await.map(|envelope| envelope.event) {
        Some(ContextEvent::Response(Response::Failed { part, kind, message })) => {
            assert_eq!(part, Part::Two);
            assert_eq!(kind, FailureKind::Load);
            assert!(message.contains("solution_2023_01_2"), "message: {}", message);
        }
        other => panic!("Expected a load failure, got {:?}", other),
    }
    assert!(context.is_alive());
}

#[tokio::test]
async fn test_terminate_during_run_reports_nothing_lost() {
    let modules = TempDir::new().unwrap();
    let factory = ProcessContextFactory::new(&config(&modules)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut context = factory.spawn(Generation::FIRST, tx).unwrap();

    context.send(Request::Init).unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        Some(Envelope::response(Generation::FIRST, Response::Ready))
    );

    context
        .send(Request::Run {
            key: key(Part::One),
            input: "abc".to_string(),
        })
        .unwrap();
    context.terminate();
    assert!(!context.is_alive());

    // The stream ends once the process is gone, and a deliberate kill is
    // never reported as a lost context.
    let late = drain(&mut rx).await;
    assert!(
        late.iter()
            .all(|envelope| matches!(envelope.event, ContextEvent::Response(_))),
        "unexpected events after terminate: {:?}",
        late
    );

    assert!(context.send(Request::Init).is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_externally_killed_worker_is_lost() {
    let modules = TempDir::new().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut context =
        ProcessContext::spawn(Path::new(WORKER), modules.path(), Generation::FIRST, tx).unwrap();

    context.send(Request::Init).unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        Some(Envelope::response(Generation::FIRST, Response::Ready))
    );

    let pid = libc::pid_t::try_from(context.pid()).unwrap();
    assert_eq!(unsafe { libc::kill(pid, libc::SIGKILL) }, 0);

    match next_event(&mut rx).await {
        Some(Envelope {
            generation,
            event: ContextEvent::Lost { .. },
        }) => assert_eq!(generation, Generation::FIRST),
        other => panic!("Expected the context to be lost, got {:?}", other),
    }
}

#[derive(Default)]
struct RecordingSurface {
    statuses: Vec<(Part, String, Severity)>,
    ready: usize,
}

impl Surface for RecordingSurface {
    fn selection(&self) -> Selection {
        Selection::new(2023, 1)
    }

    fn input(&self) -> String {
        "abc".to_string()
    }

    fn render_status(&mut self, part: Part, text: &str, severity: Severity) {
        self.statuses.push((part, text.to_string(), severity));
    }

    fn render_ready(&mut self) {
        self.ready += 1;
    }
}

#[tokio::test]
async fn test_coordinator_over_worker_process() {
    let modules = TempDir::new().unwrap();
    let factory = ProcessContextFactory::new(&config(&modules)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut coordinator = Coordinator::new(RecordingSurface::default(), factory, tx);

    // start() returns before the worker has answered.
    coordinator.start().unwrap();
    coordinator.on_run().unwrap();

    while coordinator.phase().is_running() {
        let envelope = next_event(&mut rx).await.expect("event channel closed");
        coordinator.handle(envelope);
    }

    assert_eq!(coordinator.surface().ready, 1);
    assert_eq!(coordinator.phase(), Phase::Errored);
    assert!(
        coordinator
            .slot(Part::One)
            .text()
            .contains("module not found")
    );
    assert_eq!(coordinator.slot(Part::Two), &SlotState::Cancelled);

    coordinator.shutdown();
}
