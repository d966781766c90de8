//! Cross-module lifecycle tests for the embedding session state machine.
//!
//! These use scripted engines so the scenarios are deterministic: a marker
//! engine that shifts every coordinate by +1 per step (making the iteration
//! count readable off the buffer), a throttled engine for mid-run
//! cancellation, and engines that block or fail to exercise the degraded
//! paths.

use std::time::Duration;

use ndarray::{Array2, ArrayView2};

use crate::engine::{ComputationEngine, NextScale};
use crate::error::Error;
use crate::hierarchy::TransitionMatrix;
use crate::params::{EmbeddingParameters, HierarchyParameters};
use crate::session::{EmbeddingSession, SessionEvent, SessionState};

/// Engine whose solver step adds 1 to every coordinate, optionally
/// sleeping to throttle, optionally blocking or failing at a given
/// iteration.
struct ScriptedEngine {
    step_delay: Option<Duration>,
    block_at: Option<usize>,
    fail_at: Option<usize>,
}

impl ScriptedEngine {
    fn marker() -> Self {
        Self {
            step_delay: None,
            block_at: None,
            fail_at: None,
        }
    }

    fn throttled(delay: Duration) -> Self {
        Self {
            step_delay: Some(delay),
            ..Self::marker()
        }
    }

    fn blocking_at(iteration: usize) -> Self {
        Self {
            block_at: Some(iteration),
            ..Self::marker()
        }
    }

    fn failing_at(iteration: usize) -> Self {
        Self {
            fail_at: Some(iteration),
            ..Self::marker()
        }
    }
}

impl ComputationEngine for ScriptedEngine {
    fn base_similarities(
        &self,
        data: ArrayView2<'_, f32>,
        _params: &HierarchyParameters,
    ) -> crate::Result<TransitionMatrix> {
        Ok(TransitionMatrix::new(vec![Vec::new(); data.nrows()]))
    }

    fn next_scale(
        &self,
        previous: &TransitionMatrix,
        _params: &HierarchyParameters,
    ) -> crate::Result<NextScale> {
        let n = previous.num_rows();
        Ok(NextScale {
            landmark_to_previous: (0..n as u32).collect(),
            transition: TransitionMatrix::new(vec![Vec::new(); n]),
            influence: crate::hierarchy::LandmarkMap::new(
                (0..n as u32).map(|i| vec![i]).collect(),
            ),
        })
    }

    fn solver_step(
        &self,
        _affinity: &TransitionMatrix,
        coordinates: &mut Array2<f32>,
        iteration: usize,
        _params: &EmbeddingParameters,
    ) -> crate::Result<()> {
        if let Some(at) = self.fail_at {
            if iteration >= at {
                return Err(Error::engine("solver step", "scripted failure"));
            }
        }
        if let Some(at) = self.block_at {
            if iteration >= at {
                // Ignores cancellation; forces the grace period to expire.
                std::thread::sleep(Duration::from_secs(60));
            }
        }
        if let Some(delay) = self.step_delay {
            std::thread::sleep(delay);
        }
        coordinates.mapv_inplace(|v| v + 1.0);
        Ok(())
    }
}

fn scripted(engine: ScriptedEngine) -> EmbeddingSession {
    EmbeddingSession::new(std::sync::Arc::new(engine))
}

fn empty_affinity(n: usize) -> TransitionMatrix {
    TransitionMatrix::new(vec![Vec::new(); n])
}

fn wait_for_terminal(session: &EmbeddingSession) -> SessionState {
    for _ in 0..2000 {
        let state = session.state();
        if !matches!(state, SessionState::Running | SessionState::Initializing) {
            return state;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("session did not reach a terminal state");
}

fn wait_for_iteration(session: &EmbeddingSession, target: usize) {
    for _ in 0..5000 {
        if session.iteration_count() >= target {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("session never reached iteration {target}");
}

#[test]
fn test_full_run_then_continue_retains_coordinates() {
    let mut session = scripted(ScriptedEngine::marker());
    let params = EmbeddingParameters::default()
        .with_num_iterations(1000)
        .with_seed(11);

    session.start(&params, empty_affinity(500), 500).unwrap();
    assert_eq!(wait_for_terminal(&session), SessionState::Finished);
    assert_eq!(session.iteration_count(), 1000);
    assert!(session.can_continue());

    // Each step adds 1 to every coordinate; initialization is ~0. If the
    // buffer were reinitialized, values would restart near 0.
    let coordinates = session.coordinates().unwrap();
    assert_eq!(coordinates.dim(), (500, 2));
    assert!((coordinates[[0, 0]] - 1000.0).abs() < 0.1);

    session.continue_computation(500).unwrap();
    assert_eq!(wait_for_terminal(&session), SessionState::Finished);
    assert_eq!(session.iteration_count(), 1500);
    assert!(session.can_continue());

    let coordinates = session.coordinates().unwrap();
    assert!((coordinates[[0, 0]] - 1500.0).abs() < 0.1);
}

#[test]
fn test_stop_mid_run_is_cooperative_and_resumable() {
    let mut session = scripted(ScriptedEngine::throttled(Duration::from_millis(1)));
    let params = EmbeddingParameters::default()
        .with_num_iterations(2_000)
        .with_seed(11);

    session.start(&params, empty_affinity(20), 20).unwrap();
    wait_for_iteration(&session, 300);
    session.stop();

    assert_eq!(session.state(), SessionState::Aborted { forced: false });
    assert!(session.can_continue());

    // The buffer is retained exactly where the run stopped.
    let stopped_at = session.iteration_count();
    assert!(stopped_at >= 300);
    assert!(stopped_at < 2_000);
    let coordinates = session.coordinates().unwrap();
    assert!((coordinates[[0, 0]] - stopped_at as f32).abs() < 0.1);

    // Continuing resumes from the retained buffer.
    session.continue_computation(50).unwrap();
    assert_eq!(wait_for_terminal(&session), SessionState::Finished);
    assert_eq!(session.iteration_count(), 2_050);
}

#[test]
fn test_start_while_running_fails_without_disturbing_run() {
    let mut session = scripted(ScriptedEngine::throttled(Duration::from_millis(1)));
    let params = EmbeddingParameters::default()
        .with_num_iterations(10_000)
        .with_seed(11);

    session.start(&params, empty_affinity(10), 10).unwrap();
    wait_for_iteration(&session, 10);

    let result = session.start(&params, empty_affinity(10), 10);
    assert!(matches!(result, Err(Error::ComputationAlreadyRunning)));
    assert_eq!(session.state(), SessionState::Running);

    // The original run keeps making progress.
    let before = session.iteration_count();
    wait_for_iteration(&session, before + 10);
    session.stop();
}

#[test]
fn test_progress_monotone_and_ends_at_hundred() {
    let mut session = scripted(ScriptedEngine::marker());
    let events = session.subscribe();
    let params = EmbeddingParameters::default()
        .with_num_iterations(50)
        .with_seed(11);

    session.start(&params, empty_affinity(8), 8).unwrap();
    assert_eq!(wait_for_terminal(&session), SessionState::Finished);

    let mut percentages = Vec::new();
    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Progress { percentage, .. } => percentages.push(percentage),
            SessionEvent::Finished => finished = true,
            _ => {}
        }
    }

    assert!(finished);
    assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*percentages.last().unwrap(), 100.0);
}

#[test]
fn test_layout_events_in_iteration_order() {
    let mut session = scripted(ScriptedEngine::marker());
    let events = session.subscribe();
    let params = EmbeddingParameters::default()
        .with_num_iterations(25)
        .with_seed(11);

    session.start(&params, empty_affinity(4), 4).unwrap();
    wait_for_terminal(&session);

    let iterations: Vec<usize> = events
        .try_iter()
        .filter_map(|event| match event {
            SessionEvent::Layout { iteration, .. } => Some(iteration),
            _ => None,
        })
        .collect();

    assert_eq!(iterations, (1..=25).collect::<Vec<_>>());
}

#[test]
fn test_stop_while_idle_is_noop() {
    let mut session = scripted(ScriptedEngine::marker());
    let events = session.subscribe();

    session.stop();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(events.try_recv().is_err());
    assert!(!session.can_continue());
}

#[test]
fn test_forced_abort_after_grace_period() {
    let mut session = scripted(ScriptedEngine::blocking_at(3));
    let events = session.subscribe();
    let params = EmbeddingParameters::default()
        .with_num_iterations(1000)
        .with_stop_grace(Duration::from_millis(50))
        .with_seed(11);

    session.start(&params, empty_affinity(6), 6).unwrap();
    wait_for_iteration(&session, 3);
    session.stop();

    assert_eq!(session.state(), SessionState::Aborted { forced: true });
    assert!(!session.can_continue());
    assert!(matches!(
        session.continue_computation(10),
        Err(Error::ContinuePrecondition { .. })
    ));
    assert!(events
        .try_iter()
        .any(|e| matches!(e, SessionEvent::Aborted { forced: true })));
}

#[test]
fn test_engine_failure_aborts_without_resume() {
    let mut session = scripted(ScriptedEngine::failing_at(5));
    let events = session.subscribe();
    let params = EmbeddingParameters::default()
        .with_num_iterations(100)
        .with_seed(11);

    session.start(&params, empty_affinity(6), 6).unwrap();
    let state = wait_for_terminal(&session);

    assert_eq!(state, SessionState::Aborted { forced: false });
    assert!(!session.can_continue());
    assert!(matches!(session.last_error(), Some(Error::Engine { .. })));
    assert!(events
        .try_iter()
        .any(|e| matches!(e, SessionEvent::Aborted { forced: false })));
}

#[test]
fn test_start_validates_before_touching_state() {
    let mut session = scripted(ScriptedEngine::marker());
    let bad = EmbeddingParameters::default().with_num_iterations(0);

    assert!(matches!(
        session.start(&bad, empty_affinity(4), 4),
        Err(Error::InvalidParameter { .. })
    ));
    assert_eq!(session.state(), SessionState::Idle);

    // Affinity shape mismatch is also rejected up front.
    let good = EmbeddingParameters::default();
    assert!(session.start(&good, empty_affinity(3), 4).is_err());
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn test_restart_after_finish_reinitializes() {
    let mut session = scripted(ScriptedEngine::marker());
    let params = EmbeddingParameters::default()
        .with_num_iterations(10)
        .with_seed(11);

    session.start(&params, empty_affinity(4), 4).unwrap();
    wait_for_terminal(&session);
    assert!((session.coordinates().unwrap()[[0, 0]] - 10.0).abs() < 0.1);

    // A fresh start resets the iteration count and the buffer.
    session.start(&params, empty_affinity(4), 4).unwrap();
    wait_for_terminal(&session);
    assert_eq!(session.iteration_count(), 10);
    assert!((session.coordinates().unwrap()[[0, 0]] - 10.0).abs() < 0.1);
}
