//! The embedding computation lifecycle.
//!
//! An [`EmbeddingSession`] owns one running or resumable layout
//! computation. The solver runs on its own thread; the session's caller
//! keeps a responsive handle with `stop`, `continue_computation`, and state
//! queries, and observes the run through [`SessionEvent`] channels.
//!
//! ```text
//!            start                      budget exhausted
//!   Idle ──────────▶ Initializing ──▶ Running ──────────▶ Finished ─┐
//!                                       │ ▲                         │ continue
//!                                  stop │ └─────────────────────────┘
//!                                       ▼
//!                                    Aborted ── continue (cooperative only)
//! ```
//!
//! Cancellation is cooperative first: `stop` raises a flag the solver
//! checks at every step boundary. If the solver does not acknowledge
//! within the grace period, the worker is abandoned (a generation counter
//! makes its remaining writes and events inert) and the run is marked as
//! a forced abort, which cannot be continued.

mod events;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ndarray::Array2;
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use tracing::{debug, error, info, warn};

use crate::engine::ComputationEngine;
use crate::error::{Error, Result};
use crate::hierarchy::TransitionMatrix;
use crate::params::EmbeddingParameters;

pub use events::SessionEvent;

/// Initial coordinates are drawn from N(0, INIT_STDDEV²).
const INIT_STDDEV: f32 = 1e-4;

/// Lifecycle state of an [`EmbeddingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No computation has been started.
    Idle,
    /// Coordinates are being allocated and initialized.
    Initializing,
    /// The solver thread is iterating.
    Running,
    /// The iteration budget was exhausted.
    Finished,
    /// The run ended early.
    Aborted {
        /// Whether the solver had to be abandoned after the grace period.
        forced: bool,
    },
}

/// State shared between the session handle and its solver thread.
struct Shared {
    state: Mutex<SessionState>,
    /// Cooperative cancellation flag, checked at step boundaries.
    cancel: AtomicBool,
    /// Bumped whenever a worker is superseded; a worker whose generation
    /// no longer matches must not touch shared state or publish events.
    generation: AtomicU64,
    iteration: AtomicUsize,
    budget: AtomicUsize,
    /// Last completed coordinate buffer; survives terminal states so a
    /// continued run picks up where it left off.
    coordinates: Mutex<Option<Array2<f32>>>,
    /// Whether the retained buffer is valid to continue from.
    resumable: AtomicBool,
    last_error: Mutex<Option<Error>>,
    events: events::EventHub,
}

impl Shared {
    /// Transition to a terminal state if this worker still owns the
    /// session. Returns false when the worker has been superseded.
    fn terminal_transition(&self, generation: u64, state: SessionState) -> bool {
        let mut guard = self.state.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        *guard = state;
        true
    }
}

/// A cancellable, resumable embedding computation.
///
/// At most one solver run is active per session; `start` on a running
/// session fails without disturbing it. Dropping the session stops any
/// active run, waiting out the grace period if necessary.
pub struct EmbeddingSession {
    engine: Arc<dyn ComputationEngine>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    done_rx: Option<Receiver<()>>,
    affinity: Option<Arc<TransitionMatrix>>,
    params: Option<EmbeddingParameters>,
    grace: Duration,
}

impl EmbeddingSession {
    /// Create an idle session over the given engine.
    pub fn new(engine: Arc<dyn ComputationEngine>) -> Self {
        Self {
            engine,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Idle),
                cancel: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                iteration: AtomicUsize::new(0),
                budget: AtomicUsize::new(0),
                coordinates: Mutex::new(None),
                resumable: AtomicBool::new(false),
                last_error: Mutex::new(None),
                events: events::EventHub::default(),
            }),
            worker: None,
            done_rx: None,
            affinity: None,
            params: None,
            grace: Duration::from_secs(3),
        }
    }

    /// Register an observer for this session's events.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Whether a solver run is active.
    pub fn is_running(&self) -> bool {
        matches!(self.state(), SessionState::Running | SessionState::Initializing)
    }

    /// Solver iterations completed so far.
    pub fn iteration_count(&self) -> usize {
        self.shared.iteration.load(Ordering::SeqCst)
    }

    /// Snapshot of the current coordinate buffer, if any run has produced
    /// one.
    pub fn coordinates(&self) -> Option<Array2<f32>> {
        self.shared.coordinates.lock().clone()
    }

    /// The error that ended the last run, if it ended abnormally.
    pub fn last_error(&self) -> Option<Error> {
        self.shared.last_error.lock().clone()
    }

    /// Whether `continue_computation` is currently valid: the last run
    /// finished or was cancelled cooperatively, and the affinity input has
    /// not been invalidated since.
    pub fn can_continue(&self) -> bool {
        if !self.shared.resumable.load(Ordering::SeqCst) {
            return false;
        }
        matches!(
            self.state(),
            SessionState::Finished | SessionState::Aborted { forced: false }
        )
    }

    /// Mark the retained state as stale (the affinity input was rebuilt).
    /// A later `continue_computation` will fail until a fresh `start`.
    pub fn invalidate(&self) {
        self.shared.resumable.store(false, Ordering::SeqCst);
    }

    /// Start a new computation over `affinity`.
    ///
    /// Valid from `Idle`, `Finished`, or `Aborted`; fails with
    /// [`Error::ComputationAlreadyRunning`] otherwise, leaving the active
    /// run untouched. Coordinates are freshly random-initialized.
    pub fn start(
        &mut self,
        params: &EmbeddingParameters,
        affinity: TransitionMatrix,
        num_points: usize,
    ) -> Result<()> {
        if self.is_running() {
            return Err(Error::ComputationAlreadyRunning);
        }
        params.validate()?;
        if num_points == 0 {
            return Err(Error::invalid("num_points", "cannot embed zero points"));
        }
        if affinity.num_rows() != num_points {
            return Err(Error::invalid(
                "affinity",
                format!(
                    "matrix has {} rows, expected {num_points}",
                    affinity.num_rows()
                ),
            ));
        }
        self.reap_worker();

        *self.shared.state.lock() = SessionState::Initializing;
        self.shared.events.publish(SessionEvent::Progress {
            percentage: 0.0,
            stage: "initializing embedding".into(),
        });

        let coordinates = random_coordinates(num_points, params.num_output_dims, params.seed)?;
        *self.shared.coordinates.lock() = Some(coordinates.clone());
        self.shared.iteration.store(0, Ordering::SeqCst);
        self.shared.budget.store(params.num_iterations, Ordering::SeqCst);
        self.shared.cancel.store(false, Ordering::SeqCst);
        self.shared.resumable.store(false, Ordering::SeqCst);
        *self.shared.last_error.lock() = None;

        let affinity = Arc::new(affinity);
        self.affinity = Some(Arc::clone(&affinity));
        self.params = Some(params.clone());
        self.grace = params.stop_grace;

        info!(
            num_points,
            iterations = params.num_iterations,
            "starting embedding computation"
        );
        self.spawn_worker(coordinates, affinity, params.clone())
    }

    /// Resume a finished or cooperatively aborted run, extending the
    /// iteration budget by `additional_iterations`.
    ///
    /// The retained coordinate buffer is the starting point; nothing is
    /// reinitialized.
    pub fn continue_computation(&mut self, additional_iterations: usize) -> Result<()> {
        if !self.can_continue() {
            let reason = match self.state() {
                SessionState::Running | SessionState::Initializing => "a run is still active",
                SessionState::Idle => "no computation has been started",
                SessionState::Aborted { forced: true } => "the last run was forcibly terminated",
                _ => "the session state is stale",
            };
            return Err(Error::ContinuePrecondition { reason });
        }
        if additional_iterations == 0 {
            return Err(Error::invalid(
                "additional_iterations",
                "must be at least 1",
            ));
        }
        let coordinates = self
            .shared
            .coordinates
            .lock()
            .clone()
            .ok_or(Error::ContinuePrecondition {
                reason: "no coordinate buffer retained",
            })?;
        self.reap_worker();

        self.shared
            .budget
            .fetch_add(additional_iterations, Ordering::SeqCst);
        self.shared.cancel.store(false, Ordering::SeqCst);
        self.shared.resumable.store(false, Ordering::SeqCst);

        let affinity = self
            .affinity
            .as_ref()
            .map(Arc::clone)
            .ok_or(Error::ContinuePrecondition {
                reason: "no affinity matrix retained",
            })?;
        let params = self.params.clone().ok_or(Error::ContinuePrecondition {
            reason: "no parameters retained",
        })?;

        info!(
            from_iteration = self.iteration_count(),
            additional_iterations, "continuing embedding computation"
        );
        self.spawn_worker(coordinates, affinity, params)
    }

    /// Request cancellation of the active run.
    ///
    /// From `Running` this blocks until the solver acknowledges or the
    /// grace period expires; in the latter case the worker is abandoned
    /// and the run marked as a forced abort. From any other state this is
    /// a no-op that emits no events.
    pub fn stop(&mut self) {
        if !matches!(self.state(), SessionState::Running) {
            return;
        }
        debug!("requesting cooperative cancellation");
        self.shared.cancel.store(true, Ordering::SeqCst);

        let Some(done) = self.done_rx.clone() else {
            return;
        };
        match done.recv_timeout(self.grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                // The worker exited and performed its own transition.
                self.reap_worker();
            }
            Err(RecvTimeoutError::Timeout) => {
                let mut state = self.shared.state.lock();
                if matches!(*state, SessionState::Running) {
                    // Supersede the worker; its further writes are inert.
                    self.shared.generation.fetch_add(1, Ordering::SeqCst);
                    *state = SessionState::Aborted { forced: true };
                    self.shared.resumable.store(false, Ordering::SeqCst);
                    drop(state);
                    warn!(
                        grace = ?self.grace,
                        "solver did not acknowledge cancellation, abandoning worker"
                    );
                    self.shared
                        .events
                        .publish(SessionEvent::Aborted { forced: true });
                }
                self.worker = None;
                self.done_rx = None;
            }
        }
    }

    /// Join a worker that has already exited; never blocks on a live run.
    fn reap_worker(&mut self) {
        self.done_rx = None;
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    fn spawn_worker(
        &mut self,
        coordinates: Array2<f32>,
        affinity: Arc<TransitionMatrix>,
        params: EmbeddingParameters,
    ) -> Result<()> {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.state.lock() = SessionState::Running;

        let (done_tx, done_rx) = bounded(1);
        let shared = Arc::clone(&self.shared);
        let engine = Arc::clone(&self.engine);

        let handle = thread::Builder::new()
            .name("hsne-solver".into())
            .spawn(move || {
                run_solver(engine, shared, affinity, params, coordinates, generation);
                let _ = done_tx.send(());
            })
            .map_err(|e| {
                *self.shared.state.lock() = SessionState::Aborted { forced: false };
                Error::engine("solver spawn", e.to_string())
            })?;

        self.worker = Some(handle);
        self.done_rx = Some(done_rx);
        Ok(())
    }
}

impl Drop for EmbeddingSession {
    fn drop(&mut self) {
        self.stop();
        self.reap_worker();
    }
}

/// Allocate and randomly initialize a coordinate buffer.
fn random_coordinates(
    num_points: usize,
    num_dims: usize,
    seed: Option<u64>,
) -> Result<Array2<f32>> {
    let normal = Normal::new(0.0_f32, INIT_STDDEV)
        .map_err(|e| Error::engine("initialization", e.to_string()))?;
    let mut rng: Box<dyn RngCore> = match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(rand::rng()),
    };
    Ok(Array2::from_shape_fn((num_points, num_dims), |_| {
        normal.sample(&mut rng)
    }))
}

/// Body of the solver thread.
fn run_solver(
    engine: Arc<dyn ComputationEngine>,
    shared: Arc<Shared>,
    affinity: Arc<TransitionMatrix>,
    params: EmbeddingParameters,
    mut coordinates: Array2<f32>,
    generation: u64,
) {
    loop {
        if shared.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let iteration = shared.iteration.load(Ordering::SeqCst);
        let budget = shared.budget.load(Ordering::SeqCst);

        if iteration >= budget {
            if !shared.terminal_transition(generation, SessionState::Finished) {
                return;
            }
            shared.resumable.store(true, Ordering::SeqCst);
            shared.events.publish(SessionEvent::Progress {
                percentage: 100.0,
                stage: "embedding finished".into(),
            });
            shared.events.publish(SessionEvent::Finished);
            return;
        }

        if shared.cancel.load(Ordering::SeqCst) {
            if !shared.terminal_transition(generation, SessionState::Aborted { forced: false })
            {
                return;
            }
            shared.resumable.store(true, Ordering::SeqCst);
            debug!(iteration, "solver cancelled cooperatively");
            shared
                .events
                .publish(SessionEvent::Aborted { forced: false });
            return;
        }

        if let Err(err) = engine.solver_step(&affinity, &mut coordinates, iteration, &params) {
            if !shared.terminal_transition(generation, SessionState::Aborted { forced: false })
            {
                return;
            }
            error!(%err, iteration, "solver step failed");
            *shared.last_error.lock() = Some(err);
            shared
                .events
                .publish(SessionEvent::Aborted { forced: false });
            return;
        }

        let completed = iteration + 1;
        {
            // Publish the step atomically with respect to supersession.
            let state = shared.state.lock();
            if shared.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            shared.iteration.store(completed, Ordering::SeqCst);
            *shared.coordinates.lock() = Some(coordinates.clone());
            drop(state);
        }
        shared.events.publish(SessionEvent::Layout {
            iteration: completed,
            coordinates: coordinates.clone(),
        });
        shared.events.publish(SessionEvent::Progress {
            percentage: (completed as f32 / budget as f32 * 100.0).min(100.0),
            stage: "gradient descent".into(),
        });
    }
}
