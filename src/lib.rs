//! A library for linear and mixed-integer linear programming.
//!
//! The crate is organized as a pipeline:
//! - [`model`]: the user-facing [`Model`] (objective, constraint records,
//!   linear combinations, variable domains) plus structural validation.
//! - [`format`]: a parser/emitter pair for the `lp_solve` text dialect.
//! - [`lp`]: the canonical [`lp::StandardForm`] built from a model, and the
//!   two-phase bounded-variable simplex engine that operates on it.
//! - [`milp`]: a best-bound branch-and-bound driver layered on the simplex.
//! - [`solution`]: projection of a standard-form point back onto the model's
//!   declared solution variables.
//! - [`interface`]: hand-off of a model to an external solver binary.
//!
//! Entry points are [`solve`], [`solve_with_options`] and
//! [`solve_with_hooks`]; parsing/validation failures are returned as errors
//! while solver-state outcomes (infeasible, unbounded, cycling, timeout) are
//! reported in-band through [`Status`] on the returned [`Solution`].

use std::sync::{LazyLock, Mutex};

use faer::Col;
use serde::Serialize;

pub type E = f64;
pub type I = usize;

pub mod callback;
pub mod format;
pub mod interface;
pub mod lp;
pub mod milp;
pub mod model;
pub mod options;
pub mod solution;
pub mod terminators;

#[cfg(test)]
pub mod tests;

// Required at the crate root for the test templates in `tests::properties`.
#[cfg(test)]
#[allow(unused_imports)]
use rstest_reuse;

pub use model::validate::ValidationError;
pub use model::{ConstraintSpec, External, Model, ModelOptions, OpType};
pub use options::{OptionTrait, Options};
pub use solution::{Solution, SolveStats};

/// Status codes for optimization solvers.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize)]
pub enum Status {
    #[default]
    /// The solver is still running.
    InProgress,
    /// An optimal solution was found.
    Optimal,
    /// The problem is infeasible.
    Infeasible,
    /// The problem is unbounded.
    Unbounded,
    /// The same basis reappeared (or the iteration budget was exhausted) and
    /// the cycling policy asked for termination.
    CycleDetected,
    /// The solver stopped due to a time limit.
    TimedOut,
    /// The solver was interrupted (e.g., by user or signal).
    Interrupted,
    /// Every pivot candidate fell below the pivot tolerance.
    NumericalFailure,
}

/// Simplex phase indicator, exposed to callbacks.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Phase {
    #[default]
    /// Driving artificial variables to zero.
    One,
    /// Optimizing the true objective.
    Two,
}

/// Mutable state threaded through a solve.
///
/// The engines write the standard-form primal point and objective here; the
/// assembler reads them back out. Callbacks receive a shared reference once
/// per iteration.
#[derive(Debug, Clone)]
pub struct SolverState {
    status: Status,
    nit: usize,
    nodes: usize,
    phase: Phase,
    x: Col<E>,
    objective: E,
    infeasibility: E,
}

impl Default for SolverState {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverState {
    pub fn new() -> Self {
        Self {
            status: Status::InProgress,
            nit: 0,
            nodes: 0,
            phase: Phase::One,
            x: Col::zeros(0),
            objective: 0.,
            infeasibility: 0.,
        }
    }

    pub fn get_status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Standard-form primal values (minimization sense).
    pub fn get_primal(&self) -> &Col<E> {
        &self.x
    }

    pub fn set_primal(&mut self, x: Col<E>) {
        self.x = x;
    }

    /// Standard-form objective value (minimization sense).
    pub fn get_objective(&self) -> E {
        self.objective
    }

    pub fn set_objective(&mut self, objective: E) {
        self.objective = objective;
    }

    /// Phase-I objective: total artificial mass still in the basis.
    pub fn get_infeasibility(&self) -> E {
        self.infeasibility
    }

    pub fn set_infeasibility(&mut self, infeasibility: E) {
        self.infeasibility = infeasibility;
    }

    pub fn get_iterations(&self) -> usize {
        self.nit
    }

    pub fn count_iteration(&mut self) {
        self.nit += 1;
    }

    pub fn get_nodes(&self) -> usize {
        self.nodes
    }

    pub fn count_node(&mut self) {
        self.nodes += 1;
    }

    pub fn get_phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }
}

/// Per-solve hooks: an iteration callback and a termination policy.
pub struct SolverHooks {
    pub callback: Box<dyn crate::callback::Callback>,
    pub terminator: Box<dyn crate::terminators::Terminator>,
}

impl SolverHooks {
    /// Default hooks for the given options: an iteration table when `verbose`
    /// is set (silence otherwise), and a wall-clock terminator when
    /// `timeout_ms` is set.
    pub fn from_options(options: &Options) -> Self {
        use crate::callback::{Callback, IterationOutput, NoOpCallback};
        use crate::terminators::{NoOpTerminator, Terminator, TimeOutTerminator};

        let callback: Box<dyn Callback> = if options.get_option::<bool>("verbose").unwrap_or(false)
        {
            Box::new(IterationOutput::new(options))
        } else {
            Box::new(NoOpCallback::new(options))
        };

        let timeout_ms = options.get_option::<u64>("timeout_ms").unwrap_or(u64::MAX);
        let terminator: Box<dyn Terminator> = if timeout_ms == u64::MAX {
            Box::new(NoOpTerminator::new())
        } else {
            Box::new(TimeOutTerminator::new(std::time::Duration::from_millis(
                timeout_ms,
            )))
        };

        Self { callback, terminator }
    }
}

/// Trait for iterative optimization solvers.
///
/// Provides a standard interface for algorithms that proceed by repeated
/// iteration. Outcomes are reported through [`Status`]; the primal point and
/// objective are written into the [`SolverState`].
pub trait Solver {
    /// Run the solver until an outcome is reached.
    fn solve(&mut self, state: &mut SolverState, hooks: &mut SolverHooks) -> Status;
}

static LAST_SOLVED_MODEL: LazyLock<Mutex<Model>> = LazyLock::new(|| Mutex::new(Model::default()));

/// Returns a copy of the most recently solved model.
///
/// The slot starts out holding an empty sentinel model, is overwritten on
/// every successful return from [`solve`] (including in-band infeasible,
/// unbounded, cycling and timeout outcomes) and is never cleared. It is not
/// updated while a solve is in flight, nor on validation failure.
pub fn last_solved_model() -> Model {
    LAST_SOLVED_MODEL.lock().unwrap().clone()
}

fn remember_solved_model(model: &Model) {
    *LAST_SOLVED_MODEL.lock().unwrap() = model.clone();
}

/// Solves the model with default options.
pub fn solve(model: &Model) -> Result<Solution, ValidationError> {
    solve_with_options(model, &Options::new())
}

/// Solves the model, letting `model.options` override the registry options.
pub fn solve_with_options(model: &Model, options: &Options) -> Result<Solution, ValidationError> {
    let options = model.merged_options(options);
    let mut hooks = SolverHooks::from_options(&options);
    solve_with_hooks(model, &options, &mut hooks)
}

/// Solves the model with caller-provided hooks.
///
/// `model.options` are *not* merged here; callers that want the model's own
/// option overrides should go through [`solve_with_options`].
pub fn solve_with_hooks(
    model: &Model,
    options: &Options,
    hooks: &mut SolverHooks,
) -> Result<Solution, ValidationError> {
    let internal = options::InternalOptions::from(options);
    if internal.validate {
        model::validate::validate(model)?;
    }

    let form = lp::StandardForm::from_model(model)?;
    log::debug!(
        "standard form: {} rows, {} columns ({} structural)",
        form.get_n_cons(),
        form.get_n_vars(),
        form.get_n_structural()
    );

    let mut state = SolverState::new();
    hooks.terminator.initialize();

    let status = if form.has_integers() {
        let mut driver = milp::BranchAndBound::new(&form, &internal);
        driver.solve(&mut state, hooks)
    } else {
        let mut engine = lp::simplex::Simplex::new(&form, &internal);
        engine.solve(&mut state, hooks)
    };
    state.set_status(status);

    let solution = solution::assemble(model, &form, &state, &internal);
    remember_solved_model(model);
    Ok(solution)
}
