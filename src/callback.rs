use crate::{Options, Phase, SolverState};

/// Hook invoked once per solver iteration for logging, monitoring, or early stopping.
pub trait Callback {
    /// Creates a new callback from solver options.
    fn new(options: &Options) -> Self
    where
        Self: Sized;

    /// Called at the end of each iteration with the current solver state.
    fn call(&mut self, state: &SolverState);
}

/// A callback that does nothing. Use when no per-iteration output is needed.
pub struct NoOpCallback {}

impl Callback for NoOpCallback {
    fn new(_options: &Options) -> Self {
        Self {}
    }

    fn call(&mut self, _state: &SolverState) {
        // Do nothing
    }
}

/// Prints phase, objective and remaining infeasibility to stdout each iteration.
pub struct IterationOutput {}

impl Callback for IterationOutput {
    fn new(_options: &Options) -> Self {
        Self {}
    }

    fn call(&mut self, state: &SolverState) {
        let phase = match state.get_phase() {
            Phase::One => "I",
            Phase::Two => "II",
        };
        let txt = format!(
            "| {:4}: | {:<2} | {:<12.6e} | {:<8.2e} |",
            state.get_iterations(),
            phase,
            state.get_objective(),
            state.get_infeasibility(),
        );
        println!("{}", txt);
    }
}
