//! Best-bound branch-and-bound over the LP relaxation.
//!
//! The driver keeps a frontier of open nodes in a [`MinMaxHeap`], ordered by
//! the parent relaxation objective with insertion order as the tiebreak, so
//! the search is fully deterministic. A node stores only its accumulated
//! bound tightenings; its tableau is recreated by cloning the root form and
//! applying the deltas on entry.
//!
//! Each popped node is solved with the simplex engine. Infeasible nodes are
//! pruned, fractional optima are split on the most-fractional integer column
//! (value closest to one half, smallest column index on ties), and integer
//! feasible optima update the incumbent. A node whose relaxation cannot beat
//! the incumbent by more than the relative gap
//! `tolerance * max(1, |incumbent|)` is pruned; because nodes are popped
//! best-bound-first, the first such node ends the whole search.

use faer::Col;
use min_max_heap::MinMaxHeap;

use crate::lp::StandardForm;
use crate::lp::simplex::Simplex;
use crate::options::InternalOptions;
use crate::{E, I, Solver, SolverHooks, SolverState, Status};

#[derive(Debug, Clone, Copy)]
struct BoundDelta {
    column: I,
    lower: Option<E>,
    upper: Option<E>,
}

#[derive(Debug, Clone)]
struct Node {
    /// Parent relaxation objective; lower bound on every descendant.
    bound: E,
    /// Insertion sequence number; deterministic tiebreak.
    seq: u64,
    deltas: Vec<BoundDelta>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.bound == other.bound && self.seq == other.seq
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bound
            .total_cmp(&other.bound)
            .then(self.seq.cmp(&other.seq))
    }
}

pub struct BranchAndBound<'a> {
    root: &'a StandardForm,
    opts: InternalOptions,
    integer_columns: Vec<I>,
}

impl<'a> BranchAndBound<'a> {
    pub(crate) fn new(root: &'a StandardForm, options: &InternalOptions) -> Self {
        Self {
            root,
            opts: options.clone(),
            integer_columns: root.integer_columns(),
        }
    }

    /// Objective value a node must beat to be worth exploring.
    fn gap_cut(&self, incumbent: E) -> E {
        incumbent - self.opts.tolerance * incumbent.abs().max(1.)
    }

    /// The most-fractional integer column, or `None` if `x` is integral.
    fn branch_column(&self, x: &Col<E>) -> Option<I> {
        let mut best: Option<(I, E)> = None;
        for &j in &self.integer_columns {
            if (x[j] - x[j].round()).abs() <= self.opts.precision {
                continue;
            }
            let distance = (x[j] - x[j].floor() - 0.5).abs();
            if best.is_none_or(|(_, incumbent)| distance < incumbent) {
                best = Some((j, distance));
            }
        }
        best.map(|(j, _)| j)
    }
}

impl Solver for BranchAndBound<'_> {
    fn solve(&mut self, state: &mut SolverState, hooks: &mut SolverHooks) -> Status {
        let mut frontier: MinMaxHeap<Node> = MinMaxHeap::new();
        let mut seq: u64 = 0;
        frontier.push(Node {
            bound: E::NEG_INFINITY,
            seq,
            deltas: Vec::new(),
        });

        let mut incumbent: Option<(E, Col<E>)> = None;
        let mut terminal: Option<Status> = None;

        while let Some(node) = frontier.pop_min() {
            if let Some(status) = hooks.terminator.terminate() {
                terminal = Some(status);
                break;
            }
            if let Some((z_inc, _)) = &incumbent {
                // Best-bound order: once the most promising node is within the
                // gap, every remaining node is too.
                if node.bound >= self.gap_cut(*z_inc) {
                    break;
                }
            }

            state.count_node();
            let mut form = self.root.clone();
            for delta in &node.deltas {
                form.restrict_column(delta.column, delta.lower, delta.upper);
            }

            let node_status = Simplex::new(&form, &self.opts).solve(state, hooks);
            match node_status {
                Status::Infeasible => continue,
                Status::Unbounded if node.seq == 0 => {
                    terminal = Some(Status::Unbounded);
                    break;
                }
                // Tightening bounds cannot unbound a bounded relaxation; a
                // non-root unbounded node can only be numerical noise.
                Status::Unbounded => continue,
                Status::Optimal => {}
                other => {
                    terminal = Some(other);
                    break;
                }
            }

            let z = state.get_objective();
            if let Some((z_inc, _)) = &incumbent {
                if z >= self.gap_cut(*z_inc) {
                    continue;
                }
            }

            let x = state.get_primal().clone();
            match self.branch_column(&x) {
                None => {
                    if incumbent.as_ref().is_none_or(|(z_inc, _)| z < *z_inc) {
                        log::debug!("incumbent updated to {} at node {}", z, node.seq);
                        incumbent = Some((z, x));
                    }
                }
                Some(column) => {
                    let value = x[column];
                    let mut below = node.deltas.clone();
                    below.push(BoundDelta {
                        column,
                        lower: None,
                        upper: Some(value.floor()),
                    });
                    seq += 1;
                    frontier.push(Node { bound: z, seq, deltas: below });

                    let mut above = node.deltas.clone();
                    above.push(BoundDelta {
                        column,
                        lower: Some(value.ceil()),
                        upper: None,
                    });
                    seq += 1;
                    frontier.push(Node { bound: z, seq, deltas: above });
                }
            }
        }

        match (incumbent, terminal) {
            (Some((z, x)), terminal) => {
                state.set_primal(x);
                state.set_objective(z);
                state.set_infeasibility(0.);
                terminal.unwrap_or(Status::Optimal)
            }
            (None, Some(status)) => {
                state.set_infeasibility(E::INFINITY);
                status
            }
            (None, None) => {
                state.set_infeasibility(E::INFINITY);
                Status::Infeasible
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Options;
    use crate::model::{ConstraintSpec, Model, OpType};

    fn run(model: &Model) -> (Status, SolverState) {
        let form = StandardForm::from_model(model).unwrap();
        let options = Options::new();
        let internal = InternalOptions::from(&options);
        let mut state = SolverState::new();
        let mut hooks = SolverHooks::from_options(&options);
        let status = BranchAndBound::new(&form, &internal).solve(&mut state, &mut hooks);
        (status, state)
    }

    fn value(model: &Model, state: &SolverState, name: &str) -> E {
        let form = StandardForm::from_model(model).unwrap();
        let j = form.get_names().index_of(name).unwrap();
        state.get_primal()[j]
    }

    #[test]
    fn solves_a_two_variable_integer_program() {
        // max 3x + 2y  s.t.  x + y <= 4, x, y integer  ->  z = 12
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 3.), ("y", 2.)])
            .set_row("c", &[("x", 1.), ("y", 1.)])
            .set_constraint("c", ConstraintSpec::at_most(4.))
            .flag_int("x")
            .flag_int("y");

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((state.get_objective() + 12.).abs() < 1e-6);
    }

    #[test]
    fn branching_is_exercised_by_fractional_relaxations() {
        // max x + y  s.t.  2x + 2y <= 5  ->  LP gives 2.5, ILP gives 2.
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 1.), ("y", 1.)])
            .set_row("c", &[("x", 2.), ("y", 2.)])
            .set_constraint("c", ConstraintSpec::at_most(5.))
            .flag_int("x")
            .flag_int("y");

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((state.get_objective() + 2.).abs() < 1e-6);
        let x = value(&model, &state, "x");
        let y = value(&model, &state, "y");
        assert!((x - x.round()).abs() < 1e-9);
        assert!((y - y.round()).abs() < 1e-9);
        assert!(state.get_nodes() > 1);
    }

    #[test]
    fn binary_knapsack() {
        // max 3a + 4b + 5c + 6d  s.t.  2a + 3b + 4c + 5d <= 5, all binary.
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("a", 3.), ("b", 4.), ("c", 5.), ("d", 6.)])
            .set_row("cap", &[("a", 2.), ("b", 3.), ("c", 4.), ("d", 5.)])
            .set_constraint("cap", ConstraintSpec::at_most(5.));
        for name in ["a", "b", "c", "d"] {
            model.flag_binary(name);
        }

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((state.get_objective() + 7.).abs() < 1e-6);
        assert!((value(&model, &state, "a") - 1.).abs() < 1e-6);
        assert!((value(&model, &state, "b") - 1.).abs() < 1e-6);
        assert!(value(&model, &state, "c").abs() < 1e-6);
        assert!(value(&model, &state, "d").abs() < 1e-6);
    }

    #[test]
    fn detects_integer_infeasibility() {
        // 0.4 <= x <= 0.6 admits no integer.
        let mut model = Model::new(OpType::Min, "obj");
        model
            .set_row("obj", &[("x", 1.)])
            .set_constraint("x", ConstraintSpec::range(0.4, 0.6))
            .flag_int("x");

        let (status, _) = run(&model);
        assert_eq!(status, Status::Infeasible);
    }

    #[test]
    fn unbounded_root_relaxation_is_reported() {
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 1.), ("y", 1.)])
            .set_row("c", &[("x", 1.), ("y", -1.)])
            .set_constraint("c", ConstraintSpec::at_most(2.))
            .flag_int("x");

        let (status, _) = run(&model);
        assert_eq!(status, Status::Unbounded);
    }

    #[test]
    fn timeout_returns_between_nodes() {
        use crate::callback::{Callback, NoOpCallback};
        use crate::terminators::{Terminator, TimeOutTerminator};

        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 1.), ("y", 1.)])
            .set_row("c", &[("x", 2.), ("y", 2.)])
            .set_constraint("c", ConstraintSpec::at_most(5.))
            .flag_int("x")
            .flag_int("y");

        let form = StandardForm::from_model(&model).unwrap();
        let options = Options::new();
        let internal = InternalOptions::from(&options);
        let mut state = SolverState::new();
        let mut terminator = TimeOutTerminator::new(std::time::Duration::from_millis(0));
        terminator.initialize();
        let mut hooks = SolverHooks {
            callback: Box::new(NoOpCallback::new(&options)),
            terminator: Box::new(terminator),
        };

        let status = BranchAndBound::new(&form, &internal).solve(&mut state, &mut hooks);
        assert_eq!(status, Status::TimedOut);
    }
}
