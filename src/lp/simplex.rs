//! Two-phase primal simplex on a dense tableau with variable bounds.
//!
//! The engine maintains the transformed tableau `B^-1 A`, the basic-variable
//! values, and the reduced-cost row, updating all three by Gauss-Jordan
//! elimination on each pivot. Nonbasic variables rest on their lower or upper
//! bound; a ratio-test outcome may therefore be a plain basis change or a
//! bound flip of the entering column.
//!
//! Phase I minimizes the total artificial mass from the preprocessed starting
//! basis; Phase II continues with the true costs. Artificial columns are
//! barred from entering in either phase and have their bounds locked to zero
//! once feasibility is proved.
//!
//! Pivot selection is Dantzig's rule (most negative reduced cost, adapted to
//! bounds) with the leaving row chosen by the minimum-ratio test, ties broken
//! by smallest basis index. Cycling is suspected when the same basis
//! reappears or the iteration budget `50 * max(m, n)` is exhausted; the
//! policy then either terminates with [`Status::CycleDetected`] or falls back
//! to Bland's rule for all remaining pivots.

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use faer::{Col, Mat};

use crate::lp::{ColumnKind, StandardForm};
use crate::options::InternalOptions;
use crate::{E, I, Phase, Solver, SolverHooks, SolverState, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarLoc {
    Basic(usize),
    AtLower,
    AtUpper,
}

enum RatioOutcome {
    /// A basic variable blocks after `delta`; it leaves toward the named bound.
    Blocking { row: usize, delta: E, to_upper: bool },
    /// The entering column hits its own opposite bound first.
    BoundFlip { delta: E },
    Unbounded,
    /// Improving column, but every pivot candidate is below the tolerance.
    Failure,
}

pub struct Simplex<'a> {
    form: &'a StandardForm,
    opts: InternalOptions,

    m: usize,
    n: usize,
    t: Mat<E>,
    beta: Vec<E>,
    basis: Vec<I>,
    loc: Vec<VarLoc>,
    lower: Vec<E>,
    upper: Vec<E>,
    d: Vec<E>,
    z: E,
    phase: Phase,

    nit: usize,
    iter_cap: usize,
    hard_cap: usize,
    bland: bool,
    seen: HashSet<u64>,
    best: Option<(E, Vec<E>)>,
}

impl<'a> Simplex<'a> {
    pub(crate) fn new(form: &'a StandardForm, options: &InternalOptions) -> Self {
        let (n, m) = form.get_dims();
        let iter_cap = 50 * m.max(n).max(1);
        Self {
            form,
            opts: options.clone(),
            m,
            n,
            t: Mat::zeros(m, n),
            beta: vec![0.; m],
            basis: form.basis.clone(),
            loc: vec![VarLoc::AtLower; n],
            lower: form.columns.iter().map(|column| column.lower).collect(),
            upper: form.columns.iter().map(|column| column.upper).collect(),
            d: vec![0.; n],
            z: 0.,
            phase: Phase::One,
            nit: 0,
            iter_cap,
            hard_cap: iter_cap.saturating_mul(20),
            bland: false,
            seen: HashSet::new(),
            best: None,
        }
    }

    fn kind(&self, column: I) -> ColumnKind {
        self.form.columns[column].kind
    }

    /// Index of the artificial column owned by `row`; artificials are the
    /// trailing `m` columns, in row order.
    fn artificial_of(&self, row: usize) -> I {
        self.n - self.m + row
    }

    /// Sets up the working tableau and a feasible starting basis.
    ///
    /// Nonbasic columns start on their lower bound. A row whose designated
    /// slack would go negative under those values is flipped in sign and
    /// restarted on its artificial, whose coefficient is re-pinned to `+1` so
    /// the starting basis stays an identity.
    fn initialize(&mut self) {
        self.t.copy_from(&self.form.A);

        for (i, &k) in self.basis.iter().enumerate() {
            self.loc[k] = VarLoc::Basic(i);
        }

        for i in 0..self.m {
            let mut residual = self.form.b[i];
            for j in 0..self.n {
                if !matches!(self.loc[j], VarLoc::Basic(_)) && self.lower[j] != 0. {
                    residual -= self.t[(i, j)] * self.lower[j];
                }
            }

            let designated = self.basis[i];
            if self.kind(designated) == ColumnKind::Slack && residual >= -self.opts.precision {
                self.beta[i] = residual.max(0.);
                continue;
            }

            if residual < 0. {
                for j in 0..self.n {
                    self.t[(i, j)] = -self.t[(i, j)];
                }
                residual = -residual;
            }
            let artificial = self.artificial_of(i);
            self.t[(i, artificial)] = 1.;
            if designated != artificial {
                self.loc[designated] = VarLoc::AtLower;
                self.basis[i] = artificial;
                self.loc[artificial] = VarLoc::Basic(i);
            }
            self.beta[i] = residual;
        }
    }

    fn load_phase_one(&mut self) {
        self.phase = Phase::One;
        self.seen.clear();
        for j in 0..self.n {
            self.d[j] = if self.kind(j) == ColumnKind::Artificial { 1. } else { 0. };
        }
        self.z = 0.;
        for i in 0..self.m {
            if self.kind(self.basis[i]) == ColumnKind::Artificial {
                for j in 0..self.n {
                    self.d[j] -= self.t[(i, j)];
                }
                self.z += self.beta[i];
            }
        }
    }

    fn load_phase_two(&mut self) {
        self.phase = Phase::Two;
        self.seen.clear();
        for j in 0..self.n {
            self.d[j] = self.form.c[j];
        }
        for i in 0..self.m {
            let cost = self.form.c[self.basis[i]];
            if cost != 0. {
                for j in 0..self.n {
                    self.d[j] -= cost * self.t[(i, j)];
                }
            }
        }
        self.z = self.form.objective_value(&self.extract_primal());
    }

    /// Total artificial mass still in the basis.
    fn artificial_mass(&self) -> E {
        (0..self.m)
            .filter(|&i| self.kind(self.basis[i]) == ColumnKind::Artificial)
            .map(|i| self.beta[i])
            .sum()
    }

    /// Pivots zero-valued basic artificials out where a usable column exists;
    /// rows with no candidate are redundant and keep their artificial pinned
    /// at zero.
    fn purge_artificials(&mut self) {
        for row in 0..self.m {
            if self.kind(self.basis[row]) != ColumnKind::Artificial {
                continue;
            }
            let target = (0..self.n).find(|&j| {
                self.kind(j) != ColumnKind::Artificial
                    && !matches!(self.loc[j], VarLoc::Basic(_))
                    && self.upper[j] > self.lower[j]
                    && self.t[(row, j)].abs() >= self.opts.pivot_tolerance
            });
            if let Some(j) = target {
                let sigma = if self.loc[j] == VarLoc::AtLower { 1. } else { -1. };
                self.pivot(j, sigma, row, 0., false);
            }
        }
        for j in 0..self.n {
            if self.kind(j) == ColumnKind::Artificial {
                self.lower[j] = 0.;
                self.upper[j] = 0.;
            }
        }
    }

    /// Entering-column selection: Dantzig's rule by default, Bland's rule once
    /// cycling has been suspected.
    fn select_entering(&self) -> Option<I> {
        let mut best: Option<(I, E)> = None;
        for j in 0..self.n {
            if matches!(self.loc[j], VarLoc::Basic(_)) {
                continue;
            }
            if self.kind(j) == ColumnKind::Artificial || self.upper[j] <= self.lower[j] {
                continue;
            }
            let violation = match self.loc[j] {
                VarLoc::AtLower => -self.d[j],
                VarLoc::AtUpper => self.d[j],
                VarLoc::Basic(_) => unreachable!(),
            };
            if violation > self.opts.cost_tolerance {
                if self.bland {
                    return Some(j);
                }
                if best.is_none_or(|(_, incumbent)| violation > incumbent) {
                    best = Some((j, violation));
                }
            }
        }
        best.map(|(j, _)| j)
    }

    /// Minimum-ratio test for entering column `j` moving in direction `sigma`.
    fn ratio_test(&self, j: I, sigma: E) -> RatioOutcome {
        let tie = self.opts.precision;
        let own_span = self.upper[j] - self.lower[j];

        let mut best: Option<(usize, E, bool)> = None;
        let mut skipped_small = false;
        for i in 0..self.m {
            let alpha = self.t[(i, j)] * sigma;
            let k = self.basis[i];
            let candidate = if alpha > self.opts.pivot_tolerance {
                let room = (self.beta[i] - self.lower[k]).max(0.);
                Some((room / alpha, false))
            } else if alpha < -self.opts.pivot_tolerance {
                if self.upper[k].is_finite() {
                    let room = (self.upper[k] - self.beta[i]).max(0.);
                    Some((room / -alpha, true))
                } else {
                    None
                }
            } else {
                if self.t[(i, j)] != 0. {
                    skipped_small = true;
                }
                None
            };

            if let Some((delta, to_upper)) = candidate {
                let better = match best {
                    None => true,
                    Some((row, incumbent, _)) => {
                        delta < incumbent - tie
                            || (delta < incumbent + tie && k < self.basis[row])
                    }
                };
                if better {
                    best = Some((i, delta, to_upper));
                }
            }
        }

        match best {
            Some((_, delta, _)) if own_span.is_finite() && own_span < delta - tie => {
                RatioOutcome::BoundFlip { delta: own_span }
            }
            Some((row, delta, to_upper)) => RatioOutcome::Blocking { row, delta, to_upper },
            None if own_span.is_finite() => RatioOutcome::BoundFlip { delta: own_span },
            None if skipped_small => RatioOutcome::Failure,
            None => RatioOutcome::Unbounded,
        }
    }

    /// Moves the entering column across its whole range; no basis change.
    fn bound_flip(&mut self, j: I, sigma: E, delta: E) {
        for i in 0..self.m {
            self.beta[i] -= self.t[(i, j)] * sigma * delta;
        }
        self.z += self.d[j] * sigma * delta;
        self.loc[j] = match self.loc[j] {
            VarLoc::AtLower => VarLoc::AtUpper,
            VarLoc::AtUpper => VarLoc::AtLower,
            VarLoc::Basic(_) => unreachable!(),
        };
    }

    /// Exchanges the entering column `j` with the basic variable of `row`.
    fn pivot(&mut self, j: I, sigma: E, row: usize, delta: E, to_upper: bool) {
        let delta = delta.max(0.);
        let from = match self.loc[j] {
            VarLoc::AtLower => self.lower[j],
            VarLoc::AtUpper => self.upper[j],
            VarLoc::Basic(_) => unreachable!(),
        };
        let enter_value = from + sigma * delta;

        self.z += self.d[j] * sigma * delta;
        for i in 0..self.m {
            if i != row {
                self.beta[i] -= self.t[(i, j)] * sigma * delta;
            }
        }

        let leaving = self.basis[row];
        self.loc[leaving] = if to_upper { VarLoc::AtUpper } else { VarLoc::AtLower };

        let pivot = self.t[(row, j)];
        for col in 0..self.n {
            self.t[(row, col)] /= pivot;
        }
        for i in 0..self.m {
            if i == row {
                continue;
            }
            let factor = self.t[(i, j)];
            if factor != 0. {
                for col in 0..self.n {
                    self.t[(i, col)] -= factor * self.t[(row, col)];
                }
            }
        }
        let factor = self.d[j];
        if factor != 0. {
            for col in 0..self.n {
                self.d[col] -= factor * self.t[(row, col)];
            }
        }

        self.beta[row] = enter_value;
        self.basis[row] = j;
        self.loc[j] = VarLoc::Basic(row);
    }

    fn extract_primal(&self) -> Col<E> {
        Col::from_fn(self.n, |j| match self.loc[j] {
            VarLoc::Basic(row) => self.beta[row],
            VarLoc::AtLower => self.lower[j],
            VarLoc::AtUpper => self.upper[j],
        })
    }

    fn basis_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.basis.hash(&mut hasher);
        for j in 0..self.n {
            if self.loc[j] == VarLoc::AtUpper {
                j.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Runs pivots for the current phase until no improving column remains or
    /// a terminal condition fires. `Status::Optimal` means phase-optimal.
    fn iterate(&mut self, state: &mut SolverState, hooks: &mut SolverHooks) -> Status {
        loop {
            if let Some(status) = hooks.terminator.terminate() {
                return status;
            }

            let Some(j) = self.select_entering() else {
                return Status::Optimal;
            };

            self.nit += 1;
            state.count_iteration();
            if !self.bland {
                let repeated = !self.seen.insert(self.basis_key());
                if repeated || self.nit > self.iter_cap {
                    if self.opts.exit_on_cycles {
                        return Status::CycleDetected;
                    }
                    log::warn!(
                        "cycle suspected after {} iterations; switching to Bland's rule",
                        self.nit
                    );
                    self.bland = true;
                }
            } else if self.nit > self.hard_cap {
                return Status::CycleDetected;
            }

            let sigma = if self.loc[j] == VarLoc::AtLower { 1. } else { -1. };
            match self.ratio_test(j, sigma) {
                RatioOutcome::Blocking { row, delta, to_upper } => {
                    log::trace!("pivot: column {} enters, row {} leaves, step {}", j, row, delta);
                    self.pivot(j, sigma, row, delta, to_upper);
                }
                RatioOutcome::BoundFlip { delta } => {
                    log::trace!("bound flip: column {} crosses its range {}", j, delta);
                    self.bound_flip(j, sigma, delta);
                }
                RatioOutcome::Unbounded => {
                    return if self.phase == Phase::One {
                        Status::NumericalFailure
                    } else {
                        Status::Unbounded
                    };
                }
                RatioOutcome::Failure => return Status::NumericalFailure,
            }

            match self.phase {
                Phase::One => state.set_infeasibility(self.z),
                Phase::Two => {
                    state.set_objective(self.z);
                    if self.best.as_ref().is_none_or(|(incumbent, _)| self.z < *incumbent) {
                        let x = self.extract_primal();
                        self.best = Some((self.z, (0..self.n).map(|j| x[j]).collect()));
                    }
                }
            }
            hooks.callback.call(state);
        }
    }

    fn finalize(&mut self, state: &mut SolverState, status: Status) -> Status {
        let x = match (&status, self.best.take()) {
            (Status::CycleDetected | Status::TimedOut | Status::Interrupted, Some((_, best))) => {
                Col::from_fn(self.n, |j| best[j])
            }
            _ => self.extract_primal(),
        };
        state.set_objective(self.form.objective_value(&x));
        state.set_infeasibility(self.artificial_mass());
        state.set_primal(x);
        status
    }
}

impl Solver for Simplex<'_> {
    fn solve(&mut self, state: &mut SolverState, hooks: &mut SolverHooks) -> Status {
        for j in 0..self.n {
            if self.lower[j] > self.upper[j] + self.opts.precision {
                state.set_primal(Col::zeros(self.n));
                return Status::Infeasible;
            }
        }

        self.initialize();

        state.set_phase(Phase::One);
        self.load_phase_one();
        if self.z > self.opts.cost_tolerance {
            let status = self.iterate(state, hooks);
            if status != Status::Optimal {
                return self.finalize(state, status);
            }
            if self.artificial_mass() > self.opts.cost_tolerance {
                return self.finalize(state, Status::Infeasible);
            }
        }
        self.purge_artificials();

        state.set_phase(Phase::Two);
        self.load_phase_two();
        let status = self.iterate(state, hooks);
        self.finalize(state, status)
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
        let status = Simplex::new(&form, &internal).solve(&mut state, &mut hooks);
        (status, state)
    }

    fn value(model: &Model, state: &SolverState, name: &str) -> E {
        let form = StandardForm::from_model(model).unwrap();
        let j = form.get_names().index_of(name).unwrap();
        state.get_primal()[j]
    }

    #[test]
    fn solves_a_simple_maximization() {
        // max 3x + 2y  s.t.  x + y <= 5  ->  x = 5, z = 15
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 3.), ("y", 2.)])
            .set_row("c", &[("x", 1.), ("y", 1.)])
            .set_constraint("c", ConstraintSpec::at_most(5.));

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        // Standard form minimizes the negated objective.
        assert!((state.get_objective() + 15.).abs() < 1e-9);
        assert!((value(&model, &state, "x") - 5.).abs() < 1e-9);
        assert!(value(&model, &state, "y").abs() < 1e-9);
    }

    #[test]
    fn phase_one_handles_negative_rhs() {
        // max x + y  s.t.  -x - y <= -3,  x + y <= 5  ->  z = 5
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 1.), ("y", 1.)])
            .set_row("lo", &[("x", -1.), ("y", -1.)])
            .set_constraint("lo", ConstraintSpec::at_most(-3.))
            .set_row("hi", &[("x", 1.), ("y", 1.)])
            .set_constraint("hi", ConstraintSpec::at_most(5.));

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((state.get_objective() + 5.).abs() < 1e-9);
    }

    #[test]
    fn detects_infeasibility() {
        // x <= 1 and x >= 2 cannot both hold.
        let mut model = Model::new(OpType::Min, "obj");
        model
            .set_row("obj", &[("x", 1.)])
            .set_row("hi", &[("x", 1.)])
            .set_constraint("hi", ConstraintSpec::at_most(1.))
            .set_row("lo", &[("x", 1.)])
            .set_constraint("lo", ConstraintSpec::at_least(2.));

        let (status, _) = run(&model);
        assert_eq!(status, Status::Infeasible);
    }

    #[test]
    fn detects_infeasible_column_bounds() {
        let mut model = Model::new(OpType::Min, "obj");
        model
            .set_row("obj", &[("x", 1.)])
            .set_constraint("x", ConstraintSpec::range(2., 1.));

        let (status, _) = run(&model);
        assert_eq!(status, Status::Infeasible);
    }

    #[test]
    fn detects_unboundedness() {
        // max x  s.t.  x - y <= 1
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 1.)])
            .set_row("c", &[("x", 1.), ("y", -1.)])
            .set_constraint("c", ConstraintSpec::at_most(1.));

        let (status, _) = run(&model);
        assert_eq!(status, Status::Unbounded);
    }

    #[test]
    fn respects_upper_bounds_without_rows() {
        // min -x - 2y with x <= 4, y <= 3 as pure column bounds.
        let mut model = Model::new(OpType::Min, "obj");
        model
            .set_row("obj", &[("x", -1.), ("y", -2.)])
            .set_constraint("x", ConstraintSpec::at_most(4.))
            .set_constraint("y", ConstraintSpec::at_most(3.));

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((state.get_objective() + 10.).abs() < 1e-9);
        assert!((value(&model, &state, "x") - 4.).abs() < 1e-9);
        assert!((value(&model, &state, "y") - 3.).abs() < 1e-9);
    }

    #[test]
    fn fixed_columns_stay_fixed() {
        // min x + y with y = 2.5 fixed, x + y >= 4.
        let mut model = Model::new(OpType::Min, "obj");
        model
            .set_row("obj", &[("x", 1.), ("y", 1.)])
            .set_row("c", &[("x", 1.), ("y", 1.)])
            .set_constraint("c", ConstraintSpec::at_least(4.))
            .set_constraint("y", ConstraintSpec::exactly(2.5));

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((value(&model, &state, "y") - 2.5).abs() < 1e-9);
        assert!((value(&model, &state, "x") - 1.5).abs() < 1e-9);
        assert!((state.get_objective() - 4.).abs() < 1e-9);
    }

    #[test]
    fn handles_degenerate_ties() {
        // max x + y  s.t.  x + y <= 2, x <= 2, y <= 2; several optimal bases.
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 1.), ("y", 1.)])
            .set_row("c", &[("x", 1.), ("y", 1.)])
            .set_constraint("c", ConstraintSpec::at_most(2.))
            .set_constraint("x", ConstraintSpec::at_most(2.))
            .set_constraint("y", ConstraintSpec::at_most(2.));

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((state.get_objective() + 2.).abs() < 1e-9);
    }

    #[test]
    fn equality_rows_solve_through_artificials() {
        // min x + y  s.t.  x + y = 10, x >= 3, y >= 4.
        let mut model = Model::new(OpType::Min, "obj");
        model
            .set_row("obj", &[("x", 1.), ("y", 1.)])
            .set_row("bal", &[("x", 1.), ("y", 1.)])
            .set_constraint("bal", ConstraintSpec::exactly(10.))
            .set_constraint("x", ConstraintSpec::at_least(3.))
            .set_constraint("y", ConstraintSpec::at_least(4.));

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((state.get_objective() - 10.).abs() < 1e-9);
        let x = value(&model, &state, "x");
        let y = value(&model, &state, "y");
        assert!((x + y - 10.).abs() < 1e-9);
        assert!(x >= 3. - 1e-9 && y >= 4. - 1e-9);
    }

    #[test]
    fn unrestricted_variables_can_go_negative() {
        // min x  s.t.  x >= -7 with x free  ->  x = -7.
        let mut model = Model::new(OpType::Min, "obj");
        model
            .set_row("obj", &[("x", 1.)])
            .set_constraint("x", ConstraintSpec::at_least(-7.))
            .flag_unrestricted("x");

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((state.get_objective() + 7.).abs() < 1e-9);
    }

    #[test]
    fn redundant_rows_leave_an_artificial_pinned() {
        // Two identical equalities; one row is redundant.
        let mut model = Model::new(OpType::Min, "obj");
        model
            .set_row("obj", &[("x", 1.), ("y", 2.)])
            .set_row("e1", &[("x", 1.), ("y", 1.)])
            .set_constraint("e1", ConstraintSpec::exactly(5.))
            .set_row("e2", &[("x", 1.), ("y", 1.)])
            .set_constraint("e2", ConstraintSpec::exactly(5.));

        let (status, state) = run(&model);
        assert_eq!(status, Status::Optimal);
        assert!((state.get_objective() - 5.).abs() < 1e-9);
        assert!((value(&model, &state, "x") - 5.).abs() < 1e-9);
    }
}
