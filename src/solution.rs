//! Projection of a standard-form point back onto the model's solution
//! variables.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::lp::StandardForm;
use crate::model::Model;
use crate::options::InternalOptions;
use crate::{E, SolverState, Status};

/// Counters accumulated over a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SolveStats {
    /// Total simplex iterations, across phases and branch-and-bound nodes.
    pub iterations: usize,
    /// Branch-and-bound nodes evaluated (zero for a pure LP).
    pub nodes: usize,
}

/// Outcome of a solve.
///
/// Solver-state outcomes are always reported in-band: `status` carries the
/// verdict, `feasible`/`bounded` mirror it, and `result` is the objective in
/// the user's sign convention. `variables` holds the assembled solution
/// variables, omitting values within `precision` of zero unless the
/// `full_output` option is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub status: Status,
    pub feasible: bool,
    pub bounded: bool,
    pub result: E,
    /// For mixed-integer models only: whether every integer variable is
    /// within `precision` of an integer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_integral: Option<bool>,
    pub variables: BTreeMap<String, E>,
    pub stats: SolveStats,
}

/// Assembles the user-facing solution from the final solver state.
///
/// Each declared solution variable evaluates to `sum coeff * x[internal]`
/// over its linear combination; split variables contribute the difference of
/// their parts. The objective entry is reported through `result` rather than
/// repeated in `variables`.
pub(crate) fn assemble(
    model: &Model,
    form: &StandardForm,
    state: &SolverState,
    options: &InternalOptions,
) -> Solution {
    let status = state.get_status();
    let x = state.get_primal();
    let has_point = x.nrows() == form.get_n_vars();

    let feasible =
        status != Status::Infeasible && state.get_infeasibility() <= options.cost_tolerance;
    let bounded = status != Status::Unbounded;

    let result = if !feasible {
        0.
    } else if !bounded {
        if form.is_maximize() { E::INFINITY } else { E::NEG_INFINITY }
    } else if form.is_maximize() {
        -state.get_objective()
    } else {
        state.get_objective()
    };

    let names = form.get_names();
    let mut variables = BTreeMap::new();
    if has_point && feasible && bounded {
        for (name, combo) in &model.variables {
            if name == &model.optimize {
                continue;
            }
            let mut total = 0.;
            for (var, coeff) in combo {
                if let Some(j) = names.index_of(var) {
                    total += coeff * x[j];
                }
                if let Some(neg) = names.negative_part(var) {
                    total -= coeff * x[neg];
                }
            }
            if options.full_output || total.abs() > options.precision {
                variables.insert(name.clone(), total);
            }
        }
    }

    let is_integral = form.has_integers().then(|| {
        has_point
            && form
                .integer_columns()
                .iter()
                .all(|&j| (x[j] - x[j].round()).abs() <= options.precision)
    });

    Solution {
        status,
        feasible,
        bounded,
        result,
        is_integral,
        variables,
        stats: SolveStats {
            iterations: state.get_iterations(),
            nodes: state.get_nodes(),
        },
    }
}
