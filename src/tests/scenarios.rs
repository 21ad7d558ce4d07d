//! End-to-end solves through the public API.

use crate::model::{ConstraintSpec, Model, ModelOptions, OpType};
use crate::{Options, Status, solve, solve_with_options};

/// max x + y  s.t.  x + 2y <= 14,  3x - y >= 0,  x - y <= 2.
///
/// Identity rows surface the internal variables in the output.
fn planar_lp() -> Model {
    let mut model = Model::new(OpType::Max, "profit");
    model
        .set_row("profit", &[("x", 1.), ("y", 1.)])
        .set_row("c1", &[("x", 1.), ("y", 2.)])
        .set_constraint("c1", ConstraintSpec::at_most(14.))
        .set_row("c2", &[("x", 3.), ("y", -1.)])
        .set_constraint("c2", ConstraintSpec::at_least(0.))
        .set_row("c3", &[("x", 1.), ("y", -1.)])
        .set_constraint("c3", ConstraintSpec::at_most(2.))
        .set_row("x", &[("x", 1.)])
        .set_row("y", &[("y", 1.)]);
    model
}

#[test]
fn planar_lp_reaches_the_optimal_vertex() {
    super::init_logging();
    let solution = solve(&planar_lp()).unwrap();

    assert_eq!(solution.status, Status::Optimal);
    assert!(solution.feasible);
    assert!(solution.bounded);
    // The binding constraints are x + 2y = 14 and x - y = 2.
    assert!((solution.result - 10.).abs() < 1e-6);
    assert!((solution.variables["x"] - 6.).abs() < 1e-6);
    assert!((solution.variables["y"] - 4.).abs() < 1e-6);
}

#[test]
fn contradictory_bounds_are_infeasible() {
    // min x  s.t.  x <= 1, x >= 2.
    let mut model = Model::new(OpType::Min, "obj");
    model
        .set_row("obj", &[("x", 1.)])
        .set_constraint("x", ConstraintSpec::range(2., 1.));

    let solution = solve(&model).unwrap();
    assert_eq!(solution.status, Status::Infeasible);
    assert!(!solution.feasible);
    assert_eq!(solution.result, 0.);
    assert!(solution.variables.is_empty());
}

#[test]
fn open_direction_is_unbounded() {
    // max x  s.t.  x - y <= 1.
    let mut model = Model::new(OpType::Max, "obj");
    model
        .set_row("obj", &[("x", 1.)])
        .set_row("c", &[("x", 1.), ("y", -1.)])
        .set_constraint("c", ConstraintSpec::at_most(1.));

    let solution = solve(&model).unwrap();
    assert_eq!(solution.status, Status::Unbounded);
    assert!(!solution.bounded);
    assert!(solution.feasible);
}

#[test]
fn binary_knapsack_picks_the_best_bundle() {
    // max 3a + 4b + 5c + 6d  s.t.  2a + 3b + 4c + 5d <= 5, all binary.
    let mut model = Model::new(OpType::Max, "value");
    model
        .set_row("value", &[("a", 3.), ("b", 4.), ("c", 5.), ("d", 6.)])
        .set_row("weight", &[("a", 2.), ("b", 3.), ("c", 4.), ("d", 5.)])
        .set_constraint("weight", ConstraintSpec::at_most(5.));
    for name in ["a", "b", "c", "d"] {
        model.flag_binary(name);
        model.set_row(name, &[(name, 1.)]);
    }

    let solution = solve(&model).unwrap();
    assert_eq!(solution.status, Status::Optimal);
    assert_eq!(solution.is_integral, Some(true));
    assert!((solution.result - 7.).abs() < 1e-6);
    assert!((solution.variables["a"] - 1.).abs() < 1e-6);
    assert!((solution.variables["b"] - 1.).abs() < 1e-6);
    // Zero-valued picks are filtered from the output by default.
    assert!(!solution.variables.contains_key("c"));
    assert!(!solution.variables.contains_key("d"));
}

#[test]
fn full_output_keeps_zero_valued_variables() {
    let mut model = Model::new(OpType::Max, "value");
    model
        .set_row("value", &[("a", 3.), ("b", 1.)])
        .set_row("cap", &[("a", 1.), ("b", 1.)])
        .set_constraint("cap", ConstraintSpec::at_most(1.))
        .set_row("a", &[("a", 1.)])
        .set_row("b", &[("b", 1.)]);

    let mut options = Options::new();
    options.set_option("full_output", true).unwrap();
    let solution = solve_with_options(&model, &options).unwrap();

    assert!((solution.variables["a"] - 1.).abs() < 1e-9);
    assert_eq!(solution.variables["b"], 0.);
}

#[test]
fn equality_row_with_lower_bounds_is_deterministic() {
    // min x + y  s.t.  x + y = 10, x >= 3, y >= 4  ->  result 10.
    let mut model = Model::new(OpType::Min, "cost");
    model
        .set_row("cost", &[("x", 1.), ("y", 1.)])
        .set_row("bal", &[("x", 1.), ("y", 1.)])
        .set_constraint("bal", ConstraintSpec::exactly(10.))
        .set_row("x", &[("x", 1.)])
        .set_constraint("x", ConstraintSpec::at_least(3.))
        .set_row("y", &[("y", 1.)])
        .set_constraint("y", ConstraintSpec::at_least(4.));

    let first = solve(&model).unwrap();
    assert_eq!(first.status, Status::Optimal);
    assert!((first.result - 10.).abs() < 1e-6);

    let x = first.variables["x"];
    let y = first.variables["y"];
    assert!((3. ..=6.).contains(&x));
    assert!((x + y - 10.).abs() < 1e-6);

    // The tiebreaks are deterministic, so repeated solves land on the same
    // point, not merely the same objective.
    let second = solve(&model).unwrap();
    assert_eq!(first, second);
}

/// Beale's canonical cycling program.
fn beale() -> Model {
    let mut model = Model::new(OpType::Min, "cost");
    model
        .set_row(
            "cost",
            &[("x1", -0.75), ("x2", 150.), ("x3", -0.02), ("x4", 6.)],
        )
        .set_row("r1", &[("x1", 0.25), ("x2", -60.), ("x3", -0.04), ("x4", 9.)])
        .set_constraint("r1", ConstraintSpec::at_most(0.))
        .set_row("r2", &[("x1", 0.5), ("x2", -90.), ("x3", -0.02), ("x4", 3.)])
        .set_constraint("r2", ConstraintSpec::at_most(0.))
        .set_constraint("x3", ConstraintSpec::at_most(1.));
    model
}

#[test]
fn beale_terminates_under_blands_rule() {
    super::init_logging();
    let mut model = beale();
    model.set_options(ModelOptions {
        exit_on_cycles: Some(false),
        ..ModelOptions::default()
    });

    let solution = solve(&model).unwrap();
    assert_eq!(solution.status, Status::Optimal);
    assert!((solution.result + 0.05).abs() < 1e-9);
}

#[test]
fn beale_respects_the_default_cycling_policy() {
    let solution = solve(&beale()).unwrap();

    // Dantzig pivoting may or may not cycle here depending on tie handling;
    // the policy only promises an in-band verdict.
    match solution.status {
        Status::Optimal => assert!((solution.result + 0.05).abs() < 1e-9),
        Status::CycleDetected => assert!(solution.bounded),
        other => panic!("unexpected status {:?}", other),
    }
}

#[test]
fn zero_timeout_reports_in_band() {
    let mut model = planar_lp();
    model.set_options(ModelOptions {
        timeout: Some(0),
        ..ModelOptions::default()
    });

    let solution = solve(&model).unwrap();
    assert_eq!(solution.status, Status::TimedOut);
}

#[test]
fn verbose_solves_report_iterations_and_still_converge() {
    let mut options = Options::new();
    options.set_option("verbose", true).unwrap();

    let solution = solve_with_options(&planar_lp(), &options).unwrap();
    assert_eq!(solution.status, Status::Optimal);
    assert!((solution.result - 10.).abs() < 1e-6);
    assert!(solution.stats.iterations > 0);
}

#[test]
fn mir_cuts_option_is_accepted_and_ignored() {
    let mut model = planar_lp();
    model.set_options(ModelOptions {
        use_mir_cuts: Some(true),
        ..ModelOptions::default()
    });

    let solution = solve(&model).unwrap();
    assert_eq!(solution.status, Status::Optimal);
    assert!((solution.result - 10.).abs() < 1e-6);
}

#[test]
fn validation_is_opt_in() {
    let mut model = planar_lp();
    model.set_constraint("ghost", ConstraintSpec::at_most(1.));

    // Without validation the unknown key becomes a free-standing column.
    assert!(solve(&model).is_ok());

    let mut options = Options::new();
    options.set_option("validate", true).unwrap();
    assert!(solve_with_options(&model, &options).is_err());
}

#[test]
fn integer_programs_round_to_integral_points() {
    // max x + y  s.t.  2x + 2y <= 5, integers  ->  2.
    let mut model = Model::new(OpType::Max, "obj");
    model
        .set_row("obj", &[("x", 1.), ("y", 1.)])
        .set_row("c", &[("x", 2.), ("y", 2.)])
        .set_constraint("c", ConstraintSpec::at_most(5.))
        .set_row("x", &[("x", 1.)])
        .set_row("y", &[("y", 1.)])
        .flag_int("x")
        .flag_int("y");

    let solution = solve(&model).unwrap();
    assert_eq!(solution.status, Status::Optimal);
    assert_eq!(solution.is_integral, Some(true));
    assert!((solution.result - 2.).abs() < 1e-6);
    assert!(solution.stats.nodes > 1);
}
