//! Emitter for the LP text dialect.
//!
//! The inverse of [`crate::format::parse`] over the structured subset of the
//! model: the objective, every constrained row, raw-variable bounds, and the
//! domain declarations. Solution variables that are neither the objective nor
//! constrained (pure named outputs) have no LP-text counterpart and are not
//! emitted.

use std::collections::{BTreeMap, BTreeSet};

use crate::E;
use crate::model::{Model, OpType};

/// Renders a model as LP text lines (without trailing newlines).
pub fn emit_lines(model: &Model) -> Vec<String> {
    let mut lines = Vec::new();

    let direction = match model.op_type {
        OpType::Max => "max",
        OpType::Min => "min",
    };
    let objective = model
        .variables
        .get(&model.optimize)
        .map(format_terms)
        .unwrap_or_default();
    lines.push(format!("{}: {}", direction, objective));

    for (name, spec) in &model.constraints {
        match model.variables.get(name) {
            // A constrained combination row; this covers a bound attached to
            // the objective's own name, whose unconstrained row is only ever
            // the `max:`/`min:` line above.
            Some(combo) => {
                let lhs = format_terms(combo);
                if lhs.is_empty() {
                    continue;
                }
                if let Some(equal) = spec.equal {
                    lines.push(format!("{}: {} = {}", name, lhs, format_number(equal)));
                } else {
                    if let Some(min) = spec.min {
                        lines.push(format!("{}: {} >= {}", name, lhs, format_number(min)));
                    }
                    if let Some(max) = spec.max {
                        lines.push(format!("{}: {} <= {}", name, lhs, format_number(max)));
                    }
                }
            }
            None => {
                // Raw variable bound.
                if let Some(equal) = spec.equal {
                    lines.push(format!("{} = {}", name, format_number(equal)));
                } else {
                    if let Some(min) = spec.min {
                        lines.push(format!("{} >= {}", name, format_number(min)));
                    }
                    if let Some(max) = spec.max {
                        lines.push(format!("{} <= {}", name, format_number(max)));
                    }
                }
            }
        }
    }

    if let Some(line) = declaration("int", &model.ints) {
        lines.push(line);
    }
    if let Some(line) = declaration("bin", &model.binaries) {
        lines.push(line);
    }
    if let Some(line) = declaration("free", &model.unrestricted) {
        lines.push(line);
    }

    lines
}

fn declaration(keyword: &str, names: &BTreeSet<String>) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let list: Vec<&str> = names.iter().map(String::as_str).collect();
    Some(format!("{} {}", keyword, list.join(", ")))
}

fn format_terms(combo: &BTreeMap<String, E>) -> String {
    let mut out = String::new();
    for (name, &coeff) in combo {
        if coeff == 0. {
            continue;
        }
        if out.is_empty() {
            if coeff < 0. {
                out.push_str("-");
            }
        } else if coeff < 0. {
            out.push_str(" - ");
        } else {
            out.push_str(" + ");
        }
        let magnitude = coeff.abs();
        if magnitude == 1. {
            out.push_str(name);
        } else {
            out.push_str(&format!("{} {}", format_number(magnitude), name));
        }
    }
    out
}

fn format_number(value: E) -> String {
    format!("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::parse::parse_lines;
    use crate::model::ConstraintSpec;

    fn sample() -> Model {
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 3.), ("y", -1.)])
            .set_row("c1", &[("x", 1.), ("y", 2.)])
            .set_constraint("c1", ConstraintSpec::at_most(14.))
            .set_row("c2", &[("x", 1.), ("y", -1.)])
            .set_constraint("c2", ConstraintSpec::exactly(2.))
            .set_constraint("x", ConstraintSpec::at_least(1.))
            .flag_int("x")
            .flag_binary("b");
        model
    }

    #[test]
    fn emits_expected_lines() {
        let lines = emit_lines(&sample());
        assert_eq!(
            lines,
            vec![
                "max: 3 x - y".to_string(),
                "c1: x + 2 y <= 14".to_string(),
                "c2: x - y = 2".to_string(),
                "x >= 1".to_string(),
                "int x".to_string(),
                "bin b".to_string(),
            ]
        );
    }

    #[test]
    fn range_records_emit_two_lines() {
        let mut model = Model::new(OpType::Min, "obj");
        model
            .set_row("obj", &[("x", 1.)])
            .set_row("band", &[("x", 1.), ("y", 1.)])
            .set_constraint("band", ConstraintSpec::range(2., 8.));

        let lines = emit_lines(&model);
        assert!(lines.contains(&"band: x + y >= 2".to_string()));
        assert!(lines.contains(&"band: x + y <= 8".to_string()));

        assert_eq!(parse_lines(&lines).unwrap(), model);
    }

    #[test]
    fn bounds_on_the_objective_row_emit_its_combination() {
        let mut model = Model::new(OpType::Max, "profit");
        model
            .set_row("profit", &[("x", 1.), ("y", 1.)])
            .set_constraint("profit", ConstraintSpec::at_least(5.));

        let lines = emit_lines(&model);
        assert!(lines.contains(&"profit: x + y >= 5".to_string()));
        // Not a bare raw-variable bound, which would re-parse as an
        // unrelated free-standing column.
        assert!(!lines.contains(&"profit >= 5".to_string()));
    }

    #[test]
    fn objective_bounds_round_trip() {
        let mut model = Model::new(OpType::Max, "obj");
        model
            .set_row("obj", &[("x", 1.), ("y", 1.)])
            .set_constraint("obj", ConstraintSpec::at_least(5.))
            .set_row("cap", &[("x", 2.), ("y", 1.)])
            .set_constraint("cap", ConstraintSpec::at_most(10.));

        assert_eq!(parse_lines(&emit_lines(&model)).unwrap(), model);
    }

    #[test]
    fn emitted_text_parses_back_to_the_same_model() {
        let model = sample();
        let reparsed = parse_lines(&emit_lines(&model)).unwrap();

        // The sample already uses the canonical objective name, so the round
        // trip is exact.
        assert_eq!(reparsed, model);
    }

    #[test]
    fn round_trip_is_idempotent_after_one_normalization() {
        let lines = [
            "min: 2x + 3x - y",
            "4x + 2y >= 6",
            "x + y <= 10",
            "free y",
        ];
        let first = parse_lines(&lines).unwrap();
        let second = parse_lines(&emit_lines(&first)).unwrap();
        assert_eq!(first, second);
    }
}
