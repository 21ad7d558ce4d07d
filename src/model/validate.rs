//! Structural model validation.
//!
//! Validation catches defects in the *shape* of a model before any numerical
//! work happens. Semantic infeasibility (e.g. `min > max` on a bound record)
//! is deliberately not flagged here; the solver reports it in-band.

use derive_more::{Display, Error};

use crate::model::Model;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[display("objective '{name}' is not defined in the variable table")]
    MissingObjective { name: String },

    #[display("constraint '{name}' does not match any solution or internal variable")]
    UnknownVariable { name: String },

    #[display("variable '{name}' cannot be both binary and unrestricted")]
    ConflictingDomain { name: String },

    #[display("constraint '{name}' is malformed: {detail}")]
    MalformedConstraint { name: String, detail: String },
}

/// Checks a model for structural defects, failing on the first violation.
pub fn validate(model: &Model) -> Result<(), ValidationError> {
    if model.optimize.is_empty() || !model.variables.contains_key(&model.optimize) {
        return Err(ValidationError::MissingObjective {
            name: model.optimize.clone(),
        });
    }

    for name in &model.binaries {
        if model.unrestricted.contains(name) {
            return Err(ValidationError::ConflictingDomain { name: name.clone() });
        }
    }

    for (name, spec) in &model.constraints {
        if spec.min.is_none() && spec.max.is_none() && spec.equal.is_none() {
            return Err(ValidationError::MalformedConstraint {
                name: name.clone(),
                detail: "no bound is set".to_string(),
            });
        }

        if let Some(equal) = spec.equal {
            if spec.min.is_some_and(|min| min > equal) {
                return Err(ValidationError::MalformedConstraint {
                    name: name.clone(),
                    detail: format!("equal = {} conflicts with min = {}", equal, spec.min.unwrap()),
                });
            }
            if spec.max.is_some_and(|max| max < equal) {
                return Err(ValidationError::MalformedConstraint {
                    name: name.clone(),
                    detail: format!("equal = {} conflicts with max = {}", equal, spec.max.unwrap()),
                });
            }
        }

        if !model.variables.contains_key(name) && !is_internal_variable(model, name) {
            return Err(ValidationError::UnknownVariable { name: name.clone() });
        }
    }

    Ok(())
}

/// Whether `name` appears as an internal variable of some linear combination.
fn is_internal_variable(model: &Model, name: &str) -> bool {
    model.variables.values().any(|combo| combo.contains_key(name))
}
