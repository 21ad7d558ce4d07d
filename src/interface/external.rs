//! Hand-off of a model to an external solver binary.
//!
//! When a model carries an [`External`](crate::model::External) description,
//! the shell stages the LP text under the requested file name in a fresh
//! temporary directory, spawns the binary with the caller's arguments plus
//! the staged path, and parses the solver's stdout. This pathway does not
//! touch the core engine; every missing field and every stage failure is
//! fatal on first violation.

use std::collections::BTreeMap;
use std::process::Command;

use derive_more::{Display, Error};

use crate::E;
use crate::model::Model;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ExternalError {
    #[display("missing field '{field}' in the external solver description")]
    MissingField { field: &'static str },

    #[display("failed to stage the LP file: {detail}")]
    Write { detail: String },

    #[display("failed to spawn the external solver: {detail}")]
    Spawn { detail: String },

    #[display("failed to parse the external solver output: {detail}")]
    Parse { detail: String },
}

/// Solution reported by an external solver.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExternalSolution {
    pub objective: E,
    pub variables: BTreeMap<String, E>,
}

/// Writes the model's LP text to a staging file, runs the external binary on
/// it, and parses the output.
pub fn solve_external(model: &Model) -> Result<ExternalSolution, ExternalError> {
    let spec = model
        .external
        .as_ref()
        .ok_or(ExternalError::MissingField { field: "external" })?;
    let bin_path = spec
        .bin_path
        .as_deref()
        .ok_or(ExternalError::MissingField { field: "binPath" })?;
    let args = spec
        .args
        .as_ref()
        .ok_or(ExternalError::MissingField { field: "args" })?;
    let temp_name = spec
        .temp_name
        .as_deref()
        .ok_or(ExternalError::MissingField { field: "tempName" })?;

    let staging = tempfile::tempdir().map_err(|e| ExternalError::Write { detail: e.to_string() })?;
    let path = staging.path().join(temp_name);
    let text = crate::format::emit_lines(model).join("\n") + "\n";
    std::fs::write(&path, text).map_err(|e| ExternalError::Write { detail: e.to_string() })?;

    let output = Command::new(bin_path)
        .args(args)
        .arg(&path)
        .output()
        .map_err(|e| ExternalError::Spawn { detail: e.to_string() })?;
    if !output.status.success() {
        return Err(ExternalError::Spawn {
            detail: format!("solver exited with {}", output.status),
        });
    }

    parse_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parses `lp_solve`-style stdout: an objective line followed by a variable
/// listing.
pub fn parse_output(text: &str) -> Result<ExternalSolution, ExternalError> {
    const OBJECTIVE_PREFIX: &str = "Value of objective function:";
    const VARIABLES_HEADER: &str = "Actual values of the variables";

    let mut objective: Option<E> = None;
    let mut in_variables = false;
    let mut variables = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix(OBJECTIVE_PREFIX) {
            let token = rest.split_whitespace().next().ok_or_else(|| ExternalError::Parse {
                detail: "objective line carries no value".to_string(),
            })?;
            objective = Some(token.parse::<E>().map_err(|_| ExternalError::Parse {
                detail: format!("bad objective value '{}'", token),
            })?);
            continue;
        }
        if line.starts_with(VARIABLES_HEADER) {
            in_variables = true;
            continue;
        }
        if in_variables {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
                return Err(ExternalError::Parse {
                    detail: format!("bad variable line '{}'", line),
                });
            };
            let value = value.parse::<E>().map_err(|_| ExternalError::Parse {
                detail: format!("bad value for variable '{}'", name),
            })?;
            variables.insert(name.to_string(), value);
        }
    }

    match objective {
        Some(objective) => Ok(ExternalSolution { objective, variables }),
        None => Err(ExternalError::Parse {
            detail: "no objective line in solver output".to_string(),
        }),
    }
}
