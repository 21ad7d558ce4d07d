//! User-facing model description.
//!
//! A [`Model`] names an objective, declares linear combinations of internal
//! variables (the *solution variables*), attaches bound records to row or
//! variable names, and flags variable domains (integer, binary, unrestricted).
//! Models are plain data: they serialize naturally to and from JSON, can be
//! built programmatically through the mutators here, or come from LP text via
//! [`crate::format`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{E, Options};

pub mod validate;

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpType {
    #[serde(rename = "max")]
    Max,
    #[default]
    #[serde(rename = "min")]
    Min,
}

/// Bound record attached to a row or raw variable name.
///
/// `min`/`max` may be combined into a range; `equal` pins the value and must
/// be consistent with any bounds that are also present.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConstraintSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<E>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<E>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal: Option<E>,
}

impl ConstraintSpec {
    pub fn at_most(max: E) -> Self {
        Self { max: Some(max), ..Self::default() }
    }

    pub fn at_least(min: E) -> Self {
        Self { min: Some(min), ..Self::default() }
    }

    pub fn exactly(equal: E) -> Self {
        Self { equal: Some(equal), ..Self::default() }
    }

    pub fn range(min: E, max: E) -> Self {
        Self { min: Some(min), max: Some(max), equal: None }
    }
}

/// Per-model option overrides, merged over the registry defaults at solve time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelOptions {
    /// Relative MILP optimality gap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<E>,
    /// Wall-clock limit in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Terminate on cycle suspicion instead of switching to Bland's rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_on_cycles: Option<bool>,
    /// Accepted for compatibility; has no effect.
    #[serde(rename = "useMIRCuts", skip_serializing_if = "Option::is_none")]
    pub use_mir_cuts: Option<bool>,
}

/// Description of an external solver binary to hand the model to.
///
/// All fields are required by [`crate::interface::external`]; they are
/// optional here so that a partially specified hand-off is rejected with a
/// precise error rather than at deserialization time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct External {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_name: Option<String>,
}

/// A linear or mixed-integer linear program.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Model {
    /// Name of the objective entry in [`Model::variables`].
    pub optimize: String,
    pub op_type: OpType,
    /// Bound records, keyed by a solution-variable name (a row) or by a raw
    /// internal variable name (a direct domain bound).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, ConstraintSpec>,
    /// Solution variables: each entry maps internal variable names to
    /// coefficients of a linear combination.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, BTreeMap<String, E>>,
    #[serde(with = "flags", skip_serializing_if = "BTreeSet::is_empty")]
    pub ints: BTreeSet<String>,
    #[serde(with = "flags", skip_serializing_if = "BTreeSet::is_empty")]
    pub binaries: BTreeSet<String>,
    #[serde(with = "flags", skip_serializing_if = "BTreeSet::is_empty")]
    pub unrestricted: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ModelOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<External>,
}

impl Model {
    pub fn new(op_type: OpType, objective: &str) -> Self {
        Self {
            optimize: objective.to_string(),
            op_type,
            ..Self::default()
        }
    }

    /// Defines (or replaces) the linear combination for a solution variable.
    pub fn set_row(&mut self, name: &str, terms: &[(&str, E)]) -> &mut Self {
        let mut combo = BTreeMap::new();
        for (var, coeff) in terms {
            *combo.entry(var.to_string()).or_insert(0.) += coeff;
        }
        self.variables.insert(name.to_string(), combo);
        self
    }

    /// Attaches a bound record to a row or raw variable name. Fields already
    /// present on the record are overwritten when set in `spec`.
    pub fn set_constraint(&mut self, name: &str, spec: ConstraintSpec) -> &mut Self {
        let entry = self.constraints.entry(name.to_string()).or_default();
        if spec.min.is_some() {
            entry.min = spec.min;
        }
        if spec.max.is_some() {
            entry.max = spec.max;
        }
        if spec.equal.is_some() {
            entry.equal = spec.equal;
        }
        self
    }

    pub fn flag_int(&mut self, name: &str) -> &mut Self {
        self.ints.insert(name.to_string());
        self
    }

    pub fn flag_binary(&mut self, name: &str) -> &mut Self {
        self.binaries.insert(name.to_string());
        self
    }

    pub fn flag_unrestricted(&mut self, name: &str) -> &mut Self {
        self.unrestricted.insert(name.to_string());
        self
    }

    pub fn set_options(&mut self, options: ModelOptions) -> &mut Self {
        self.options = Some(options);
        self
    }

    pub fn set_external(&mut self, external: External) -> &mut Self {
        self.external = Some(external);
        self
    }

    /// Overlays this model's option overrides on a base registry.
    pub fn merged_options(&self, base: &Options) -> Options {
        let mut options = base.clone();
        if let Some(overrides) = &self.options {
            if let Some(tolerance) = overrides.tolerance {
                options.set_option("tolerance", tolerance).expect("registered option");
            }
            if let Some(timeout) = overrides.timeout {
                options.set_option("timeout_ms", timeout).expect("registered option");
            }
            if let Some(exit_on_cycles) = overrides.exit_on_cycles {
                options
                    .set_option("exit_on_cycles", exit_on_cycles)
                    .expect("registered option");
            }
            if let Some(use_mir_cuts) = overrides.use_mir_cuts {
                options
                    .set_option("use_mir_cuts", use_mir_cuts)
                    .expect("registered option");
            }
        }
        options
    }
}

/// Serde glue for boundary-polymorphic flag maps.
///
/// The wire shape is a map from variable name to a truthy token (`true`, `1`,
/// `"yes"`, ...); a bare list of names is also accepted. Internally only the
/// set of truthy names is kept, and serialization always writes `name: true`.
mod flags {
    use std::collections::{BTreeMap, BTreeSet};

    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Truthy {
        Bool(bool),
        Num(f64),
        Str(String),
    }

    impl Truthy {
        fn is_truthy(&self) -> bool {
            match self {
                Truthy::Bool(b) => *b,
                Truthy::Num(n) => *n != 0.,
                Truthy::Str(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagSpec {
        Map(BTreeMap<String, Truthy>),
        List(Vec<String>),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match FlagSpec::deserialize(deserializer)? {
            FlagSpec::Map(map) => Ok(map
                .into_iter()
                .filter(|(_, flag)| flag.is_truthy())
                .map(|(name, _)| name)
                .collect()),
            FlagSpec::List(names) => Ok(names.into_iter().collect()),
        }
    }

    pub fn serialize<S>(set: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(set.len()))?;
        for name in set {
            map.serialize_entry(name, &true)?;
        }
        map.end()
    }
}
