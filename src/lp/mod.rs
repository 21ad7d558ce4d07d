//! Canonical standard form and the simplex engine that solves it.
//!
//! [`StandardForm`] holds a linear program as
//!
//! ```text
//! min  c^T x
//! s.t. A x = b,  b >= 0
//!      lower <= x <= upper
//! ```
//!
//! built from a [`Model`] by:
//! - assigning each internal variable a dense column index on first encounter
//!   (a name<->index bimap is kept for solution assembly),
//! - turning combination-keyed constraint records into rows with slack,
//!   surplus and artificial columns,
//! - applying raw-variable constraint records directly as column bounds,
//! - splitting unrestricted variables into positive and negative parts,
//! - encoding binaries as integer columns with bounds `[0, 1]`,
//! - flipping any row with a negative right-hand side.
//!
//! Every row carries an artificial column so that any combination of node
//! bounds still admits a Phase-I-feasible starting basis; rows whose slack is
//! feasible leave their artificial nonbasic at zero.

use std::collections::{BTreeMap, HashMap};

use faer::{Col, Mat};

use crate::model::Model;
use crate::model::validate::ValidationError;
use crate::{E, I};

pub mod simplex;

/// Role of a column in the standard form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Structural,
    Slack,
    Surplus,
    Artificial,
}

/// Per-column metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub kind: ColumnKind,
    pub integer: bool,
    pub lower: E,
    pub upper: E,
}

/// Bidirectional map between internal variable names and column indices.
///
/// Indices are dense and assigned on first encounter; unrestricted variables
/// additionally own a negative-part column.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    index: HashMap<String, I>,
    names: Vec<String>,
    negative: HashMap<String, I>,
}

impl NameTable {
    fn intern(&mut self, name: &str) -> I {
        if let Some(&index) = self.index.get(name) {
            return index;
        }
        let index = self.names.len();
        self.index.insert(name.to_string(), index);
        self.names.push(name.to_string());
        index
    }

    pub fn index_of(&self, name: &str) -> Option<I> {
        self.index.get(name).copied()
    }

    /// Column of the negative part of a split (unrestricted) variable.
    pub fn negative_part(&self, name: &str) -> Option<I> {
        self.negative.get(name).copied()
    }

    pub fn name_of(&self, index: I) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Le,
    Ge,
    Eq,
}

struct RowSpec {
    coeffs: Vec<(I, E)>,
    relation: Relation,
    rhs: E,
}

/// A linear program in standard form.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct StandardForm {
    /// Constraint matrix (dense, `m x n`).
    pub(crate) A: Mat<E>,
    /// Right-hand side of the equality constraints (non-negative).
    pub(crate) b: Col<E>,
    /// Objective function coefficients (minimization sense).
    pub(crate) c: Col<E>,
    /// Designated basic column per row (slack or artificial).
    pub(crate) basis: Vec<I>,
    /// Per-column metadata.
    pub(crate) columns: Vec<Column>,
    names: NameTable,
    n_structural: I,
    maximize: bool,
}

impl StandardForm {
    /// Builds the standard form for a model.
    ///
    /// Only defects that make the form unbuildable are reported here; full
    /// structural validation lives in [`crate::model::validate`].
    pub fn from_model(model: &Model) -> Result<Self, ValidationError> {
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

        let mut names = NameTable::default();
        for var in model.variables[&model.optimize].keys() {
            names.intern(var);
        }
        for (row, combo) in &model.variables {
            if row != &model.optimize {
                for var in combo.keys() {
                    names.intern(var);
                }
            }
        }
        for key in model.constraints.keys() {
            if !model.variables.contains_key(key) {
                names.intern(key);
            }
        }
        let n_named = names.len();

        let mut columns: Vec<Column> = names
            .names
            .iter()
            .map(|name| {
                let binary = model.binaries.contains(name);
                Column {
                    kind: ColumnKind::Structural,
                    integer: binary || model.ints.contains(name),
                    lower: 0.,
                    upper: if binary { 1. } else { E::INFINITY },
                }
            })
            .collect();

        // Negative parts for unrestricted variables.
        for j in 0..n_named {
            let name = names.names[j].clone();
            if model.unrestricted.contains(&name) {
                let neg = columns.len();
                columns.push(Column {
                    kind: ColumnKind::Structural,
                    integer: columns[j].integer,
                    lower: 0.,
                    upper: E::INFINITY,
                });
                names.negative.insert(name.clone(), neg);
                names.names.push(format!("{}_neg", name));
            }
        }

        // Raw-variable records become column bounds; for split variables the
        // bound constrains the difference of the parts and must be a row.
        let mut rows: Vec<RowSpec> = Vec::new();
        for (key, spec) in &model.constraints {
            if model.variables.contains_key(key) {
                continue;
            }
            let j = names.index_of(key).expect("raw constraint key was interned");
            if let Some(neg) = names.negative_part(key) {
                let coeffs = vec![(j, 1.), (neg, -1.)];
                if let Some(equal) = spec.equal {
                    rows.push(RowSpec { coeffs, relation: Relation::Eq, rhs: equal });
                } else {
                    if let Some(min) = spec.min {
                        rows.push(RowSpec {
                            coeffs: coeffs.clone(),
                            relation: Relation::Ge,
                            rhs: min,
                        });
                    }
                    if let Some(max) = spec.max {
                        rows.push(RowSpec { coeffs, relation: Relation::Le, rhs: max });
                    }
                }
            } else if let Some(equal) = spec.equal {
                columns[j].lower = equal;
                columns[j].upper = equal;
            } else {
                if let Some(min) = spec.min {
                    columns[j].lower = columns[j].lower.max(min);
                }
                if let Some(max) = spec.max {
                    columns[j].upper = columns[j].upper.min(max);
                }
            }
        }

        // Combination-keyed records become rows.
        for (key, spec) in &model.constraints {
            let Some(combo) = model.variables.get(key) else {
                continue;
            };
            let coeffs = combo_coeffs(&names, combo);
            if let Some(equal) = spec.equal {
                rows.push(RowSpec { coeffs, relation: Relation::Eq, rhs: equal });
            } else if spec.min.is_some() && spec.min == spec.max {
                rows.push(RowSpec {
                    coeffs,
                    relation: Relation::Eq,
                    rhs: spec.min.unwrap(),
                });
            } else {
                if let Some(min) = spec.min {
                    rows.push(RowSpec {
                        coeffs: coeffs.clone(),
                        relation: Relation::Ge,
                        rhs: min,
                    });
                }
                if let Some(max) = spec.max {
                    rows.push(RowSpec { coeffs, relation: Relation::Le, rhs: max });
                }
            }
        }

        // Normalize negative right-hand sides.
        for row in &mut rows {
            if row.rhs < 0. {
                row.rhs = -row.rhs;
                for (_, coeff) in &mut row.coeffs {
                    *coeff = -*coeff;
                }
                row.relation = match row.relation {
                    Relation::Le => Relation::Ge,
                    Relation::Ge => Relation::Le,
                    Relation::Eq => Relation::Eq,
                };
            }
        }

        let m = rows.len();
        let n_structural = columns.len();

        // Slack / surplus columns, then one artificial per row.
        let mut slack_of: Vec<Option<I>> = vec![None; m];
        for (i, row) in rows.iter().enumerate() {
            match row.relation {
                Relation::Le => {
                    slack_of[i] = Some(columns.len());
                    columns.push(Column {
                        kind: ColumnKind::Slack,
                        integer: false,
                        lower: 0.,
                        upper: E::INFINITY,
                    });
                }
                Relation::Ge => {
                    slack_of[i] = Some(columns.len());
                    columns.push(Column {
                        kind: ColumnKind::Surplus,
                        integer: false,
                        lower: 0.,
                        upper: E::INFINITY,
                    });
                }
                Relation::Eq => {}
            }
        }
        let mut artificial_of: Vec<I> = Vec::with_capacity(m);
        for _ in 0..m {
            artificial_of.push(columns.len());
            columns.push(Column {
                kind: ColumnKind::Artificial,
                integer: false,
                lower: 0.,
                upper: E::INFINITY,
            });
        }

        let n = columns.len();
        let mut a = Mat::<E>::zeros(m, n);
        let mut b = Col::<E>::zeros(m);
        let mut basis = Vec::with_capacity(m);
        for (i, row) in rows.iter().enumerate() {
            for &(j, coeff) in &row.coeffs {
                a[(i, j)] += coeff;
            }
            b[i] = row.rhs;
            match row.relation {
                Relation::Le => {
                    let slack = slack_of[i].unwrap();
                    a[(i, slack)] = 1.;
                    basis.push(slack);
                }
                Relation::Ge => {
                    a[(i, slack_of[i].unwrap())] = -1.;
                    basis.push(artificial_of[i]);
                }
                Relation::Eq => basis.push(artificial_of[i]),
            }
            a[(i, artificial_of[i])] = 1.;
        }

        let maximize = model.op_type == crate::model::OpType::Max;
        let mut c = Col::<E>::zeros(n);
        for (j, coeff) in combo_coeffs(&names, &model.variables[&model.optimize]) {
            c[j] = if maximize { -coeff } else { coeff };
        }

        Ok(Self {
            A: a,
            b,
            c,
            basis,
            columns,
            names,
            n_structural,
            maximize,
        })
    }

    /// Returns the number of variables (columns of `A`).
    pub fn get_n_vars(&self) -> usize {
        self.columns.len()
    }

    /// Returns the number of constraints (rows of `A`).
    pub fn get_n_cons(&self) -> usize {
        self.basis.len()
    }

    /// Returns `(n_vars, n_cons)`.
    pub fn get_dims(&self) -> (usize, usize) {
        (self.get_n_vars(), self.get_n_cons())
    }

    /// Number of structural columns (user variables, including split parts).
    pub fn get_n_structural(&self) -> usize {
        self.n_structural
    }

    pub fn get_names(&self) -> &NameTable {
        &self.names
    }

    /// Whether the original objective was a maximization.
    pub fn is_maximize(&self) -> bool {
        self.maximize
    }

    pub fn has_integers(&self) -> bool {
        self.columns.iter().any(|column| column.integer)
    }

    /// Indices of integer structural columns, in column order.
    pub fn integer_columns(&self) -> Vec<I> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.integer)
            .map(|(j, _)| j)
            .collect()
    }

    /// Tightens the bounds of one column, used by branch-and-bound nodes.
    pub fn restrict_column(&mut self, column: I, lower: Option<E>, upper: Option<E>) {
        if let Some(lower) = lower {
            self.columns[column].lower = self.columns[column].lower.max(lower);
        }
        if let Some(upper) = upper {
            self.columns[column].upper = self.columns[column].upper.min(upper);
        }
    }

    /// Evaluates the standard-form objective (minimization sense) at `x`.
    pub fn objective_value(&self, x: &Col<E>) -> E {
        let mut total = 0.;
        for j in 0..self.columns.len() {
            total += self.c[j] * x[j];
        }
        total
    }
}

/// Resolves a linear combination to column coefficients, folding split
/// variables into their positive and negative parts and merging duplicates.
fn combo_coeffs(names: &NameTable, combo: &BTreeMap<String, E>) -> Vec<(I, E)> {
    let mut acc: BTreeMap<I, E> = BTreeMap::new();
    for (var, &coeff) in combo {
        let j = names.index_of(var).expect("combination variable was interned");
        *acc.entry(j).or_insert(0.) += coeff;
        if let Some(neg) = names.negative_part(var) {
            *acc.entry(neg).or_insert(0.) -= coeff;
        }
    }
    acc.into_iter().filter(|(_, coeff)| *coeff != 0.).collect()
}
