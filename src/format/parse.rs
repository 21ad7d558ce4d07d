//! Line-oriented parser for the LP text dialect.
//!
//! Each input line is classified as an objective, a declaration, or a
//! constraint, and parsed with `nom` token parsers driven by a small cursor
//! that tracks the current column for error reporting.

use std::collections::BTreeMap;

use derive_more::{Display, Error};
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char as nom_char, space0};
use nom::combinator::{recognize, value};
use nom::number::complete::double;
use nom::sequence::pair;

use crate::E;
use crate::model::{ConstraintSpec, Model, OpType};

/// Name given to the (anonymous) objective row in LP text.
pub(crate) const OBJECTIVE_NAME: &str = "obj";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Syntax,
    UnknownDirective,
}

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
#[display("parse error at line {line}, column {col}: expected {expected}")]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub expected: String,
    pub kind: ParseErrorKind,
}

/// Parses a sequence of text lines (without trailing newlines) into a model.
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Result<Model, ParseError> {
    let mut sink = Sink::default();
    for (index, line) in lines.iter().enumerate() {
        parse_line(index + 1, line.as_ref(), &mut sink)?;
    }
    if !sink.objective_seen {
        return Err(ParseError {
            line: lines.len(),
            col: 1,
            expected: "an objective declaration (max: or min:)".to_string(),
            kind: ParseErrorKind::Syntax,
        });
    }
    Ok(sink.model)
}

/// Convenience wrapper splitting a full document on newlines.
pub fn parse_str(text: &str) -> Result<Model, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    parse_lines(&lines)
}

#[derive(Default)]
struct Sink {
    model: Model,
    objective_seen: bool,
    anonymous_rows: usize,
}

impl Sink {
    fn fresh_row_name(&mut self) -> String {
        loop {
            self.anonymous_rows += 1;
            let name = format!("R_{}", self.anonymous_rows);
            if !self.model.variables.contains_key(&name)
                && !self.model.constraints.contains_key(&name)
            {
                return name;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Le,
    Ge,
    Eq,
}

struct Cursor<'a> {
    full: &'a str,
    rest: &'a str,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: usize, text: &'a str) -> Self {
        Self { full: text, rest: text, line }
    }

    fn col(&self) -> usize {
        self.full.len() - self.rest.len() + 1
    }

    fn skip_space(&mut self) {
        if let Ok((rest, _)) = space0::<_, nom::error::Error<&str>>(self.rest) {
            self.rest = rest;
        }
    }

    fn take<T>(&mut self, mut parser: impl FnMut(&'a str) -> IResult<&'a str, T>) -> Option<T> {
        match parser(self.rest) {
            Ok((rest, parsed)) => {
                self.rest = rest;
                Some(parsed)
            }
            Err(_) => None,
        }
    }

    fn mark(&self) -> &'a str {
        self.rest
    }

    fn reset(&mut self, mark: &'a str) {
        self.rest = mark;
    }

    fn at_end(&self) -> bool {
        self.rest.is_empty()
    }

    fn error(&self, expected: &str) -> ParseError {
        ParseError {
            line: self.line,
            col: self.col(),
            expected: expected.to_string(),
            kind: ParseErrorKind::Syntax,
        }
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn relation(input: &str) -> IResult<&str, Relation> {
    alt((
        value(Relation::Le, tag("<=")),
        value(Relation::Ge, tag(">=")),
        value(Relation::Le, tag("<")),
        value(Relation::Ge, tag(">")),
        value(Relation::Eq, tag("=")),
    ))(input)
}

fn sign(input: &str) -> IResult<&str, char> {
    alt((nom_char('+'), nom_char('-')))(input)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(index) => &line[..index],
        None => line,
    }
}

fn parse_line(line_no: usize, raw: &str, sink: &mut Sink) -> Result<(), ParseError> {
    let text = strip_comment(raw).trim_end();
    if text.trim().is_empty() {
        return Ok(());
    }

    let mut cur = Cursor::new(line_no, text);
    cur.skip_space();

    let start = cur.mark();
    let start_col = cur.col();
    if let Some(word) = cur.take(identifier) {
        cur.skip_space();

        // Objective: `max:` / `min:` introduce the (single) objective row.
        let direction = match word {
            "max" | "maximize" => Some(OpType::Max),
            "min" | "minimize" => Some(OpType::Min),
            _ => None,
        };
        if let Some(op_type) = direction {
            if cur.take(|i| nom_char::<_, nom::error::Error<&str>>(':')(i)).is_some() {
                if sink.objective_seen {
                    return Err(ParseError {
                        line: line_no,
                        col: start_col,
                        expected: "a single objective declaration".to_string(),
                        kind: ParseErrorKind::Syntax,
                    });
                }
                let terms = parse_terms(&mut cur)?;
                expect_line_end(&mut cur)?;
                sink.objective_seen = true;
                sink.model.op_type = op_type;
                sink.model.optimize = OBJECTIVE_NAME.to_string();
                insert_row(&mut sink.model, OBJECTIVE_NAME, &terms);
                return Ok(());
            }
        }

        // Declarations: a keyword followed by a variable list.
        let declaration = matches!(word, "int" | "bin" | "binary" | "free" | "unrestricted");
        let next_is_name = {
            let mark = cur.mark();
            let found = cur.take(identifier).is_some();
            cur.reset(mark);
            found
        };
        if declaration && next_is_name {
            let names = parse_name_list(&mut cur)?;
            expect_line_end(&mut cur)?;
            for name in names {
                match word {
                    "int" => sink.model.ints.insert(name),
                    "bin" | "binary" => sink.model.binaries.insert(name),
                    _ => sink.model.unrestricted.insert(name),
                };
            }
            return Ok(());
        }

        // Any other word-word shape is a directive this dialect does not know.
        if !declaration && next_is_name {
            return Err(ParseError {
                line: line_no,
                col: start_col,
                expected: format!("a known directive; found '{}'", word),
                kind: ParseErrorKind::UnknownDirective,
            });
        }

        cur.reset(start);
    }

    parse_constraint(&mut cur, sink)
}

fn parse_constraint(cur: &mut Cursor, sink: &mut Sink) -> Result<(), ParseError> {
    // Optional row label.
    let mut label: Option<String> = None;
    let mark = cur.mark();
    if let Some(name) = cur.take(identifier) {
        cur.skip_space();
        if cur.take(|i| nom_char::<_, nom::error::Error<&str>>(':')(i)).is_some() {
            label = Some(name.to_string());
        } else {
            cur.reset(mark);
        }
    }

    let terms = parse_terms(cur)?;
    cur.skip_space();
    let Some(rel) = cur.take(relation) else {
        return Err(cur.error("a constraint operator (<=, >=, =)"));
    };
    cur.skip_space();
    let Some(rhs) = cur.take(double) else {
        return Err(cur.error("a number"));
    };
    expect_line_end(cur)?;

    let spec = match rel {
        Relation::Le => ConstraintSpec::at_most(rhs),
        Relation::Ge => ConstraintSpec::at_least(rhs),
        Relation::Eq => ConstraintSpec::exactly(rhs),
    };

    match label {
        Some(name) => {
            insert_row(&mut sink.model, &name, &terms);
            sink.model.set_constraint(&name, spec);
        }
        // An unlabelled unit term is a bound declaration on a raw variable.
        None if terms.len() == 1 && terms[0].1 == 1. => {
            sink.model.set_constraint(&terms[0].0, spec);
        }
        None => {
            let name = sink.fresh_row_name();
            insert_row(&mut sink.model, &name, &terms);
            sink.model.set_constraint(&name, spec);
        }
    }
    Ok(())
}

/// Parses a signed linear expression, e.g. `3 x + 2.5y - z`.
///
/// Signs bind to the following term and an omitted coefficient defaults to 1;
/// an optional `*` is accepted between coefficient and variable.
fn parse_terms(cur: &mut Cursor) -> Result<Vec<(String, E)>, ParseError> {
    let mut terms: Vec<(String, E)> = Vec::new();
    loop {
        cur.skip_space();

        let mut negate = false;
        let mut signed = false;
        while let Some(token) = cur.take(sign) {
            if token == '-' {
                negate = !negate;
            }
            signed = true;
            cur.skip_space();
        }

        if !signed && !terms.is_empty() {
            break;
        }

        let coeff = cur.take(double);
        cur.skip_space();
        if coeff.is_some() {
            if cur.take(|i| nom_char::<_, nom::error::Error<&str>>('*')(i)).is_some() {
                cur.skip_space();
            }
        }

        match (coeff, cur.take(identifier)) {
            (None, None) => return Err(cur.error("a term (coefficient or variable)")),
            (Some(_), None) => return Err(cur.error("a variable name")),
            (coeff, Some(name)) => {
                let magnitude = coeff.unwrap_or(1.);
                terms.push((name.to_string(), if negate { -magnitude } else { magnitude }));
            }
        }
    }
    Ok(terms)
}

fn parse_name_list(cur: &mut Cursor) -> Result<Vec<String>, ParseError> {
    let mut names = Vec::new();
    loop {
        cur.skip_space();
        if !names.is_empty() {
            let _ = cur.take(|i| nom_char::<_, nom::error::Error<&str>>(',')(i));
            cur.skip_space();
        }
        match cur.take(identifier) {
            Some(name) => names.push(name.to_string()),
            None if names.is_empty() => return Err(cur.error("a variable name")),
            None => break,
        }
    }
    Ok(names)
}

fn expect_line_end(cur: &mut Cursor) -> Result<(), ParseError> {
    cur.skip_space();
    let _ = cur.take(|i| nom_char::<_, nom::error::Error<&str>>(';')(i));
    cur.skip_space();
    if cur.at_end() {
        Ok(())
    } else {
        Err(cur.error("end of line"))
    }
}

/// Defines (or redefines) a row combination, merging duplicate terms within
/// the line by addition.
///
/// A repeated label replaces the combination rather than accumulating into
/// it: multi-line bound records share one label (a range emits as a `>=` and
/// a `<=` line, and a bound on the objective row restates its combination),
/// and each such line carries the full combination.
fn insert_row(model: &mut Model, name: &str, terms: &[(String, E)]) {
    let mut combo = BTreeMap::new();
    for (var, coeff) in terms {
        *combo.entry(var.clone()).or_insert(0.) += coeff;
    }
    model.variables.insert(name.to_string(), combo);
}
