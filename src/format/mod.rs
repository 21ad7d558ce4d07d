//! Reading and writing the `lp_solve` LP text dialect.
//!
//! The dialect is line-oriented: an objective (`max:` / `min:`), constraint
//! lines (named or anonymous), bound declarations on raw variables, and
//! `int` / `bin` / `free` declarations. `//` comments run to end of line.
//!
//! [`parse_lines`] and [`emit_lines`] form a round-trippable pair over the
//! structured subset of [`crate::Model`]: parsing emitted output reproduces a
//! model equivalent up to constraint ordering, renaming of anonymous rows to
//! `R_1, R_2, ...`, and merging of duplicate terms (`a x + b x` into
//! `(a + b) x`).

pub mod emit;
pub mod parse;

pub use emit::emit_lines;
pub use parse::{ParseError, ParseErrorKind, parse_lines, parse_str};
