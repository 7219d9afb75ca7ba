/**************************************************************************/
/*  This file is part of UNWEIGHT.                                        */
/*                                                                        */
/*  Copyright (C) 2025                                                    */
/*    CEA (Commissariat à l'énergie atomique et aux énergies              */
/*         alternatives)                                                  */
/*                                                                        */
/*  you can redistribute it and/or modify it under the terms of the GNU   */
/*  Lesser General Public License as published by the Free Software       */
/*  Foundation, version 2.1.                                              */
/*                                                                        */
/*  It is distributed in the hope that it will be useful,                 */
/*  but WITHOUT ANY WARRANTY; without even the implied warranty of        */
/*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the         */
/*  GNU Lesser General Public License for more details.                   */
/*                                                                        */
/*  See the GNU Lesser General Public License version 2.1                 */
/*  for more details (enclosed in the file licenses/LGPLv2.1).            */
/*                                                                        */
/**************************************************************************/

//! Reading and writing weighted extended DIMACS CNF.
//!
//! Recognized lines, after whitespace normalization:
//! - `p cnf VARS CLAUSES`, before any clause
//! - `c ind VARS.. 0` and `c p show VARS.. 0`: sampling set
//! - `c MUST MULTIPLY BY VALUE 0`: multiplier carried over from a previous transformation
//! - `w LIT VALUE` and `c p weight LIT VALUE 0`: literal weights
//! - other comments, copied to the output except `c t ..` and `c p ..`
//! - clauses of at least 2 literals, terminated by 0 on the same line (unit clauses are
//!   accepted in transformed formulas)

use crate::cnf::{Lit, Var};
use crate::error::TransformError;
use crate::formula::Formula;
use crate::weight::{parse_value, WeightMap};
use anyhow::Context;
use itertools::Itertools;
use num_rational::BigRational;
use num_traits::One;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use tracing::{debug, trace, warn};

mod parser {
    use nom::bytes::complete::{tag, take_till1};
    use nom::character::complete::{char, digit1, space1};
    use nom::combinator::{all_consuming, map_res, opt, recognize};
    use nom::multi::separated_list0;
    use nom::sequence::{pair, preceded, tuple};
    use nom::IResult;

    fn unsigned(s: &str) -> IResult<&str, usize> {
        map_res(digit1, str::parse)(s)
    }

    fn signed(s: &str) -> IResult<&str, isize> {
        map_res(recognize(pair(opt(char('-')), digit1)), str::parse)(s)
    }

    /// `p cnf VARS CLAUSES`
    pub(super) fn header(s: &str) -> IResult<&str, (usize, usize)> {
        let (s, (_, _, _, _, vars, _, clauses)) = all_consuming(tuple((
            tag("p"),
            space1,
            tag("cnf"),
            space1,
            unsigned,
            space1,
            unsigned,
        )))(s)?;
        Ok((s, (vars, clauses)))
    }

    /// space separated integers
    pub(super) fn integers(s: &str) -> IResult<&str, Vec<isize>> {
        all_consuming(separated_list0(space1, signed))(s)
    }

    /// `VALUE [0]`, the value is returned unparsed
    pub(super) fn value_then_zero(s: &str) -> IResult<&str, &str> {
        let (s, value) = take_till1(|c: char| c == ' ')(s)?;
        let (s, _) = all_consuming(opt(preceded(space1, char('0'))))(s)?;
        Ok((s, value))
    }

    /// `LIT VALUE [0]`
    pub(super) fn weight(s: &str) -> IResult<&str, (isize, &str)> {
        let (s, lit) = signed(s)?;
        let (s, _) = space1(s)?;
        let (s, value) = value_then_zero(s)?;
        Ok((s, (lit, value)))
    }
}

/// If the words of `line` start with those of `prefix`, the rest of the line.
fn strip_words<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(' ')
    }
}

fn unexpected(line: usize, content: &str, reason: &'static str) -> TransformError {
    TransformError::UnexpectedInput {
        line,
        content: content.to_owned(),
        reason,
    }
}

/// A formula as read, with its weights not yet normalized.
#[derive(Debug)]
pub struct ParsedFormula {
    /// the formula, with its sampling set and the multiplier it carries
    pub formula: Formula,
    /// declared weights of sampled literals
    pub weights: WeightMap,
}

struct WeightDeclaration {
    line: usize,
    lit: isize,
    value: BigRational,
}

/// Reads and validates a weighted extended DIMACS formula.
///
/// Errors are [`TransformError`]s wrapped in `anyhow::Error`, except I/O errors.
pub fn read(input: impl BufRead) -> anyhow::Result<ParsedFormula> {
    read_lines(input, false)
}

/// Reads a formula written by [`write`]. Unlike [`read`], unit clauses are accepted: they are
/// how weights rounded to 0 or 1 are encoded.
pub fn read_transformed(input: impl BufRead) -> anyhow::Result<ParsedFormula> {
    read_lines(input, true)
}

fn read_lines(input: impl BufRead, allow_unit_clauses: bool) -> anyhow::Result<ParsedFormula> {
    let mut formula: Option<Formula> = None;
    let mut found_sampling_set = false;
    let mut multiplier: Option<BigRational> = None;
    let mut declarations = Vec::new();
    let mut comments = Vec::new();
    let mut clauses_seen = 0usize;
    let mut last_line = 0;

    for (index, line) in input.lines().enumerate() {
        let number = index + 1;
        last_line = number;
        let raw = line.with_context(|| format!("reading line {}", number))?;
        let line = raw.split_whitespace().join(" ");

        if line.is_empty() {
            debug!(line = number, "skipping empty line");
            continue;
        }

        if strip_words(&line, "p").is_some() {
            if formula.is_some() {
                return Err(TransformError::MalformedHeader {
                    line: number,
                    reason: "second header".to_owned(),
                }
                .into());
            }
            let (vars, clauses) = match parser::header(&line) {
                Ok((_, (vars, _))) if vars > Var::max_count() => {
                    return Err(TransformError::MalformedHeader {
                        line: number,
                        reason: format!("at most {} variables are supported", Var::max_count()),
                    }
                    .into())
                }
                Ok((_, (vars, clauses))) if vars > 0 && clauses > 0 => (vars, clauses),
                _ => {
                    return Err(TransformError::MalformedHeader {
                        line: number,
                        reason: format!("found '{}'", line),
                    }
                    .into())
                }
            };
            trace!(vars, clauses, "found header");
            formula = Some(Formula::new(vars, clauses));
            continue;
        }

        if let Some(rest) = strip_words(&line, "c p show").or_else(|| strip_words(&line, "c ind"))
        {
            let f = match formula.as_mut() {
                Some(f) => f,
                None => {
                    return Err(TransformError::MalformedHeader {
                        line: number,
                        reason: "the header must come before the sampling set".to_owned(),
                    }
                    .into())
                }
            };
            found_sampling_set = true;
            let vars = parser::integers(rest)
                .map_err(|_| unexpected(number, &line, "expected a list of variables"))?
                .1;
            let var_count = f.var_count();
            for var in vars.into_iter().take_while(|&v| v != 0) {
                if var < 1 || var as usize > var_count {
                    return Err(TransformError::InvalidSamplingVar {
                        line: number,
                        var,
                        var_count,
                    }
                    .into());
                }
                f.add_sampling_var(Var::from_dimacs(var));
            }
            continue;
        }

        if let Some(rest) = strip_words(&line, "c MUST MULTIPLY BY") {
            if let Some(previous) = multiplier {
                return Err(TransformError::DuplicateMultiplier {
                    line: number,
                    previous,
                }
                .into());
            }
            let value = parser::value_then_zero(rest)
                .ok()
                .and_then(|(_, value)| parse_value(value))
                .ok_or_else(|| unexpected(number, &line, "expected a multiplier"))?;
            trace!(multiplier = %value, "found multiplier");
            multiplier = Some(value);
            continue;
        }

        if let Some(rest) = strip_words(&line, "w").or_else(|| strip_words(&line, "c p weight")) {
            let (lit, value) = parser::weight(rest)
                .ok()
                .and_then(|(_, (lit, value))| Some((lit, parse_value(value)?)))
                .ok_or_else(|| unexpected(number, &line, "expected a literal and its weight"))?;
            declarations.push(WeightDeclaration {
                line: number,
                lit,
                value,
            });
            continue;
        }

        if line.starts_with('c') {
            if strip_words(&line, "c t").is_some() || strip_words(&line, "c p").is_some() {
                trace!(line = number, "dropping reserved comment {}", &line);
            } else {
                comments.push(line);
            }
            continue;
        }

        // an actual clause
        let f = match formula.as_mut() {
            Some(f) => f,
            None => {
                return Err(TransformError::MalformedHeader {
                    line: number,
                    reason: "the header must come before the clauses".to_owned(),
                }
                .into())
            }
        };
        let mut lits = parser::integers(&line)
            .map_err(|_| unexpected(number, &line, "expected a clause"))?
            .1;
        if lits.pop() != Some(0) || lits.contains(&0) {
            return Err(unexpected(
                number,
                &line,
                "clauses must be terminated by 0 on the same line",
            )
            .into());
        }
        if lits.is_empty() || (lits.len() == 1 && !allow_unit_clauses) {
            return Err(TransformError::UnpreprocessedUnitClause {
                line: number,
                clause: line,
            }
            .into());
        }
        let var_count = f.var_count();
        if let Some(&lit) = lits.iter().find(|lit| lit.unsigned_abs() > var_count) {
            return Err(TransformError::VariableOutOfRange {
                line: number,
                var: lit.unsigned_abs(),
                var_count,
            }
            .into());
        }
        let clause: Vec<Lit> = lits.into_iter().map(Lit::from_dimacs).collect();
        f.add_clause(&clause);
        clauses_seen += 1;
    }

    let mut formula = match formula {
        Some(f) => f,
        None => {
            return Err(TransformError::MalformedHeader {
                line: last_line,
                reason: "no header found".to_owned(),
            }
            .into())
        }
    };
    let var_count = formula.var_count();
    if clauses_seen != formula.original_clause_count() {
        warn!(
            "header declares {} clauses but the formula has {}",
            formula.original_clause_count(),
            clauses_seen
        );
    }
    for comment in comments {
        formula.add_comment(comment);
    }
    formula.set_multiplier(multiplier.unwrap_or_else(BigRational::one));

    if !found_sampling_set {
        warn!("no sampling set found, assuming all variables are in the sampling set");
        for index in 0..var_count {
            formula.add_sampling_var(Var::from_index(index));
        }
    }

    let mut weights = WeightMap::new();
    for WeightDeclaration { line, lit, value } in declarations {
        if lit == 0 || lit.unsigned_abs() > var_count {
            return Err(TransformError::VariableOutOfRange {
                line,
                var: lit.unsigned_abs(),
                var_count,
            }
            .into());
        }
        if value.is_one() {
            return Err(TransformError::UnnormalizedWeight { line, lit }.into());
        }
        let literal = Lit::from_dimacs(lit);
        if !formula.is_sampling_var(literal.var()) {
            warn!(
                "variable {} has a weight but is not part of the sampling set, skipping it",
                literal.var()
            );
            continue;
        }
        if weights.get(literal).is_some() {
            return Err(TransformError::DuplicateWeight { line, lit }.into());
        }
        if let Some(complement) = weights.get(!literal) {
            if !(complement + &value).is_one() {
                return Err(TransformError::InconsistentComplementWeight {
                    line,
                    lit,
                    weight: value,
                    complement: complement.clone(),
                }
                .into());
            }
        }
        trace!(lit, weight = %value, "declared weight");
        weights.insert(literal, value);
    }

    Ok(ParsedFormula { formula, weights })
}

/// Writes the transformed formula: header, sampling set, comments, input clauses, injected
/// clauses and multiplier.
pub fn write(mut out: impl Write, formula: &Formula) -> std::io::Result<()> {
    writeln!(out, "p cnf {} {}", formula.var_count(), formula.clause_count())?;
    write!(out, "c p show ")?;
    for var in formula.sampling_vars() {
        write!(out, "{} ", var.to_dimacs())?;
    }
    writeln!(out, "0")?;
    for comment in formula.comments() {
        writeln!(out, "{}", comment)?;
    }
    for clause in formula
        .clauses()
        .iter()
        .chain(formula.injected_clauses().iter())
    {
        writeln!(out, "{} 0", clause.iter().join(" "))?;
    }
    writeln!(out, "c MUST MULTIPLY BY {} 0", formula.multiplier())?;
    out.flush()
}

/// Writes the transformed formula to `path`, replacing it only once fully written.
pub fn write_file(path: &Path, formula: &Formula) -> Result<(), TransformError> {
    let failed = |reason: String| TransformError::OutputWriteFailed {
        path: path.to_owned(),
        reason,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| failed(e.to_string()))?;
    write(BufWriter::new(file.as_file_mut()), formula).map_err(|e| failed(e.to_string()))?;
    file.persist(path).map_err(|e| failed(e.error.to_string()))?;
    trace!(path = %path.display(), "wrote output formula");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::ChainEncoding;
    use crate::quantize::DyadicWeight;

    fn parse(text: &str) -> anyhow::Result<ParsedFormula> {
        read(text.as_bytes())
    }

    fn error(text: &str) -> TransformError {
        parse(text)
            .expect_err("should fail")
            .downcast::<TransformError>()
            .expect("not a transformation error")
    }

    fn q(text: &str) -> BigRational {
        parse_value(text).unwrap()
    }

    #[test]
    fn reads_a_weighted_formula() {
        let parsed = parse(
            "c some comment\n\
             p cnf 3 2\n\
             c ind 1 2 0\n\
             \n\
             c t wmc\n\
             w 1 0.3\n\
             c p weight -2 1/4 0\n\
             c MUST MULTIPLY BY 3/2 0\n\
             1  -2 0\n\
             2 3\t-1 0\n",
        )
        .unwrap();
        let f = &parsed.formula;
        assert_eq!(f.var_count(), 3);
        assert_eq!(f.original_clause_count(), 2);
        assert_eq!(f.clauses().len(), 2);
        assert_eq!(f.comments(), &["c some comment".to_owned()]);
        assert_eq!(f.multiplier(), &q("3/2"));
        assert_eq!(
            f.sampling_vars().map(Var::to_dimacs).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(parsed.weights.len(), 2);
        assert_eq!(parsed.weights.get(Lit::from_dimacs(1)), Some(&q("3/10")));
        assert_eq!(parsed.weights.get(Lit::from_dimacs(-2)), Some(&q("0.25")));
        let clauses: Vec<Vec<isize>> = f
            .clauses()
            .iter()
            .map(|c| c.iter().map(|l| l.to_dimacs()).collect())
            .collect();
        assert_eq!(clauses, vec![vec![1, -2], vec![2, 3, -1]]);
    }

    #[test]
    fn defaults() {
        let parsed = parse("p cnf 3 1\n1 2 0\n").unwrap();
        assert_eq!(parsed.formula.sampling_len(), 3);
        assert!(parsed.formula.multiplier().is_one());
        assert!(parsed.weights.is_empty());
        assert!(parsed.formula.comments().is_empty());
    }

    #[test]
    fn weights_of_unsampled_variables_are_skipped() {
        let parsed = parse("p cnf 3 1\nc p show 1 0\nw 2 0.5\nw 1 0.5\n1 2 0\n").unwrap();
        assert_eq!(parsed.weights.vars(), vec![Var::from_dimacs(1)]);
    }

    #[test]
    fn complement_declarations_in_any_order() {
        let parsed = parse("p cnf 2 1\nw -1 0.75\nw 1 0.25\nw -2 0.5\n1 2 0\n").unwrap();
        assert_eq!(parsed.weights.len(), 3);
        assert_eq!(parsed.weights.get(Lit::from_dimacs(1)), Some(&q("0.25")));
    }

    #[test]
    fn clause_count_mismatch_is_tolerated() {
        let parsed = parse("p cnf 2 5\n1 2 0\n").unwrap();
        assert_eq!(parsed.formula.clauses().len(), 1);
        assert_eq!(parsed.formula.clause_count(), 5);
    }

    #[test]
    fn header_errors() {
        for text in &[
            "1 2 0\n",
            "",
            "p cnf 0 1\n",
            "p cnf 2 0\n",
            "p cnf two 1\n",
            "p cnf 2 1\np cnf 2 1\n1 2 0\n",
            "p dnf 2 1\n1 2 0\n",
        ] {
            assert!(
                matches!(error(text), TransformError::MalformedHeader { .. }),
                "{:?}",
                text
            );
        }
    }

    #[test]
    fn sampling_errors() {
        assert_eq!(
            error("p cnf 2 1\nc ind 1 3 0\n1 2 0\n"),
            TransformError::InvalidSamplingVar {
                line: 2,
                var: 3,
                var_count: 2
            }
        );
        assert!(matches!(
            error("p cnf 2 1\nc p show -1 0\n1 2 0\n"),
            TransformError::InvalidSamplingVar { var: -1, .. }
        ));
        for text in &[
            "c ind 0\np cnf 2 1\nw 1 0.5\n1 2 0\n",
            "c p show 0\np cnf 2 1\n1 2 0\n",
            "c ind 1 0\np cnf 2 1\n1 2 0\n",
        ] {
            assert_eq!(
                error(text),
                TransformError::MalformedHeader {
                    line: 1,
                    reason: "the header must come before the sampling set".to_owned()
                }
            );
        }
    }

    #[test]
    fn variable_limit() {
        let too_many = Var::max_count() + 1;
        let text = format!("p cnf {} 1\nc ind {} 0\n1 2 0\n", too_many, too_many);
        assert!(matches!(
            error(&text),
            TransformError::MalformedHeader { line: 1, .. }
        ));
    }

    #[test]
    fn weight_errors() {
        assert_eq!(
            error("p cnf 2 1\nw 1 0.5\nw 1 0.5\n1 2 0\n"),
            TransformError::DuplicateWeight { line: 3, lit: 1 }
        );
        assert_eq!(
            error("p cnf 2 1\nw 1 0.5\nw -1 0.4\n1 2 0\n"),
            TransformError::InconsistentComplementWeight {
                line: 3,
                lit: -1,
                weight: q("0.4"),
                complement: q("0.5"),
            }
        );
        assert_eq!(
            error("p cnf 2 1\nw 2 1\n1 2 0\n"),
            TransformError::UnnormalizedWeight { line: 2, lit: 2 }
        );
        assert_eq!(
            error("p cnf 2 1\nw 3 0.5\n1 2 0\n"),
            TransformError::VariableOutOfRange {
                line: 2,
                var: 3,
                var_count: 2
            }
        );
        assert!(matches!(
            error("p cnf 2 1\nw 0 0.5\n1 2 0\n"),
            TransformError::VariableOutOfRange { var: 0, .. }
        ));
        assert!(matches!(
            error("p cnf 2 1\nw 1 half\n1 2 0\n"),
            TransformError::UnexpectedInput { line: 2, .. }
        ));
        assert!(matches!(
            error("p cnf 2 1\nw 1 1e-2000000000\n1 2 0\n"),
            TransformError::UnexpectedInput { line: 2, .. }
        ));
    }

    #[test]
    fn multiplier_errors() {
        assert_eq!(
            error("p cnf 2 1\nc MUST MULTIPLY BY 2 0\nc MUST MULTIPLY BY 3 0\n1 2 0\n"),
            TransformError::DuplicateMultiplier {
                line: 3,
                previous: q("2")
            }
        );
        assert!(matches!(
            error("p cnf 2 1\nc MUST MULTIPLY BY lots 0\n1 2 0\n"),
            TransformError::UnexpectedInput { .. }
        ));
    }

    #[test]
    fn clause_errors() {
        assert!(matches!(
            error("p cnf 2 2\n1 2 0\n-1 0\n"),
            TransformError::UnpreprocessedUnitClause { line: 3, .. }
        ));
        assert!(matches!(
            error("p cnf 2 1\n0\n"),
            TransformError::UnpreprocessedUnitClause { .. }
        ));
        assert_eq!(
            error("p cnf 2 1\n1 -4 0\n"),
            TransformError::VariableOutOfRange {
                line: 2,
                var: 4,
                var_count: 2
            }
        );
        assert!(matches!(
            error("p cnf 2 1\n1 2\n"),
            TransformError::UnexpectedInput { .. }
        ));
        assert!(matches!(
            error("p cnf 2 1\n1 0 2 0\n"),
            TransformError::UnexpectedInput { .. }
        ));
    }

    #[test]
    fn writes_the_formula() {
        let mut parsed = parse(
            "p cnf 3 1\nc ind 3 0\nc hello\nc MUST MULTIPLY BY 5/4 0\n1 -2 0\n",
        )
        .unwrap();
        let weight = DyadicWeight::new(3u32.into(), 2).unwrap();
        let encoding = ChainEncoding::new(Lit::from_dimacs(3), &weight, 3);
        parsed.formula.inject(&encoding);
        let mut out = Vec::new();
        write(&mut out, &parsed.formula).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "p cnf 5 4\n\
             c p show 3 4 5 0\n\
             c hello\n\
             1 -2 0\n\
             5 4 -3 0\n\
             5 3 0\n\
             -4 3 0\n\
             c MUST MULTIPLY BY 5/4 0\n"
        );
    }

    #[test]
    fn output_can_be_read_back() {
        let parsed = parse("p cnf 3 2\nc ind 1 3 0\nc MUST MULTIPLY BY 7 0\n1 -2 0\n2 3 0\n")
            .unwrap();
        let mut out = Vec::new();
        write(&mut out, &parsed.formula).unwrap();
        let again = read(out.as_slice()).unwrap();
        assert_eq!(again.formula.var_count(), 3);
        assert_eq!(again.formula.multiplier(), &q("7"));
        assert_eq!(
            again.formula.sampling_vars().collect::<Vec<_>>(),
            parsed.formula.sampling_vars().collect::<Vec<_>>()
        );
        let unweighted = crate::cnf::parse_unweighted(out.as_slice()).unwrap();
        assert_eq!(unweighted.len(), 2);
    }

    #[test]
    fn unit_clauses_of_transformed_formulas() {
        let mut parsed = parse("p cnf 2 1\nw 1 0.99\n1 2 0\n").unwrap();
        let one = DyadicWeight::new(1u32.into(), 0).unwrap();
        parsed
            .formula
            .inject(&ChainEncoding::new(Lit::from_dimacs(1), &one, 2));
        let mut out = Vec::new();
        write(&mut out, &parsed.formula).unwrap();
        assert!(matches!(
            read(out.as_slice())
                .unwrap_err()
                .downcast::<TransformError>()
                .unwrap(),
            TransformError::UnpreprocessedUnitClause { line: 4, .. }
        ));
        let again = read_transformed(out.as_slice()).unwrap();
        assert_eq!(again.formula.var_count(), 2);
        assert_eq!(again.formula.original_clause_count(), 2);
        assert_eq!(again.formula.clauses().len(), 2);
        assert_eq!(again.formula.sampling_len(), 2);
        // the empty clause is still refused
        assert!(read_transformed(&b"p cnf 2 1\n0\n"[..]).is_err());
    }

    #[test]
    fn write_file_replaces_the_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.cnf");
        std::fs::write(&path, "stale").unwrap();
        let parsed = parse("p cnf 2 1\n1 2 0\n").unwrap();
        write_file(&path, &parsed.formula).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("p cnf 2 1\nc p show 1 2 0\n"));
        let missing = dir.path().join("nowhere").join("out.cnf");
        assert!(matches!(
            write_file(&missing, &parsed.formula),
            Err(TransformError::OutputWriteFailed { .. })
        ));
    }
}
