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

//! Errors of the weighted to unweighted transformation.

use num_rational::BigRational;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that makes the transformation give up.
///
/// Line numbers are 1-based and refer to the input formula. None of these are recoverable: the
/// transformation aborts before any output is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Missing, duplicated or unparsable `p cnf` header, or a clause or sampling set before the
    /// header.
    #[error("line {line}: the header must be of the form 'p cnf VARS CLAUSES': {reason}")]
    MalformedHeader {
        /// offending line, or the last line when there is no header
        line: usize,
        /// what is wrong
        reason: String,
    },
    /// Variable of a `c ind` / `c p show` line out of range.
    #[error(
        "line {line}: the sampling set contains {var} but sampling variables must be in 1..={var_count}"
    )]
    InvalidSamplingVar {
        /// line of the sampling set
        line: usize,
        /// the variable as written
        var: isize,
        /// variables declared by the header
        var_count: usize,
    },
    /// More than one `c MUST MULTIPLY BY` annotation.
    #[error("line {line}: the formula already has a multiplier defined: {previous}")]
    DuplicateMultiplier {
        /// line of the second annotation
        line: usize,
        /// value of the first one
        previous: BigRational,
    },
    /// The same literal has two weight declarations.
    #[error("line {line}: literal {lit} has two weights declared")]
    DuplicateWeight {
        /// line of the second declaration
        line: usize,
        /// DIMACS literal
        lit: isize,
    },
    /// Both literals of a variable have weights that do not add up to 1.
    #[error(
        "line {line}: literal {lit} has weight {weight} but its complement has weight {complement}, they must add up to 1"
    )]
    InconsistentComplementWeight {
        /// line of the second declaration
        line: usize,
        /// DIMACS literal of the second declaration
        lit: isize,
        /// its weight
        weight: BigRational,
        /// weight declared for the opposite literal
        complement: BigRational,
    },
    /// A literal was declared with weight exactly 1.
    #[error(
        "line {line}: literal {lit} has weight 1, the formula was not preprocessed or its weights do not add up to 1"
    )]
    UnnormalizedWeight {
        /// line of the declaration
        line: usize,
        /// DIMACS literal
        lit: isize,
    },
    /// A weight, declared or synthesized, is 0 or negative.
    #[error("literal {lit} has weight {weight}, a variable with weight 0 should have been eliminated")]
    NonPositiveWeight {
        /// DIMACS literal
        lit: isize,
        /// its weight
        weight: BigRational,
    },
    /// A clause or weight mentions a variable the header does not declare.
    #[error("line {line}: variable {var} is used but the header declares {var_count} variables")]
    VariableOutOfRange {
        /// offending line
        line: usize,
        /// the variable, 0 for a weight on literal 0
        var: usize,
        /// variables declared by the header
        var_count: usize,
    },
    /// A clause with fewer than two literals.
    #[error(
        "line {line}: clause '{clause}' has fewer than 2 literals, the formula was not preprocessed"
    )]
    UnpreprocessedUnitClause {
        /// line of the clause
        line: usize,
        /// the clause as written
        clause: String,
    },
    /// Quantization precision below 2 bits.
    #[error("precision must be at least 2, got {precision}")]
    PrecisionTooLow {
        /// requested precision
        precision: u32,
    },
    /// Quantization of a weight outside [0, 1].
    #[error("weight {weight} is not in the range [0, 1]")]
    WeightOutOfRange {
        /// the weight
        weight: BigRational,
    },
    /// Fresh variables would exceed the number of variables a formula can hold.
    #[error(
        "{needed} fresh variables are needed on top of {var_count} but formulas are limited to {limit} variables"
    )]
    TooManyVariables {
        /// variables before the gadget
        var_count: usize,
        /// fresh variables of the gadget
        needed: usize,
        /// maximum number of variables
        limit: usize,
    },
    /// The output formula could not be written.
    #[error("failed to write output to {}: {reason}", .path.display())]
    OutputWriteFailed {
        /// destination
        path: PathBuf,
        /// underlying I/O error
        reason: String,
    },
    /// A line that is none of the recognized forms.
    #[error("line {line}: cannot parse '{content}': {reason}")]
    UnexpectedInput {
        /// offending line
        line: usize,
        /// its whitespace normalized content
        content: String,
        /// what was expected
        reason: &'static str,
    },
}

#[test]
fn test_messages() {
    let e = TransformError::MalformedHeader {
        line: 3,
        reason: "second header".to_owned(),
    };
    assert_eq!(
        e.to_string(),
        "line 3: the header must be of the form 'p cnf VARS CLAUSES': second header"
    );
    let e = TransformError::TooManyVariables {
        var_count: 10,
        needed: 3,
        limit: 12,
    };
    assert!(e.to_string().contains("limited to 12 variables"));
}
