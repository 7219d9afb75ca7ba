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

//! CNF formulas, and brute force counting to check transformations on small formulas.

use crate::model::Model;
use crate::weight::WeightMap;
use anyhow::Context;
use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, Zero};
use std::io::Read;
pub use varisat_dimacs::{DimacsHeader, DimacsParser};
pub use varisat_formula::{CnfFormula, ExtendFormula, Lit, Var};

/// Parses a plain DIMACS CNF formula, ignoring all comment lines (weights, sampling set and
/// multiplier included). Checks the header.
pub fn parse_unweighted(read: impl Read) -> anyhow::Result<CnfFormula> {
    DimacsParser::parse(read).context("parsing unweighted dimacs cnf")
}

/// returns the model count of the formula by testing all models sequentially.
pub fn brute_force_model_count(f: &CnfFormula) -> BigUint {
    let mut m = Model::empty(f.var_count());
    let mut n = BigUint::zero();
    loop {
        if m.satisfies(f.iter()) {
            n += BigUint::one();
        }
        if !m.next_model() {
            break;
        }
    }
    n
}

/// returns the weighted model count of the formula by testing all models sequentially.
///
/// A model weighs the product of the weights of its true literals. Literals without a weight
/// weigh 1.
pub fn brute_force_weighted_count(f: &CnfFormula, weights: &WeightMap) -> BigRational {
    let mut m = Model::empty(f.var_count());
    let mut total = BigRational::zero();
    let one = BigRational::one();
    loop {
        if m.satisfies(f.iter()) {
            let mut product = BigRational::one();
            for index in 0..f.var_count() {
                let var = Var::from_index(index);
                let lit = Lit::from_var(var, m.var(var));
                product *= weights.get(lit).unwrap_or(&one);
            }
            total += product;
        }
        if !m.next_model() {
            break;
        }
    }
    total
}

/// Converts the unweighted (projected) model count of a transformed formula back to the
/// weighted model count of the original formula: `count / 2^divisor_exponent * multiplier`.
///
/// # Example
/// ```
/// use unweight::cnf::weighted_count_from;
/// use num_rational::BigRational;
///
/// let multiplier = BigRational::new(3.into(), 2.into());
/// let weighted = weighted_count_from(&24u32.into(), 4, &multiplier);
/// assert_eq!(weighted, BigRational::new(9.into(), 4.into()));
/// ```
pub fn weighted_count_from(
    count: &BigUint,
    divisor_exponent: u64,
    multiplier: &BigRational,
) -> BigRational {
    let count = BigRational::new(BigInt::from(count.clone()), BigInt::one() << divisor_exponent);
    count * multiplier
}

#[test]
fn test_brute_force_mc() -> anyhow::Result<()> {
    let f = b"p cnf 3 3
-1 3 -2 0
-2 1 3 0
3 -1 -2 0
";
    let formula = parse_unweighted(f as &[u8])?;
    let mc = brute_force_model_count(&formula);
    assert_eq!(mc, 6u32.into());
    Ok(())
}

#[test]
fn test_brute_force_wmc() -> anyhow::Result<()> {
    use crate::weight::parse_value;
    let f = b"p cnf 2 1
1 2 0
";
    let formula = parse_unweighted(f as &[u8])?;
    let weights: WeightMap = vec![
        (Lit::from_dimacs(1), parse_value("0.3").unwrap()),
        (Lit::from_dimacs(-1), parse_value("0.7").unwrap()),
    ]
    .into_iter()
    .collect();
    // models 01 10 11: 0.7 + 0.3 + 0.3, variable 2 is unweighted
    assert_eq!(
        brute_force_weighted_count(&formula, &weights),
        parse_value("1.3").unwrap()
    );
    Ok(())
}
