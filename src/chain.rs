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

//! Chain formulas: clauses giving a literal a dyadic weight among unweighted models.
//!
//! For `m / 2^k` with `m` odd and `k >= 2`, the gadget uses `k` fresh variables
//! `x_1 .. x_k`. Writing `m = b_{k-1} .. b_1 1` in binary, the chain formula
//! `(..((x_k op_1 x_{k-1}) op_2 x_{k-2}) .. ) op_{k-1} x_1`, where `op_i` is a disjunction
//! when `b_i` is 1 and a conjunction otherwise, has exactly `m` models over the fresh
//! variables. The same construction on the complemented bits with negated variables has
//! `2^k - m` models. The first is asserted when the target literal is true, the second when it
//! is false, so the target literal is true in a fraction `m / 2^k` of the models.

use crate::cnf::{Lit, Var};
use crate::quantize::DyadicWeight;
use itertools::Itertools;
use std::ops::Range;

/// The clauses and fresh variables encoding the weight of one literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainEncoding {
    target: Lit,
    /// indices (0-based) of the fresh variables
    aux: Range<usize>,
    clauses: Vec<Vec<Lit>>,
    divisor_exponent: u32,
}

/// Clauses of a chain formula guarded by `guard`.
///
/// `start` carries the implicit low bit; each step adds a variable, by disjunction when its bit
/// is true and by conjunction otherwise.
fn chain(
    start: Var,
    steps: impl Iterator<Item = (Var, bool)>,
    polarity: bool,
    guard: Lit,
) -> Vec<Vec<Lit>> {
    let mut clauses = vec![vec![start.positive()]];
    for (var, bit) in steps {
        let lit = Lit::from_var(var, polarity);
        if bit {
            for clause in clauses.iter_mut() {
                clause.push(lit);
            }
        } else {
            clauses.push(vec![lit]);
        }
    }
    for clause in clauses.iter_mut() {
        clause.push(guard);
    }
    clauses
}

impl ChainEncoding {
    /// Builds the encoding of `weight` for `target`, with fresh variables numbered after the
    /// first `var_count` variables.
    ///
    /// * `1/2^0`: the unit clause `target`
    /// * `0/2^0`: the unit clause `-target`
    /// * `1/2^1`: nothing, a free variable is already true in half of the models
    /// * otherwise a chain formula on `weight.exponent()` fresh variables.
    pub fn new(target: Lit, weight: &DyadicWeight, var_count: usize) -> ChainEncoding {
        let k = weight.exponent() as usize;
        let m = weight.mantissa();
        let (aux_count, clauses, divisor_exponent) = if k == 0 {
            let unit = if m.bit(0) { target } else { !target };
            (0, vec![vec![unit]], 0)
        } else if weight.is_one_half() {
            (0, vec![], 1)
        } else {
            let var = |j: usize| Var::from_index(var_count + j - 1);
            // x_j goes with bit k - j of m
            let bits = || (1..k).rev().map(|j| (var(j), m.bit((k - j) as u64)));
            let when_true = chain(var(k), bits(), true, !target);
            let when_false = chain(
                var(k),
                bits().map(|(var, bit)| (var, !bit)),
                false,
                target,
            );
            let clauses = when_true.into_iter().chain(when_false).unique().collect();
            (k, clauses, weight.exponent())
        };
        ChainEncoding {
            target,
            aux: var_count..(var_count + aux_count),
            clauses,
            divisor_exponent,
        }
    }

    /// Number of fresh variables [`ChainEncoding::new`] allocates for `weight`.
    pub fn fresh_vars_needed(weight: &DyadicWeight) -> usize {
        if weight.exponent() < 2 {
            0
        } else {
            weight.exponent() as usize
        }
    }

    /// The literal whose weight is encoded
    pub fn target(&self) -> Lit {
        self.target
    }

    /// The fresh variables, increasing
    pub fn aux_vars(&self) -> impl Iterator<Item = Var> {
        self.aux.clone().map(Var::from_index)
    }

    /// Number of fresh variables
    pub fn aux_count(&self) -> usize {
        self.aux.len()
    }

    /// 0-based index of the first fresh variable, which is the number of variables the
    /// encoding was built for.
    pub fn first_aux_index(&self) -> usize {
        self.aux.start
    }

    /// Generated clauses
    pub fn clauses(&self) -> &[Vec<Lit>] {
        &self.clauses
    }

    /// `d` such that the models of the encoding, weighted, sum to their count divided by `2^d`.
    pub fn divisor_exponent(&self) -> u32 {
        self.divisor_exponent
    }
}
