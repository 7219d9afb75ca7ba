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

//! The formula being transformed.

use crate::chain::ChainEncoding;
use crate::cnf::{CnfFormula, ExtendFormula, Lit, Var};
use fixedbitset::FixedBitSet;
use num_rational::BigRational;
use num_traits::One;

/// A CNF formula with its sampling set and multiplier, as read from an extended DIMACS file,
/// plus the clauses injected by chain formulas.
///
/// Variable and clause counts start from the header and only grow.
#[derive(Debug)]
pub struct Formula {
    comments: Vec<String>,
    original_var_count: usize,
    original_clause_count: usize,
    var_count: usize,
    clause_count: usize,
    clauses: CnfFormula,
    injected: CnfFormula,
    /// indexed by `Var::index()`
    sampling: FixedBitSet,
    multiplier: BigRational,
}

impl Formula {
    /// An empty formula with the counts of its header, no sampling variable and multiplier 1.
    pub fn new(var_count: usize, clause_count: usize) -> Formula {
        Formula {
            comments: Vec::new(),
            original_var_count: var_count,
            original_clause_count: clause_count,
            var_count,
            clause_count,
            clauses: CnfFormula::new(),
            injected: CnfFormula::new(),
            sampling: FixedBitSet::with_capacity(var_count),
            multiplier: BigRational::one(),
        }
    }

    /// Number of variables declared by the input header
    pub fn original_var_count(&self) -> usize {
        self.original_var_count
    }

    /// Number of clauses declared by the input header
    pub fn original_clause_count(&self) -> usize {
        self.original_clause_count
    }

    /// Current number of variables
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Current number of clauses
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    /// Comment lines to copy to the output
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Clauses of the input
    pub fn clauses(&self) -> &CnfFormula {
        &self.clauses
    }

    /// Clauses added by chain formulas
    pub fn injected_clauses(&self) -> &CnfFormula {
        &self.injected
    }

    /// Multiplier to apply to the model count
    pub fn multiplier(&self) -> &BigRational {
        &self.multiplier
    }

    pub(crate) fn add_comment(&mut self, line: String) {
        self.comments.push(line);
    }

    pub(crate) fn add_clause(&mut self, clause: &[Lit]) {
        self.clauses.add_clause(clause);
    }

    pub(crate) fn set_multiplier(&mut self, multiplier: BigRational) {
        self.multiplier = multiplier;
    }

    /// Adds a variable to the sampling set.
    pub fn add_sampling_var(&mut self, var: Var) {
        self.sampling.grow(var.index() + 1);
        self.sampling.insert(var.index());
    }

    /// Whether the variable is part of the sampling set
    pub fn is_sampling_var(&self, var: Var) -> bool {
        self.sampling.contains(var.index())
    }

    /// Variables of the sampling set, increasing.
    pub fn sampling_vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.sampling.ones().map(Var::from_index)
    }

    /// Number of variables in the sampling set
    pub fn sampling_len(&self) -> usize {
        self.sampling.count_ones(..)
    }

    /// Appends the clauses of a chain formula built on top of the current variables, and
    /// samples its auxiliary variables.
    ///
    /// Panics if the encoding was not built from the current variable count.
    pub fn inject(&mut self, encoding: &ChainEncoding) {
        assert_eq!(
            encoding.first_aux_index(),
            self.var_count,
            "chain formula built for another formula"
        );
        for var in encoding.aux_vars() {
            self.add_sampling_var(var);
        }
        for clause in encoding.clauses() {
            self.injected.add_clause(clause);
        }
        self.var_count += encoding.aux_count();
        self.clause_count += encoding.clauses().len();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::quantize::DyadicWeight;

    #[test]
    fn injection_grows_counts_and_sampling() {
        let mut f = Formula::new(4, 2);
        f.add_sampling_var(Var::from_dimacs(2));
        let weight = DyadicWeight::new(5u32.into(), 3).unwrap();
        let encoding = ChainEncoding::new(Lit::from_dimacs(2), &weight, f.var_count());
        f.inject(&encoding);
        assert_eq!(f.var_count(), 7);
        assert_eq!(f.original_var_count(), 4);
        assert_eq!(f.clause_count(), 2 + encoding.clauses().len());
        assert_eq!(f.original_clause_count(), 2);
        assert_eq!(
            f.sampling_vars().map(Var::to_dimacs).collect::<Vec<_>>(),
            vec![2, 5, 6, 7]
        );
        assert_eq!(f.injected_clauses().len(), encoding.clauses().len());
        assert!(f.is_sampling_var(Var::from_dimacs(6)));
        assert!(!f.is_sampling_var(Var::from_dimacs(1)));
    }

    #[test]
    fn clauses_are_kept_apart() {
        let mut f = Formula::new(3, 2);
        f.add_clause(&[Lit::from_dimacs(1), Lit::from_dimacs(-2)]);
        f.add_clause(&[Lit::from_dimacs(2), Lit::from_dimacs(3)]);
        let weight = DyadicWeight::new(0u32.into(), 0).unwrap();
        f.inject(&ChainEncoding::new(Lit::from_dimacs(3), &weight, f.var_count()));
        let clauses: Vec<&[Lit]> = f.clauses().iter().collect();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[1], &[Lit::from_dimacs(2), Lit::from_dimacs(3)][..]);
        let injected: Vec<&[Lit]> = f.injected_clauses().iter().collect();
        assert_eq!(injected, vec![&[Lit::from_dimacs(-3)][..]]);
        assert_eq!(f.clause_count(), 3);
        assert_eq!(f.var_count(), 3);
    }

    #[test]
    #[should_panic]
    fn stale_encodings_are_refused() {
        let mut f = Formula::new(4, 2);
        let weight = DyadicWeight::new(5u32.into(), 3).unwrap();
        let encoding = ChainEncoding::new(Lit::from_dimacs(2), &weight, 3);
        f.inject(&encoding);
    }
}
