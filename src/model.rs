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

//! A type for a model, or an assignment of some variables
use crate::cnf::{Lit, Var};
use fixedbitset::FixedBitSet;

#[derive(Clone, PartialOrd, Ord, PartialEq, Eq)]
/// Represents an assignment by the set of true variables.
pub struct Model(FixedBitSet);

impl std::fmt::Debug for Model {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_set()
            .entries(self.0.ones().map(Var::from_index))
            .finish()
    }
}

impl Model {
    /// creates an assignment of `nvars` variables, all false
    pub fn empty(nvars: usize) -> Model {
        Self(FixedBitSet::with_capacity(nvars))
    }

    /// number of variables
    pub fn nvars(&self) -> usize {
        self.0.len()
    }

    /// set the specified variable to the specified value
    pub fn set(&mut self, var: Var, value: bool) {
        self.0.set(var.index(), value)
    }

    /// value of the variable
    pub fn var(&self, var: Var) -> bool {
        self.0[var.index()]
    }

    /// value of the literal
    pub fn lit(&self, lit: Lit) -> bool {
        self.var(lit.var()) ^ lit.is_negative()
    }

    /// Moves to the next assignment of `vars`, leaving other variables untouched, as if `vars`
    /// were the bits of a counter, least significant first. Returns false and resets `vars` to
    /// false after the last one.
    /// # Example
    /// ```
    /// use unweight::model::Model;
    /// use unweight::cnf::Var;
    ///
    /// let vars = [Var::from_dimacs(3), Var::from_dimacs(1)];
    /// let mut model = Model::empty(3);
    /// let mut seen = Vec::new();
    /// loop {
    ///     seen.push((model.var(vars[1]), model.var(vars[0])));
    ///     if !model.next_model_over(&vars) {
    ///         break;
    ///     }
    /// }
    /// assert_eq!(seen, vec![(false, false), (false, true), (true, false), (true, true)]);
    /// assert_eq!(model, Model::empty(3));
    /// ```
    pub fn next_model_over(&mut self, vars: &[Var]) -> bool {
        for &var in vars {
            if self.var(var) {
                self.set(var, false);
            } else {
                self.set(var, true);
                return true;
            }
        }
        false
    }

    /// Moves to the next assignment of all variables, see `next_model_over`.
    pub fn next_model(&mut self) -> bool {
        let all: Vec<Var> = (0..self.nvars()).map(Var::from_index).collect();
        self.next_model_over(&all)
    }

    /// Checks whether at least one literal of the clause is true.
    pub fn satisfies_clause(&self, clause: &[Lit]) -> bool {
        clause.iter().any(|&lit| self.lit(lit))
    }

    /// Checks whether the assignment satisfies all clauses.
    pub fn satisfies<'a>(&self, clauses: impl IntoIterator<Item = &'a [Lit]>) -> bool {
        clauses
            .into_iter()
            .all(|clause| self.satisfies_clause(clause))
    }
}

#[test]
fn test_satisfies() -> anyhow::Result<()> {
    let f = b"p cnf 3 3
-1 3 -2 0
-2 1 3 0
3 -1 -2 0
";
    let formula = varisat_dimacs::DimacsParser::parse(f as &[u8])?;
    let mut model = Model::empty(3);
    assert!(model.satisfies(formula.iter()));
    model.set(Var::from_index(0), true);
    model.set(Var::from_index(1), true);
    assert!(!model.satisfies(formula.iter()));
    assert!(model.lit(Lit::from_dimacs(-3)));
    Ok(())
}

#[test]
fn test_next_model() {
    for size in 0..=10 {
        let mut m = Model::empty(size);
        let mut count = 0u64;
        loop {
            let value: u64 = (0..size)
                .filter(|&i| m.var(Var::from_index(i)))
                .map(|i| 1 << i)
                .sum();
            assert_eq!(value, count, "size: {}", size);
            count += 1;
            if !m.next_model() {
                break;
            }
        }
        assert_eq!(count, 1 << size);
        assert_eq!(m, Model::empty(size));
    }
}
