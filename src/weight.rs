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

//! Literal weights: exact values, the weight map, and normalization.

use crate::cnf::{Lit, Var};
use crate::error::TransformError;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use std::collections::BTreeMap;
use tracing::trace;

pub(crate) mod parser {
    use super::*;
    use nom::character::complete::{char, digit0, digit1, one_of};
    use nom::combinator::{all_consuming, map_res, opt, recognize, verify};
    use nom::sequence::{pair, preceded};
    use nom::IResult;

    /// Largest absolute decimal exponent accepted, `10^e` is computed exactly.
    pub(crate) const MAX_EXPONENT: u32 = 1000;

    /// `[+-]digits[.digits][e[+-]digits]`, at least one digit in the mantissa.
    fn decimal(s: &str) -> IResult<&str, BigRational> {
        let (s, negative) = opt(one_of("+-"))(s)?;
        let (s, (int_part, frac_part)) = verify(
            pair(digit0, opt(preceded(char('.'), digit0))),
            |(i, f): &(&str, Option<&str>)| !i.is_empty() || f.map_or(false, |f| !f.is_empty()),
        )(s)?;
        let (s, exponent) = opt(preceded(
            one_of("eE"),
            verify(
                map_res(recognize(pair(opt(one_of("+-")), digit1)), |e: &str| {
                    e.parse::<i32>()
                }),
                |e: &i32| e.unsigned_abs() <= MAX_EXPONENT,
            ),
        ))(s)?;
        let frac_part = frac_part.unwrap_or("");
        let digits = format!("{}{}", int_part, frac_part);
        // digits only contains ascii digits and is not empty
        let numerator = BigInt::parse_bytes(digits.as_bytes(), 10).unwrap_or_default();
        let mut value = BigRational::new(numerator, pow10(frac_part.len() as u32));
        match exponent {
            Some(e) if e >= 0 => value *= BigRational::from_integer(pow10(e as u32)),
            Some(e) => value /= BigRational::from_integer(pow10(e.unsigned_abs())),
            None => {}
        }
        if negative == Some('-') {
            value = -value;
        }
        Ok((s, value))
    }

    fn pow10(exponent: u32) -> BigInt {
        BigInt::from(10u32).pow(exponent)
    }

    /// `decimal` or `decimal/decimal` with a non-zero denominator.
    fn fraction(s: &str) -> IResult<&str, BigRational> {
        let (s, numerator) = decimal(s)?;
        let (s, denominator) = opt(preceded(
            char('/'),
            verify(decimal, |d: &BigRational| !d.is_zero()),
        ))(s)?;
        Ok((
            s,
            match denominator {
                Some(d) => numerator / d,
                None => numerator,
            },
        ))
    }

    pub(crate) fn value(s: &str) -> IResult<&str, BigRational> {
        all_consuming(fraction)(s)
    }
}

/// Parses an exact weight value, written either as a decimal literal (`0.25`, `.5`, `1e-3`) or
/// as a fraction of two decimals (`1/3`). Exponents are limited to 1000 in absolute value.
/// # Example
/// ```
/// use unweight::weight::parse_value;
/// use num_rational::BigRational;
///
/// assert_eq!(parse_value("0.25"), Some(BigRational::new(1.into(), 4.into())));
/// assert_eq!(parse_value("2/6"), Some(BigRational::new(1.into(), 3.into())));
/// assert_eq!(parse_value("1/0"), None);
/// ```
pub fn parse_value(text: &str) -> Option<BigRational> {
    parser::value(text).ok().map(|(_, value)| value)
}

/// Weights attached to literals.
///
/// Iteration is by variable, and for a given variable the positive literal comes first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WeightMap(BTreeMap<Lit, BigRational>);

impl WeightMap {
    /// creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// weight of this literal, if any
    pub fn get(&self, lit: Lit) -> Option<&BigRational> {
        self.0.get(&lit)
    }

    /// sets the weight of a literal, returns the previous one
    pub fn insert(&mut self, lit: Lit, weight: BigRational) -> Option<BigRational> {
        self.0.insert(lit, weight)
    }

    /// removes the weights of both literals of this variable
    pub fn remove_var(&mut self, var: Var) {
        self.0.remove(&var.positive());
        self.0.remove(&var.negative());
    }

    /// Number of literals with a weight
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// true when no literal has a weight
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All weighted literals.
    pub fn iter(&self) -> impl Iterator<Item = (Lit, &BigRational)> {
        self.0.iter().map(|(&lit, weight)| (lit, weight))
    }

    /// Variables having at least one weighted literal, in increasing order.
    pub fn vars(&self) -> Vec<Var> {
        let mut res: Vec<Var> = self.0.keys().map(|lit| lit.var()).collect();
        res.dedup();
        res
    }

    /// Weights of positive literals, by increasing variable.
    pub fn positive(&self) -> impl Iterator<Item = (Var, &BigRational)> {
        self.iter()
            .filter(|(lit, _)| lit.is_positive())
            .map(|(lit, weight)| (lit.var(), weight))
    }

    /// Removes every variable whose both literals weigh exactly 1
    fn remove_trivial_pairs(&mut self) {
        let one = BigRational::one();
        for var in self.vars() {
            if self.get(var.positive()) == Some(&one) && self.get(var.negative()) == Some(&one) {
                trace!(var = var.to_dimacs(), "dropping weight pair (1, 1)");
                self.remove_var(var);
            }
        }
    }
}

impl std::iter::FromIterator<(Lit, BigRational)> for WeightMap {
    fn from_iter<I: IntoIterator<Item = (Lit, BigRational)>>(iter: I) -> Self {
        WeightMap(iter.into_iter().collect())
    }
}

/// Makes the weights of the two literals of every variable add up to exactly 1.
///
/// Missing complements are set to `1 - weight`. Variables whose literals both weigh 1 are
/// dropped. Other pairs `(a, b)` become `(a / (a + b), b / (a + b))` and `multiplier` is
/// multiplied by `a + b`, so that the weighted model count is preserved once multiplied back.
///
/// Returns the normalized map and the updated multiplier. Fails if any weight is 0 or negative.
pub fn normalize(
    mut weights: WeightMap,
    mut multiplier: BigRational,
) -> Result<(WeightMap, BigRational), TransformError> {
    let one = BigRational::one();
    let missing: Vec<(Lit, BigRational)> = weights
        .iter()
        .filter(|&(lit, _)| weights.get(!lit).is_none())
        .map(|(lit, weight)| (!lit, &one - weight))
        .collect();
    for (lit, weight) in missing {
        trace!(lit = lit.to_dimacs(), weight = %weight, "synthesized complement weight");
        weights.insert(lit, weight);
    }

    if let Some((lit, weight)) = weights.iter().find(|(_, weight)| !weight.is_positive()) {
        return Err(TransformError::NonPositiveWeight {
            lit: lit.to_dimacs(),
            weight: weight.clone(),
        });
    }

    weights.remove_trivial_pairs();

    for var in weights.vars() {
        let (positive, negative) = match (weights.get(var.positive()), weights.get(var.negative()))
        {
            (Some(p), Some(n)) => (p.clone(), n.clone()),
            _ => continue,
        };
        let sum = &positive + &negative;
        if sum.is_one() {
            continue;
        }
        trace!(var = var.to_dimacs(), sum = %sum, "rescaling weight pair");
        weights.insert(var.positive(), positive / &sum);
        weights.insert(var.negative(), negative / &sum);
        multiplier *= sum;
    }

    weights.remove_trivial_pairs();

    Ok((weights, multiplier))
}

#[cfg(test)]
mod test {
    use super::*;

    fn q(text: &str) -> BigRational {
        parse_value(text).unwrap()
    }

    fn lit(n: isize) -> Lit {
        Lit::from_dimacs(n)
    }

    #[test]
    fn parse_decimals() {
        assert_eq!(q("0.5"), BigRational::new(1.into(), 2.into()));
        assert_eq!(q(".5"), q("0.5"));
        assert_eq!(q("5."), BigRational::from_integer(5.into()));
        assert_eq!(q("0.49888"), BigRational::new(49888.into(), 100000.into()));
        assert_eq!(q("1e-3"), BigRational::new(1.into(), 1000.into()));
        assert_eq!(q("2.5E+1"), BigRational::from_integer(25.into()));
        assert_eq!(q("+0.1"), BigRational::new(1.into(), 10.into()));
        assert_eq!(q("-0.1"), BigRational::new((-1).into(), 10.into()));
        assert_eq!(q("0"), BigRational::zero());
    }

    #[test]
    fn parse_fractions() {
        assert_eq!(q("3/4"), BigRational::new(3.into(), 4.into()));
        assert_eq!(q("0.3/0.6"), BigRational::new(1.into(), 2.into()));
        assert_eq!(q("1/3") + q("2/3"), BigRational::one());
    }

    #[test]
    fn parse_garbage() {
        for text in &["", ".", "abc", "0.5x", "1/", "/2", "1/0", "1/0.0", "0.5 0", "1e", "--1"] {
            assert_eq!(parse_value(text), None, "{:?}", text);
        }
    }

    #[test]
    fn huge_exponents_are_refused() {
        assert_eq!(parse_value("1e-2000000000"), None);
        assert_eq!(parse_value("1e99999999999"), None);
        assert_eq!(parse_value("1/1e1001"), None);
        assert_eq!(
            q("1e-1000"),
            BigRational::new(1.into(), BigInt::from(10u32).pow(parser::MAX_EXPONENT))
        );
    }

    #[test]
    fn complement_is_synthesized() {
        let weights: WeightMap = vec![(lit(1), q("0.3")), (lit(-2), q("1/4"))]
            .into_iter()
            .collect();
        let (weights, multiplier) = normalize(weights, BigRational::one()).unwrap();
        assert_eq!(weights.get(lit(-1)), Some(&q("0.7")));
        assert_eq!(weights.get(lit(2)), Some(&q("3/4")));
        assert_eq!(weights.len(), 4);
        assert_eq!(multiplier, BigRational::one());
    }

    #[test]
    fn zero_and_negative_weights_are_rejected() {
        let weights: WeightMap = vec![(lit(1), q("0"))].into_iter().collect();
        assert!(matches!(
            normalize(weights, BigRational::one()),
            Err(TransformError::NonPositiveWeight { lit: 1, .. })
        ));
        // the synthesized complement of 1.5 is -0.5
        let weights: WeightMap = vec![(lit(3), q("1.5"))].into_iter().collect();
        assert!(matches!(
            normalize(weights, BigRational::one()),
            Err(TransformError::NonPositiveWeight { lit: -3, .. })
        ));
    }

    #[test]
    fn one_one_pairs_are_dropped() {
        let weights: WeightMap = vec![(lit(1), q("1")), (lit(-1), q("1")), (lit(2), q("0.5"))]
            .into_iter()
            .collect();
        let (weights, multiplier) = normalize(weights, q("3")).unwrap();
        assert_eq!(weights.vars(), vec![Var::from_dimacs(2)]);
        assert_eq!(multiplier, q("3"));
    }

    #[test]
    fn pairs_are_rescaled() {
        let weights: WeightMap = vec![
            (lit(1), q("2")),
            (lit(-1), q("6")),
            (lit(2), q("0.1")),
            (lit(-2), q("0.3")),
            (lit(3), q("0.25")),
        ]
        .into_iter()
        .collect();
        let (weights, multiplier) = normalize(weights, q("1/2")).unwrap();
        assert_eq!(weights.get(lit(1)), Some(&q("1/4")));
        assert_eq!(weights.get(lit(-1)), Some(&q("3/4")));
        assert_eq!(weights.get(lit(2)), Some(&q("1/4")));
        assert_eq!(weights.get(lit(-2)), Some(&q("3/4")));
        assert_eq!(weights.get(lit(-3)), Some(&q("3/4")));
        // 1/2 * 8 * 0.4
        assert_eq!(multiplier, q("1.6"));
        for var in weights.vars() {
            let sum = weights.get(var.positive()).unwrap() + weights.get(var.negative()).unwrap();
            assert!(sum.is_one());
        }
    }
}
