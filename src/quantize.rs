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

//! Approximation of weights by dyadic fractions.

use crate::error::TransformError;
use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, Signed};
use serde::Serialize;
use std::cmp::Ordering;

fn biguint_to_string<S: serde::Serializer>(n: &BigUint, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&n.to_string())
}

/// The fraction `mantissa / 2^exponent`.
///
/// Invariant: `mantissa <= 2^exponent`, and `mantissa` is odd unless `exponent == 0`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DyadicWeight {
    #[serde(serialize_with = "biguint_to_string")]
    mantissa: BigUint,
    exponent: u32,
}

impl DyadicWeight {
    /// Creates `mantissa / 2^exponent`, or None when it breaks the invariant.
    pub fn new(mantissa: BigUint, exponent: u32) -> Option<DyadicWeight> {
        let reduced = exponent == 0 || mantissa.bit(0);
        if reduced && mantissa <= BigUint::one() << exponent {
            Some(DyadicWeight { mantissa, exponent })
        } else {
            None
        }
    }

    /// numerator
    pub fn mantissa(&self) -> &BigUint {
        &self.mantissa
    }

    /// log2 of the denominator
    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    /// The represented value.
    pub fn value(&self) -> BigRational {
        BigRational::new(
            BigInt::from(self.mantissa.clone()),
            BigInt::one() << self.exponent,
        )
    }

    /// Exactly 1/2
    pub fn is_one_half(&self) -> bool {
        self.exponent == 1
    }
}

impl std::fmt::Display for DyadicWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/2^{}", self.mantissa, self.exponent)
    }
}

/// Rounds to the nearest integer, ties to even.
fn round_half_even(x: &BigRational) -> BigInt {
    let floor = x.floor();
    let twice_fraction = (x - &floor) * BigRational::from_integer(2.into());
    let floor = floor.to_integer();
    match twice_fraction.cmp(&BigRational::one()) {
        Ordering::Less => floor,
        Ordering::Greater => floor + 1,
        Ordering::Equal if floor.magnitude().bit(0) => floor + 1,
        Ordering::Equal => floor,
    }
}

/// Approximates `weight` by a dyadic fraction with a denominator of at most `2^precision`.
///
/// The result is the closest multiple of `2^-precision` (ties to even), reduced until the
/// mantissa is odd or the exponent is 0, so `|weight - result| <= 2^-(precision+1)`.
/// Weights closer to 0 or 1 than `2^-(precision+1)` collapse to `0/2^0` and `1/2^0`.
///
/// # Example
/// ```
/// use unweight::quantize::quantize;
/// use unweight::weight::parse_value;
///
/// let w = quantize(&parse_value("0.75").unwrap(), 7).unwrap();
/// assert_eq!((w.mantissa().clone(), w.exponent()), (3u32.into(), 2));
/// ```
pub fn quantize(weight: &BigRational, precision: u32) -> Result<DyadicWeight, TransformError> {
    if precision < 2 {
        return Err(TransformError::PrecisionTooLow { precision });
    }
    if weight.is_negative() || weight > &BigRational::one() {
        return Err(TransformError::WeightOutOfRange {
            weight: weight.clone(),
        });
    }
    if weight.is_one() {
        return Ok(DyadicWeight {
            mantissa: BigUint::one(),
            exponent: 0,
        });
    }
    let scaled = weight * BigRational::from_integer(BigInt::one() << precision);
    // non negative because weight is
    let mut mantissa = round_half_even(&scaled).magnitude().clone();
    let mut exponent = precision;
    while exponent > 0 && !mantissa.bit(0) {
        mantissa >>= 1;
        exponent -= 1;
    }
    Ok(DyadicWeight { mantissa, exponent })
}
