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


#![warn(missing_docs)]

//! Transforms weighted CNF formulas into unweighted ones.
//!
//! Each literal weight is approximated by a dyadic fraction `m / 2^k`, which a chain formula on
//! `k` fresh sampled variables encodes exactly. The unweighted (projected) model count of the
//! result, divided by `2^d` and multiplied by the multiplier written in the output, approximates
//! the weighted model count of the input.

pub mod chain;
pub mod cnf;
pub mod dimacs;
pub mod error;
pub mod formula;
pub mod model;
pub mod quantize;
pub mod weight;

use anyhow::Context;
use chain::ChainEncoding;
use cnf::Var;
use dimacs::ParsedFormula;
use error::TransformError;
use formula::Formula;
use num_rational::BigRational;
use serde::Serialize;
use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use structopt::StructOpt;
use tracing::{debug, info, trace_span};

/// Default number of bits of the dyadic approximations
pub const DEFAULT_PRECISION: u32 = 7;

/// Parameters of the transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    /// Every weight is approximated by a multiple of `2^-precision`. At least 2.
    pub precision: u32,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            precision: DEFAULT_PRECISION,
        }
    }
}

fn rational_to_string<S: serde::Serializer>(q: &BigRational, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&q.to_string())
}

/// Summary of a transformation.
///
/// The weighted model count of the input is approximately the unweighted model count of the
/// output projected on its sampling set, divided by `2^divisor_exponent` and multiplied by
/// `multiplier`.
#[derive(Debug, Clone, Serialize)]
pub struct TransformReport {
    /// variables declared by the input header
    pub orig_vars: usize,
    /// clauses declared by the input header
    pub orig_clauses: usize,
    /// variables of the output
    pub final_vars: usize,
    /// clauses of the output
    pub final_clauses: usize,
    /// fresh variables introduced by chain formulas
    pub added_vars: usize,
    /// exponent of the power of two the unweighted count must be divided by
    pub divisor_exponent: u64,
    /// multiplier written in the output
    #[serde(serialize_with = "rational_to_string")]
    pub multiplier: BigRational,
    /// variables that still had a weight after normalization
    pub weighted_vars: usize,
    /// number of chain formulas that produced clauses
    pub gadgets: usize,
    /// time spent reading and transforming, writing excluded
    pub elapsed: Duration,
}

/// Reads a weighted formula and replaces its weights by chain formulas.
///
/// Nothing is written: see [`dimacs::write`] for the output.
pub fn transform(
    input: impl BufRead,
    options: &TransformOptions,
) -> anyhow::Result<(Formula, TransformReport)> {
    let start = Instant::now();
    if options.precision < 2 {
        return Err(TransformError::PrecisionTooLow {
            precision: options.precision,
        }
        .into());
    }

    let ParsedFormula {
        mut formula,
        weights,
    } = {
        let _span = trace_span!("reading_formula", timing = true).entered();
        dimacs::read(input)?
    };

    let _span = trace_span!("encoding_weights", timing = true).entered();
    let (weights, multiplier) = weight::normalize(weights, formula.multiplier().clone())?;
    formula.set_multiplier(multiplier);

    let mut divisor_exponent = 0u64;
    let mut gadgets = 0;
    let mut weighted_vars = 0;
    for (var, weight) in weights.positive() {
        let dyadic = quantize::quantize(weight, options.precision)?;
        debug!(
            var = var.to_dimacs(),
            weight = %weight,
            mantissa = %dyadic.mantissa(),
            exponent = dyadic.exponent(),
            "approximated weight {} by {} = {}",
            weight,
            dyadic,
            dyadic.value()
        );
        let needed = ChainEncoding::fresh_vars_needed(&dyadic);
        if needed > Var::max_count() - formula.var_count() {
            return Err(TransformError::TooManyVariables {
                var_count: formula.var_count(),
                needed,
                limit: Var::max_count(),
            }
            .into());
        }
        let encoding = ChainEncoding::new(var.positive(), &dyadic, formula.var_count());
        if !encoding.clauses().is_empty() {
            gadgets += 1;
        }
        weighted_vars += 1;
        divisor_exponent += u64::from(encoding.divisor_exponent());
        formula.inject(&encoding);
    }

    let report = TransformReport {
        orig_vars: formula.original_var_count(),
        orig_clauses: formula.original_clause_count(),
        final_vars: formula.var_count(),
        final_clauses: formula.clause_count(),
        added_vars: formula.var_count() - formula.original_var_count(),
        divisor_exponent,
        multiplier: formula.multiplier().clone(),
        weighted_vars,
        gadgets,
        elapsed: start.elapsed(),
    };
    Ok((formula, report))
}

/// Transforms the formula in file `input` and writes the result to `output`.
///
/// On error `output` is left untouched.
pub fn transform_file(
    input: &Path,
    output: &Path,
    options: &TransformOptions,
) -> anyhow::Result<TransformReport> {
    let file = File::open(input)
        .with_context(|| format!("opening input file {}", input.display()))?;
    let (formula, report) = transform(std::io::BufReader::new(file), options)
        .with_context(|| format!("transforming {}", input.display()))?;
    {
        let _span = trace_span!("writing_formula", timing = true).entered();
        dimacs::write_file(output, &formula)?;
    }
    Ok(report)
}

#[derive(Debug)]
/// Writes the report in json to a file, created only when there is something to write.
pub struct ResultWriter {
    path: PathBuf,
}

impl ResultWriter {
    fn write<R: serde::Serialize>(&self, result: &R) -> anyhow::Result<()> {
        let file = File::create(&self.path).with_context(|| {
            format!(
                "failed to open {} to write the report (--json option)",
                self.path.display()
            )
        })?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), result)
            .with_context(|| format!("writing report to {}", self.path.display()))
    }
}

impl From<&std::ffi::OsStr> for ResultWriter {
    fn from(path: &std::ffi::OsStr) -> ResultWriter {
        ResultWriter { path: path.into() }
    }
}

/// Configuration options
#[derive(Debug, StructOpt)]
#[structopt(
    name = "unweight",
    about = "Turns a weighted CNF formula into an unweighted one whose projected model count gives back the weighted count"
)]
pub struct Opt {
    /// Input file, weighted CNF in extended DIMACS
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Output file, overwritten
    #[structopt(parse(from_os_str))]
    output: PathBuf,

    /// Approximate weights by multiples of 2^-prec
    #[structopt(long, default_value = "7")]
    prec: u32,

    /// JSON report to the specified file
    #[structopt(short, long, parse(from_os_str))]
    json: Option<ResultWriter>,

    /// Print debug information
    #[structopt(short, long)]
    debug: bool,
}

fn setup_tracing(opt: &Opt) -> anyhow::Result<()> {
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::prelude::*;
    let min_level = if opt.debug { Level::TRACE } else { Level::INFO };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::filter::filter_fn(move |metadata| {
            *metadata.level() <= min_level
        }));
    let subscriber = tracing_subscriber::Registry::default().with(fmt_layer);
    #[cfg(feature = "tracy")]
    let subscriber = subscriber.with(tracing_tracy::TracyLayer::new());
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default tracing collector")?;
    Ok(())
}

/// entrypoint of the binary
pub fn run() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    setup_tracing(&opt)?;
    execute(&opt)
}

fn execute(opt: &Opt) -> anyhow::Result<()> {
    let options = TransformOptions {
        precision: opt.prec,
    };
    info!(
        "transforming {} into {} with precision {}",
        opt.input.display(),
        opt.output.display(),
        options.precision
    );
    let report = transform_file(&opt.input, &opt.output, &options)?;
    println!(
        "Orig vars: {} Added vars: {}",
        report.orig_vars, report.added_vars
    );
    println!(
        "The resulting count you have to divide by: 2**{}",
        report.divisor_exponent
    );
    println!("Time to transform: {:.3} s", report.elapsed.as_secs_f64());
    if let Some(writer) = opt.json.as_ref() {
        writer.write(&report)?;
    }
    Ok(())
}
