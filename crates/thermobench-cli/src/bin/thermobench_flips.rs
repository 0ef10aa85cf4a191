//! Floating-point multiply-add kernel for studying how operand bit patterns
//! affect power draw and temperature.
//!
//! ## Usage
//!
//! ```bash
//! thermobench-flips <output> <mode> <outer_loop> <inner_loop> <core_id>
//! ```
//!
//! `mode` picks the operands: `random` (six independent values), `equal`
//! (one value everywhere) or `adversary` (alternating bit patterns).
//!
//! ## Output
//!
//! One headerless row per outer iteration in `<output>`:
//! `start,duration_ns,core_id`. The two accumulators are printed to stdout
//! before and after the run.

use std::fs::File;
use std::hint::black_box;
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use rand::Rng;
use thermobench_core::timestamp;

/// `0101...` and `1010...` mantissas, both close to one.
const ADVERSARY_HIGH: u64 = 0x3FF5_5555_5555_5555;
const ADVERSARY_LOW: u64 = 0x3FEA_AAAA_AAAA_AAAA;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Random,
    Equal,
    Adversary,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "equal" => Ok(Self::Equal),
            "adversary" => Ok(Self::Adversary),
            _ => Err(format!(
                "Error, unknown mode '{s}', must be 'random', 'equal' or 'adversary'"
            )),
        }
    }
}

impl Mode {
    fn operands(self, rng: &mut impl Rng) -> [f64; 6] {
        match self {
            Self::Random => std::array::from_fn(|_| rng.random()),
            Self::Equal => [rng.random(); 6],
            Self::Adversary => std::array::from_fn(|i| {
                f64::from_bits(if i % 2 == 0 {
                    ADVERSARY_HIGH
                } else {
                    ADVERSARY_LOW
                })
            }),
        }
    }
}

struct Args {
    output: String,
    mode: Mode,
    outer: u64,
    inner: u64,
    core: i64,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let [_, output, mode, outer, inner, core] = args else {
        return Err(usage(args.first().map_or("thermobench-flips", String::as_str)));
    };
    Ok(Args {
        output: output.clone(),
        mode: mode.parse()?,
        outer: outer.parse().map_err(|_| format!("invalid outer loop: {outer}"))?,
        inner: inner.parse().map_err(|_| format!("invalid inner loop: {inner}"))?,
        core: core.parse().map_err(|_| format!("invalid core id: {core}"))?,
    })
}

fn usage(program: &str) -> String {
    format!("Syntax: {program} <filename> <mode> <outer_loop> <inner_loop> <ID>")
}

/// Eight multiply-add pairs per inner iteration, then one timed row.
fn measure_call(
    out: &mut impl Write,
    inner: u64,
    core: i64,
    tab: &mut [f64; 6],
) -> std::io::Result<()> {
    let start = timestamp::now();
    let clock = Instant::now();
    for _ in 0..inner {
        for _ in 0..8 {
            tab[0] += tab[1] * tab[2];
            tab[3] += tab[4] * tab[5];
        }
    }
    let elapsed = clock.elapsed();
    writeln!(out, "{},{},{core}", timestamp::format(&start), elapsed.as_nanos())
}

/// Run every outer iteration and return the final accumulators.
fn run(args: &Args, mut tab: [f64; 6]) -> std::io::Result<(f64, f64)> {
    let mut out = BufWriter::new(File::create(&args.output)?);
    tab = black_box(tab);
    for _ in 0..args.outer {
        measure_call(&mut out, args.inner, args.core, &mut tab)?;
    }
    out.flush()?;
    Ok((tab[0], tab[3]))
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(1);
        }
    };

    let tab = args.mode.operands(&mut rand::rng());
    println!("{:e} {:e}", tab[0], tab[3]);
    let (first, second) = match run(&args, tab) {
        Ok(acc) => acc,
        Err(e) => {
            eprintln!("{}: {e}", args.output);
            return ExitCode::from(1);
        }
    };
    println!("{first:e} {second:e}");

    if !(first.is_finite() && second.is_finite()) {
        eprintln!("accumulators overflowed: {first:e} {second:e}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
