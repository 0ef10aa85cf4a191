//! Per-core matrix-multiply benchmark driven by `thermobench pinned`.
//!
//! ## Usage
//!
//! ```bash
//! thermobench-kernel <output> <calls> <size> <core_id>
//! ```
//!
//! ## Output
//!
//! One headerless row per call in `<output>`:
//! `start,stop,duration_ns,cycle_count,core_id,gflops`

use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;

use thermobench_core::{MatrixMultiply, timestamp};

struct Args {
    output: String,
    calls: u64,
    size: usize,
    core: i64,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let [_, output, calls, size, core] = args else {
        return Err(usage(args.first().map_or("thermobench-kernel", String::as_str)));
    };
    Ok(Args {
        output: output.clone(),
        calls: calls.parse().map_err(|_| format!("invalid call count: {calls}"))?,
        size: size.parse().map_err(|_| format!("invalid size: {size}"))?,
        core: core.parse().map_err(|_| format!("invalid core id: {core}"))?,
    })
}

fn usage(program: &str) -> String {
    format!("Syntax: {program} <filename> <nb_calls> <size> <ID>")
}

#[cfg(target_arch = "x86_64")]
#[allow(unused_unsafe)]
fn cycles() -> u64 {
    // SAFETY: rdtsc has no preconditions on x86_64.
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(not(target_arch = "x86_64"))]
fn cycles() -> u64 {
    0
}

fn run(args: &Args) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(&args.output)?);
    let mut kernel = MatrixMultiply::new(args.size, args.calls);
    for _ in 0..args.calls {
        let first = cycles();
        let outcome = kernel.compute();
        let cycle_count = cycles().wrapping_sub(first);
        writeln!(
            out,
            "{},{},{},{},{},{:e}",
            timestamp::format(&outcome.start),
            timestamp::format(&outcome.stop),
            outcome.duration.as_nanos(),
            cycle_count,
            args.core,
            outcome.gflops
        )?;
    }
    out.flush()
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
    if let Err(e) = run(&args) {
        eprintln!("{}: {e}", args.output);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let args = parse_args(&argv(&["k", "/tmp/o.csv", "3", "64", "2"])).unwrap();
        assert_eq!(args.output, "/tmp/o.csv");
        assert_eq!(args.calls, 3);
        assert_eq!(args.size, 64);
        assert_eq!(args.core, 2);
    }

    #[test]
    fn test_wrong_arg_count_is_usage() {
        let err = parse_args(&argv(&["k", "/tmp/o.csv", "3"])).err().unwrap();
        assert_eq!(err, "Syntax: k <filename> <nb_calls> <size> <ID>");
    }

    #[test]
    fn test_non_numeric_calls() {
        let err = parse_args(&argv(&["k", "o", "many", "64", "0"])).err().unwrap();
        assert!(err.contains("many"));
    }

    #[test]
    fn test_run_writes_one_row_per_call() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("core_2.csv");
        let args = Args {
            output: output.display().to_string(),
            calls: 4,
            size: 8,
            core: 2,
        };
        run(&args).unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        let rows: Vec<Vec<&str>> = content.lines().map(|l| l.split(',').collect()).collect();
        assert_eq!(rows.len(), 4);
        for row in rows {
            assert_eq!(row.len(), 6);
            assert_eq!(row[4], "2");
            assert!(row[5].parse::<f64>().unwrap() > 0.0);
        }
    }
}
