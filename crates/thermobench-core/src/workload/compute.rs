//! In-process dense matrix multiply.
//!
//! Each launch performs one `N×N` multiply on the calling thread and appends
//! its duration and throughput to the performance sink. Because the work is
//! already done when [`Workload::start`] returns, the orchestrator records
//! once and moves on.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use rand::Rng;

use super::{Liveness, ProcessOutput, Workload};
use crate::error::Result;
use crate::sink::Sink;
use crate::timestamp;

/// Columns of the performance sink after `start,stop`.
pub const PERF_SCHEMA: &[&str] = &["duration", "gflops"];

/// Timing of one completed multiply.
#[derive(Debug, Clone)]
pub struct ComputeOutcome {
    pub start: DateTime<Local>,
    pub stop: DateTime<Local>,
    pub duration: Duration,
    pub gflops: f64,
}

/// `2·N³` floating point operations over `duration`, in billions per second.
pub fn gflops(size: usize, duration: Duration) -> f64 {
    let n = size as f64;
    let secs = duration.as_secs_f64().max(1e-9);
    2.0 * n * n * n / secs * 1e-9
}

/// Repeated multiply of two fixed random matrices.
pub struct MatrixMultiply {
    size: usize,
    calls: u64,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    sink: Option<Sink>,
}

impl MatrixMultiply {
    /// Random `size×size` operands, `calls` multiplies per repetition.
    pub fn new(size: usize, calls: u64) -> Self {
        let mut rng = rand::rng();
        let mut random = || -> Vec<f64> { (0..size * size).map(|_| rng.random()).collect() };
        let a = random();
        let b = random();
        Self {
            size,
            calls,
            a,
            b,
            c: vec![0.0; size * size],
            sink: None,
        }
    }

    /// Append every outcome to a performance CSV at `path`.
    pub fn with_output(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.sink = Some(Sink::create(path, PERF_SCHEMA)?);
        Ok(self)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// One timed multiply, `C = A·B`.
    pub fn compute(&mut self) -> ComputeOutcome {
        let n = self.size;
        let start = timestamp::now();
        let clock = Instant::now();

        self.c.fill(0.0);
        for i in 0..n {
            let row = &mut self.c[i * n..(i + 1) * n];
            for k in 0..n {
                let aik = self.a[i * n + k];
                let b_row = &self.b[k * n..(k + 1) * n];
                for (cij, bkj) in row.iter_mut().zip(b_row) {
                    *cij += aik * bkj;
                }
            }
        }
        std::hint::black_box(&self.c);

        let duration = clock.elapsed();
        let stop = timestamp::now();
        ComputeOutcome {
            start,
            stop,
            duration,
            gflops: gflops(n, duration),
        }
    }
}

impl Workload for MatrixMultiply {
    type Handle = ComputeOutcome;

    fn describe(&self) -> String {
        format!("matrix multiply {0}x{0}", self.size)
    }

    fn launches_per_repetition(&self) -> u64 {
        self.calls
    }

    fn start(&mut self) -> Result<ComputeOutcome> {
        let outcome = self.compute();
        if let Some(sink) = self.sink.as_mut() {
            sink.append(
                &timestamp::format(&outcome.start),
                &timestamp::format(&outcome.stop),
                &[
                    outcome.duration.as_secs_f64().to_string(),
                    outcome.gflops.to_string(),
                ],
            )?;
            sink.flush()?;
        }
        log::debug!(
            "{}: {:.6}s, {:.3} GFLOPS",
            self.describe(),
            outcome.duration.as_secs_f64(),
            outcome.gflops
        );
        Ok(outcome)
    }

    fn poll(&mut self, _handle: &mut ComputeOutcome) -> Result<Liveness> {
        Ok(Liveness::Exited(0))
    }

    fn drain(&mut self, _handle: ComputeOutcome) -> Result<Vec<ProcessOutput>> {
        Ok(Vec::new())
    }

    fn abort(&mut self, _handle: ComputeOutcome) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gflops_matches_operation_count() {
        // 2 * 1000^3 flops in one second = 2 GFLOPS
        let g = gflops(1000, Duration::from_secs(1));
        assert!((g - 2.0).abs() < 1e-12);
    }

    #[test]
    fn gflops_survives_zero_duration() {
        assert!(gflops(4, Duration::ZERO).is_finite());
    }

    #[test]
    fn multiply_is_correct_for_identity() {
        let mut mm = MatrixMultiply::new(3, 1);
        mm.b = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        mm.compute();
        assert_eq!(mm.c, mm.a);
    }

    #[test]
    fn repeated_compute_does_not_accumulate() {
        let mut mm = MatrixMultiply::new(2, 1);
        mm.a = vec![1.0, 2.0, 3.0, 4.0];
        mm.b = vec![1.0, 0.0, 0.0, 1.0];
        mm.compute();
        mm.compute();
        assert_eq!(mm.c, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn start_completes_synchronously_and_records() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("perf.csv");
        let mut mm = MatrixMultiply::new(8, 5).with_output(&path).unwrap();
        assert_eq!(mm.launches_per_repetition(), 5);

        let mut handle = mm.start().unwrap();
        assert!(handle.start <= handle.stop);
        assert_eq!(mm.poll(&mut handle).unwrap(), Liveness::Exited(0));
        assert!(mm.drain(handle).unwrap().is_empty());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "start,stop,duration,gflops");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].split(',').count(), 4);
    }
}
