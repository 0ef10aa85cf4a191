//! # thermobench-core
//!
//! **Watch the silicon heat up while it works.**
//!
//! `thermobench-core` samples hardware telemetry (thermal zones, per-core
//! scaling frequency) from kernel pseudo-files while driving a workload, and
//! records every sample with the wall-clock interval it was taken in.
//!
//! ## Quick Start
//!
//! ```no_run
//! use thermobench_core::{
//!     CancelToken, Orchestrator, Recorder, RecorderSet, RunPlan, ShellCommand, THERMAL_ROOT,
//!     thermal_zones,
//! };
//!
//! let mut recorders = RecorderSet::new();
//! recorders.push(Recorder::create(Box::new(thermal_zones(THERMAL_ROOT)?), "temp.csv")?);
//!
//! let mut workload = ShellCommand::new("stress-ng --cpu 4 --timeout 10s");
//! let summary = Orchestrator::new(recorders, RunPlan::default())
//!     .with_cancel(CancelToken::new())
//!     .run(&mut workload)?;
//! println!("{} samples", summary.recorder_invocations);
//! # Ok::<(), thermobench_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Sampler → Recorder → Sink, driven by the Orchestrator around a Workload:
//!
//! - [`Sampler`]s read one value per sensor; [`ScaledSampler`] converts units.
//! - A [`Recorder`] brackets each sample with start/stop timestamps and
//!   appends one CSV row per reading to its [`Sink`].
//! - A [`Workload`] is an in-process matrix multiply, a shell command, or a
//!   set of per-core pinned benchmark processes whose result files are merged
//!   after every repetition.
//! - The [`Orchestrator`] takes a baseline sample, starts the workload,
//!   samples on every poll tick until it exits, then keeps sampling through
//!   an idle cool-down before the next repetition.

pub mod cancel;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod monitor;
pub mod orchestrator;
pub mod recorder;
pub mod sampler;
pub mod sink;
pub mod timestamp;
pub mod workload;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use manifest::{MachineInfo, RunManifest, detect_machine_info, write_pid_file};
pub use merge::{MergeSummary, RESULT_SCHEMA, merge_into};
pub use monitor::MonitorConfig;
pub use orchestrator::{Orchestrator, Phase, RunPlan, RunSummary};
pub use recorder::{Recorder, RecorderSet};
pub use sampler::{
    CPU_ROOT, CpuFrequency, DirectorySampler, FREQUENCY_SCHEMA, Reading, Sampler, ScaledSampler,
    TEMPERATURE_SCHEMA, THERMAL_ROOT, Thermometer, UnitScale, cpu_frequencies, read_single_value,
    thermal_zones,
};
pub use sink::{Sink, open_append};
pub use workload::{
    ComputeOutcome, LivenessPolicy, Liveness, MatrixMultiply, PERF_SCHEMA, PinnedConfig,
    PinnedSet, Pinning, ProcessOutput, ShellCommand, Workload, thread_env,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
