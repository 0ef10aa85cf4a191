pub mod exec;
pub mod monitor;
pub mod pinned;
pub mod stress;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use thermobench_core::{
    CPU_ROOT, CancelToken, LivenessPolicy, Pinning, Recorder, RecorderSet, Result, RunManifest,
    RunPlan, RunSummary, THERMAL_ROOT, cpu_frequencies, thermal_zones,
};

/// Repetition schedule shared by every workload subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct ScheduleArgs {
    /// Number of runs to perform
    #[arg(long, default_value = "10")]
    pub nb_runs: u64,

    /// Number of idle samples taken between runs
    #[arg(long, default_value = "100")]
    pub nb_sleeps: u64,

    /// Poll and idle-sampling interval (e.g. 1, 0.5, 250ms)
    #[arg(long, default_value = "1", value_parser = parse_duration)]
    pub sleep_time: Duration,

    /// Do not copy workload stdout/stderr to the terminal
    #[arg(long)]
    pub quiet: bool,
}

impl ScheduleArgs {
    pub fn plan(&self) -> RunPlan {
        RunPlan {
            repetitions: self.nb_runs,
            idle_ticks: self.nb_sleeps,
            tick: self.sleep_time,
            relay_output: !self.quiet,
        }
    }
}

/// Where sensors are read from. Tests and containers point these at a copy.
#[derive(clap::Args, Debug, Clone)]
pub struct SensorArgs {
    /// Directory holding the thermal_zone* entries
    #[arg(long, default_value = THERMAL_ROOT)]
    pub thermal_root: PathBuf,

    /// Directory holding the cpu*/cpufreq entries
    #[arg(long, default_value = CPU_ROOT)]
    pub cpu_root: PathBuf,
}

/// `warn` by default; each `-v` raises one level. `RUST_LOG` wins when set.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

/// Cancel token set by Ctrl+C.
pub fn install_interrupt() -> CancelToken {
    let token = CancelToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }
    token
}

/// Parse `1`, `0.5`, `1.5s`, `250ms`, `2m` or `1h`. Bare numbers are seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let (numeric, unit) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1e-3)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1.0)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60.0)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3600.0)
    } else {
        (s, 1.0)
    };
    let value: f64 = numeric
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {s}"))?;
    Duration::try_from_secs_f64(value * unit).map_err(|_| format!("invalid duration: {s}"))
}

pub fn parse_pinning(s: &str) -> Pinning {
    match s {
        "numactl" => Pinning::Numactl,
        "affinity" | "sched" => Pinning::Affinity,
        "none" => Pinning::None,
        _ => {
            eprintln!("Unknown pinning '{s}', using numactl");
            Pinning::Numactl
        }
    }
}

pub fn parse_liveness(s: &str) -> LivenessPolicy {
    match s {
        "leader" | "first" => LivenessPolicy::Leader,
        "all" => LivenessPolicy::All,
        _ => {
            eprintln!("Unknown liveness policy '{s}', using leader");
            LivenessPolicy::Leader
        }
    }
}

/// Temperature recorder, plus a frequency recorder when `freq_output` is set.
pub fn sensor_recorders(
    sensors: &SensorArgs,
    temp_output: &Path,
    freq_output: Option<&Path>,
) -> Result<RecorderSet> {
    let mut set = RecorderSet::new();
    set.push(Recorder::create(
        Box::new(thermal_zones(&sensors.thermal_root)?),
        temp_output,
    )?);
    if let Some(path) = freq_output {
        set.push(Recorder::create(
            Box::new(cpu_frequencies(&sensors.cpu_root)?),
            path,
        )?);
    }
    Ok(set)
}

/// Print where samples went and how the run ended.
pub fn print_summary(summary: &RunSummary, outputs: &[&Path]) {
    println!();
    if summary.interrupted {
        println!(
            "Interrupted after {:.2} seconds",
            summary.elapsed.as_secs_f64()
        );
    } else {
        println!("Finished in {:.2} seconds", summary.elapsed.as_secs_f64());
    }
    println!("  Runs completed: {}", summary.repetitions_completed);
    println!("  Launches:       {}", summary.launches);
    println!("  Samples:        {}", summary.recorder_invocations);
    for path in outputs {
        println!("  Output:         {}", path.display());
    }
}

/// Write `run.json` when the user asked for one.
pub fn write_manifest(
    path: Option<&Path>,
    workload: &str,
    plan: Option<&RunPlan>,
    outputs: &[&Path],
    summary: &RunSummary,
    started_at: DateTime<Local>,
) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    RunManifest::new(workload, plan, outputs, summary, started_at).write(path)?;
    println!("  Manifest:       {}", path.display());
    Ok(())
}

/// A bare `thermobench-kernel` prefers the binary installed next to this one.
pub fn resolve_sibling(executable: &Path) -> PathBuf {
    if executable.components().count() != 1 {
        return executable.to_path_buf();
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(executable)))
        .filter(|candidate| candidate.is_file())
        .unwrap_or_else(|| executable.to_path_buf())
}
