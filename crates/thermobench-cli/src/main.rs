//! CLI for thermobench: watch your CPU heat up while it works.

mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "thermobench")]
#[command(about = "thermobench: sample CPU temperature and frequency around a workload")]
#[command(version = thermobench_core::VERSION)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Periodically record temperature and frequency until Ctrl+C
    Monitor {
        /// Output file for the temperature measures
        #[arg(long, default_value = "/tmp/monitoring_temp.csv")]
        temp_output: PathBuf,

        /// Output file for the frequency measures
        #[arg(long, default_value = "/tmp/monitoring_freq.csv")]
        freq_output: PathBuf,

        /// File in which the PID of this process is written
        #[arg(long, default_value = "/tmp/monitoring_pid")]
        pid_file: PathBuf,

        /// Interval between measures (e.g. 1, 0.5, 250ms)
        #[arg(long, default_value = "1", value_parser = commands::parse_duration)]
        period: Duration,

        /// Stop after this long instead of waiting for Ctrl+C
        #[arg(long, value_parser = commands::parse_duration)]
        duration: Option<Duration>,

        #[command(flatten)]
        sensors: commands::SensorArgs,

        /// Write run metadata as JSON
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// In-process matrix multiply with performance and temperature measures
    Stress {
        /// Problem size (rank of the matrix)
        #[arg(long, default_value = "4096")]
        size: usize,

        /// Output file for the performance measures
        #[arg(long, default_value = "/tmp/stress_perf.csv")]
        perf_output: PathBuf,

        /// Output file for the temperature measures
        #[arg(long, default_value = "/tmp/stress_temp.csv")]
        temp_output: PathBuf,

        /// Consecutive multiplies in a run
        #[arg(long, default_value = "10")]
        nb_calls: u64,

        #[command(flatten)]
        schedule: commands::ScheduleArgs,

        #[command(flatten)]
        sensors: commands::SensorArgs,

        /// Write run metadata as JSON
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// Run a shell command repeatedly while recording temperature
    Exec {
        /// Command line passed to `sh -c`
        command: String,

        /// Output file for the temperature measures
        #[arg(long, default_value = "/tmp/exec_temp.csv")]
        temp_output: PathBuf,

        /// Also record per-core frequency to this file
        #[arg(long)]
        freq_output: Option<PathBuf>,

        /// Thread count exported as OMP/OPENBLAS/MKL_NUM_THREADS
        #[arg(long)]
        threads: Option<usize>,

        #[command(flatten)]
        schedule: commands::ScheduleArgs,

        #[command(flatten)]
        sensors: commands::SensorArgs,

        /// Write run metadata as JSON
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// One pinned benchmark process per core, results merged after each run
    Pinned {
        /// Benchmark executable taking `<output> <calls> <size> <core>`
        #[arg(long, default_value = "thermobench-kernel")]
        executable: PathBuf,

        /// Aggregated result file
        #[arg(long, default_value = "/tmp/stress_results.csv")]
        output: PathBuf,

        /// Cores on which to run the benchmark (e.g. 0,2,3)
        #[arg(long, default_value = "1", value_delimiter = ',', num_args = 1..)]
        cores: Vec<u32>,

        /// Calls per benchmark process
        #[arg(long, default_value = "100")]
        nb_calls: u64,

        /// Problem size passed to the benchmark
        #[arg(long, default_value = "512")]
        size: u64,

        /// Thread count exported to every process
        #[arg(long, default_value = "1")]
        threads: usize,

        /// Core binding: numactl (default), affinity, none
        #[arg(long, default_value = "numactl", value_parser = ["numactl", "affinity", "none"])]
        pinning: String,

        /// Which processes decide the run is over: leader (default) or all
        #[arg(long, default_value = "leader", value_parser = ["leader", "all"])]
        liveness: String,

        /// Add to an existing result file instead of truncating it
        #[arg(long)]
        append: bool,

        /// Output file for the temperature measures
        #[arg(long, default_value = "/tmp/stress_temp.csv")]
        temp_output: PathBuf,

        /// Also record per-core frequency to this file
        #[arg(long)]
        freq_output: Option<PathBuf>,

        #[command(flatten)]
        schedule: commands::ScheduleArgs,

        #[command(flatten)]
        sensors: commands::SensorArgs,

        /// Write run metadata as JSON
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose);
    let cancel = commands::install_interrupt();

    let result = match cli.command {
        Commands::Monitor {
            temp_output,
            freq_output,
            pid_file,
            period,
            duration,
            sensors,
            manifest,
        } => commands::monitor::run(
            thermobench_core::MonitorConfig {
                temperature_output: temp_output,
                frequency_output: freq_output,
                pid_file: Some(pid_file),
                period,
                duration,
                thermal_root: sensors.thermal_root,
                cpu_root: sensors.cpu_root,
            },
            manifest.as_deref(),
            cancel,
        ),
        Commands::Stress {
            size,
            perf_output,
            temp_output,
            nb_calls,
            schedule,
            sensors,
            manifest,
        } => commands::stress::run(commands::stress::StressCommandConfig {
            size,
            perf_output: &perf_output,
            temp_output: &temp_output,
            sensors: &sensors,
            calls: nb_calls,
            plan: schedule.plan(),
            manifest: manifest.as_deref(),
            cancel,
        }),
        Commands::Exec {
            command,
            temp_output,
            freq_output,
            threads,
            schedule,
            sensors,
            manifest,
        } => commands::exec::run(commands::exec::ExecCommandConfig {
            command: &command,
            temp_output: &temp_output,
            sensors: &sensors,
            freq_output: freq_output.as_deref(),
            threads,
            plan: schedule.plan(),
            manifest: manifest.as_deref(),
            cancel,
        }),
        Commands::Pinned {
            executable,
            output,
            cores,
            nb_calls,
            size,
            threads,
            pinning,
            liveness,
            append,
            temp_output,
            freq_output,
            schedule,
            sensors,
            manifest,
        } => commands::pinned::run(commands::pinned::PinnedCommandConfig {
            workload: thermobench_core::PinnedConfig {
                executable,
                output,
                cores,
                calls: nb_calls,
                size,
                threads: Some(threads),
                pinning: commands::parse_pinning(&pinning),
                liveness: commands::parse_liveness(&liveness),
                append,
            },
            temp_output: &temp_output,
            sensors: &sensors,
            freq_output: freq_output.as_deref(),
            plan: schedule.plan(),
            manifest: manifest.as_deref(),
            cancel,
        }),
    };

    if let Err(e) = result {
        match e {
            thermobench_core::Error::UserInterrupt => eprintln!("{e}"),
            _ => eprintln!("Error: {e}"),
        }
        std::process::exit(e.exit_code());
    }
}
