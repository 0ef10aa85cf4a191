//! Workload-less monitoring: sample temperature and frequency until stopped.

use std::path::PathBuf;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::orchestrator::{Orchestrator, RunPlan, RunSummary};
use crate::recorder::{Recorder, RecorderSet};
use crate::sampler::{CPU_ROOT, THERMAL_ROOT, cpu_frequencies, thermal_zones};

/// Configuration for a monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub temperature_output: PathBuf,
    pub frequency_output: PathBuf,
    /// Receives `<pid>\n` before the first sample.
    pub pid_file: Option<PathBuf>,
    pub period: Duration,
    /// Stop after this long; `None` runs until cancelled.
    pub duration: Option<Duration>,
    pub thermal_root: PathBuf,
    pub cpu_root: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            temperature_output: PathBuf::from("/tmp/monitoring_temp.csv"),
            frequency_output: PathBuf::from("/tmp/monitoring_freq.csv"),
            pid_file: Some(PathBuf::from("/tmp/monitoring_pid")),
            period: Duration::from_secs(1),
            duration: None,
            thermal_root: PathBuf::from(THERMAL_ROOT),
            cpu_root: PathBuf::from(CPU_ROOT),
        }
    }
}

impl MonitorConfig {
    /// Temperature then frequency recorder, both scanned once up front.
    pub fn recorders(&self) -> Result<RecorderSet> {
        let mut set = RecorderSet::new();
        set.push(Recorder::create(
            Box::new(thermal_zones(&self.thermal_root)?),
            &self.temperature_output,
        )?);
        set.push(Recorder::create(
            Box::new(cpu_frequencies(&self.cpu_root)?),
            &self.frequency_output,
        )?);
        Ok(set)
    }

    /// Write the pid file, then record every `period` until done.
    pub fn run(&self, cancel: CancelToken) -> Result<RunSummary> {
        let recorders = self.recorders()?;
        if let Some(path) = &self.pid_file {
            let pid = crate::manifest::write_pid_file(path)?;
            log::info!("pid {pid} written to {}", path.display());
        }
        let plan = RunPlan {
            repetitions: 0,
            idle_ticks: 0,
            tick: self.period,
            relay_output: false,
        };
        Orchestrator::new(recorders, plan)
            .with_cancel(cancel)
            .monitor(self.duration)
    }
}
