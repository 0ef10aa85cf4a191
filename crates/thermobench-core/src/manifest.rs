//! Run manifest (`run.json`): what ran, on which machine, and how it ended.
//!
//! Samples live in the CSV sinks; this file only carries the metadata needed
//! to interpret them later.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::orchestrator::{RunPlan, RunSummary};

/// Current manifest layout version.
pub const MANIFEST_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Machine info
// ---------------------------------------------------------------------------

/// Host description captured when a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineInfo {
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cores: usize,
}

/// Detect machine information (best-effort).
pub fn detect_machine_info() -> MachineInfo {
    let os = match os_release(Path::new("/etc/os-release")) {
        Some(name) => format!("{} {name}", std::env::consts::OS),
        None => std::env::consts::OS.to_string(),
    };
    let cpu = cpu_model(Path::new("/proc/cpuinfo")).unwrap_or_else(|| "unknown".to_string());
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    MachineInfo {
        os,
        arch: std::env::consts::ARCH.to_string(),
        cpu,
        cores,
    }
}

fn os_release(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().and_then(|s| {
        s.lines()
            .find_map(|l| l.strip_prefix("PRETTY_NAME="))
            .map(|v| v.trim_matches('"').to_string())
    })
}

fn cpu_model(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().and_then(|s| {
        s.lines()
            .find(|l| l.starts_with("model name"))
            .and_then(|l| l.split_once(':'))
            .map(|(_, v)| v.trim().to_string())
    })
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Metadata for one `thermobench` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub version: u32,
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub workload: String,
    pub plan: Option<RunPlan>,
    pub outputs: Vec<String>,
    pub repetitions_completed: u64,
    pub recorder_invocations: u64,
    pub polls: u64,
    pub interrupted: bool,
    pub machine: MachineInfo,
    pub tool_version: String,
}

impl RunManifest {
    /// Assemble the manifest of a run that began at `started_at`.
    pub fn new(
        workload: impl Into<String>,
        plan: Option<&RunPlan>,
        outputs: &[&Path],
        summary: &RunSummary,
        started_at: DateTime<Local>,
    ) -> Self {
        let ended_at = started_at
            + chrono::Duration::from_std(summary.elapsed).unwrap_or(chrono::Duration::zero());
        Self {
            version: MANIFEST_VERSION,
            id: Uuid::new_v4().to_string(),
            started_at: started_at.to_rfc3339(),
            ended_at: ended_at.to_rfc3339(),
            duration_ms: summary.elapsed.as_millis() as u64,
            workload: workload.into(),
            plan: plan.cloned(),
            outputs: outputs.iter().map(|p| p.display().to_string()).collect(),
            repetitions_completed: summary.repetitions_completed,
            recorder_invocations: summary.recorder_invocations,
            polls: summary.polls,
            interrupted: summary.interrupted,
            machine: detect_machine_info(),
            tool_version: crate::VERSION.to_string(),
        }
    }

    /// Write pretty-printed JSON to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)?;
        log::info!("wrote run manifest to {}", path.display());
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| crate::error::Error::malformed(path, e.to_string()))
    }
}

/// Write `<pid>\n` for the current process to `path`.
pub fn write_pid_file(path: impl AsRef<Path>) -> Result<u32> {
    let pid = std::process::id();
    fs::write(path, format!("{pid}\n"))?;
    Ok(pid)
}
