//! The sampling-and-orchestration loop.
//!
//! One control thread interleaves recorder invocations with a workload's
//! lifecycle:
//!
//! ```text
//! Idle → Running(i) → Draining(i) → Sleeping(i) → Running(i+1) → … → Done
//! ```
//!
//! Entering `Running` takes a baseline sample and starts the workload. While
//! it is live, every tick records and then polls. Once it has exited, its
//! output is drained and relayed and its exit status checked; a non-zero
//! status ends the whole run. `Sleeping` records once per idle tick.
//!
//! The tick is the only blocking point, and it watches the [`CancelToken`]
//! so an interrupt is handled at the next slice rather than mid-write.

use std::io::Write;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::recorder::RecorderSet;
use crate::workload::{Liveness, ProcessOutput, Workload};

/// Repetition schedule of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    /// Number of workload repetitions.
    pub repetitions: u64,
    /// Idle ticks sampled after each repetition.
    pub idle_ticks: u64,
    /// Poll and idle-sampling interval.
    #[serde(with = "duration_secs")]
    pub tick: Duration,
    /// Copy each finished process's stdout/stderr to ours.
    pub relay_output: bool,
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            repetitions: 10,
            idle_ticks: 100,
            tick: Duration::from_secs(1),
            relay_output: true,
        }
    }
}

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running(u64),
    Draining(u64),
    Sleeping(u64),
    Monitoring,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running(i) => write!(f, "running (repetition {})", i + 1),
            Self::Draining(i) => write!(f, "draining (repetition {})", i + 1),
            Self::Sleeping(i) => write!(f, "sleeping (repetition {})", i + 1),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Counters reported when a run ends normally or is interrupted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub repetitions_completed: u64,
    pub launches: u64,
    pub polls: u64,
    pub recorder_invocations: u64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub interrupted: bool,
}

enum Flow {
    Continue,
    Interrupted,
}

/// Drives the recorders around a workload.
pub struct Orchestrator {
    recorders: RecorderSet,
    plan: RunPlan,
    cancel: CancelToken,
    phase: Phase,
    transitions: Vec<Phase>,
    repetitions_completed: u64,
    launches: u64,
    polls: u64,
}

impl Orchestrator {
    pub fn new(recorders: RecorderSet, plan: RunPlan) -> Self {
        Self {
            recorders,
            plan,
            cancel: CancelToken::new(),
            phase: Phase::Idle,
            transitions: vec![Phase::Idle],
            repetitions_completed: 0,
            launches: 0,
            polls: 0,
        }
    }

    /// Use an externally owned token (e.g. one set from a Ctrl+C handler).
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase entered so far, in order.
    pub fn transitions(&self) -> &[Phase] {
        &self.transitions
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase == phase {
            return;
        }
        match phase {
            Phase::Running(_) | Phase::Done => log::info!("{} -> {}", self.phase, phase),
            _ => log::debug!("{} -> {}", self.phase, phase),
        }
        self.phase = phase;
        self.transitions.push(phase);
    }

    fn summary(&self, started: Instant, interrupted: bool) -> RunSummary {
        RunSummary {
            repetitions_completed: self.repetitions_completed,
            launches: self.launches,
            polls: self.polls,
            recorder_invocations: self.recorders.invocations(),
            elapsed: started.elapsed(),
            interrupted,
        }
    }

    fn interrupted(&mut self, started: Instant) -> RunSummary {
        log::warn!("interrupted during {}", self.phase);
        self.enter(Phase::Done);
        self.summary(started, true)
    }

    /// Run every repetition of `workload`.
    ///
    /// With zero repetitions the workload never starts and only a single
    /// baseline sample is taken.
    pub fn run<W: Workload>(&mut self, workload: &mut W) -> Result<RunSummary> {
        let started = Instant::now();
        log::info!(
            "{} repetitions of {} ({} idle ticks of {:?})",
            self.plan.repetitions,
            workload.describe(),
            self.plan.idle_ticks,
            self.plan.tick
        );

        if self.plan.repetitions == 0 {
            if !self.recorders.is_empty() {
                self.recorders.record_all()?;
            }
            self.enter(Phase::Done);
            return Ok(self.summary(started, false));
        }

        for rep in 0..self.plan.repetitions {
            if self.cancel.is_cancelled() {
                return Ok(self.interrupted(started));
            }
            self.enter(Phase::Running(rep));
            self.recorders.record_all()?;

            for _ in 0..workload.launches_per_repetition() {
                if let Flow::Interrupted = self.launch(workload, rep)? {
                    return Ok(self.interrupted(started));
                }
            }

            if self.plan.idle_ticks > 0 {
                self.enter(Phase::Sleeping(rep));
            }
            for _ in 0..self.plan.idle_ticks {
                if !self.cancel.sleep(self.plan.tick) {
                    return Ok(self.interrupted(started));
                }
                self.recorders.record_all()?;
            }
            self.repetitions_completed += 1;
        }

        self.enter(Phase::Done);
        Ok(self.summary(started, false))
    }

    /// One start → poll loop → drain cycle.
    fn launch<W: Workload>(&mut self, workload: &mut W, rep: u64) -> Result<Flow> {
        if self.cancel.is_cancelled() {
            return Ok(Flow::Interrupted);
        }
        self.enter(Phase::Running(rep));
        let mut handle = workload.start()?;
        self.launches += 1;

        let exit_code = loop {
            let step = self
                .recorders
                .record_all()
                .and_then(|()| workload.poll(&mut handle));
            let liveness = match step {
                Ok(liveness) => liveness,
                Err(e) => {
                    if let Err(abort_err) = workload.abort(handle) {
                        log::warn!("failed to tear down workload: {abort_err}");
                    }
                    return Err(e);
                }
            };
            self.polls += 1;

            match liveness {
                Liveness::Exited(_) if self.cancel.is_cancelled() => {
                    // Children share the terminal's process group and die on SIGINT too.
                    if let Err(e) = workload.abort(handle) {
                        log::warn!("failed to tear down workload: {e}");
                    }
                    return Ok(Flow::Interrupted);
                }
                Liveness::Exited(code) => break code,
                Liveness::Running => {
                    if !self.cancel.sleep(self.plan.tick) {
                        log::warn!("stopping `{}`", workload.describe());
                        workload.abort(handle)?;
                        return Ok(Flow::Interrupted);
                    }
                }
            }
        };

        self.enter(Phase::Draining(rep));
        let outputs = workload.drain(handle)?;
        if self.plan.relay_output {
            relay(&outputs);
        }
        if self.cancel.is_cancelled() {
            return Ok(Flow::Interrupted);
        }

        if let Some(failed) = outputs.iter().find(|o| !o.success()) {
            return Err(Error::WorkloadFailure {
                workload: failed.label.clone(),
                code: failed.code,
            });
        }
        if outputs.is_empty() && exit_code != 0 {
            return Err(Error::WorkloadFailure {
                workload: workload.describe(),
                code: exit_code,
            });
        }

        workload.finalize()?;
        Ok(Flow::Continue)
    }

    /// Record every tick until cancelled or `limit` has elapsed.
    pub fn monitor(&mut self, limit: Option<Duration>) -> Result<RunSummary> {
        let started = Instant::now();
        self.enter(Phase::Monitoring);
        loop {
            self.recorders.record_all()?;
            if limit.is_some_and(|limit| started.elapsed() >= limit) {
                break;
            }
            if !self.cancel.sleep(self.plan.tick) {
                self.enter(Phase::Done);
                return Ok(self.summary(started, true));
            }
        }
        self.enter(Phase::Done);
        Ok(self.summary(started, false))
    }
}

fn relay(outputs: &[ProcessOutput]) {
    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr().lock();
    for output in outputs {
        let _ = stdout.write_all(output.stdout.as_bytes());
        let _ = stderr.write_all(output.stderr.as_bytes());
    }
    let _ = stdout.flush();
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
