//! `thermobench exec`: run a shell command repeatedly under temperature watch.

use std::path::Path;

use thermobench_core::{CancelToken, Error, Orchestrator, Result, RunPlan, ShellCommand};

pub struct ExecCommandConfig<'a> {
    pub command: &'a str,
    pub temp_output: &'a Path,
    pub sensors: &'a super::SensorArgs,
    pub freq_output: Option<&'a Path>,
    pub threads: Option<usize>,
    pub plan: RunPlan,
    pub manifest: Option<&'a Path>,
    pub cancel: CancelToken,
}

pub fn run(config: ExecCommandConfig<'_>) -> Result<()> {
    let recorders =
        super::sensor_recorders(config.sensors, config.temp_output, config.freq_output)?;
    let mut workload = ShellCommand::new(config.command);
    if let Some(threads) = config.threads {
        workload = workload.with_threads(threads);
    }

    println!("Running `{}` {} times", config.command, config.plan.repetitions);

    let started_at = chrono::Local::now();
    let mut orchestrator = Orchestrator::new(recorders, config.plan).with_cancel(config.cancel);
    let summary = orchestrator.run(&mut workload)?;

    let mut outputs = vec![config.temp_output];
    outputs.extend(config.freq_output);
    super::print_summary(&summary, &outputs);
    super::write_manifest(
        config.manifest,
        config.command,
        Some(orchestrator.plan()),
        &outputs,
        &summary,
        started_at,
    )?;
    if summary.interrupted {
        return Err(Error::UserInterrupt);
    }
    Ok(())
}
