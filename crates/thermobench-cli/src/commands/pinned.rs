//! `thermobench pinned`: one pinned benchmark process per core.

use std::path::Path;

use thermobench_core::{
    CancelToken, Error, Orchestrator, PinnedConfig, PinnedSet, Result, RunPlan, Workload,
};

pub struct PinnedCommandConfig<'a> {
    pub workload: PinnedConfig,
    pub temp_output: &'a Path,
    pub sensors: &'a super::SensorArgs,
    pub freq_output: Option<&'a Path>,
    pub plan: RunPlan,
    pub manifest: Option<&'a Path>,
    pub cancel: CancelToken,
}

pub fn run(mut config: PinnedCommandConfig<'_>) -> Result<()> {
    config.workload.executable = super::resolve_sibling(&config.workload.executable);
    let mut workload = PinnedSet::new(config.workload)?;
    let recorders =
        super::sensor_recorders(config.sensors, config.temp_output, config.freq_output)?;

    let settings = workload.config();
    println!("Pinned benchmark: {}", workload.describe());
    println!(
        "  {} calls of size {} per core, liveness: {}",
        settings.calls, settings.size, settings.liveness
    );

    let started_at = chrono::Local::now();
    let mut orchestrator = Orchestrator::new(recorders, config.plan).with_cancel(config.cancel);
    let summary = orchestrator.run(&mut workload)?;

    let results = workload.config().output.clone();
    let mut outputs = vec![results.as_path(), config.temp_output];
    outputs.extend(config.freq_output);
    super::print_summary(&summary, &outputs);
    println!("  Result rows:    {}", workload.merged_rows());
    super::write_manifest(
        config.manifest,
        &workload.describe(),
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
