//! `thermobench stress`: in-process matrix multiply under temperature watch.

use std::path::Path;

use thermobench_core::{
    CancelToken, Error, MatrixMultiply, Orchestrator, Result, RunPlan, Workload,
};

pub struct StressCommandConfig<'a> {
    pub size: usize,
    pub perf_output: &'a Path,
    pub temp_output: &'a Path,
    pub sensors: &'a super::SensorArgs,
    pub calls: u64,
    pub plan: RunPlan,
    pub manifest: Option<&'a Path>,
    pub cancel: CancelToken,
}

pub fn run(config: StressCommandConfig<'_>) -> Result<()> {
    let recorders = super::sensor_recorders(config.sensors, config.temp_output, None)?;
    let mut workload = MatrixMultiply::new(config.size, config.calls).with_output(config.perf_output)?;

    println!("Stress test: {}", workload.describe());
    println!(
        "  {} runs of {} calls, {} idle samples every {:.3}s",
        config.plan.repetitions,
        config.calls,
        config.plan.idle_ticks,
        config.plan.tick.as_secs_f64()
    );

    let started_at = chrono::Local::now();
    let mut orchestrator = Orchestrator::new(recorders, config.plan).with_cancel(config.cancel);
    let summary = orchestrator.run(&mut workload)?;

    let outputs = [config.perf_output, config.temp_output];
    super::print_summary(&summary, &outputs);
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
