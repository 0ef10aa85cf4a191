//! `thermobench monitor`: periodic temperature and frequency measures.

use std::path::Path;

use thermobench_core::{CancelToken, MonitorConfig, Result};

pub fn run(config: MonitorConfig, manifest: Option<&Path>, cancel: CancelToken) -> Result<()> {
    println!("Starting to monitor the system, press Ctrl-C to stop");
    match config.duration {
        Some(d) => println!("  Duration:  {:.2}s", d.as_secs_f64()),
        None => println!("  Duration:  until Ctrl+C"),
    }
    println!("  Period:    {:.3}s", config.period.as_secs_f64());

    let started_at = chrono::Local::now();
    let summary = config.run(cancel)?;

    println!(
        "\nMonitored the system for {:.2} seconds",
        summary.elapsed.as_secs_f64()
    );
    let outputs = [
        config.temperature_output.as_path(),
        config.frequency_output.as_path(),
    ];
    for path in outputs {
        println!("  Output:    {}", path.display());
    }
    super::write_manifest(manifest, "monitor", None, &outputs, &summary, started_at)
}
