//! Telemetry samplers.
//!
//! A [`Sampler`] returns one [`Reading`] per sensor at the instant it is
//! called. Raw kernel pseudo-files are read by [`DirectorySampler`]; unit
//! conversion is layered on top with [`ScaledSampler`] rather than baked into
//! each sensor type.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Kernel thermal zone directory.
pub const THERMAL_ROOT: &str = "/sys/class/thermal";
/// Kernel per-CPU directory.
pub const CPU_ROOT: &str = "/sys/devices/system/cpu";

/// One sensor's value at one sampling instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub id: u32,
    pub value: f64,
}

impl Reading {
    pub fn new(id: u32, value: f64) -> Self {
        Self { id, value }
    }
}

/// Anything that can produce a batch of readings.
///
/// Implementations must be all-or-nothing: if any sensor cannot be read the
/// whole call fails.
pub trait Sampler: Send {
    /// Column names for the reading fields (without the timestamp columns).
    fn schema(&self) -> &[&'static str];

    /// Read every sensor once, in a stable order.
    fn sample(&self) -> Result<Vec<Reading>>;

    /// Short label for logs.
    fn name(&self) -> &str {
        "sampler"
    }
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    fn schema(&self) -> &[&'static str] {
        (**self).schema()
    }

    fn sample(&self) -> Result<Vec<Reading>> {
        (**self).sample()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Read a pseudo-file that must contain exactly one integer line.
pub fn read_single_value(path: &Path) -> Result<i64> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::unavailable(path),
        _ => Error::Io(e),
    })?;

    let lines: Vec<&str> = content.lines().collect();
    if lines.len() != 1 {
        return Err(Error::malformed(
            path,
            format!("expected exactly one line, found {}", lines.len()),
        ));
    }
    lines[0]
        .trim()
        .parse::<i64>()
        .map_err(|e| Error::malformed(path, format!("{:?} is not an integer: {e}", lines[0])))
}

// ---------------------------------------------------------------------------
// Raw directory scanning
// ---------------------------------------------------------------------------

/// Reads `<prefix>/<name><id>/<suffix>` for every matching entry of `prefix`.
///
/// The directory is scanned once, at construction. Values are returned raw,
/// in ascending id order.
#[derive(Debug, Clone)]
pub struct DirectorySampler {
    label: String,
    files: BTreeMap<u32, PathBuf>,
}

impl DirectorySampler {
    const SCHEMA: &'static [&'static str] = &["id", "value"];

    /// Scan `prefix` for directories named `<name><integer>`.
    pub fn scan(prefix: impl AsRef<Path>, name: &str, suffix: &str) -> Result<Self> {
        let prefix = prefix.as_ref();
        let entries = fs::read_dir(prefix).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::unavailable(prefix),
            _ => Error::Io(e),
        })?;

        let mut files = BTreeMap::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(id) = parse_entry_id(&file_name.to_string_lossy(), name) else {
                continue;
            };
            files.insert(id, prefix.join(&file_name).join(suffix));
        }

        log::debug!(
            "scanned {} for {name}N/{suffix}: {} entries",
            prefix.display(),
            files.len()
        );

        Ok(Self {
            label: name.to_string(),
            files,
        })
    }

    /// Number of discovered sensor files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Sampler for DirectorySampler {
    fn schema(&self) -> &[&'static str] {
        Self::SCHEMA
    }

    fn sample(&self) -> Result<Vec<Reading>> {
        self.files
            .iter()
            .map(|(&id, path)| Ok(Reading::new(id, read_single_value(path)? as f64)))
            .collect()
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// `thermal_zone12` with name `thermal_zone` → `Some(12)`; only digits may follow.
fn parse_entry_id(entry: &str, name: &str) -> Option<u32> {
    let digits = entry.strip_prefix(name)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Unit conversion
// ---------------------------------------------------------------------------

/// Rational factor applied to raw readings: `value * multiply / divide`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScale {
    pub multiply: f64,
    pub divide: f64,
}

impl UnitScale {
    /// Thousandths of a degree → degrees.
    pub const MILLI: Self = Self {
        multiply: 1.0,
        divide: 1000.0,
    };
    /// Kilohertz → hertz.
    pub const KILO: Self = Self {
        multiply: 1000.0,
        divide: 1.0,
    };

    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.multiply / self.divide
    }
}

/// Decorates a sampler with a unit scale and its own column names.
#[derive(Debug, Clone)]
pub struct ScaledSampler<S> {
    inner: S,
    scale: UnitScale,
    schema: &'static [&'static str],
}

impl<S: Sampler> ScaledSampler<S> {
    pub fn new(inner: S, scale: UnitScale, schema: &'static [&'static str]) -> Self {
        Self {
            inner,
            scale,
            schema,
        }
    }
}

impl<S: Sampler> Sampler for ScaledSampler<S> {
    fn schema(&self) -> &[&'static str] {
        self.schema
    }

    fn sample(&self) -> Result<Vec<Reading>> {
        Ok(self
            .inner
            .sample()?
            .into_iter()
            .map(|r| Reading::new(r.id, self.scale.apply(r.value)))
            .collect())
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Temperature sampler in degrees Celsius, one reading per thermal zone.
pub type Thermometer = ScaledSampler<DirectorySampler>;
/// Frequency sampler in hertz, one reading per CPU core.
pub type CpuFrequency = ScaledSampler<DirectorySampler>;

pub const TEMPERATURE_SCHEMA: &[&str] = &["sensor_id", "temperature"];
pub const FREQUENCY_SCHEMA: &[&str] = &["core_id", "frequency"];

/// Thermal zones under `root` (normally [`THERMAL_ROOT`]).
pub fn thermal_zones(root: impl AsRef<Path>) -> Result<Thermometer> {
    let raw = DirectorySampler::scan(root, "thermal_zone", "temp")?;
    Ok(ScaledSampler::new(raw, UnitScale::MILLI, TEMPERATURE_SCHEMA))
}

/// Current scaling frequency of every core under `root` (normally [`CPU_ROOT`]).
pub fn cpu_frequencies(root: impl AsRef<Path>) -> Result<CpuFrequency> {
    let raw = DirectorySampler::scan(root, "cpu", "cpufreq/scaling_cur_freq")?;
    Ok(ScaledSampler::new(raw, UnitScale::KILO, FREQUENCY_SCHEMA))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sensor(root: &Path, dir: &str, suffix: &str, content: &str) {
        let path = root.join(dir).join(suffix);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    // -----------------------------------------------------------------------
    // read_single_value
    // -----------------------------------------------------------------------

    #[test]
    fn single_value_parses_trailing_newline() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("temp");
        fs::write(&path, "45000\n").unwrap();
        assert_eq!(read_single_value(&path).unwrap(), 45000);
    }

    #[test]
    fn single_value_missing_file_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_single_value(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn single_value_rejects_multiple_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("temp");
        fs::write(&path, "1\n2\n").unwrap();
        assert!(matches!(
            read_single_value(&path).unwrap_err(),
            Error::MalformedSource { .. }
        ));
    }

    #[test]
    fn single_value_rejects_empty_and_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty");
        fs::write(&empty, "").unwrap();
        assert!(matches!(
            read_single_value(&empty).unwrap_err(),
            Error::MalformedSource { .. }
        ));

        let garbage = tmp.path().join("garbage");
        fs::write(&garbage, "hot\n").unwrap();
        assert!(matches!(
            read_single_value(&garbage).unwrap_err(),
            Error::MalformedSource { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Directory scanning
    // -----------------------------------------------------------------------

    #[test]
    fn parse_entry_id_requires_digits_only() {
        assert_eq!(parse_entry_id("thermal_zone12", "thermal_zone"), Some(12));
        assert_eq!(parse_entry_id("cpu0", "cpu"), Some(0));
        assert_eq!(parse_entry_id("cpufreq", "cpu"), None);
        assert_eq!(parse_entry_id("cpuidle", "cpu"), None);
        assert_eq!(parse_entry_id("cpu", "cpu"), None);
        assert_eq!(parse_entry_id("cooling_device0", "thermal_zone"), None);
    }

    #[test]
    fn scan_finds_matching_entries_only() {
        let tmp = tempfile::tempdir().unwrap();
        write_sensor(tmp.path(), "thermal_zone0", "temp", "40000\n");
        write_sensor(tmp.path(), "thermal_zone3", "temp", "41000\n");
        write_sensor(tmp.path(), "cooling_device0", "temp", "1\n");

        let sampler = DirectorySampler::scan(tmp.path(), "thermal_zone", "temp").unwrap();
        assert_eq!(sampler.len(), 2);
        let readings = sampler.sample().unwrap();
        assert_eq!(readings, vec![Reading::new(0, 40000.0), Reading::new(3, 41000.0)]);
    }

    #[test]
    fn scan_missing_root_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = DirectorySampler::scan(tmp.path().join("missing"), "cpu", "x").unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn sample_is_all_or_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        write_sensor(tmp.path(), "thermal_zone0", "temp", "40000\n");
        write_sensor(tmp.path(), "thermal_zone1", "temp", "40000\n40000\n");
        let sampler = thermal_zones(tmp.path()).unwrap();
        assert!(sampler.sample().is_err());
    }

    #[test]
    fn sensor_removed_after_scan_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        write_sensor(tmp.path(), "cpu0", "cpufreq/scaling_cur_freq", "1000\n");
        let sampler = cpu_frequencies(tmp.path()).unwrap();
        fs::remove_dir_all(tmp.path().join("cpu0")).unwrap();
        assert!(matches!(
            sampler.sample().unwrap_err(),
            Error::SourceUnavailable { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Unit conversion
    // -----------------------------------------------------------------------

    #[test]
    fn thermometer_converts_millidegrees() {
        let tmp = tempfile::tempdir().unwrap();
        write_sensor(tmp.path(), "thermal_zone0", "temp", "45000\n");
        write_sensor(tmp.path(), "thermal_zone1", "temp", "42000\n");
        write_sensor(tmp.path(), "thermal_zone2", "temp", "45500\n");

        let sampler = thermal_zones(tmp.path()).unwrap();
        assert_eq!(sampler.schema(), TEMPERATURE_SCHEMA);
        let values: Vec<f64> = sampler.sample().unwrap().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![45.0, 42.0, 45.5]);
    }

    #[test]
    fn frequency_converts_kilohertz() {
        let tmp = tempfile::tempdir().unwrap();
        write_sensor(tmp.path(), "cpu0", "cpufreq/scaling_cur_freq", "2400000\n");
        write_sensor(tmp.path(), "cpu1", "cpufreq/scaling_cur_freq", "1800000\n");
        fs::create_dir_all(tmp.path().join("cpufreq")).unwrap();

        let sampler = cpu_frequencies(tmp.path()).unwrap();
        assert_eq!(sampler.schema(), FREQUENCY_SCHEMA);
        let readings = sampler.sample().unwrap();
        assert_eq!(
            readings,
            vec![
                Reading::new(0, 2_400_000_000.0),
                Reading::new(1, 1_800_000_000.0)
            ]
        );
    }

    #[test]
    fn scale_display_has_no_fraction_for_whole_values() {
        assert_eq!(UnitScale::MILLI.apply(42000.0).to_string(), "42");
        assert_eq!(UnitScale::KILO.apply(1_800_000.0).to_string(), "1800000000");
    }
}
