//! Recorders: a sampler bound to the sink that stores its readings.

use std::path::Path;

use crate::error::Result;
use crate::sampler::Sampler;
use crate::sink::Sink;
use crate::timestamp;

/// Samples once per call and appends the bracketed readings to its sink.
pub struct Recorder {
    sampler: Box<dyn Sampler>,
    sink: Sink,
    invocations: u64,
}

impl Recorder {
    /// Create the sink at `path` with the sampler's schema as header.
    pub fn create(sampler: Box<dyn Sampler>, path: impl AsRef<Path>) -> Result<Self> {
        let sink = Sink::create(path, sampler.schema())?;
        Ok(Self::new(sampler, sink))
    }

    pub fn new(sampler: Box<dyn Sampler>, sink: Sink) -> Self {
        Self {
            sampler,
            sink,
            invocations: 0,
        }
    }

    /// Take one sample and append one `start,stop,id,value` row per reading.
    ///
    /// `start` is captured before the first sensor is read and `stop` after
    /// the last, so every reading happened inside the bracket.
    pub fn record_once(&mut self) -> Result<usize> {
        let start = timestamp::format(&timestamp::now());
        let readings = self.sampler.sample()?;
        let stop = timestamp::format(&timestamp::now());

        for reading in &readings {
            self.sink.append(
                &start,
                &stop,
                &[reading.id.to_string(), reading.value.to_string()],
            )?;
        }
        self.sink.flush()?;
        self.invocations += 1;

        log::debug!(
            "{}: {} readings -> {}",
            self.sampler.name(),
            readings.len(),
            self.sink.path().display()
        );
        Ok(readings.len())
    }

    pub fn invocations(&self) -> u64 {
        self.invocations
    }
}

/// Every recorder of a run, invoked together in configuration order.
#[derive(Default)]
pub struct RecorderSet {
    recorders: Vec<Recorder>,
    invocations: u64,
}

impl RecorderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, recorder: Recorder) {
        self.recorders.push(recorder);
    }

    /// Invoke every recorder once. The first failure aborts the batch.
    pub fn record_all(&mut self) -> Result<()> {
        for recorder in &mut self.recorders {
            recorder.record_once()?;
        }
        self.invocations += 1;
        Ok(())
    }

    /// Number of `record_all` calls that completed.
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recorder> {
        self.recorders.iter()
    }
}

impl FromIterator<Recorder> for RecorderSet {
    fn from_iter<I: IntoIterator<Item = Recorder>>(iter: I) -> Self {
        Self {
            recorders: iter.into_iter().collect(),
            invocations: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sampler::Reading;

    struct Fixed(Vec<Reading>);

    impl Sampler for Fixed {
        fn schema(&self) -> &[&'static str] {
            &["sensor_id", "temperature"]
        }

        fn sample(&self) -> Result<Vec<Reading>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl Sampler for Broken {
        fn schema(&self) -> &[&'static str] {
            &["id", "value"]
        }

        fn sample(&self) -> Result<Vec<Reading>> {
            Err(Error::unavailable("/sys/class/thermal"))
        }
    }

    fn fixed() -> Box<dyn Sampler> {
        Box::new(Fixed(vec![Reading::new(0, 42.0), Reading::new(1, 45.5)]))
    }

    #[test]
    fn record_once_writes_one_row_per_reading() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("temp.csv");
        let mut recorder = Recorder::create(fixed(), &path).unwrap();
        assert_eq!(recorder.record_once().unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "start,stop,sensor_id,temperature");
        assert!(lines[1].ends_with(",0,42"));
        assert!(lines[2].ends_with(",1,45.5"));
    }

    #[test]
    fn bracket_is_ordered() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("temp.csv");
        let mut recorder = Recorder::create(fixed(), &path).unwrap();
        recorder.record_once().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        for line in content.lines().skip(1) {
            let cols: Vec<&str> = line.split(',').collect();
            let start = timestamp::parse(cols[0]).unwrap();
            let stop = timestamp::parse(cols[1]).unwrap();
            assert!(start <= stop);
        }
    }

    #[test]
    fn failed_sample_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("temp.csv");
        let mut recorder = Recorder::create(Box::new(Broken), &path).unwrap();
        assert!(recorder.record_once().is_err());
        assert_eq!(recorder.invocations(), 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn set_stops_at_first_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let mut set: RecorderSet = [
            Recorder::create(Box::new(Broken), tmp.path().join("a.csv")).unwrap(),
            Recorder::create(fixed(), tmp.path().join("b.csv")).unwrap(),
        ]
        .into_iter()
        .collect();

        assert!(set.record_all().is_err());
        assert_eq!(set.invocations(), 0);
        assert_eq!(set.iter().nth(1).unwrap().invocations(), 0);
    }

    #[test]
    fn empty_set_still_counts_invocations() {
        let mut set = RecorderSet::new();
        assert!(set.is_empty());
        set.record_all().unwrap();
        assert_eq!(set.invocations(), 1);
    }
}
