//! Append-only CSV sinks.
//!
//! A sink writes its header once, at creation, and only ever appends rows
//! after that. Callers flush after each batch so an interrupted run still
//! leaves readable output on disk.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Leading columns of every sink.
pub const TIMESTAMP_COLUMNS: [&str; 2] = ["start", "stop"];

/// Line-oriented CSV destination with a fixed header.
pub struct Sink {
    path: PathBuf,
    writer: BufWriter<File>,
    header: String,
    rows: u64,
}

impl Sink {
    /// Create (truncate) `path` and write `start,stop,<fields...>`.
    pub fn create(path: impl AsRef<Path>, fields: &[&str]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = header_line(fields);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{header}")?;
        writer.flush()?;

        Ok(Self {
            path,
            writer,
            header,
            rows: 0,
        })
    }

    /// Append `start,stop,<fields...>` without flushing.
    pub fn append(&mut self, start: &str, stop: &str, fields: &[String]) -> Result<()> {
        write!(self.writer, "{start},{stop}")?;
        for field in fields {
            write!(self.writer, ",{field}")?;
        }
        writeln!(self.writer)?;
        self.rows += 1;
        Ok(())
    }

    /// Append an already formatted row.
    pub fn append_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line.trim_end_matches(['\r', '\n']))?;
        self.rows += 1;
        Ok(())
    }

    /// Append every non-empty row of `source`, skipping a copy of our own header.
    ///
    /// Returns the number of rows appended. A missing file is
    /// [`Error::SourceUnavailable`].
    pub fn append_file(&mut self, source: &Path) -> Result<u64> {
        let file = File::open(source).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::unavailable(source),
            _ => Error::Io(e),
        })?;

        let mut appended = 0;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() || line == self.header {
                continue;
            }
            self.append_line(&line)?;
            appended += 1;
        }
        Ok(appended)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Data rows written so far (header excluded).
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Open an existing sink for appending without touching its header.
///
/// Backs `pinned --append`. A missing or empty file is created with the
/// header; otherwise rows go after the existing content.
pub fn open_append(path: impl AsRef<Path>, fields: &[&str]) -> Result<Sink> {
    let path = path.as_ref();
    let has_content = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
    if !has_content {
        return Sink::create(path, fields);
    }

    let file = OpenOptions::new().append(true).open(path)?;
    Ok(Sink {
        path: path.to_path_buf(),
        writer: BufWriter::new(file),
        header: header_line(fields),
        rows: 0,
    })
}

fn header_line(fields: &[&str]) -> String {
    TIMESTAMP_COLUMNS
        .iter()
        .chain(fields.iter())
        .copied()
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_written_at_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("temp.csv");
        let sink = Sink::create(&path, &["sensor_id", "temperature"]).unwrap();
        assert_eq!(sink.header(), "start,stop,sensor_id,temperature");
        drop(sink);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "start,stop,sensor_id,temperature\n");
    }

    #[test]
    fn append_writes_comma_separated_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("perf.csv");
        let mut sink = Sink::create(&path, &["duration", "gflops"]).unwrap();
        sink.append("a", "b", &["1.5".to_string(), "12".to_string()])
            .unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["start,stop,duration,gflops", "a,b,1.5,12"]);
        assert_eq!(sink.rows(), 1);
    }

    #[test]
    fn append_file_skips_blank_lines_and_header_copies() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("core_1.csv");
        std::fs::write(&source, "start,stop,x\nr1\n\nr2\n").unwrap();

        let mut sink = Sink::create(tmp.path().join("all.csv"), &["x"]).unwrap();
        assert_eq!(sink.append_file(&source).unwrap(), 2);
        assert_eq!(sink.rows(), 2);
    }

    #[test]
    fn append_file_missing_source_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = Sink::create(tmp.path().join("all.csv"), &["x"]).unwrap();
        let err = sink.append_file(&tmp.path().join("core_9.csv")).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn open_append_keeps_single_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        {
            let mut sink = open_append(&path, &["x"]).unwrap();
            sink.append_line("1,2,3").unwrap();
        }
        {
            let mut sink = open_append(&path, &["x"]).unwrap();
            sink.append_line("4,5,6").unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "start,stop,x\n1,2,3\n4,5,6\n");
    }
}
