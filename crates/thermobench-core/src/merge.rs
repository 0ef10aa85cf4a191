//! Aggregation of per-core benchmark result files.

use std::path::PathBuf;

use crate::error::Result;
use crate::sink::Sink;

/// Columns written by the per-core benchmark after `start,stop`.
pub const RESULT_SCHEMA: &[&str] = &["duration", "cycle_count", "core_id", "throughput"];

/// What one merge appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub files: usize,
    pub rows: u64,
}

/// Append every row of `sources`, in order, to `target` and flush.
///
/// Rows of one source stay contiguous. The target's header is never
/// rewritten.
pub fn merge_into(target: &mut Sink, sources: &[PathBuf]) -> Result<MergeSummary> {
    let mut summary = MergeSummary::default();
    for source in sources {
        let rows = target.append_file(source)?;
        log::debug!("merged {rows} rows from {}", source.display());
        summary.files += 1;
        summary.rows += rows;
    }
    target.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn core_file(dir: &std::path::Path, core: u32, rows: usize) -> PathBuf {
        let path = dir.join(format!("core_{core}.csv"));
        let body: String = (0..rows)
            .map(|i| format!("s{i},e{i},100,2000,{core},1.5e0\n"))
            .collect();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn merge_counts_rows_and_keeps_one_header() {
        let tmp = tempfile::tempdir().unwrap();
        let sources = vec![
            core_file(tmp.path(), 1, 3),
            core_file(tmp.path(), 2, 0),
            core_file(tmp.path(), 5, 4),
        ];
        let out = tmp.path().join("results.csv");
        let mut sink = Sink::create(&out, RESULT_SCHEMA).unwrap();

        let summary = merge_into(&mut sink, &sources).unwrap();
        assert_eq!(summary, MergeSummary { files: 3, rows: 7 });

        let content = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "start,stop,duration,cycle_count,core_id,throughput");
        assert_eq!(lines.iter().filter(|l| l.starts_with("start,")).count(), 1);
    }

    #[test]
    fn merge_preserves_per_core_contiguity() {
        let tmp = tempfile::tempdir().unwrap();
        let sources = vec![core_file(tmp.path(), 3, 2), core_file(tmp.path(), 1, 2)];
        let out = tmp.path().join("results.csv");
        let mut sink = Sink::create(&out, RESULT_SCHEMA).unwrap();
        merge_into(&mut sink, &sources).unwrap();

        let content = fs::read_to_string(&out).unwrap();
        let cores: Vec<&str> = content
            .lines()
            .skip(1)
            .map(|l| l.split(',').nth(4).unwrap())
            .collect();
        assert_eq!(cores, vec!["3", "3", "1", "1"]);
    }

    #[test]
    fn successive_merges_accumulate() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("results.csv");
        let mut sink = Sink::create(&out, RESULT_SCHEMA).unwrap();
        for _ in 0..3 {
            let sources = vec![core_file(tmp.path(), 0, 2)];
            merge_into(&mut sink, &sources).unwrap();
        }
        let content = fs::read_to_string(&out).unwrap();
        assert_eq!(content.lines().count(), 1 + 6);
    }
}
