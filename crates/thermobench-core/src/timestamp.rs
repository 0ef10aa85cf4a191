//! Wall-clock timestamps used to bracket every record.

use chrono::{DateTime, Local, NaiveDateTime};

/// Column format of every `start`/`stop` field, e.g. `2026-10-16 14:03:07.512093`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Current local time.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Render a timestamp the way sinks write it.
pub fn format(ts: &DateTime<Local>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `start`/`stop` column back; `None` if it is not in [`TIMESTAMP_FORMAT`].
pub fn parse(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_back() {
        let ts = now();
        let text = format(&ts);
        let parsed = parse(&text).expect("formatted timestamp parses");
        assert_eq!(parsed.format(TIMESTAMP_FORMAT).to_string(), text);
    }

    #[test]
    fn format_has_microsecond_resolution() {
        let text = format(&now());
        let (_, frac) = text.rsplit_once('.').unwrap();
        assert_eq!(frac.len(), 6);
    }

    #[test]
    fn parse_rejects_other_shapes() {
        assert!(parse("2026-02-15T01:30:00Z").is_none());
        assert!(parse("").is_none());
    }
}
