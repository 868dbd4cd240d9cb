use chrono::{DateTime, TimeZone};
use chrono_tz::US::Eastern;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const TIMECODE_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Minute-granularity identifier shared by every artifact of one run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timecode(String);

impl Timecode {
    /// Current US/Eastern wall-clock time.
    pub fn now() -> Self {
        Self::at(&chrono::Utc::now().with_timezone(&Eastern))
    }

    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(instant.format(TIMECODE_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Timecode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory tree for data and logs:
/// `<data>/raw`, `<data>/parsed`, `<logs>/info`, `<logs>/errors`.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub data_root: PathBuf,
    pub data_raw: PathBuf,
    pub data_parsed: PathBuf,
    pub logs_root: PathBuf,
    pub logs_info: PathBuf,
    pub logs_errors: PathBuf,
}

impl DataLayout {
    pub fn new(data_root: &Path, logs_root: &Path) -> Self {
        Self {
            data_root: data_root.to_path_buf(),
            data_raw: data_root.join("raw"),
            data_parsed: data_root.join("parsed"),
            logs_root: logs_root.to_path_buf(),
            logs_info: logs_root.join("info"),
            logs_errors: logs_root.join("errors"),
        }
    }

    /// Create every directory of the layout that does not exist yet.
    pub fn bootstrap(&self) -> std::io::Result<()> {
        for dir in [
            &self.data_root,
            &self.data_raw,
            &self.data_parsed,
            &self.logs_root,
            &self.logs_info,
            &self.logs_errors,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Read-only state shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub timecode: Timecode,
    pub raw_output_dir: PathBuf,
    pub parsed_output_dir: PathBuf,
}

impl RunContext {
    pub fn new(timecode: Timecode, layout: &DataLayout) -> Self {
        Self {
            timecode,
            raw_output_dir: layout.data_raw.clone(),
            parsed_output_dir: layout.data_parsed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn timecode_uses_eastern_minutes() {
        // 2024-07-04 16:30 UTC is 12:30 EDT
        let utc = Utc.with_ymd_and_hms(2024, 7, 4, 16, 30, 59).unwrap();
        let tc = Timecode::at(&utc.with_timezone(&Eastern));
        assert_eq!(tc.as_str(), "2024-07-04-12-30");

        // 2024-01-15 05:05 UTC is 00:05 EST
        let utc = Utc.with_ymd_and_hms(2024, 1, 15, 5, 5, 0).unwrap();
        assert_eq!(Timecode::at(&utc.with_timezone(&Eastern)).to_string(), "2024-01-15-00-05");
    }

    #[test]
    fn timecodes_sort_chronologically() {
        let a = Timecode::from("2024-01-15-09-59");
        let b = Timecode::from("2024-01-15-10-00");
        let c = Timecode::from("2024-11-02-00-00");
        assert!(a < b && b < c);
    }

    #[test]
    fn bootstrap_creates_full_layout() {
        let dir = tempdir().unwrap();
        let layout = DataLayout::new(&dir.path().join("data"), &dir.path().join("logs"));
        layout.bootstrap().unwrap();
        // second call is a no-op
        layout.bootstrap().unwrap();

        for p in [&layout.data_raw, &layout.data_parsed, &layout.logs_info, &layout.logs_errors] {
            assert!(p.is_dir(), "{} missing", p.display());
        }

        let ctx = RunContext::new(Timecode::from("2024-01-15-10-00"), &layout);
        assert_eq!(ctx.raw_output_dir, dir.path().join("data").join("raw"));
        assert_eq!(ctx.parsed_output_dir, dir.path().join("data").join("parsed"));
    }
}
