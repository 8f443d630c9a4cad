//! Append-only attendance ledger backed by `attendance.csv`.
//!
//! One row per successful verification, keyed by email. No deduplication:
//! several same-day rows for one person are expected.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use crate::identities::LedgerError;

/// Calendar-day format, e.g. `03-09-2025`.
pub const DATE_FORMAT: &str = "%m-%d-%Y";
/// 24-hour wall-clock format, e.g. `14:30:05`.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// One successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub email: String,
    pub date: String,
    pub time: String,
}

/// Append-only record of successful verifications.
pub struct AttendanceLedger {
    path: PathBuf,
}

impl AttendanceLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append a row stamped with the current local date and time.
    pub fn record(&self, email: &str) -> Result<AttendanceRecord, LedgerError> {
        self.record_at(email, Local::now())
    }

    /// Append a row stamped with `when`. Header on first-ever write.
    pub fn record_at(
        &self,
        email: &str,
        when: DateTime<Local>,
    ) -> Result<AttendanceRecord, LedgerError> {
        let row = AttendanceRecord {
            email: email.to_string(),
            date: when.format(DATE_FORMAT).to_string(),
            time: when.format(TIME_FORMAT).to_string(),
        };

        let first_write = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(first_write)
            .from_writer(file);
        writer.serialize(&row)?;
        writer.flush()?;
        tracing::info!(email, date = %row.date, time = %row.time, "attendance recorded");
        Ok(row)
    }

    /// Lazy scan of this email's rows in file order. Each call starts a
    /// fresh pass over the file; a missing ledger yields an empty history.
    pub fn history(&self, email: &str) -> Result<History, LedgerError> {
        let rows = if self.path.is_file() {
            Some(csv::Reader::from_path(&self.path)?.into_deserialize())
        } else {
            None
        };
        Ok(History {
            rows,
            email: email.to_string(),
        })
    }
}

/// Iterator over one email's attendance rows.
pub struct History {
    rows: Option<csv::DeserializeRecordsIntoIter<File, AttendanceRecord>>,
    email: String,
}

impl Iterator for History {
    type Item = Result<AttendanceRecord, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.rows.as_mut()?;
        for record in rows {
            match record {
                Ok(row) if row.email == self.email => return Some(Ok(row)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ledger_in(dir: &tempfile::TempDir) -> AttendanceLedger {
        AttendanceLedger::new(dir.path().join("attendance.csv"))
    }

    fn fixed_instant() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 9, 14, 30, 5).unwrap()
    }

    #[test]
    fn stamps_use_contract_formats() {
        let dir = tempfile::tempdir().unwrap();
        let row = ledger_in(&dir).record_at("a@x.com", fixed_instant()).unwrap();
        assert_eq!(row.date, "03-09-2025");
        assert_eq!(row.time, "14:30:05");
    }

    #[test]
    fn header_then_append_only_rows() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        ledger.record_at("a@x.com", fixed_instant()).unwrap();
        ledger.record_at("b@x.com", fixed_instant()).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("attendance.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "email,date,time");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("a@x.com,"));
        assert!(lines[2].starts_with("b@x.com,"));
    }

    #[test]
    fn history_counts_match_records_and_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);

        for _ in 0..3 {
            ledger.record_at("a@x.com", fixed_instant()).unwrap();
        }
        ledger.record_at("other@x.com", fixed_instant()).unwrap();

        let rows: Vec<_> = ledger
            .history("a@x.com")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.email == "a@x.com"));

        // No dedup: same-day rows accumulate.
        ledger.record_at("a@x.com", fixed_instant()).unwrap();
        assert_eq!(ledger.history("a@x.com").unwrap().count(), 4);
    }

    #[test]
    fn history_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        ledger.record_at("a@x.com", fixed_instant()).unwrap();

        assert_eq!(ledger.history("a@x.com").unwrap().count(), 1);
        // A second invocation scans from the top again.
        assert_eq!(ledger.history("a@x.com").unwrap().count(), 1);
    }

    #[test]
    fn missing_ledger_yields_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ledger_in(&dir).history("a@x.com").unwrap().count(), 0);
    }
}
