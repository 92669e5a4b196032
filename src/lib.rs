pub mod charts;
mod util;

pub use anyhow::{Context, Error};
use chrono::{Datelike, NaiveDateTime, Timelike};
use qu::ick_use::*;
use std::{fs, io, ops::Deref, path::Path, sync::Arc};

pub use crate::util::{header, parse_number, parse_stamp, path_exists};

/// Patient admissions extract, read from the working directory.
pub const PATIENTS_CSV: &str = "patients.csv";
/// Weekly per-service extract. Loaded for its shape only; nothing downstream
/// uses it yet.
pub const SERVICES_CSV: &str = "services_weekly.csv";
/// Where the cleaned table is written.
pub const CLEANED_CSV: &str = "patients_cleaned.csv";

/// Columns appended to the cleaned export, in order.
pub const DERIVED_COLUMNS: [&str; 4] = ["stay_duration_days", "month", "week", "year"];

pub type ArcStr = Arc<str>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;

/// A CSV extract held as rows of strings, before any typing.
///
/// Extracts arrive with arbitrary extra columns that must survive into the
/// cleaned export, so cells stay untyped here and the admission fields are
/// picked out by column name later.
#[derive(Debug, Clone)]
pub struct RawTable {
    columns: Vec<ArcStr>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Read a CSV extract from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        fn inner(path: &Path) -> Result<RawTable> {
            RawTable::from_reader(fs::File::open(path)?)
        }
        let path = path.as_ref();
        inner(path).with_context(|| format!("while loading \"{}\"", path.display()))
    }

    /// Read a CSV extract from any reader. Cells are trimmed.
    pub fn from_reader(rdr: impl io::Read) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let columns = reader.headers()?.iter().map(Into::into).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_owned).collect());
        }
        Ok(RawTable { columns, rows })
    }

    /// Normalize column labels: trim, lowercase, spaces to underscores.
    ///
    /// Normalizing twice is the same as normalizing once.
    pub fn normalize_columns(&mut self) {
        self.columns = self
            .columns
            .iter()
            .map(|label| normalize_label(label).into())
            .collect();
    }

    /// Index of the first column whose label contains `needle`.
    pub fn find_column(&self, needle: &str) -> Option<usize> {
        self.columns.iter().position(|label| label.contains(needle))
    }

    /// Index of the column with exactly this label.
    pub fn column(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|l| &**l == label)
    }

    pub fn columns(&self) -> &[ArcStr] {
        &self.columns
    }

    /// `(rows, columns)`, the way a dataframe prints its shape.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }
}

pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// A cleaned admission row.
///
/// `cells` keeps every original cell (in normalized column order) so that the
/// export can round-trip columns this crate knows nothing about.
#[derive(Debug, Clone)]
pub struct Admission {
    pub arrival: NaiveDateTime,
    pub departure: NaiveDateTime,
    /// Complete days between arrival and departure. Never negative.
    pub stay_days: i64,
    /// "YYYY-MM" of the arrival.
    pub month: ArcStr,
    /// ISO week number of the arrival.
    pub week: u32,
    /// Calendar year of the arrival.
    pub year: i32,
    pub service: Option<ArcStr>,
    pub age: Option<f64>,
    cells: Vec<String>,
}

/// Tallies from the cleaning pass.
///
/// Dropped rows are only ever counted, never reported individually.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanCounts {
    /// Rows in the incoming extract.
    pub total: usize,
    /// Dropped because arrival or departure would not parse.
    pub unparseable: usize,
    /// Dropped because the departure preceded the arrival.
    pub inverted: usize,
}

impl CleanCounts {
    pub fn kept(&self) -> usize {
        self.total - self.unparseable - self.inverted
    }
}

/// Per-column description of the cleaned table, for the run summary.
pub struct ColumnSummary {
    pub label: ArcStr,
    pub non_null: usize,
    pub kind: &'static str,
}

/// The cleaned admissions table.
pub struct Admissions {
    els: Vec<Admission>,
    columns: Vec<ArcStr>,
    arrival_idx: usize,
    departure_idx: usize,
    service_idx: Option<usize>,
    age_idx: Option<usize>,
}

impl Admissions {
    /// Convert a normalized extract into typed admissions.
    ///
    /// Fails if no arrival or departure column can be found. Rows that fail
    /// to parse are dropped and counted, not reported.
    pub fn clean(table: RawTable) -> Result<(Self, CleanCounts)> {
        let Some(arrival_idx) = table.find_column("arrival") else {
            bail!("no column containing \"arrival\" in the patient extract")
        };
        let Some(departure_idx) = table.find_column("departure") else {
            bail!("no column containing \"departure\" in the patient extract")
        };
        let service_idx = table.column("service");
        let age_idx = table.column("age");
        let RawTable { columns, rows } = table;

        let mut counts = CleanCounts {
            total: rows.len(),
            ..CleanCounts::default()
        };
        let mut els = Vec::with_capacity(rows.len());
        for cells in rows {
            let (Some(arrival), Some(departure)) = (
                parse_stamp(&cells[arrival_idx]),
                parse_stamp(&cells[departure_idx]),
            ) else {
                counts.unparseable += 1;
                continue;
            };
            if departure < arrival {
                counts.inverted += 1;
                continue;
            }
            let arrived = arrival.date();
            els.push(Admission {
                arrival,
                departure,
                stay_days: (departure - arrival).num_days(),
                month: format!("{:04}-{:02}", arrived.year(), arrived.month()).into(),
                week: arrived.iso_week().week(),
                year: arrived.year(),
                service: service_idx.and_then(|idx| match cells[idx].as_str() {
                    "" => None,
                    s => Some(s.into()),
                }),
                age: age_idx.and_then(|idx| parse_number(&cells[idx])),
                cells,
            });
        }
        let this = Admissions {
            els,
            columns,
            arrival_idx,
            departure_idx,
            service_idx,
            age_idx,
        };
        Ok((this, counts))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Admission> + '_ {
        self.els.iter()
    }

    pub fn arrival_column(&self) -> &str {
        &self.columns[self.arrival_idx]
    }

    pub fn departure_column(&self) -> &str {
        &self.columns[self.departure_idx]
    }

    pub fn has_service(&self) -> bool {
        self.service_idx.is_some()
    }

    pub fn has_age(&self) -> bool {
        self.age_idx.is_some()
    }

    /// One summary per exported column, original then derived.
    pub fn column_summaries(&self) -> Vec<ColumnSummary> {
        let mut out = Vec::with_capacity(self.columns.len() + DERIVED_COLUMNS.len());
        for (idx, label) in self.columns.iter().enumerate() {
            let kind = if idx == self.arrival_idx || idx == self.departure_idx {
                "timestamp"
            } else if Some(idx) == self.age_idx {
                "number"
            } else {
                "text"
            };
            out.push(ColumnSummary {
                label: label.clone(),
                non_null: self
                    .els
                    .iter()
                    .filter(|adm| !adm.cells[idx].is_empty())
                    .count(),
                kind,
            });
        }
        for (label, kind) in DERIVED_COLUMNS
            .iter()
            .zip(["integer", "text", "integer", "integer"])
        {
            out.push(ColumnSummary {
                label: (*label).into(),
                non_null: self.els.len(),
                kind,
            });
        }
        out
    }

    /// Write the cleaned table as CSV, one line per retained admission, no
    /// index column.
    ///
    /// Original cells round-trip verbatim except the two date columns, which
    /// are rewritten from their parsed values. A date column prints date-only
    /// when every value in it is midnight, which is how a dataframe would
    /// have printed it.
    pub fn save(&self, path: impl AsRef<Path>) -> Result {
        fn inner(this: &Admissions, path: &Path) -> Result {
            let mut writer = csv::Writer::from_path(path)?;
            let mut record: Vec<String> = this
                .columns
                .iter()
                .map(|label| label.to_string())
                .chain(DERIVED_COLUMNS.iter().map(|label| (*label).to_owned()))
                .collect();
            writer.write_record(&record)?;

            let arrival_fmt = stamp_format(this.els.iter().map(|adm| adm.arrival));
            let departure_fmt = stamp_format(this.els.iter().map(|adm| adm.departure));
            for adm in &this.els {
                record.clear();
                for (idx, cell) in adm.cells.iter().enumerate() {
                    if idx == this.arrival_idx {
                        record.push(adm.arrival.format(arrival_fmt).to_string());
                    } else if idx == this.departure_idx {
                        record.push(adm.departure.format(departure_fmt).to_string());
                    } else {
                        record.push(cell.clone());
                    }
                }
                record.push(adm.stay_days.to_string());
                record.push(adm.month.to_string());
                record.push(adm.week.to_string());
                record.push(adm.year.to_string());
                writer.write_record(&record)?;
            }
            writer.flush()?;
            Ok(())
        }
        let path = path.as_ref();
        inner(self, path)
            .with_context(|| format!("unable to save data to \"{}\"", path.display()))
    }
}

impl Deref for Admissions {
    type Target = [Admission];
    fn deref(&self) -> &Self::Target {
        &self.els
    }
}

fn stamp_format(mut stamps: impl Iterator<Item = NaiveDateTime>) -> &'static str {
    if stamps.all(|stamp| stamp.hour() == 0 && stamp.minute() == 0 && stamp.second() == 0) {
        "%Y-%m-%d"
    } else {
        "%Y-%m-%d %H:%M:%S"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            columns: columns.iter().map(|&label| label.into()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|&cell| cell.to_owned()).collect())
                .collect(),
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut t = table(&[" Arrival Date ", "DEPARTURE date", "Age"], &[]);
        t.normalize_columns();
        let labels: Vec<String> = t.columns().iter().map(|l| l.to_string()).collect();
        assert_eq!(labels, ["arrival_date", "departure_date", "age"]);
        t.normalize_columns();
        let again: Vec<String> = t.columns().iter().map(|l| l.to_string()).collect();
        assert_eq!(labels, again);
        for label in &labels {
            assert!(!label.contains(' '));
            assert_eq!(*label, label.to_lowercase());
        }
    }

    #[test]
    fn find_column_takes_first_match() {
        let t = table(&["ward", "arrival_date", "arrival_checked"], &[]);
        assert_eq!(t.find_column("arrival"), Some(1));
        assert_eq!(t.find_column("departure"), None);
    }

    #[test]
    fn clean_derives_stay_fields() {
        let t = table(
            &["patient", "arrival_date", "departure_date", "service", "age"],
            &[&["p1", "2024-01-10", "2024-01-12", "ICU", "70"]],
        );
        let (admissions, counts) = Admissions::clean(t).unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.kept(), 1);
        let adm = &admissions[0];
        assert_eq!(adm.stay_days, 2);
        assert_eq!(adm.year, 2024);
        assert_eq!(adm.week, 2);
        assert_eq!(&*adm.month, "2024-01");
        assert_eq!(adm.service.as_deref(), Some("ICU"));
        assert_eq!(adm.age, Some(70.0));
    }

    #[test]
    fn clean_drops_bad_rows() {
        let t = table(
            &["arrival", "departure", "service"],
            &[
                &["2024-01-10", "2024-01-12", "ICU"],
                &["2024-01-10", "2024-01-08", "ICU"],
                &["soon", "2024-01-12", "ICU"],
                &["2024-01-10", "", ""],
            ],
        );
        let (admissions, counts) = Admissions::clean(t).unwrap();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.unparseable, 2);
        assert_eq!(counts.inverted, 1);
        assert_eq!(counts.kept(), 1);
        assert_eq!(admissions.len(), 1);
    }

    #[test]
    fn clean_keeps_zero_day_stays() {
        let t = table(
            &["arrival", "departure"],
            &[
                &["2024-01-10", "2024-01-10"],
                &["2024-01-10 23:00:00", "2024-01-11 01:00:00"],
                &["2024-01-10 23:00:00", "2024-01-12 01:00:00"],
            ],
        );
        let (admissions, counts) = Admissions::clean(t).unwrap();
        assert_eq!(counts.kept(), 3);
        let days: Vec<i64> = admissions.iter().map(|adm| adm.stay_days).collect();
        assert_eq!(days, [0, 0, 1]);
    }

    #[test]
    fn clean_requires_date_columns() {
        let t = table(&["patient", "departure"], &[]);
        assert!(Admissions::clean(t).is_err());
        let t = table(&["patient", "arrival"], &[]);
        assert!(Admissions::clean(t).is_err());
    }

    #[test]
    fn empty_service_cell_is_none() {
        let t = table(
            &["arrival", "departure", "service"],
            &[&["2024-01-10", "2024-01-12", ""]],
        );
        let (admissions, _) = Admissions::clean(t).unwrap();
        assert!(admissions.has_service());
        assert_eq!(admissions[0].service, None);
    }

    #[test]
    fn save_is_deterministic() {
        let t = table(
            &["patient", "arrival_date", "departure_date", "service", "age"],
            &[
                &["p1", "2024-01-10", "2024-01-12", "ICU", "70"],
                &["p2", "2024-01-11", "2024-01-11", "Bedah", "41"],
            ],
        );
        let (admissions, _) = Admissions::clean(t).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        admissions.save(&path).unwrap();
        let first = std::fs::read(&path).unwrap();
        admissions.save(&path).unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);

        let text = String::from_utf8(first).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "patient,arrival_date,departure_date,service,age,stay_duration_days,month,week,year"
        );
        assert_eq!(
            lines.next().unwrap(),
            "p1,2024-01-10,2024-01-12,ICU,70,2,2024-01,2,2024"
        );
        assert_eq!(
            lines.next().unwrap(),
            "p2,2024-01-11,2024-01-11,Bedah,41,0,2024-01,2,2024"
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn save_keeps_times_when_present() {
        let t = table(
            &["arrival", "departure"],
            &[&["2024-01-10 09:30:00", "2024-01-12"]],
        );
        let (admissions, _) = Admissions::clean(t).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        admissions.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row, "2024-01-10 09:30:00,2024-01-12,1,2024-01,2,2024");
    }
}
