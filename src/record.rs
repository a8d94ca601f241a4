//! Iteration records and the append-only table they are written to.

use crate::formula::Literal;
use crate::solver::{SolverReport, Verdict};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const COLUMNS: [&str; 9] = [
    "iter",
    "k_added_total",
    "new_units",
    "status",
    "conflicts",
    "cpu_time",
    "cnf_path",
    "log_path",
    "rng_seed",
];

#[derive(Clone, Debug, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    pub k_added_total: usize,
    /// Empty for the baseline.
    pub new_units: Vec<Literal>,
    pub verdict: Verdict,
    pub conflicts: Option<u64>,
    pub cpu_time: Option<f64>,
    pub cnf_path: PathBuf,
    pub log_path: PathBuf,
}

impl IterationRecord {
    pub fn new(
        iteration: usize,
        k_added_total: usize,
        new_units: Vec<Literal>,
        report: &SolverReport,
        cnf_path: PathBuf,
        log_path: PathBuf,
    ) -> Self {
        Self {
            iteration,
            k_added_total,
            new_units,
            verdict: report.verdict,
            conflicts: report.conflicts,
            cpu_time: report.cpu_time,
            cnf_path,
            log_path,
        }
    }

    pub fn units_string(&self) -> String {
        self.new_units.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(" ")
    }

    fn fields(&self, seed: Option<u64>) -> [String; 9] {
        [
            self.iteration.to_string(),
            self.k_added_total.to_string(),
            self.units_string(),
            self.verdict.to_string(),
            self.conflicts.map_or_else(|| "-1".to_string(), |c| c.to_string()),
            self.cpu_time.map_or_else(|| "-1".to_string(), |t| t.to_string()),
            self.cnf_path.display().to_string(),
            self.log_path.display().to_string(),
            seed.map(|s| s.to_string()).unwrap_or_default(),
        ]
    }
}

fn csv_field(field: &str) -> String {
    if field.contains(|c: char| c == ',' || c == '"' || c == '\n' || c == '\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields.into_iter().map(csv_field).collect::<Vec<_>>().join(",")
}

/// Writes one CSV row per record, flushing each row so a crash keeps every
/// completed iteration.
///
/// The `rng_seed` column is empty unless a seed was attached with
/// [`RecordWriter::with_seed`].
pub struct RecordWriter<W: Write> {
    out: W,
    seed: Option<u64>,
}

impl RecordWriter<BufWriter<File>> {
    /// Truncates `path` and writes the header row.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
        RecordWriter::new(BufWriter::new(file))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W) -> io::Result<Self> {
        let mut writer = Self { out, seed: None };
        writer.write_line(&csv_line(COLUMNS.iter().copied()))?;
        Ok(writer)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn append(&mut self, record: &IterationRecord) -> io::Result<()> {
        let fields = record.fields(self.seed);
        let line = csv_line(fields.iter().map(|s| s.as_str()));
        self.write_line(&line)
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
