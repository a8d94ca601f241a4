//! Adapter around an external DIMACS solver.
//!
//! The solver is a black box: it is handed a CNF path, its combined
//! stdout/stderr is captured to a log, and only the verdict, the conflict
//! count and the CPU time are read back out of that text.

use crate::error::{Error, Result};
use log::{debug, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
    Sat,
    Unsat,
    Unknown,
}

impl Verdict {
    pub fn is_decided(&self) -> bool {
        *self != Verdict::Unknown
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Verdict::Sat => "SAT",
            Verdict::Unsat => "UNSAT",
            Verdict::Unknown => "UNKNOWN",
        })
    }
}

/// What was extracted from one solver run. `None` means "not reported".
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SolverReport {
    pub verdict: Verdict,
    pub conflicts: Option<u64>,
    pub cpu_time: Option<f64>,
}

impl SolverReport {
    /// Decided without a single conflict: the instance collapsed under propagation.
    pub fn is_trivial(&self) -> bool {
        self.verdict.is_decided() && self.conflicts == Some(0)
    }
}

/// Line prefixes identifying the fields of a report. The defaults match the
/// MiniSat/Glucose family.
#[derive(Clone, Debug)]
pub struct ReportFormat {
    pub verdict_marker: String,
    pub conflicts_label: String,
    pub cpu_time_label: String,
}

impl Default for ReportFormat {
    fn default() -> Self {
        Self {
            verdict_marker: "s ".to_string(),
            conflicts_label: "c conflicts".to_string(),
            cpu_time_label: "c CPU time".to_string(),
        }
    }
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.is_char_boundary(prefix.len())
        && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// The text after the first ':' of `line`, trimmed.
fn value_part(line: &str) -> Option<&str> {
    line.splitn(2, ':').nth(1).map(|rhs| rhs.trim())
}

fn leading_count(value: &str) -> Option<u64> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn leading_seconds(value: &str) -> Option<f64> {
    value
        .split_whitespace()
        .next()
        .and_then(|tok| tok.parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t >= 0.0)
}

pub fn parse_report(text: &str, format: &ReportFormat) -> SolverReport {
    let mut report = SolverReport {
        verdict: Verdict::Unknown,
        conflicts: None,
        cpu_time: None,
    };

    for line in text.lines() {
        let s = line.trim();
        if s.starts_with(format.verdict_marker.as_str()) {
            if s.contains("UNSATISFIABLE") {
                report.verdict = Verdict::Unsat;
            } else if s.contains("SATISFIABLE") {
                report.verdict = Verdict::Sat;
            }
        } else if starts_with_ignore_case(s, &format.conflicts_label) {
            match value_part(s).and_then(leading_count) {
                Some(n) => report.conflicts = Some(n),
                None => debug!("unreadable conflicts line: {}", s),
            }
        } else if starts_with_ignore_case(s, &format.cpu_time_label) {
            match value_part(s).and_then(leading_seconds) {
                Some(t) => report.cpu_time = Some(t),
                None => debug!("unreadable CPU time line: {}", s),
            }
        }
    }

    if report.verdict == Verdict::Unknown {
        warn!("solver report has no verdict line, recording UNKNOWN");
    }
    report
}

/// Anything that can decide a CNF file and leave a log behind.
pub trait SolverBackend {
    fn solve(&mut self, cnf: &Path, log: &Path) -> Result<SolverReport>;
}

pub struct ExternalSolver {
    binary: PathBuf,
    format: ReportFormat,
}

impl ExternalSolver {
    /// Resolves `binary` (a path, or a bare name looked up on `PATH`).
    pub fn locate(binary: impl AsRef<Path>) -> Result<Self> {
        let binary = binary.as_ref();
        let resolved = if binary.components().count() == 1 && !binary.exists() {
            which(binary)
        } else if binary.is_file() {
            Some(binary.to_path_buf())
        } else {
            None
        };
        let binary = resolved
            .ok_or_else(|| Error::Resource(format!("solver binary not found: {}", binary.display())))?;
        Ok(Self {
            binary,
            format: ReportFormat::default(),
        })
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl SolverBackend for ExternalSolver {
    fn solve(&mut self, cnf: &Path, log: &Path) -> Result<SolverReport> {
        debug!("running {} {}", self.binary.display(), cnf.display());
        // solvers exit non-zero on purpose (10/20 for SAT/UNSAT), so the status is ignored
        let output = Command::new(&self.binary).arg(cnf).output().map_err(|e| {
            Error::Resource(format!("failed to run solver {}: {}", self.binary.display(), e))
        })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        fs::write(log, &text)?;

        Ok(parse_report(&text, &self.format))
    }
}

fn which(bin: &Path) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(bin))
        .find(|p| is_executable(p))
}

fn is_executable(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = p.metadata() {
            return (meta.permissions().mode() & 0o111) != 0;
        }
    }
    #[cfg(not(unix))]
    {
        return true;
    }
    false
}
