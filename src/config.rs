//! Run parameters and their validation.

use crate::error::{Error, Result};
use crate::select::{Policy, SelectorParams};
use crate::solver::ReportFormat;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// When a solved iteration ends the run. Running out of literal budget or
/// iterations always ends it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StopPolicy {
    /// Decided (SAT or UNSAT) with zero conflicts.
    Collapsed,
    /// Decided, whatever the conflict count.
    Decided,
    /// Only the budgets stop the run.
    Budget,
}

impl StopPolicy {
    pub const ALL: [&'static str; 3] = ["collapsed", "decided", "budget"];

    pub fn name(&self) -> &'static str {
        match self {
            StopPolicy::Collapsed => "collapsed",
            StopPolicy::Decided => "decided",
            StopPolicy::Budget => "budget",
        }
    }
}

impl fmt::Display for StopPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StopPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "collapsed" => Ok(StopPolicy::Collapsed),
            "decided" => Ok(StopPolicy::Decided),
            "budget" => Ok(StopPolicy::Budget),
            _ => Err(Error::Config(format!("unknown stop policy '{}'", s))),
        }
    }
}

/// Whether selections avoid the variables committed earlier in the run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AvoidMode {
    /// Every committed variable stays excluded for the rest of the run.
    Committed,
    /// Each selection looks at the current formula afresh.
    Fresh,
}

impl AvoidMode {
    pub const ALL: [&'static str; 2] = ["committed", "fresh"];

    pub fn name(&self) -> &'static str {
        match self {
            AvoidMode::Committed => "committed",
            AvoidMode::Fresh => "fresh",
        }
    }
}

impl fmt::Display for AvoidMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AvoidMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "committed" => Ok(AvoidMode::Committed),
            "fresh" => Ok(AvoidMode::Fresh),
            _ => Err(Error::Config(format!("unknown avoid mode '{}'", s))),
        }
    }
}

/// Where a run writes its CNF files, solver logs and record table.
#[derive(Clone, Debug)]
pub struct ArtifactLayout {
    pub root: PathBuf,
    pub tag: String,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            tag: tag.into(),
        }
    }

    pub fn cnf_dir(&self) -> PathBuf {
        self.root.join("cnf")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn cnf_path(&self, iteration: usize) -> PathBuf {
        self.cnf_dir().join(format!("{}_iter{}.cnf", self.tag, iteration))
    }

    pub fn log_path(&self, iteration: usize) -> PathBuf {
        self.log_dir().join(format!("{}_iter{}.log", self.tag, iteration))
    }

    pub fn records_path(&self, policy: Policy) -> PathBuf {
        self.results_dir().join(format!("{}_{}.csv", self.tag, policy))
    }
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub input: PathBuf,
    pub solver: PathBuf,
    pub artifacts: ArtifactLayout,
    pub policy: Policy,
    pub selector: SelectorParams,
    /// Total number of literals the run may add.
    pub k_total: usize,
    /// Literals added per iteration (the last one may add fewer).
    pub k_step: usize,
    /// Optional cap on selection iterations, on top of `k_total`.
    pub max_iterations: Option<usize>,
    pub stop: StopPolicy,
    /// Apply `stop` to the baseline solve as well.
    pub stop_at_baseline: bool,
    pub avoid: AvoidMode,
    /// Labels of the solver output lines that carry the verdict and counters.
    pub report: ReportFormat,
}

impl RunConfig {
    pub fn new(input: impl Into<PathBuf>, solver: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            solver: solver.into(),
            artifacts: ArtifactLayout::new("shared", tag),
            policy: Policy::Spectral,
            selector: SelectorParams::default(),
            k_total: 10,
            k_step: 1,
            max_iterations: None,
            stop: StopPolicy::Collapsed,
            stop_at_baseline: false,
            avoid: AvoidMode::Committed,
            report: ReportFormat::default(),
        }
    }

    pub fn with_output_root(mut self, root: impl AsRef<Path>) -> Self {
        self.artifacts.root = root.as_ref().to_path_buf();
        self
    }

    /// Checks the numeric parameters. Touches no files.
    pub fn validate(&self) -> Result<()> {
        if self.k_total == 0 {
            return Err(Error::Config("k_total must be > 0".into()));
        }
        if self.k_step == 0 {
            return Err(Error::Config("k_step must be > 0".into()));
        }
        if self.k_step > self.k_total {
            return Err(Error::Config(format!(
                "k_step ({}) cannot be greater than k_total ({})",
                self.k_step, self.k_total
            )));
        }
        if self.max_iterations == Some(0) {
            return Err(Error::Config("max_iterations must be > 0".into()));
        }
        if self.selector.power_iterations == 0 {
            return Err(Error::Config("power iterations must be > 0".into()));
        }
        if !(self.selector.damping.is_finite() && self.selector.damping >= 0.0) {
            return Err(Error::Config("damping must be a non-negative number".into()));
        }
        if self.artifacts.tag.is_empty() {
            return Err(Error::Config("tag must not be empty".into()));
        }
        Ok(())
    }
}
