//! The iteration controller: select literals on the current formula, append
//! them as unit clauses, re-solve, record, and decide whether to go on.
//!
//! ```text
//! INIT -> BASELINE_SOLVED -> { SELECTING, STOPPED }
//! SELECTING -> MUTATED -> SOLVED -> { SELECTING, STOPPED }
//! ```
//!
//! Each iteration depends on the formula produced by the previous one, so
//! the loop is strictly sequential. Artifacts of completed iterations are on
//! disk before the next one starts and are never rolled back.

use crate::config::{AvoidMode, RunConfig, StopPolicy};
use crate::error::{Error, Result};
use crate::formula::{dimacs, Formula, Literal};
use crate::record::{IterationRecord, RecordWriter};
use crate::select::{self, LiteralSelector, Policy, UsedVariables};
use crate::solver::{ExternalSolver, SolverBackend, SolverReport};
use log::{debug, info};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StopReason {
    /// Decided with zero conflicts.
    Collapsed,
    /// Decided, with conflicts.
    Decided,
    /// `k_total` literals have been added.
    BudgetExhausted,
    /// `max_iterations` selection iterations have run.
    IterationLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            StopReason::Collapsed => "solved with 0 conflicts",
            StopReason::Decided => "reached a verdict",
            StopReason::BudgetExhausted => "literal budget exhausted",
            StopReason::IterationLimit => "iteration limit reached",
        })
    }
}

fn stop_reason(policy: StopPolicy, report: &SolverReport) -> Option<StopReason> {
    match policy {
        StopPolicy::Collapsed if report.is_trivial() => Some(StopReason::Collapsed),
        StopPolicy::Decided if report.is_trivial() => Some(StopReason::Collapsed),
        StopPolicy::Decided if report.verdict.is_decided() => Some(StopReason::Decided),
        _ => None,
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub records: Vec<IterationRecord>,
    pub stop: StopReason,
    pub records_path: PathBuf,
}

impl RunOutcome {
    fn last(&self) -> &IterationRecord {
        // the baseline record is always present
        &self.records[self.records.len() - 1]
    }

    pub fn final_cnf(&self) -> &Path {
        &self.last().cnf_path
    }

    pub fn final_log(&self) -> &Path {
        &self.last().log_path
    }

    pub fn k_added_total(&self) -> usize {
        self.last().k_added_total
    }
}

/// Mutable state of one run. The current formula is replaced each iteration, never edited.
struct RunState {
    current: Formula,
    used: UsedVariables,
    k_added: usize,
    iteration: usize,
}

pub struct Controller<B> {
    config: RunConfig,
    backend: B,
    selector: Box<dyn LiteralSelector>,
}

impl Controller<ExternalSolver> {
    /// Validates `config` and locates the solver binary and input file before anything is written.
    pub fn from_config(config: RunConfig) -> Result<Self> {
        config.validate()?;
        check_input(&config.input)?;
        let solver = ExternalSolver::locate(&config.solver)?.with_format(config.report.clone());
        info!("solver: {}", solver.binary().display());
        Ok(Self::new(config, solver))
    }
}

fn check_input(input: &Path) -> Result<()> {
    if input.is_file() {
        Ok(())
    } else {
        Err(Error::Resource(format!("input CNF not found: {}", input.display())))
    }
}

fn write_formula(formula: &Formula, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    dimacs::write(formula, &mut out)?;
    out.flush()?;
    Ok(())
}

impl<B: SolverBackend> Controller<B> {
    pub fn new(config: RunConfig, backend: B) -> Self {
        let selector = select::build(config.policy, &config.selector);
        Self {
            config,
            backend,
            selector,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn run(&mut self) -> Result<RunOutcome> {
        self.config.validate()?;
        check_input(&self.config.input)?;

        // INIT
        let text = fs::read_to_string(&self.config.input)?;
        let baseline = dimacs::parse_str(&text)?;
        let layout = self.config.artifacts.clone();
        fs::create_dir_all(layout.cnf_dir())?;
        fs::create_dir_all(layout.log_dir())?;
        fs::create_dir_all(layout.results_dir())?;

        let records_path = layout.records_path(self.config.policy);
        let mut table = RecordWriter::create(&records_path)?;
        if self.config.policy == Policy::Random {
            table = table.with_seed(self.config.selector.seed);
        }
        let mut records = vec![];

        info!(
            "{} run on {}: k_total={} k_step={} stop={} avoid={}",
            self.config.policy,
            self.config.input.display(),
            self.config.k_total,
            self.config.k_step,
            self.config.stop,
            self.config.avoid
        );

        // BASELINE_SOLVED
        let cnf0 = layout.cnf_path(0);
        let log0 = layout.log_path(0);
        fs::write(&cnf0, &text)?;
        let report = self.backend.solve(&cnf0, &log0)?;
        let record = IterationRecord::new(0, 0, vec![], &report, cnf0, log0);
        table.append(&record)?;
        info!(
            "[iter 0] status={} conflicts={} cpu={} (baseline)",
            report.verdict,
            fmt_conflicts(&report),
            fmt_cpu(&report)
        );
        records.push(record);

        if self.config.stop_at_baseline {
            if let Some(stop) = stop_reason(self.config.stop, &report) {
                info!("baseline already {}, stopping", stop);
                return Ok(RunOutcome {
                    records,
                    stop,
                    records_path,
                });
            }
        }

        let mut state = RunState {
            current: baseline,
            used: UsedVariables::new(),
            k_added: 0,
            iteration: 0,
        };
        let fresh = UsedVariables::new();

        let stop = loop {
            if state.k_added >= self.config.k_total {
                break StopReason::BudgetExhausted;
            }
            if self.config.max_iterations.map_or(false, |max| state.iteration >= max) {
                break StopReason::IterationLimit;
            }
            state.iteration += 1;

            // SELECTING
            let want = self.config.k_step.min(self.config.k_total - state.k_added);
            let avoid = match self.config.avoid {
                AvoidMode::Committed => &state.used,
                AvoidMode::Fresh => &fresh,
            };
            let units = self.selector.select(&state.current, want, avoid)?;
            if units.len() != want {
                return Err(Error::SelectionExhausted {
                    requested: want,
                    available: units.len(),
                });
            }
            debug!("[iter {}] selected {}", state.iteration, fmt_units(&units));
            state.used.commit(&units);
            state.k_added += units.len();

            // MUTATED
            let next = state.current.with_units(&units)?;
            let cnf = layout.cnf_path(state.iteration);
            let log = layout.log_path(state.iteration);
            write_formula(&next, &cnf)?;

            // SOLVED
            let report = self.backend.solve(&cnf, &log)?;
            let record = IterationRecord::new(state.iteration, state.k_added, units, &report, cnf, log);
            table.append(&record)?;
            info!(
                "[iter {}] +{} units (total={}): [{}] | status={} conflicts={} cpu={}",
                state.iteration,
                record.new_units.len(),
                state.k_added,
                record.units_string(),
                report.verdict,
                fmt_conflicts(&report),
                fmt_cpu(&report)
            );
            records.push(record);
            state.current = next;

            if let Some(stop) = stop_reason(self.config.stop, &report) {
                break stop;
            }
        };

        info!("stopping: {}", stop);
        Ok(RunOutcome {
            records,
            stop,
            records_path,
        })
    }
}

fn fmt_units(units: &[Literal]) -> String {
    units.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(" ")
}

fn fmt_conflicts(report: &SolverReport) -> String {
    report.conflicts.map_or_else(|| "n/a".to_string(), |c| c.to_string())
}

fn fmt_cpu(report: &SolverReport) -> String {
    report.cpu_time.map_or_else(|| "n/a".to_string(), |t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brute_force::BruteForceSolver;
    use crate::formula::{n, p, Clause};
    use crate::select::Policy;
    use crate::solver::Verdict;
    use std::collections::{HashSet, VecDeque};
    use tempfile::TempDir;
    use test_env_log::test;

    /// Replays canned reports; UNKNOWN once they run out.
    struct ScriptedSolver {
        reports: VecDeque<SolverReport>,
        calls: usize,
    }

    impl ScriptedSolver {
        fn new(reports: Vec<SolverReport>) -> Self {
            Self {
                reports: reports.into(),
                calls: 0,
            }
        }
    }

    impl SolverBackend for ScriptedSolver {
        fn solve(&mut self, cnf: &Path, log: &Path) -> Result<SolverReport> {
            assert!(cnf.is_file(), "solver called on missing {}", cnf.display());
            self.calls += 1;
            fs::write(log, "c scripted\n")?;
            Ok(self.reports.pop_front().unwrap_or(UNKNOWN))
        }
    }

    const UNKNOWN: SolverReport = SolverReport {
        verdict: Verdict::Unknown,
        conflicts: None,
        cpu_time: None,
    };

    fn report(verdict: Verdict, conflicts: u64) -> SolverReport {
        SolverReport {
            verdict,
            conflicts: Some(conflicts),
            cpu_time: Some(0.01),
        }
    }

    const INSTANCE: &str = "c test instance
p cnf 6 7
1 2 -3 0
-1 4 5 0
2 -4 6 0
1 -2 -6 0
3 4 -5 0
-1 -3 6 0
1 5 0
";

    fn setup(text: &str) -> (TempDir, RunConfig) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.cnf");
        fs::write(&input, text).unwrap();
        let mut config = RunConfig::new(&input, "unused", "t").with_output_root(dir.path().join("shared"));
        config.stop = StopPolicy::Budget;
        (dir, config)
    }

    fn units_of(outcome: &RunOutcome) -> Vec<Vec<Literal>> {
        outcome.records.iter().map(|r| r.new_units.clone()).collect()
    }

    #[test]
    fn budget_run_performs_k_total_over_k_step_iterations() {
        let (_dir, mut config) = setup(INSTANCE);
        config.policy = Policy::Frequency;
        config.k_total = 6;
        config.k_step = 2;

        let mut controller = Controller::new(config, ScriptedSolver::new(vec![]));
        let outcome = controller.run().unwrap();

        assert_eq!(outcome.stop, StopReason::BudgetExhausted);
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(controller.backend().calls, 4);
        let totals: Vec<usize> = outcome.records.iter().map(|r| r.k_added_total).collect();
        assert_eq!(totals, vec![0, 2, 4, 6]);
        assert!(outcome.records[0].new_units.is_empty());

        for (i, record) in outcome.records.iter().enumerate() {
            assert_eq!(record.iteration, i);
            assert!(record.cnf_path.is_file());
            assert!(record.log_path.is_file());
        }

        let final_cnf = dimacs::parse_str(&fs::read_to_string(outcome.final_cnf()).unwrap()).unwrap();
        assert_eq!(final_cnf.num_clauses(), 7 + 6);
        assert_eq!(final_cnf.num_variables(), 6);
        assert_eq!(final_cnf.comments().collect::<Vec<_>>(), vec!["c test instance"]);

        let table = fs::read_to_string(&outcome.records_path).unwrap();
        assert_eq!(table.lines().count(), 5);
        assert!(table.lines().nth(1).unwrap().starts_with("0,0,,UNKNOWN,-1,-1,"));
    }

    #[test]
    fn baseline_artifact_is_a_verbatim_copy() {
        let (_dir, mut config) = setup(INSTANCE);
        config.k_total = 2;
        let mut controller = Controller::new(config, ScriptedSolver::new(vec![]));
        let outcome = controller.run().unwrap();
        assert_eq!(fs::read_to_string(&outcome.records[0].cnf_path).unwrap(), INSTANCE);
    }

    #[test]
    fn random_runs_record_their_seed() {
        let (_dir, mut config) = setup(INSTANCE);
        config.policy = Policy::Random;
        config.selector.seed = 7;
        config.k_total = 2;
        let outcome = Controller::new(config, ScriptedSolver::new(vec![])).run().unwrap();
        let table = fs::read_to_string(&outcome.records_path).unwrap();
        assert!(table.lines().next().unwrap().ends_with(",rng_seed"));
        assert!(table.lines().skip(1).all(|row| row.ends_with(",7")));

        let (_dir, mut config) = setup(INSTANCE);
        config.k_total = 2;
        let outcome = Controller::new(config, ScriptedSolver::new(vec![])).run().unwrap();
        let table = fs::read_to_string(&outcome.records_path).unwrap();
        assert!(table.lines().skip(1).all(|row| row.ends_with(',')));
    }

    #[test]
    fn last_step_takes_the_remainder() {
        let (_dir, mut config) = setup(INSTANCE);
        config.k_total = 5;
        config.k_step = 2;
        let outcome = Controller::new(config, ScriptedSolver::new(vec![])).run().unwrap();
        let sizes: Vec<usize> = outcome.records.iter().map(|r| r.new_units.len()).collect();
        assert_eq!(sizes, vec![0, 2, 2, 1]);
        assert_eq!(outcome.k_added_total(), 5);
    }

    #[test]
    fn collapsed_stop_ignores_baseline_by_default() {
        let (_dir, mut config) = setup(INSTANCE);
        config.stop = StopPolicy::Collapsed;
        let scripted = ScriptedSolver::new(vec![
            report(Verdict::Sat, 0),
            report(Verdict::Sat, 12),
            report(Verdict::Unknown, 0),
            report(Verdict::Unsat, 0),
        ]);
        let outcome = Controller::new(config, scripted).run().unwrap();
        assert_eq!(outcome.stop, StopReason::Collapsed);
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.records[3].verdict, Verdict::Unsat);
    }

    #[test]
    fn stop_at_baseline() {
        let (_dir, mut config) = setup(INSTANCE);
        config.stop = StopPolicy::Collapsed;
        config.stop_at_baseline = true;
        let mut controller = Controller::new(config, ScriptedSolver::new(vec![report(Verdict::Sat, 0)]));
        let outcome = controller.run().unwrap();
        assert_eq!(outcome.stop, StopReason::Collapsed);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(controller.backend().calls, 1);
    }

    #[test]
    fn decided_stop_is_stricter() {
        let (_dir, mut config) = setup(INSTANCE);
        config.stop = StopPolicy::Decided;
        let scripted = ScriptedSolver::new(vec![report(Verdict::Sat, 40), report(Verdict::Sat, 12)]);
        let outcome = Controller::new(config, scripted).run().unwrap();
        assert_eq!(outcome.stop, StopReason::Decided);
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn iteration_limit() {
        let (_dir, mut config) = setup(INSTANCE);
        config.k_total = 6;
        config.k_step = 1;
        config.max_iterations = Some(3);
        let outcome = Controller::new(config, ScriptedSolver::new(vec![])).run().unwrap();
        assert_eq!(outcome.stop, StopReason::IterationLimit);
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.k_added_total(), 3);
    }

    #[test]
    fn committed_mode_never_revisits_a_variable() {
        for policy in &[Policy::Spectral, Policy::Frequency, Policy::Rayleigh, Policy::Pressure, Policy::Random] {
            let (_dir, mut config) = setup(INSTANCE);
            config.policy = *policy;
            config.k_total = 6;
            config.k_step = 1;
            let outcome = Controller::new(config, ScriptedSolver::new(vec![])).run().unwrap();
            let mut seen = HashSet::new();
            for lit in units_of(&outcome).into_iter().flatten() {
                assert!(seen.insert(lit.idx()), "{} reselected variable {}", policy, lit.idx());
            }
            assert_eq!(seen.len(), 6);
        }
    }

    #[test]
    fn fresh_mode_reselects_on_current_formula() {
        let text = "p cnf 3 3\n1 2 0\n1 3 0\n-1 2 0\n";

        let (_dir, mut config) = setup(text);
        config.policy = Policy::Frequency;
        config.k_total = 2;
        config.avoid = AvoidMode::Fresh;
        let outcome = Controller::new(config, ScriptedSolver::new(vec![])).run().unwrap();
        assert_eq!(units_of(&outcome), vec![vec![], vec![p(1)], vec![p(1)]]);

        let (_dir, mut config) = setup(text);
        config.policy = Policy::Frequency;
        config.k_total = 2;
        config.avoid = AvoidMode::Committed;
        let outcome = Controller::new(config, ScriptedSolver::new(vec![])).run().unwrap();
        assert_eq!(units_of(&outcome), vec![vec![], vec![p(1)], vec![p(2)]]);
    }

    #[test]
    fn exhaustion_aborts_but_keeps_completed_rows() {
        let (_dir, mut config) = setup("p cnf 4 1\n1 -2 0\n");
        config.policy = Policy::Spectral;
        config.k_total = 3;
        config.k_step = 1;
        let records_path = config.artifacts.records_path(Policy::Spectral);
        let cnf2 = config.artifacts.cnf_path(2);

        match Controller::new(config, ScriptedSolver::new(vec![])).run() {
            Err(Error::SelectionExhausted { requested: 1, available: 0 }) => {}
            other => panic!("expected exhaustion, got {:?}", other.map(|o| o.stop)),
        }
        let table = fs::read_to_string(records_path).unwrap();
        assert_eq!(table.lines().count(), 1 + 3);
        assert!(cnf2.is_file());
    }

    #[test]
    fn config_errors_come_before_any_io() {
        let (dir, mut config) = setup(INSTANCE);
        config.k_total = 2;
        config.k_step = 3;
        let mut controller = Controller::new(config, ScriptedSolver::new(vec![]));
        assert!(matches!(controller.run(), Err(Error::Config(_))));
        assert!(!dir.path().join("shared").exists());
        assert_eq!(controller.backend().calls, 0);
    }

    #[test]
    fn missing_input_is_resource_error() {
        let (dir, mut config) = setup(INSTANCE);
        config.input = dir.path().join("nope.cnf");
        let mut controller = Controller::new(config, ScriptedSolver::new(vec![]));
        assert!(matches!(controller.run(), Err(Error::Resource(_))));
        assert_eq!(controller.backend().calls, 0);
    }

    #[test]
    fn missing_solver_is_resource_error() {
        let (_dir, mut config) = setup(INSTANCE);
        config.solver = PathBuf::from("/no/such/solver");
        assert!(matches!(Controller::from_config(config), Err(Error::Resource(_))));
    }

    #[test]
    fn malformed_header_never_reaches_the_solver() {
        let (_dir, config) = setup("1 2 0\np cnf 2 1\n");
        let mut controller = Controller::new(config, ScriptedSolver::new(vec![]));
        assert!(matches!(controller.run(), Err(Error::Format(_))));
        assert_eq!(controller.backend().calls, 0);
    }

    #[test]
    fn brute_force_end_to_end() {
        // fixing 2 to false leaves the all-true assignment of the rest as a model
        let (_dir, mut config) = setup("p cnf 3 3\n-1 -2 0\n-1 2 3 0\n-2 -3 0\n");
        config.policy = Policy::Frequency;
        config.stop = StopPolicy::Collapsed;
        config.k_total = 3;
        let outcome = Controller::new(config, BruteForceSolver).run().unwrap();

        assert!(outcome.records.iter().all(|r| r.verdict == Verdict::Sat));
        assert_eq!(outcome.records[1].new_units, vec![n(2)]);
        assert_eq!(outcome.stop, StopReason::Collapsed);
        let last = dimacs::parse_str(&fs::read_to_string(outcome.final_cnf()).unwrap()).unwrap();
        assert_eq!(last.clauses().last(), Some(&Clause::unit(*outcome.records.last().unwrap().new_units.last().unwrap())));
    }

    #[test]
    fn brute_force_unsat_stops_when_decided() {
        let (_dir, mut config) = setup("p cnf 2 3\n1 0\n-1 2 0\n-2 0\n");
        config.policy = Policy::Spectral;
        config.stop = StopPolicy::Decided;
        config.k_total = 2;
        let outcome = Controller::new(config, BruteForceSolver).run().unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[1].verdict, Verdict::Unsat);
        assert_eq!(outcome.stop, StopReason::Decided);
    }
}
