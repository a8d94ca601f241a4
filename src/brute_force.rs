use crate::error::Result;
use crate::formula::{dimacs, Formula};
use crate::solver::{parse_report, ReportFormat, SolverBackend, SolverReport};
use std::fs;
use std::path::Path;

/// Outcome of enumerating the assignments of a small formula.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Enumeration {
    pub satisfiable: bool,
    /// Assignments rejected before a model was found (all of them when unsatisfiable).
    pub rejected: u64,
}

// Simple brute-force enumeration for use as a test solver backend. Unit
// clauses fix their variable up front; only the remaining variables are
// enumerated, so every added unit shrinks the search.
#[cfg(test)]
pub(crate) fn solve_brute_force(f: &Formula) -> Enumeration {
    let mut fixed: Vec<Option<bool>> = vec![None; f.num_variables() + 1];
    for clause in f.clauses().filter(|c| c.len() == 1) {
        for literal in clause.literals() {
            match fixed[literal.idx()] {
                Some(value) if value != literal.is_positive() => {
                    return Enumeration {
                        satisfiable: false,
                        rejected: 0,
                    }
                }
                _ => fixed[literal.idx()] = Some(literal.is_positive()),
            }
        }
    }
    let free: Vec<usize> = (1..=f.num_variables()).filter(|&v| fixed[v].is_none()).collect();
    assert!(free.len() <= 15); // just for safety

    fn assignment_for(assignment: u32, x: usize) -> bool {
        assignment & (1 << x) == 0
    }

    let mut values = fixed.clone();
    let mut rejected = 0;
    'search: for assignment in 0..2u32.pow(free.len() as u32) {
        for (bit, &v) in free.iter().enumerate() {
            values[v] = Some(assignment_for(assignment, bit));
        }
        'clauses: for clause in f.clauses() {
            for literal in clause.literals() {
                if values[literal.idx()] == Some(literal.is_positive()) {
                    // this clause is satisfied, let's go to the next one
                    continue 'clauses;
                }
            }
            // if we got here, this clause was not satisfied, so this assignment is bogus
            rejected += 1;
            continue 'search;
        }
        // if we got here, every clause was satisfied, so we're done and satisfiable
        return Enumeration {
            satisfiable: true,
            rejected,
        };
    }
    // no assignment is valid
    Enumeration {
        satisfiable: false,
        rejected,
    }
}

/// Test backend that enumerates instead of shelling out, and reports rejected
/// assignments as conflicts in a glucose-style log.
#[cfg(test)]
pub(crate) struct BruteForceSolver;

#[cfg(test)]
impl SolverBackend for BruteForceSolver {
    fn solve(&mut self, cnf: &Path, log: &Path) -> Result<SolverReport> {
        let formula = dimacs::parse_str(&fs::read_to_string(cnf)?)?;
        let result = solve_brute_force(&formula);
        let text = format!(
            "c brute force\nc conflicts : {} (0 /sec)\nc CPU time : 0.000001 s\ns {}\n",
            result.rejected,
            if result.satisfiable { "SATISFIABLE" } else { "UNSATISFIABLE" }
        );
        fs::write(log, &text)?;
        Ok(parse_report(&text, &ReportFormat::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{n, p, Clause};
    use crate::solver::Verdict;
    use test_env_log::test;

    #[test]
    fn solve_sat_first_try() {
        let f = Formula::new(2, vec![Clause::new(vec![p(1), p(2)]), Clause::new(vec![p(1), n(2)])]).unwrap();
        assert_eq!(
            solve_brute_force(&f),
            Enumeration {
                satisfiable: true,
                rejected: 0
            }
        );
    }

    #[test]
    fn solve_sat_after_rejections() {
        let c1 = Clause::new(vec![n(1), n(2)]);
        let c2 = Clause::new(vec![n(1), p(2), p(3)]);
        let c3 = Clause::new(vec![n(2), n(3)]);
        let f = Formula::new(3, vec![c1, c2, c3]).unwrap();
        assert_eq!(
            solve_brute_force(&f),
            Enumeration {
                satisfiable: true,
                rejected: 2
            }
        );

        // pinning 2 to false makes the first assignment a model
        assert_eq!(solve_brute_force(&f.with_units(&[n(2)]).unwrap()).rejected, 0);
    }

    #[test]
    fn solve_unsat() {
        let c1 = Clause::new(vec![p(1), p(2)]);
        let c2 = Clause::new(vec![n(1)]);
        let c3 = Clause::new(vec![n(2)]);
        let f = Formula::new(2, vec![c1, c2, c3]).unwrap();
        assert!(!solve_brute_force(&f).satisfiable);
    }

    #[test]
    fn contradictory_units_fail_immediately() {
        let f = Formula::new(1, vec![Clause::new(vec![p(1)])]).unwrap().with_units(&[n(1)]).unwrap();
        assert_eq!(
            solve_brute_force(&f),
            Enumeration {
                satisfiable: false,
                rejected: 0
            }
        );
    }

    #[test]
    fn backend_writes_a_parseable_log() {
        let dir = tempfile::tempdir().unwrap();
        let cnf = dir.path().join("x.cnf");
        let log = dir.path().join("x.log");
        fs::write(&cnf, "p cnf 2 3\n1 2 0\n-1 0\n-2 0\n").unwrap();

        let report = BruteForceSolver.solve(&cnf, &log).unwrap();
        // both variables are pinned, leaving the single assignment to reject
        assert_eq!(report.verdict, Verdict::Unsat);
        assert_eq!(report.conflicts, Some(1));
        assert!(!report.is_trivial());
        assert!(fs::read_to_string(&log).unwrap().contains("s UNSATISFIABLE"));
    }
}
