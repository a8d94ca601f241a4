//! Structural importance of variables in the variable/clause incidence graph.
//!
//! The scorer runs power iteration on the bipartite graph whose edges join a
//! variable to every clause it occurs in (either polarity, multiplicity
//! ignored). One round maps variable scores to clause scores and back, which
//! is a multiplication by `BᵗB` for the incidence matrix `B`, so the vector
//! converges toward the dominant eigenvector of the co-occurrence matrix
//! without ever building it.

use crate::formula::{Formula, Literal, Variable};
use log::trace;

pub const DEFAULT_POWER_ITERATIONS: usize = 20;

/// Debit weight applied to a literal for each clause its negation occurs in.
pub const DEFAULT_RAYLEIGH_DAMPING: f64 = 0.15;

/// Boolean adjacency between clauses and the distinct variables they mention.
#[derive(Debug)]
pub struct Incidence {
    clause_vars: Vec<Vec<usize>>,
    var_clauses: Vec<Vec<usize>>,
}

impl Incidence {
    pub fn new(formula: &Formula) -> Self {
        let mut var_clauses = vec![vec![]; formula.num_variables() + 1];
        let clause_vars: Vec<Vec<usize>> = formula
            .clauses()
            .enumerate()
            .map(|(j, clause)| {
                let vars: Vec<usize> = clause.variables().into_iter().map(|v| v.0).collect();
                for &v in &vars {
                    var_clauses[v].push(j);
                }
                vars
            })
            .collect();
        Self {
            clause_vars,
            var_clauses,
        }
    }

    pub fn occurs(&self, v: Variable) -> bool {
        !self.var_clauses[v.0].is_empty()
    }

    pub fn num_variables(&self) -> usize {
        self.var_clauses.len() - 1
    }

    /// Variables occurring in at least one clause, ascending.
    pub fn occurring(&self) -> impl Iterator<Item = Variable> + '_ {
        (1..self.var_clauses.len())
            .filter(move |&v| !self.var_clauses[v].is_empty())
            .map(Variable)
    }
}

/// Importance per variable, indexed by id. Variables that never occur score zero.
#[derive(Clone, PartialEq, Debug)]
pub struct ScoreVector {
    scores: Vec<f64>,
}

impl ScoreVector {
    pub fn get(&self, v: Variable) -> f64 {
        self.scores[v.0]
    }

    pub fn num_variables(&self) -> usize {
        self.scores.len() - 1
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.scores[1..]
    }
}

/// Scales `vec` to unit L2 norm. Returns false, leaving `vec` untouched, if the norm is zero.
fn l2_normalize(vec: &mut [f64]) -> bool {
    let norm = vec.iter().map(|x| x * x).sum::<f64>().sqrt();
    if !(norm > f64::EPSILON * f64::EPSILON) || !norm.is_finite() {
        return false;
    }
    let inv = 1.0 / norm;
    for x in vec.iter_mut() {
        *x *= inv;
    }
    true
}

pub fn score(formula: &Formula, iterations: usize) -> ScoreVector {
    score_incidence(&Incidence::new(formula), iterations)
}

pub fn score_incidence(incidence: &Incidence, iterations: usize) -> ScoreVector {
    let num_vars = incidence.num_variables();
    let mut var_score = vec![0.0; num_vars + 1];
    for v in incidence.occurring() {
        var_score[v.0] = 1.0;
    }
    if !l2_normalize(&mut var_score) {
        return ScoreVector { scores: var_score };
    }

    let mut clause_score = vec![0.0; incidence.clause_vars.len()];
    let mut next = vec![0.0; num_vars + 1];
    for round in 0..iterations {
        for (j, vars) in incidence.clause_vars.iter().enumerate() {
            clause_score[j] = vars.iter().map(|&v| var_score[v]).sum();
        }
        if !l2_normalize(&mut clause_score) {
            trace!("power iteration: zero clause norm at round {}", round);
            break;
        }

        for (v, clauses) in incidence.var_clauses.iter().enumerate() {
            next[v] = clauses.iter().map(|&j| clause_score[j]).sum();
        }
        if !l2_normalize(&mut next) {
            trace!("power iteration: zero variable norm at round {}", round);
            break;
        }
        std::mem::swap(&mut var_score, &mut next);
    }

    ScoreVector { scores: var_score }
}

/// Sum of the scores of each clause's distinct variables.
pub fn clause_masses(incidence: &Incidence, scores: &ScoreVector) -> Vec<f64> {
    incidence
        .clause_vars
        .iter()
        .map(|vars| vars.iter().map(|&v| scores.scores[v]).sum())
        .collect()
}

/// Per-literal values, indexed by variable id for each polarity.
#[derive(Clone, Debug)]
pub struct LiteralScores {
    positive: Vec<f64>,
    negative: Vec<f64>,
}

impl LiteralScores {
    fn zeros(num_vars: usize) -> Self {
        Self {
            positive: vec![0.0; num_vars + 1],
            negative: vec![0.0; num_vars + 1],
        }
    }

    fn slot(&mut self, literal: &Literal) -> &mut f64 {
        if literal.is_positive() {
            &mut self.positive[literal.idx()]
        } else {
            &mut self.negative[literal.idx()]
        }
    }

    pub fn get(&self, literal: &Literal) -> f64 {
        if literal.is_positive() {
            self.positive[literal.idx()]
        } else {
            self.negative[literal.idx()]
        }
    }

    /// The better of the two literals of `v`; the positive one wins ties.
    pub fn best(&self, v: Variable) -> (Literal, f64) {
        let (pos, neg) = (self.positive[v.0], self.negative[v.0]);
        if pos >= neg {
            (Literal::Positive(v), pos)
        } else {
            (Literal::Negative(v), neg)
        }
    }
}

/// Rayleigh-proxy benefit of asserting each literal.
///
/// Satisfying a clause removes it outright, so a literal is credited the
/// square of the mass of every clause it occurs in. Asserting it also
/// falsifies its negation, which only drops one edge from each clause the
/// negation occurs in; that is debited linearly, scaled by `damping`.
pub fn rayleigh_benefits(formula: &Formula, scores: &ScoreVector, damping: f64) -> LiteralScores {
    let incidence = Incidence::new(formula);
    let masses = clause_masses(&incidence, scores);
    let mut benefits = LiteralScores::zeros(formula.num_variables());

    for (clause, &mass) in formula.clauses().zip(&masses) {
        let mut seen: Vec<Literal> = Vec::with_capacity(clause.len());
        for literal in clause.literals() {
            if seen.contains(literal) {
                continue;
            }
            seen.push(*literal);
            *benefits.slot(literal) += mass * mass;
            *benefits.slot(&literal.negated()) -= damping * mass;
        }
    }
    benefits
}

/// Clause mass accumulated by each literal over the clauses it occurs in.
pub fn polarity_pressure(formula: &Formula, scores: &ScoreVector) -> LiteralScores {
    let incidence = Incidence::new(formula);
    let masses = clause_masses(&incidence, scores);
    let mut pressure = LiteralScores::zeros(formula.num_variables());

    for (clause, &mass) in formula.clauses().zip(&masses) {
        for literal in clause.literals() {
            *pressure.slot(literal) += mass;
        }
    }
    pressure
}
