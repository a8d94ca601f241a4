//! Literal selection policies.
//!
//! Every policy turns a formula into exactly `k` distinct literals over
//! distinct variables, skipping any variable in the caller's avoid set, or
//! fails with [`Error::SelectionExhausted`].

use crate::error::{Error, Result};
use crate::formula::{Formula, Literal, Variable};
use crate::spectral::{self, Incidence};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Draws attempted by the random control before it falls back to a scan.
pub const RANDOM_RETRY_LIMIT: usize = 2000;

/// Variables already committed during a run. Both polarities of a committed
/// variable are off limits.
#[derive(Clone, Debug, Default)]
pub struct UsedVariables {
    used: Vec<bool>,
    count: usize,
}

impl UsedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, v: Variable) -> bool {
        self.used.get(v.0).copied().unwrap_or(false)
    }

    pub fn contains_literal(&self, literal: &Literal) -> bool {
        self.contains(*literal.variable())
    }

    pub fn insert(&mut self, v: Variable) {
        if v.0 >= self.used.len() {
            self.used.resize(v.0 + 1, false);
        }
        if !self.used[v.0] {
            self.used[v.0] = true;
            self.count += 1;
        }
    }

    pub fn commit(&mut self, literals: &[Literal]) {
        for literal in literals {
            self.insert(*literal.variable());
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

pub trait LiteralSelector {
    fn policy(&self) -> Policy;

    /// Picks exactly `k` literals on `formula`, none of whose variables is in `avoid`.
    fn select(&mut self, formula: &Formula, k: usize, avoid: &UsedVariables) -> Result<Vec<Literal>>;
}

/// Takes the `k` best candidates: score descending, then variable id ascending.
fn top_k(mut candidates: Vec<(f64, Literal)>, k: usize, avoid: &UsedVariables) -> Result<Vec<Literal>> {
    candidates.retain(|(_, literal)| !avoid.contains_literal(literal));
    if candidates.len() < k {
        return Err(Error::SelectionExhausted {
            requested: k,
            available: candidates.len(),
        });
    }
    candidates.sort_by(|(sa, la), (sb, lb)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| la.variable().cmp(lb.variable()))
    });
    Ok(candidates.into_iter().take(k).map(|(_, literal)| literal).collect())
}

/// Ranks variables by their dominant-eigenvector score.
pub struct SpectralSelector {
    iterations: usize,
}

impl SpectralSelector {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }
}

impl LiteralSelector for SpectralSelector {
    fn policy(&self) -> Policy {
        Policy::Spectral
    }

    fn select(&mut self, formula: &Formula, k: usize, avoid: &UsedVariables) -> Result<Vec<Literal>> {
        let incidence = Incidence::new(formula);
        let scores = spectral::score_incidence(&incidence, self.iterations);
        let occurrences = formula.occurrences();
        let candidates = incidence
            .occurring()
            .map(|v| (scores.get(v), occurrences.majority_literal(v)))
            .collect();
        top_k(candidates, k, avoid)
    }
}

/// Ranks variables by raw occurrence count.
pub struct FrequencySelector;

impl LiteralSelector for FrequencySelector {
    fn policy(&self) -> Policy {
        Policy::Frequency
    }

    fn select(&mut self, formula: &Formula, k: usize, avoid: &UsedVariables) -> Result<Vec<Literal>> {
        let occurrences = formula.occurrences();
        let candidates = (1..=formula.num_variables())
            .map(Variable)
            .filter(|&v| occurrences.total(v) > 0)
            .map(|v| (occurrences.total(v) as f64, occurrences.majority_literal(v)))
            .collect();
        top_k(candidates, k, avoid)
    }
}

/// Scores literals directly by their Rayleigh-proxy benefit.
pub struct RayleighSelector {
    iterations: usize,
    damping: f64,
}

impl RayleighSelector {
    pub fn new(iterations: usize, damping: f64) -> Self {
        Self { iterations, damping }
    }
}

impl LiteralSelector for RayleighSelector {
    fn policy(&self) -> Policy {
        Policy::Rayleigh
    }

    fn select(&mut self, formula: &Formula, k: usize, avoid: &UsedVariables) -> Result<Vec<Literal>> {
        let incidence = Incidence::new(formula);
        let scores = spectral::score_incidence(&incidence, self.iterations);
        let benefits = spectral::rayleigh_benefits(formula, &scores, self.damping);
        let candidates = incidence
            .occurring()
            .map(|v| {
                let (literal, benefit) = benefits.best(v);
                (benefit, literal)
            })
            .collect();
        top_k(candidates, k, avoid)
    }
}

/// Spectral strength weighted by clause mass, polarity from mass-weighted occurrences.
pub struct PressureSelector {
    iterations: usize,
}

impl PressureSelector {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }
}

impl LiteralSelector for PressureSelector {
    fn policy(&self) -> Policy {
        Policy::Pressure
    }

    fn select(&mut self, formula: &Formula, k: usize, avoid: &UsedVariables) -> Result<Vec<Literal>> {
        let incidence = Incidence::new(formula);
        let scores = spectral::score_incidence(&incidence, self.iterations);
        let pressure = spectral::polarity_pressure(formula, &scores);
        let candidates = incidence
            .occurring()
            .map(|v| {
                let pos = pressure.get(&Literal::Positive(v));
                let neg = pressure.get(&Literal::Negative(v));
                let strength = scores.get(v) * (pos + neg + 1e-12);
                (strength, Literal::with_polarity(v, pos >= neg))
            })
            .collect();
        top_k(candidates, k, avoid)
    }
}

/// Uniformly random literals; the control arm of an experiment.
///
/// Keeps a run-scoped used set of its own, so a variable is never proposed
/// twice in one run even when the caller passes an empty avoid set.
pub struct RandomSelector {
    rng: StdRng,
    used: UsedVariables,
}

impl RandomSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            used: UsedVariables::new(),
        }
    }

    fn blocked(&self, v: Variable, avoid: &UsedVariables) -> bool {
        self.used.contains(v) || avoid.contains(v)
    }
}

impl LiteralSelector for RandomSelector {
    fn policy(&self) -> Policy {
        Policy::Random
    }

    fn select(&mut self, formula: &Formula, k: usize, avoid: &UsedVariables) -> Result<Vec<Literal>> {
        let num_vars = formula.num_variables();
        let mut chosen = Vec::with_capacity(k);
        let mut tries = 0;

        while num_vars > 0 && chosen.len() < k && tries < RANDOM_RETRY_LIMIT {
            tries += 1;
            let v = Variable(self.rng.gen_range(1, num_vars + 1));
            let positive: bool = self.rng.gen();
            if self.blocked(v, avoid) {
                continue;
            }
            self.used.insert(v);
            chosen.push(Literal::with_polarity(v, positive));
        }

        if chosen.len() < k {
            debug!("random selection hit {} retries, scanning", RANDOM_RETRY_LIMIT);
            for v in (1..=num_vars).map(Variable) {
                if chosen.len() >= k {
                    break;
                }
                if !self.blocked(v, avoid) {
                    self.used.insert(v);
                    chosen.push(Literal::Positive(v));
                }
            }
        }

        if chosen.len() < k {
            return Err(Error::SelectionExhausted {
                requested: k,
                available: chosen.len(),
            });
        }
        Ok(chosen)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Policy {
    Spectral,
    Frequency,
    Rayleigh,
    Pressure,
    Random,
}

impl Policy {
    pub const ALL: [&'static str; 5] = ["spectral", "frequency", "rayleigh", "pressure", "random"];

    pub fn name(&self) -> &'static str {
        match self {
            Policy::Spectral => "spectral",
            Policy::Frequency => "frequency",
            Policy::Rayleigh => "rayleigh",
            Policy::Pressure => "pressure",
            Policy::Random => "random",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "spectral" => Ok(Policy::Spectral),
            "frequency" => Ok(Policy::Frequency),
            "rayleigh" => Ok(Policy::Rayleigh),
            "pressure" => Ok(Policy::Pressure),
            "random" => Ok(Policy::Random),
            _ => Err(Error::Config(format!("unknown selection policy '{}'", s))),
        }
    }
}

/// Knobs shared by the policies; each one reads only what it needs.
#[derive(Clone, Copy, Debug)]
pub struct SelectorParams {
    pub power_iterations: usize,
    pub damping: f64,
    pub seed: u64,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            power_iterations: spectral::DEFAULT_POWER_ITERATIONS,
            damping: spectral::DEFAULT_RAYLEIGH_DAMPING,
            seed: 12345,
        }
    }
}

pub fn build(policy: Policy, params: &SelectorParams) -> Box<dyn LiteralSelector> {
    match policy {
        Policy::Spectral => Box::new(SpectralSelector::new(params.power_iterations)),
        Policy::Frequency => Box::new(FrequencySelector),
        Policy::Rayleigh => Box::new(RayleighSelector::new(params.power_iterations, params.damping)),
        Policy::Pressure => Box::new(PressureSelector::new(params.power_iterations)),
        Policy::Random => Box::new(RandomSelector::new(params.seed)),
    }
}
