//! Guess a few unit clauses for a CNF instance by structural importance, and
//! measure what they do to an external SAT solver's effort.

pub mod config;
pub mod controller;
pub mod error;
pub mod formula;
pub mod generate;
pub mod record;
pub mod select;
pub mod solver;
pub mod spectral;

#[cfg(test)]
mod brute_force;

pub use config::{ArtifactLayout, AvoidMode, RunConfig, StopPolicy};
pub use controller::{Controller, RunOutcome, StopReason};
pub use error::{Error, Result};
pub use formula::{add_units, Clause, Formula, Literal, Variable};
pub use record::IterationRecord;
pub use select::{LiteralSelector, Policy, SelectorParams, UsedVariables};
pub use solver::{ExternalSolver, SolverBackend, SolverReport, Verdict};
pub use spectral::ScoreVector;
