//! Seeded random k-SAT instances, for building experiment inputs.

use crate::error::{Error, Result};
use crate::formula::{Clause, Formula, Literal, Variable};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

/// `num_clauses` clauses over `num_vars` variables, each with `width` distinct
/// variables and uniform polarities.
pub fn random_ksat(num_vars: usize, num_clauses: usize, width: usize, seed: u64) -> Result<Formula> {
    if num_vars == 0 {
        return Err(Error::Config("number of variables must be > 0".into()));
    }
    if width == 0 || width > num_vars {
        return Err(Error::Config(format!(
            "clause width must be between 1 and {} (got {})",
            num_vars, width
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let clauses: Vec<Clause> = (0..num_clauses)
        .map(|_| {
            let vars = index::sample(&mut rng, num_vars, width);
            Clause::new(
                vars.into_iter()
                    .map(|i| Literal::with_polarity(Variable(i + 1), rng.gen::<bool>()))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    Formula::new(num_vars, clauses)
}
