pub mod dimacs;

use crate::error::{Error, Result};
use std::fmt::Debug;
use std::fmt::{self, Display, Formatter};

/// A DIMACS variable. Ids are 1-based and dense up to `Formula::num_variables`.
#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash, Debug)]
pub struct Variable(pub usize);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Literal {
    Positive(Variable),
    Negative(Variable),
}

impl Literal {
    /// Converts a signed DIMACS integer; zero is the clause terminator and has no literal.
    pub fn from_dimacs(lit: i64) -> Option<Self> {
        if lit > 0 {
            Some(Literal::Positive(Variable(lit as usize)))
        } else if lit < 0 {
            Some(Literal::Negative(Variable(lit.unsigned_abs() as usize)))
        } else {
            None
        }
    }

    pub fn to_dimacs(&self) -> i64 {
        match self {
            Literal::Positive(v) => v.0 as i64,
            Literal::Negative(v) => -(v.0 as i64),
        }
    }

    pub fn with_polarity(variable: Variable, positive: bool) -> Self {
        if positive {
            Literal::Positive(variable)
        } else {
            Literal::Negative(variable)
        }
    }

    pub fn variable(&self) -> &Variable {
        match self {
            Literal::Positive(v) => v,
            Literal::Negative(v) => v,
        }
    }

    pub fn is_positive(&self) -> bool {
        match self {
            Literal::Positive(_) => true,
            Literal::Negative(_) => false,
        }
    }

    pub fn idx(&self) -> usize {
        self.variable().0
    }

    pub fn negated(&self) -> Self {
        match self {
            Literal::Positive(v) => Literal::Negative(*v),
            Literal::Negative(v) => Literal::Positive(*v),
        }
    }

    /// Two literals are opposite when they share a variable and differ in sign.
    pub fn is_opposite(&self, other: &Literal) -> bool {
        self.idx() == other.idx() && self.is_positive() != other.is_positive()
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Clause {
    literals: Vec<Literal>,
}

impl Clause {
    pub fn new(disjuncts: impl IntoIterator<Item = Literal>) -> Self {
        Self {
            literals: disjuncts.into_iter().collect(),
        }
    }

    pub fn unit(literal: Literal) -> Self {
        Self { literals: vec![literal] }
    }

    pub fn literals(&self) -> impl Iterator<Item = &Literal> {
        self.literals.iter()
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// The distinct variables of this clause, in first-occurrence order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut vars: Vec<Variable> = Vec::with_capacity(self.literals.len());
        for literal in &self.literals {
            if !vars.contains(literal.variable()) {
                vars.push(*literal.variable());
            }
        }
        vars
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for literal in &self.literals {
            write!(f, "{} ", literal)?;
        }
        f.write_str("0")
    }
}

/// A CNF instance as read from (and written back to) DIMACS.
///
/// The clause list is authoritative: a serialized header always reports
/// `clauses.len()`, whatever the header of the source file claimed.
#[derive(Clone, PartialEq, Eq)]
pub struct Formula {
    num_variables: usize,
    clauses: Vec<Clause>,
    comments: Vec<String>,
}

impl Formula {
    /// Fails with a format error if any literal names variable 0 or a
    /// variable above `num_variables`.
    pub fn new(num_variables: usize, conjuncts: impl IntoIterator<Item = Clause>) -> Result<Self> {
        let clauses: Vec<Clause> = conjuncts.into_iter().collect();
        for clause in &clauses {
            check_range(clause.literals(), num_variables)?;
        }
        Ok(Self {
            num_variables,
            clauses,
            comments: vec![],
        })
    }

    /// Replaces the comment block. Every line is written back before the
    /// header, so lines the reader would not take as comments get a `c `
    /// prefix and blank lines become a bare `c`.
    pub fn with_comments(mut self, comments: impl IntoIterator<Item = String>) -> Self {
        self.comments = comments
            .into_iter()
            .flat_map(|c| c.lines().map(comment_line).collect::<Vec<_>>())
            .collect();
        self
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.comments.iter().map(|c| c.as_str())
    }

    /// Returns a new formula with one unit clause appended per literal, in order.
    ///
    /// Nothing is deduplicated or simplified; appending both `v` and `-v` is
    /// allowed and left for the solver to refute.
    pub fn with_units(&self, literals: &[Literal]) -> Result<Formula> {
        check_range(literals.iter(), self.num_variables)?;
        let mut next = self.clone();
        next.clauses.extend(literals.iter().copied().map(Clause::unit));
        Ok(next)
    }

    pub fn occurrences(&self) -> Occurrences {
        let mut occurrences = Occurrences {
            positive: vec![0; self.num_variables + 1],
            negative: vec![0; self.num_variables + 1],
        };
        for clause in &self.clauses {
            for literal in clause.literals() {
                if literal.is_positive() {
                    occurrences.positive[literal.idx()] += 1;
                } else {
                    occurrences.negative[literal.idx()] += 1;
                }
            }
        }
        occurrences
    }
}

/// Appends `literals` as unit clauses to `formula`. See [`Formula::with_units`].
pub fn add_units(formula: &Formula, literals: &[Literal]) -> Result<Formula> {
    formula.with_units(literals)
}

fn check_range<'a>(literals: impl IntoIterator<Item = &'a Literal>, num_variables: usize) -> Result<()> {
    for literal in literals {
        if literal.idx() == 0 || literal.idx() > num_variables {
            return Err(Error::Format(format!(
                "literal {} outside variables 1..={}",
                literal, num_variables
            )));
        }
    }
    Ok(())
}

fn comment_line(line: &str) -> String {
    if line.trim().is_empty() {
        "c".to_string()
    } else if line.trim_start().starts_with('c') {
        line.to_string()
    } else {
        format!("c {}", line)
    }
}

/// Raw per-polarity occurrence counts, indexed by variable id (index 0 unused).
#[derive(Clone, Debug)]
pub struct Occurrences {
    positive: Vec<usize>,
    negative: Vec<usize>,
}

impl Occurrences {
    pub fn positive(&self, v: Variable) -> usize {
        self.positive[v.0]
    }

    pub fn negative(&self, v: Variable) -> usize {
        self.negative[v.0]
    }

    pub fn total(&self, v: Variable) -> usize {
        self.positive[v.0] + self.negative[v.0]
    }

    /// Majority polarity by raw count; ties favour the positive literal.
    pub fn majority_literal(&self, v: Variable) -> Literal {
        Literal::with_polarity(v, self.positive(v) >= self.negative(v))
    }
}

impl Debug for Formula {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut first_clause = true;
        for clause in &self.clauses {
            if first_clause {
                first_clause = false;
            } else {
                f.write_str(" & ")?;
            }
            if clause.literals.len() != 1 {
                f.write_str("(")?;
            }
            let mut first_literal = true;
            for literal in &clause.literals {
                if first_literal {
                    first_literal = false;
                } else {
                    f.write_str(" | ")?;
                }
                match literal {
                    Literal::Positive(Variable(x)) => f.write_fmt(format_args!("{}", x))?,
                    Literal::Negative(Variable(x)) => f.write_fmt(format_args!("!{}", x))?,
                }
            }
            if clause.literals.len() != 1 {
                f.write_str(")")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn p(x: usize) -> Literal {
    Literal::Positive(Variable(x))
}

#[cfg(test)]
pub(crate) fn n(x: usize) -> Literal {
    Literal::Negative(Variable(x))
}

/// Random formulas over up to 15 variables, clauses of width 1..=3.
#[cfg(test)]
pub(crate) fn formula_strategy() -> impl proptest::strategy::Strategy<Value = Formula> {
    use proptest::prelude::*;

    (1usize..=15).prop_flat_map(|num_vars| {
        let literal = (1..=num_vars, any::<bool>()).prop_map(|(v, pos)| Literal::with_polarity(Variable(v), pos));
        let clause = proptest::collection::vec(literal, 1..=3).prop_map(Clause::new);
        proptest::collection::vec(clause, 1..=20).prop_map(move |clauses| Formula::new(num_vars, clauses).unwrap())
    })
}
