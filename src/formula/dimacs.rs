use crate::formula::{Clause, Formula, Literal};
use std::io::{self, BufRead, BufReader, Read, Write};

pub fn parse<R: Read>(reader: R) -> Result<Formula, DimacsParseError> {
    let reader = BufReader::new(reader);

    let mut comments = vec![];
    let mut clauses = vec![];
    let mut num_variables = None;

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }
        // SATLIB benchmarks end the clause section with a '%' line
        if trimmed.starts_with('%') {
            break;
        }
        if trimmed.starts_with('c') {
            comments.push(line.clone());
            continue;
        }

        let mut tokens = trimmed.split_whitespace().peekable();
        match tokens.peek() {
            Some(&"p") => {
                let _ = tokens.next();

                if num_variables.is_some() {
                    return Err(DimacsParseError::Format("duplicate 'p' line".into()));
                }
                if tokens.next() != Some("cnf") {
                    return Err(DimacsParseError::Format("missing 'cnf'".into()));
                }

                let vars = tokens
                    .next()
                    .and_then(|c| c.parse::<usize>().ok())
                    .filter(|&v| v > 0)
                    .ok_or_else(|| DimacsParseError::Format("invalid num_variables".into()))?;

                // the declared clause count is advisory, but it still has to be a number
                let _num_clauses = tokens
                    .next()
                    .and_then(|c| c.parse::<usize>().ok())
                    .ok_or_else(|| DimacsParseError::Format("invalid num_clauses".into()))?;

                num_variables = Some(vars);
            }
            Some(_) => {
                let vars = num_variables
                    .ok_or_else(|| DimacsParseError::Format("missing 'p' line before clauses".into()))?;

                let mut clause = vec![];
                let mut pending = false;
                for x in tokens {
                    match parse_literal(x, vars)? {
                        Some(l) => {
                            clause.push(l);
                            pending = true;
                        }
                        None => {
                            clauses.push(Clause::new(clause.drain(..)));
                            pending = false;
                        }
                    }
                }
                if pending {
                    clauses.push(Clause::new(clause));
                }
            }
            None => continue,
        }
    }

    let num_variables =
        num_variables.ok_or_else(|| DimacsParseError::Format("DIMACS header 'p cnf <vars> <clauses>' not found".into()))?;

    let formula = Formula::new(num_variables, clauses).map_err(|e| DimacsParseError::Format(e.to_string()))?;
    Ok(formula.with_comments(comments))
}

pub fn parse_str(text: &str) -> Result<Formula, DimacsParseError> {
    parse(text.as_bytes())
}

fn parse_literal(s: &str, num_variables: usize) -> Result<Option<Literal>, DimacsParseError> {
    let l = s
        .parse::<i64>()
        .map_err(|_| DimacsParseError::Format(format!("non-integer token in clause line: {}", s)))?;
    match Literal::from_dimacs(l) {
        Some(literal) if literal.idx() > num_variables => Err(DimacsParseError::Format(format!(
            "literal {} exceeds declared variable count {}",
            l, num_variables
        ))),
        other => Ok(other),
    }
}

/// Writes comments, a header carrying the current clause count, then one
/// zero-terminated line per clause.
pub fn write<W: Write>(formula: &Formula, writer: &mut W) -> io::Result<()> {
    for comment in formula.comments() {
        writeln!(writer, "{}", comment)?;
    }
    writeln!(writer, "p cnf {} {}", formula.num_variables(), formula.num_clauses())?;
    for clause in formula.clauses() {
        writeln!(writer, "{}", clause)?;
    }
    Ok(())
}

pub fn serialize(formula: &Formula) -> String {
    let mut out = Vec::new();
    // writing into a Vec cannot fail
    let _ = write(formula, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Debug)]
pub enum DimacsParseError {
    Io(std::io::Error),
    Format(String),
}

impl From<std::io::Error> for DimacsParseError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
