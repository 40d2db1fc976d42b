//! Formulas in conjunctive normal form, and the DIMACS format
//!
//! Besides parsing and printing, a formula can be evaluated under an
//! assignment and randomized into an isomorphic formula (clause order,
//! variable names and signs), which is how benchmark corpora are perturbed.

use crate::{
    assignment::Assignment,
    error::Result,
    files::{read_compressed_file, write_compressed_file},
    input::Input,
    literal::{Literal, Variable},
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::{
    cell::OnceCell,
    collections::{BTreeMap, HashSet},
    fmt::Write as _,
    path::Path,
};

/// A conjunction of clauses, each a disjunction of literals.
#[derive(Debug, Clone)]
pub struct CnfFormula {
    clauses: Vec<Vec<Literal>>,
    /// Comment lines, without the leading `c `
    comments: Vec<String>,
    /// True if some clause is empty
    unsat: bool,
    statistics: OnceCell<Statistics>,
}

/// Derived properties of a formula.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statistics {
    /// The largest variable occurring in the formula, 0 if there is none
    pub max_variable: u32,
    /// The number of distinct variables occurring in the formula
    pub num_variables: usize,
    /// The total number of literal occurrences
    pub num_literals: usize,
    /// Maps clause width to the number of clauses with that width
    pub widths: BTreeMap<usize, usize>,
}

/// Unsatisfied clauses of a formula under a partial assignment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnsatisfiedClauses {
    /// Clauses with an unassigned variable, which may still become true
    pub undetermined: Vec<usize>,
    /// Clauses where every literal is assigned and false
    pub conflicting: Vec<usize>,
}

impl UnsatisfiedClauses {
    /// True if every clause is satisfied.
    pub fn is_empty(&self) -> bool {
        self.undetermined.is_empty() && self.conflicting.is_empty()
    }
}

impl PartialEq for CnfFormula {
    fn eq(&self, other: &CnfFormula) -> bool {
        self.clauses == other.clauses && self.comments == other.comments
    }
}

impl CnfFormula {
    /// Create a formula from signed integer clauses.
    ///
    /// # Panics
    /// Panics if a literal is zero.
    pub fn new(clauses: Vec<Vec<i32>>, comments: Vec<String>) -> CnfFormula {
        CnfFormula::from_literals(
            clauses
                .into_iter()
                .map(|clause| {
                    clause
                        .into_iter()
                        .map(|value| {
                            requires!(value != 0, "literals must be nonzero");
                            Literal::new(value)
                        })
                        .collect()
                })
                .collect(),
            comments,
        )
    }

    pub fn from_literals(clauses: Vec<Vec<Literal>>, comments: Vec<String>) -> CnfFormula {
        invariant!(clauses.iter().flatten().all(|literal| !literal.is_zero()));
        let unsat = clauses.iter().any(|clause| clause.is_empty());
        CnfFormula {
            clauses,
            comments,
            unsat,
            statistics: OnceCell::new(),
        }
    }

    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }
    pub fn comments(&self) -> &[String] {
        &self.comments
    }
    /// True if the formula contains the empty clause.
    pub fn is_trivially_unsat(&self) -> bool {
        self.unsat
    }
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Properties computed on first access.
    pub fn statistics(&self) -> &Statistics {
        self.statistics.get_or_init(|| {
            let mut seen = HashSet::new();
            let mut statistics = Statistics::default();
            for clause in &self.clauses {
                *statistics.widths.entry(clause.len()).or_insert(0) += 1;
                statistics.num_literals += clause.len();
                for literal in clause {
                    let variable = literal.variable();
                    statistics.max_variable = statistics.max_variable.max(variable.0);
                    if seen.insert(variable) {
                        statistics.num_variables += 1;
                    }
                }
            }
            statistics
        })
    }
    pub fn max_variable(&self) -> u32 {
        self.statistics().max_variable
    }
    pub fn num_variables(&self) -> usize {
        self.statistics().num_variables
    }
    pub fn num_literals(&self) -> usize {
        self.statistics().num_literals
    }
    pub fn widths(&self) -> &BTreeMap<usize, usize> {
        &self.statistics().widths
    }

    /// Returns true if every clause has a literal that is true under `assignment`.
    pub fn evaluate(&self, assignment: &Assignment) -> bool {
        self.first_falsified_clause(assignment).is_none()
    }

    /// The index of the first clause without a true literal, if any.
    pub fn first_falsified_clause(&self, assignment: &Assignment) -> Option<usize> {
        self.clauses
            .iter()
            .position(|clause| !clause_is_satisfied(clause, assignment))
    }

    /// Partition the clauses that are not satisfied by `assignment` into
    /// undetermined and conflicting ones.
    pub fn unsatisfied_clauses(&self, assignment: &Assignment) -> UnsatisfiedClauses {
        let mut result = UnsatisfiedClauses::default();
        for (index, clause) in self.clauses.iter().enumerate() {
            let mut any_unassigned = false;
            let mut satisfied = false;
            for &literal in clause {
                match assignment.literal_value(literal) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => (),
                    None => any_unassigned = true,
                }
            }
            if satisfied {
                continue;
            }
            if any_unassigned {
                result.undetermined.push(index);
            } else {
                result.conflicting.push(index);
            }
        }
        result
    }

    /// Return an isomorphic formula with clauses, variable names and variable
    /// signs randomized by a generator seeded with `seed`.
    pub fn shuffle(&self, seed: u64) -> CnfFormula {
        self.shuffle_with_renaming(seed).0
    }

    /// Like [shuffle](#method.shuffle), but also return the variable renaming
    /// that maps this formula onto the shuffled one.
    pub fn shuffle_with_renaming(&self, seed: u64) -> (CnfFormula, VariableRenaming) {
        let (clause_order, renaming) = self.draw_permutations(seed);
        let clauses = clause_order
            .into_iter()
            .map(|index| {
                self.clauses[index]
                    .iter()
                    .map(|&literal| renaming.apply(literal))
                    .collect()
            })
            .collect();
        (
            CnfFormula::from_literals(clauses, self.comments.clone()),
            renaming,
        )
    }

    /// The renaming [shuffle](#method.shuffle) applies for `seed`.
    pub fn renaming(&self, seed: u64) -> VariableRenaming {
        self.draw_permutations(seed).1
    }

    /// Draw, in this order, the clause permutation, the variable bijection
    /// and the sign flips from a single generator.
    fn draw_permutations(&self, seed: u64) -> (Vec<usize>, VariableRenaming) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut clause_order: Vec<usize> = (0..self.clauses.len()).collect();
        clause_order.shuffle(&mut rng);
        let max_variable = self.max_variable();
        let mut image: Vec<u32> = (1..=max_variable).collect();
        image.shuffle(&mut rng);
        let flipped = (0..max_variable).map(|_| rng.gen_bool(0.5)).collect();
        (clause_order, VariableRenaming { image, flipped })
    }

    /// Parse a formula in DIMACS format.
    pub fn parse(text: &str) -> Result<CnfFormula> {
        parse_dimacs(&mut Input::from_bytes(text.as_bytes()))
    }

    /// Read a formula from a possibly compressed DIMACS file.
    pub fn from_file(path: &Path) -> Result<CnfFormula> {
        let contents = read_compressed_file(path)?;
        let formula = parse_dimacs(&mut Input::from_bytes(&contents));
        formula
    }

    /// Write the formula to a DIMACS file, compressed if the extension says so.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        write_compressed_file(path, self.to_dimacs().as_bytes())
    }

    /// Print the formula in DIMACS format.
    ///
    /// The header declares the number of distinct variables and clauses
    /// actually present.
    pub fn to_dimacs(&self) -> String {
        let mut text = String::with_capacity(8 * self.num_literals() + 32);
        for comment in &self.comments {
            let _ = writeln!(text, "c {}", comment);
        }
        let _ = writeln!(text, "p cnf {} {}", self.num_variables(), self.num_clauses());
        for clause in &self.clauses {
            for literal in clause {
                let _ = write!(text, "{} ", literal);
            }
            text.push_str("0\n");
        }
        text
    }
}

fn clause_is_satisfied(clause: &[Literal], assignment: &Assignment) -> bool {
    clause
        .iter()
        .any(|&literal| assignment.literal_value(literal) == Some(true))
}

/// A bijection on the variables `1..=max_variable` combined with a sign
/// flip per variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRenaming {
    /// `image[v - 1]` is the new name of variable `v`
    image: Vec<u32>,
    /// `flipped[v - 1]` tells whether the literals of `v` change sign
    flipped: Vec<bool>,
}

impl VariableRenaming {
    /// The literal that replaces `literal`.
    pub fn apply(&self, literal: Literal) -> Literal {
        let offset = literal.variable().index() - 1;
        let renamed = Variable(self.image[offset]).literal(!literal.is_negative());
        if self.flipped[offset] {
            -renamed
        } else {
            renamed
        }
    }

    /// Move an assignment of the original variables to the renamed ones.
    ///
    /// Variables outside the renaming are dropped.
    pub fn forward(&self, assignment: &Assignment) -> Assignment {
        assignment
            .iter()
            .filter(|&(variable, _)| self.covers(variable))
            .map(|(variable, value)| self.apply(variable.literal(value)))
            .collect()
    }

    /// Move an assignment of the renamed variables back to the original ones.
    pub fn backward(&self, assignment: &Assignment) -> Assignment {
        let mut original = Assignment::new();
        for (offset, (&image, &flipped)) in self.image.iter().zip(&self.flipped).enumerate() {
            if let Some(value) = assignment.get(Variable(image)) {
                original.insert(Variable(offset as u32 + 1), value != flipped);
            }
        }
        original
    }

    fn covers(&self, variable: Variable) -> bool {
        variable.0 >= 1 && variable.index() <= self.image.len()
    }
}

/// Parse a DIMACS comment, consuming a leading "c", one optional space,
/// and the rest of the line.
fn parse_comment(input: &mut Input) -> String {
    requires!(input.peek() == Some(b'c'));
    input.next();
    if input.peek() == Some(b' ') {
        input.next();
    }
    input.rest_of_line().trim_end().to_string()
}

/// Parse the problem line `p cnf <variables> <clauses>`.
fn parse_header(input: &mut Input) -> Result<(u64, u64)> {
    requires!(input.peek() == Some(b'p'));
    input.next();
    input.skip_some_blanks()?;
    let problem_type = input.parse_word();
    if problem_type != "cnf" {
        return Err(input.error(format!("not a cnf instance: \"{}\"", problem_type)));
    }
    input.skip_some_blanks()?;
    let num_variables = input.parse_dec64()?;
    if num_variables <= 0 {
        return Err(input.error("bad number of variables"));
    }
    input.skip_some_blanks()?;
    let num_clauses = input.parse_dec64()?;
    if num_clauses <= 0 {
        return Err(input.error("bad number of clauses"));
    }
    input.skip_some_blanks()?;
    match input.peek() {
        None | Some(b'\n') => Ok((num_variables as u64, num_clauses as u64)),
        Some(_) => Err(input.error(Input::P_CNF)),
    }
}

/// Parse a DIMACS formula.
///
/// Clauses may span several lines and several clauses may share a line.
/// The counts declared in the header are not checked against the clauses.
fn parse_dimacs(input: &mut Input) -> Result<CnfFormula> {
    let mut header: Option<(u64, u64)> = None;
    let mut comments = Vec::new();
    let mut clauses = Vec::new();
    let mut clause = Vec::new();
    // Number of tokens read for the current clause, including the terminating zero
    let mut tokens = 0;
    let mut at_line_start = true;
    loop {
        input.skip_blanks();
        match input.peek() {
            None => break,
            Some(b'\n') => {
                input.next();
                at_line_start = true;
                continue;
            }
            Some(b'c') if at_line_start => {
                comments.push(parse_comment(input));
                continue;
            }
            Some(b'p') if at_line_start => {
                if header.is_some() {
                    return Err(input.error("duplicate problem line"));
                }
                header = Some(parse_header(input)?);
                continue;
            }
            Some(_) => (),
        }
        at_line_start = false;
        if header.is_none() {
            return Err(input.error("clause before problem line"));
        }
        let literal = input.parse_dec32()?;
        input.skip_some_blanks()?;
        tokens += 1;
        if literal != 0 {
            clause.push(Literal::new(literal));
            continue;
        }
        if tokens < 2 {
            return Err(input.error("clause too short"));
        }
        clauses.push(std::mem::replace(&mut clause, Vec::new()));
        tokens = 0;
    }
    if header.is_none() {
        return Err(input.error("missing problem line"));
    }
    if tokens != 0 {
        return Err(input.error(Input::EOF));
    }
    Ok(CnfFormula::from_literals(clauses, comments))
}
