//! A partial assignment of truth values to variables.

use crate::literal::{Literal, Variable};
use std::{collections::BTreeMap, iter::FromIterator};

/// Maps variables to truth values. Variables that were never set are absent.
///
/// Models come from solver output, so the variables are kept in a map rather
/// than a table indexed by variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    values: BTreeMap<Variable, bool>,
}

impl Assignment {
    /// Create an empty assignment.
    pub fn new() -> Assignment {
        Assignment::default()
    }
    /// Set the value of a variable, replacing any previous value.
    pub fn insert(&mut self, variable: Variable, value: bool) {
        self.values.insert(variable, value);
    }
    /// Make the literal true.
    pub fn assign(&mut self, literal: Literal) {
        self.insert(literal.variable(), !literal.is_negative());
    }
    pub fn get(&self, variable: Variable) -> Option<bool> {
        self.values.get(&variable).copied()
    }
    pub fn contains(&self, variable: Variable) -> bool {
        self.values.contains_key(&variable)
    }
    /// The truth value of a literal, if its variable is assigned.
    pub fn literal_value(&self, literal: Literal) -> Option<bool> {
        self.get(literal.variable())
            .map(|value| value != literal.is_negative())
    }
    /// Number of assigned variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// The assigned variables with their values, in increasing variable order.
    pub fn iter(&self) -> impl Iterator<Item = (Variable, bool)> + '_ {
        self.values.iter().map(|(&variable, &value)| (variable, value))
    }
}

/// Collects the literals that are true.
impl FromIterator<Literal> for Assignment {
    fn from_iter<T: IntoIterator<Item = Literal>>(literals: T) -> Assignment {
        let mut assignment = Assignment::new();
        for literal in literals {
            assignment.assign(literal);
        }
        assignment
    }
}
