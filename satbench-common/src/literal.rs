//! Variable and literal representations

use std::{fmt, fmt::Display, ops};

/// A propositional variable, numbered from 1.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Variable(pub u32);

/// A variable or its negation.
///
/// The encoding is `2 * variable + negative`, so a literal and its negation
/// differ only in the lowest bit.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Literal {
    encoding: u32,
}

impl Variable {
    /// Position of this variable in a table indexed by variables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
    /// The literal of this variable with the given polarity.
    pub fn literal(self, positive: bool) -> Literal {
        Literal {
            encoding: self.0 * 2 + (!positive as u32),
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Literal {
    /// Construct a new literal from the usual signed representation.
    pub fn new(value: i32) -> Literal {
        requires!(value != i32::min_value());
        Literal {
            encoding: (value.abs() as u32) * 2 + ((value < 0) as u32),
        }
    }
    /// The signed DIMACS representation.
    pub fn decode(self) -> i32 {
        let magnitude = self.variable().0 as i32;
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }
    pub fn variable(self) -> Variable {
        Variable(self.encoding / 2)
    }
    pub fn is_negative(self) -> bool {
        self.encoding & 1 != 0
    }
    pub fn is_zero(self) -> bool {
        self.variable().0 == 0
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.decode())
    }
}

impl ops::Neg for Literal {
    type Output = Literal;
    fn neg(self) -> Literal {
        Literal {
            encoding: self.encoding ^ 1,
        }
    }
}
