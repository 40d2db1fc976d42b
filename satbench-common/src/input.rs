//! Byte reader for text formats

use crate::error::Error;
use std::iter::Peekable;

/// A peekable iterator for bytes that records line and column information.
pub struct Input<'a> {
    /// The source of the input data
    source: Peekable<Box<dyn Iterator<Item = u8> + 'a>>,
    /// The current line number
    line: usize,
    /// The current column
    column: usize,
}

impl<'a> Input<'a> {
    /// Create a new `Input` from some source
    pub fn new(source: Box<dyn Iterator<Item = u8> + 'a>) -> Self {
        Input {
            source: source.peekable(),
            line: 1,
            column: 1,
        }
    }
    /// Read from an in-memory buffer.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Input::new(Box::new(bytes.iter().cloned()))
    }
    /// Look at the next byte without consuming it
    pub fn peek(&mut self) -> Option<u8> {
        self.source.peek().cloned()
    }
    /// The line of the next byte.
    pub fn line(&self) -> usize {
        self.line
    }
    /// Create a format error with the given message and position information.
    pub fn error(&self, why: impl Into<String>) -> Error {
        Error::Format {
            message: why.into(),
            line: self.line,
            column: self.column,
        }
    }

    /// Parse a decimal number, with an optional leading minus.
    ///
    /// Fails if there is no digit, or if the number does not lie within the
    /// range [-i64::MAX , i64::MAX].
    pub fn parse_dec64(&mut self) -> Result<i64, Error> {
        let sign: bool = self.peek() == Some(b'-');
        if sign {
            self.next();
        }
        if !self.peek().map_or(false, Self::is_digit) {
            return Err(self.error(Self::NUMBER));
        }
        let mut value: i64 = 0;
        while let Some(c) = self.peek() {
            if !Self::is_digit(c) {
                break;
            }
            // Does not unnecessarily overflow because of the order of operations
            value = value
                .checked_mul(10)
                .and_then(|val| val.checked_add(i64::from(c - b'0')))
                .ok_or_else(|| self.error(Self::OVERFLOW))?;
            self.next();
        }
        Ok(if sign { -value } else { value })
    }

    /// Like parse_dec64, but fails if the number does not lie within
    /// [-i32::MAX , i32::MAX].
    pub fn parse_dec32(&mut self) -> Result<i32, Error> {
        let value = self.parse_dec64()?;
        if value.abs() > i64::from(i32::max_value()) {
            return Err(self.error(Self::OVERFLOW));
        }
        Ok(value as i32)
    }

    /// Read the bytes up to the end of the line or a blank.
    pub fn parse_word(&mut self) -> String {
        let mut word = Vec::new();
        while let Some(c) = self.peek() {
            if Self::is_blank(c) || c == b'\n' {
                break;
            }
            word.push(c);
            self.next();
        }
        String::from_utf8_lossy(&word).into_owned()
    }

    /// Consume everything up to and including the next newline, returning
    /// the consumed text without the newline.
    pub fn rest_of_line(&mut self) -> String {
        let mut text = Vec::new();
        while let Some(c) = self.next() {
            if c == b'\n' {
                break;
            }
            text.push(c);
        }
        String::from_utf8_lossy(&text).into_owned()
    }

    /// Parse zero or more blanks (spaces, tabs, carriage returns), stopping at newlines.
    pub fn skip_blanks(&mut self) {
        while let Some(c) = self.peek() {
            if !Self::is_blank(c) {
                break;
            }
            self.next();
        }
    }

    /// Skip blanks, and return an error if no blank, newline nor EOF follows.
    pub fn skip_some_blanks(&mut self) -> Result<(), Error> {
        match self.peek() {
            Some(c) if !Self::is_blank(c) && c != b'\n' => Err(self.error(Self::SPACE)),
            _ => {
                self.skip_blanks();
                Ok(())
            }
        }
    }

    // Error messages.
    /// A numeric overflow. This should only happen for user input.
    pub const OVERFLOW: &'static str = "overflow while parsing number";
    /// Parser error ("unexpected EOF")
    pub const EOF: &'static str = "premature end of file";
    /// Parser error (`expected ...`)
    pub const NUMBER: &'static str = "expected number";
    /// Parser error (`expected ...`)
    pub const SPACE: &'static str = "expected space";
    /// Parser error (`expected ...`)
    pub const P_CNF: &'static str = "expected \"p cnf <variables> <clauses>\"";

    /// Check if a character is a decimal digit.
    pub fn is_digit(value: u8) -> bool {
        value >= b'0' && value <= b'9'
    }

    /// Returns true if the character separates tokens within a line.
    pub fn is_blank(c: u8) -> bool {
        [b' ', b'\t', b'\r'].iter().any(|&s| s == c)
    }
}

impl Iterator for Input<'_> {
    type Item = u8;
    fn next(&mut self) -> Option<u8> {
        self.source.next().map(|c| {
            if c == b'\n' {
                self.line += 1;
                self.column = 0;
            }
            self.column += 1;
            c
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        let mut input = Input::from_bytes(b"-17 42");
        assert_eq!(input.parse_dec32().unwrap(), -17);
        input.skip_some_blanks().unwrap();
        assert_eq!(input.parse_dec64().unwrap(), 42);
        assert_eq!(input.peek(), None);
    }

    #[test]
    fn lone_minus_is_not_a_number() {
        let mut input = Input::from_bytes(b"- 1");
        assert!(input.parse_dec32().is_err());
    }

    #[test]
    fn literal_overflow() {
        let mut input = Input::from_bytes(b"2147483648");
        match input.parse_dec32() {
            Err(Error::Format { message, .. }) => assert_eq!(message, Input::OVERFLOW),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn positions() {
        let mut input = Input::from_bytes(b"ab\ncd");
        assert_eq!(input.rest_of_line(), "ab");
        assert_eq!(input.line(), 2);
        assert_eq!(input.parse_word(), "cd");
        match input.error("boom") {
            Error::Format { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
