use std::fmt;
use thiserror::Error;

/// A syntax problem in a filter expression
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the expression text
    pub position: Option<usize>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(p) => write!(f, "{} (at position {})", self.message, p),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            position: None,
        }
    }

    pub fn at(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position: Some(position),
        }
    }
}

/// Every syntax problem found in one expression
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.0.iter()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ParseErrors {}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BindError {
    #[error("Column '{0}' not found.")]
    UnknownColumn(String),
    #[error("Unknown method '{0}'.")]
    UnknownMethod(String),
    #[error("Method '{name}' expects {expected} arguments, found {found}.")]
    WrongArgumentCount {
        name: String,
        expected: String,
        found: usize,
    },
}
