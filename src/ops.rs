//! Built-in line operations for the command-line tool

use sha2::{Digest, Sha256};
use std::fmt;

/// Operation applied to each input line
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineOp {
    Upper,
    Lower,
    Length,
    Reverse,
    Trim,
    /// Validate and compact a JSON document; fails on invalid JSON
    Json,
    Sha256,
}

/// Error from a line operation
#[derive(Debug)]
pub struct OpError {
    op: LineOp,
    message: String,
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} failed: {}", self.op, self.message)
    }
}

impl std::error::Error for OpError {}

impl LineOp {
    pub fn apply(self, line: &str) -> Result<String, OpError> {
        match self {
            LineOp::Upper => Ok(line.to_uppercase()),
            LineOp::Lower => Ok(line.to_lowercase()),
            LineOp::Length => Ok(line.chars().count().to_string()),
            LineOp::Reverse => Ok(line.chars().rev().collect()),
            LineOp::Trim => Ok(line.trim().to_string()),
            LineOp::Json => {
                let value: serde_json::Value =
                    serde_json::from_str(line).map_err(|e| OpError {
                        op: self,
                        message: e.to_string(),
                    })?;
                Ok(value.to_string())
            }
            LineOp::Sha256 => Ok(hex::encode(Sha256::digest(line.as_bytes()))),
        }
    }
}
