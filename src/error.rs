//! Error types shared by every layer of the solver.

use thiserror::Error;

/// Errors raised while reading, bounding, modeling or decoding an MCP instance.
///
/// Solver outcomes such as "unsatisfiable" or "unknown" are not errors; they are
/// reported through [`crate::backend::SolveStatus`].
#[derive(Debug, Error)]
pub enum McpError {
    /// Structurally invalid instance data (matrix shape, negative entries, lengths).
    #[error("malformed instance: {0}")]
    MalformedInstance(String),

    /// The derived bounds contradict each other, so the instance cannot be modeled.
    #[error("infeasible bounds: {0}")]
    InfeasibleBounds(String),

    /// A raw assignment does not describe a valid set of routes.
    #[error("malformed assignment: {0}")]
    MalformedAssignment(String),

    /// The finite-domain model itself is inconsistent.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Unknown configuration name or unusable option value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = McpError::MalformedInstance("distance matrix has 3 rows, expected 4".into());
        assert_eq!(err.to_string(), "malformed instance: distance matrix has 3 rows, expected 4");

        let err = McpError::Parse { line: 3, message: "invalid capacity 'x'".into() };
        assert_eq!(err.to_string(), "parse error at line 3: invalid capacity 'x'");
    }
}
