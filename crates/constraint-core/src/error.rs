use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintError {
    /// One or more of the reconciliation reads failed. Every failure is listed.
    #[error("Upstream fetch failed: {}", .0.join("; "))]
    Upstream(Vec<String>),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ConstraintError {
    pub fn fetch(context: &str, err: impl std::fmt::Display) -> Self {
        ConstraintError::Source(format!("{context}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_lists_every_failure() {
        let err = ConstraintError::Upstream(vec![
            "constraints: timeout".to_string(),
            "stock groups: 500".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Upstream fetch failed: constraints: timeout; stock groups: 500"
        );
    }
}
