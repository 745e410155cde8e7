use std::fmt;

/// Catalog loading failure. Carries a human readable message only.
#[derive(Debug, Clone)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Failures that end a judge or run request and are reported back to the caller.
///
/// A failing checker query is deliberately absent: it only removes that checker
/// from the match set (see [`crate::judge::CheckerOutcome::Failed`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeError {
    /// Malformed request or empty submission.
    Input(String),
    /// Rejected by the safety filter before execution.
    Unsafe(String),
    /// The seed script failed; no partial credit.
    Seed(String),
    /// The learner statement failed to execute.
    Query(String),
    /// Unknown or inactive topic/question.
    NotFound(String),
    /// Store or sandbox infrastructure failed.
    Internal(String),
}

impl JudgeError {
    pub fn code(&self) -> &'static str {
        match self {
            JudgeError::Input(_) => "E_INPUT",
            JudgeError::Unsafe(_) => "E_UNSAFE",
            JudgeError::Seed(_) => "E_SEED",
            JudgeError::Query(_) => "E_QUERY",
            JudgeError::NotFound(_) => "E_NOT_FOUND",
            JudgeError::Internal(_) => "E_INTERNAL",
        }
    }
}

impl fmt::Display for JudgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JudgeError::Input(msg) => write!(f, "{}", msg),
            JudgeError::Unsafe(msg) => write!(f, "unsafe: {}", msg),
            JudgeError::Seed(msg) => write!(f, "seed failed: {}", msg),
            JudgeError::Query(msg) => write!(f, "query failed: {}", msg),
            JudgeError::NotFound(what) => write!(f, "{} not found", what),
            JudgeError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for JudgeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_match_reason_strings() {
        assert_eq!(JudgeError::Input("empty".into()).to_string(), "empty");
        assert_eq!(
            JudgeError::Query("no such table: t".into()).to_string(),
            "query failed: no such table: t"
        );
        assert_eq!(
            JudgeError::NotFound("question 'q1'".into()).to_string(),
            "question 'q1' not found"
        );
        assert_eq!(JudgeError::Seed("x".into()).code(), "E_SEED");
    }
}
