//! Result code domain type

use serde::{Deserialize, Serialize};

/// Outcome of a single stage or of a whole pipeline run
///
/// The numeric values are stable and used as process exit codes by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// All stages completed and the output is valid
    Success,

    /// A stage could not complete for a recoverable reason (bad input, tool failure)
    Failure,

    /// A content-policy stage refused to proceed
    Rejected,

    /// A stage observed a pending stop request and aborted
    Cancelled,
}

impl ResultCode {
    /// Numeric code of this result
    pub fn code(self) -> i32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::Failure => 1,
            ResultCode::Rejected => 3,
            ResultCode::Cancelled => 4,
        }
    }

    /// Parses a numeric code back into a result
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ResultCode::Success),
            1 => Some(ResultCode::Failure),
            3 => Some(ResultCode::Rejected),
            4 => Some(ResultCode::Cancelled),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }

    /// Human-readable message shown to CLI users
    pub fn message(self) -> &'static str {
        match self {
            ResultCode::Success => "Processing succeeded",
            ResultCode::Failure => "Processing failed",
            ResultCode::Rejected => "Processing rejected by content analysis",
            ResultCode::Cancelled => "Processing cancelled",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultCode::Success => write!(f, "Success"),
            ResultCode::Failure => write!(f, "Failure"),
            ResultCode::Rejected => write!(f, "Rejected"),
            ResultCode::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes_are_stable() {
        assert_eq!(ResultCode::Success.code(), 0);
        assert_eq!(ResultCode::Failure.code(), 1);
        assert_eq!(ResultCode::Rejected.code(), 3);
        assert_eq!(ResultCode::Cancelled.code(), 4);
    }

    #[test]
    fn test_from_code_rejects_unknown() {
        assert_eq!(ResultCode::from_code(3), Some(ResultCode::Rejected));
        assert_eq!(ResultCode::from_code(2), None);
        assert_eq!(ResultCode::from_code(-1), None);
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&ResultCode::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
