//! Result variants for inputs the engine cannot compute from.

use thiserror::Error;

/// Why a calculation produced no result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// A required field is blank.
    #[error("{field} is required")]
    IncompleteInput { field: &'static str },

    /// A field does not parse to a finite number.
    #[error("{field} is not a valid number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// Inputs parse but describe something that cannot be computed
    /// (entry equal to stop, non-positive capital, zero leverage, ...).
    #[error("cannot compute: {0}")]
    DegenerateInput(String),
}

/// Result type for engine operations.
pub type CalcResult<T> = Result<T, InputError>;

impl InputError {
    pub fn degenerate(reason: impl Into<String>) -> Self {
        InputError::DegenerateInput(reason.into())
    }

    /// Inputs are still being filled in; outputs should be cleared silently.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, InputError::IncompleteInput { .. })
    }

    /// Inputs are present but wrong; the caller should surface a warning.
    pub fn should_warn(&self) -> bool {
        matches!(
            self,
            InputError::InvalidNumber { .. } | InputError::DegenerateInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let blank = InputError::IncompleteInput { field: "entry price" };
        assert!(blank.is_incomplete());
        assert!(!blank.should_warn());

        let nan = InputError::InvalidNumber {
            field: "stop loss",
            value: "abc".to_string(),
        };
        assert!(!nan.is_incomplete());
        assert!(nan.should_warn());

        let degenerate = InputError::degenerate("entry price equals stop loss");
        assert!(degenerate.should_warn());
        assert_eq!(
            degenerate.to_string(),
            "cannot compute: entry price equals stop loss"
        );
    }
}
