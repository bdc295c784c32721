//! Error type for the alignment pipeline.
//!
//! # Error Categories
//!
//! | Category | Variants | Recovery Strategy |
//! |----------|----------|-------------------|
//! | Numerical | NumericalDivergence | None: fatal, stop the run |
//! | Shape | ShapeMismatch, DimensionMismatch | None: fix checkpoint / inputs |
//! | Languages | UnknownLanguage, IncompleteLanguageSet | Fix configuration |
//! | Input | InvalidInput, ParseError | Fix input data |
//! | Infrastructure | BackendError, CheckpointError, IoError | Retry or fix environment |
//!
//! # Design Principles
//!
//! - **NO FALLBACKS**: errors propagate, they are not silently handled
//! - **FAIL FAST**: invalid state triggers an immediate error
//! - **CONTEXTUAL**: every variant carries debugging information
//!
//! The two recoverable conditions of the pipeline (an empty dictionary
//! intersection, a missing validation resource) are deliberately *not*
//! error variants: they are signalled as absent values (`Option`) so that
//! callers skip the dependent step instead of unwinding.

use thiserror::Error;

/// Error type for all alignment pipeline failures.
#[derive(Debug, Error)]
pub enum AlignError {
    // === Numerical Errors ===
    /// A loss became NaN. Unrecoverable numerical divergence: the training
    /// run must stop, no optimizer step is applied for the failing
    /// iteration.
    #[error("NaN detected ({context})")]
    NumericalDivergence { context: String },

    // === Shape Errors ===
    /// A tensor did not have the expected 2-D shape (checkpoint reload,
    /// mapping install).
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Vector/matrix dimension disagreement between two embedding spaces.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // === Language Errors ===
    /// A language was requested that is not part of the configured set.
    #[error("Unknown language: {lang}")]
    UnknownLanguage { lang: String },

    /// The per-language state map does not cover the configured languages.
    #[error("Incomplete language set: missing state for {lang}")]
    IncompleteLanguageSet { lang: String },

    // === Input Errors ===
    /// Invalid caller-supplied data (empty vocabulary, duplicate word,
    /// index out of range, ...).
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A text resource (embedding file, dictionary file, config string)
    /// could not be parsed.
    #[error("Parse error: {message}")]
    ParseError { message: String },

    // === Infrastructure Errors ===
    /// Tensor backend operation failed.
    #[error("Backend error: {message}")]
    BackendError { message: String },

    /// Checkpoint serialization/deserialization failed.
    #[error("Checkpoint error: {message}")]
    CheckpointError { message: String },

    /// File I/O error (embedding files, dictionary files, checkpoints).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for alignment operations.
pub type AlignResult<T> = Result<T, AlignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divergence_message_names_context() {
        let err = AlignError::NumericalDivergence {
            context: "discriminator".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("NaN"));
        assert!(msg.contains("discriminator"));
    }

    #[test]
    fn test_shape_mismatch_shows_both_shapes() {
        let err = AlignError::ShapeMismatch {
            expected: (300, 300),
            actual: (200, 300),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("300"));
        assert!(msg.contains("200"));
    }

    #[test]
    fn test_io_error_conversion_via_question_mark() {
        fn fallible_io() -> AlignResult<()> {
            let _ = std::fs::read("/nonexistent/path/for/this/test")?;
            Ok(())
        }
        assert!(matches!(fallible_io(), Err(AlignError::IoError(_))));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<AlignError>();
        assert_sync::<AlignError>();
    }
}
