//! Error types for stimex operations.
//!
//! Structural failures (wrong stimulus types, misaligned batch output,
//! unreachable resources) are surfaced through [`StimexError`]. A single
//! absent dictionary entry or out-of-vocabulary embedding is not an error;
//! those are filled in place by the owning extractor.

use thiserror::Error;

use crate::providers::Dependency;
use crate::stimulus::StimulusKind;

/// Result type alias for stimex operations.
pub type StimexResult<T> = Result<T, StimexError>;

/// Main error type for all stimex operations.
#[derive(Error, Debug)]
pub enum StimexError {
    /// A transformer was handed a stimulus type it does not accept.
    #[error("Incompatible input: {transformer} cannot process {kind} stimulus '{stimulus}'")]
    IncompatibleInput {
        transformer: String,
        stimulus: String,
        kind: StimulusKind,
    },

    /// A step in a converter chain failed. `step` is 1-based.
    #[error("Conversion error in {chain} at step {step} ({converter}): {source}")]
    Conversion {
        chain: String,
        step: usize,
        converter: String,
        #[source]
        source: Box<StimexError>,
    },

    /// A converter chain cannot run because a step lacks its collaborator.
    #[error("Missing dependency for step {step} of {converter}: {dependency} is not configured")]
    MissingDependency {
        converter: String,
        step: usize,
        dependency: Dependency,
    },

    /// An external dictionary, corpus or service could not be obtained.
    #[error("Resource unavailable: {resource}: {message}")]
    ResourceUnavailable { resource: String, message: String },

    /// A batch call returned a different number of outputs than inputs.
    #[error("Tagging mismatch: expected {expected} outputs, got {actual}")]
    TaggingMismatch { expected: usize, actual: usize },

    /// An extractor produced a result violating the table invariants.
    #[error("Invalid result: {0}")]
    InvalidResult(String),

    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    IncompatibleInput,
    ConversionFailed,
    MissingDependency,
    ResourceUnavailable,
    TaggingMismatch,
    InvalidResult,
    Validation,
    Configuration,
    Io,
    Serialization,
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IncompatibleInput => "TYPE_001",
            ErrorCode::ConversionFailed => "CONV_001",
            ErrorCode::MissingDependency => "CONV_002",
            ErrorCode::ResourceUnavailable => "RES_001",
            ErrorCode::TaggingMismatch => "BATCH_001",
            ErrorCode::InvalidResult => "RES_002",
            ErrorCode::Validation => "VAL_001",
            ErrorCode::Configuration => "CFG_001",
            ErrorCode::Io => "IO_001",
            ErrorCode::Serialization => "SER_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl StimexError {
    /// Create an incompatible input error.
    pub fn incompatible(
        transformer: impl Into<String>,
        stimulus: impl Into<String>,
        kind: StimulusKind,
    ) -> Self {
        Self::IncompatibleInput {
            transformer: transformer.into(),
            stimulus: stimulus.into(),
            kind,
        }
    }

    /// Create a resource unavailable error.
    pub fn resource(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a conversion error wrapping the failure of chain step `step`.
    pub fn conversion(
        chain: impl Into<String>,
        step: usize,
        converter: impl Into<String>,
        source: StimexError,
    ) -> Self {
        Self::Conversion {
            chain: chain.into(),
            step,
            converter: converter.into(),
            source: Box::new(source),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid result error.
    pub fn invalid_result(message: impl Into<String>) -> Self {
        Self::InvalidResult(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::IncompatibleInput { .. } => ErrorCode::IncompatibleInput,
            Self::Conversion { .. } => ErrorCode::ConversionFailed,
            Self::MissingDependency { .. } => ErrorCode::MissingDependency,
            Self::ResourceUnavailable { .. } => ErrorCode::ResourceUnavailable,
            Self::TaggingMismatch { .. } => ErrorCode::TaggingMismatch,
            Self::InvalidResult(_) => ErrorCode::InvalidResult,
            Self::Validation(_) => ErrorCode::Validation,
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::Io(_) => ErrorCode::Io,
            Self::Serialization(_) => ErrorCode::Serialization,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::IncompatibleInput { .. } => {
                Some("Convert the stimulus first or pick a transformer that accepts its type")
            }
            Self::MissingDependency { .. } => {
                Some("Register the missing collaborator on the Providers passed to the converter")
            }
            Self::ResourceUnavailable { .. } => {
                Some("Check that the named dictionary or service is installed and reachable")
            }
            Self::Conversion { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// Step index of the failing converter when this error came from a chain.
    pub fn failed_step(&self) -> Option<usize> {
        match self {
            Self::Conversion { step, .. } | Self::MissingDependency { step, .. } => Some(*step),
            _ => None,
        }
    }
}
