//! Unified error handling for paddleforge
//!
//! Every fatal condition raised while converting a program ends up as a
//! [`ConvertError`]. Errors are grouped by [`ErrorCategory`] so callers can
//! report the kind of failure together with the offending operator or
//! variable name:
//! - Unsupported operations (operator type outside the handled set)
//! - Unsupported configurations (a handled operator with unhandled attributes)
//! - Format errors (tensor payload framing and shape problems)
//! - Descriptor errors (lookups into the parsed program that fail)
//! - I/O errors
//! - Internal errors (graph invariant violations, indicate a bug)

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while decoding a tensor payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The stream ended before the named field could be read in full
    #[error("payload truncated while reading {what}")]
    Truncated { what: &'static str },

    /// Inner tensor version is not the one this decoder understands
    #[error("unsupported tensor version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// A length field that must be non-negative was negative
    #[error("negative {what} length {value}")]
    NegativeLength { what: &'static str, value: i64 },

    /// Trailing data is not a whole number of elements
    #[error("{len} data bytes are not a multiple of the {width}-byte element width")]
    Misaligned { len: usize, width: usize },

    /// Element count disagrees with the declared shape
    #[error("payload holds {actual} elements but shape {shape:?} needs {expected}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// The shape's element count or byte size does not fit in memory
    #[error("shape {shape:?} is too large to materialize")]
    ShapeOverflow { shape: Vec<usize> },
}

/// Error type for program conversion
#[derive(Debug, Error)]
pub enum ConvertError {
    // ========== Operator Errors ==========
    /// Operator type outside the supported set
    #[error("unsupported operation '{op_type}' (operator #{index})")]
    UnsupportedOperation { op_type: String, index: usize },

    /// Supported operator with an attribute combination we cannot lower
    #[error("unsupported {op_type} configuration: {detail}")]
    UnsupportedConfiguration { op_type: String, detail: String },

    // ========== Payload Errors ==========
    /// Tensor payload could not be decoded
    #[error("invalid payload for variable '{variable}': {source}")]
    Format {
        variable: String,
        #[source]
        source: FormatError,
    },

    /// Payload required but absent.
    ///
    /// Conv filters, batch-norm statistics and folded feeds always need a
    /// payload. Other unproduced variables raise this only under
    /// `MissingPayloadPolicy::Reject`.
    #[error("no payload found for variable '{0}'")]
    MissingPayload(String),

    // ========== Descriptor Errors ==========
    /// Variable referenced by an operator is not declared in the block
    #[error("variable not declared in block: {0}")]
    MissingVariable(String),

    /// Required attribute not present on an operator
    #[error("{op_type} is missing attribute '{attr}'")]
    MissingAttribute { op_type: String, attr: String },

    /// Attribute present but carrying the wrong value type
    #[error("{op_type} attribute '{attr}' should be {expected}")]
    AttributeType {
        op_type: String,
        attr: String,
        expected: &'static str,
    },

    /// Required input/output role missing or empty
    #[error("{op_type} has no argument for role '{role}'")]
    MissingArgument { op_type: String, role: String },

    /// Block index outside the program
    #[error("program has no block {index} ({available} blocks)")]
    MissingBlock { index: usize, available: usize },

    /// Descriptor JSON could not be parsed
    #[error("invalid program descriptor: {0}")]
    Json(#[from] serde_json::Error),

    // ========== I/O Errors ==========
    /// File could not be read
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Converter configuration rejected
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ========== Internal Errors ==========
    /// Graph invariant violated (indicates a bug)
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ConvertError {
    /// Categorize the error for reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConvertError::UnsupportedOperation { .. } => ErrorCategory::UnsupportedOperation,

            ConvertError::UnsupportedConfiguration { .. } => {
                ErrorCategory::UnsupportedConfiguration
            }

            ConvertError::Format { .. } => ErrorCategory::Format,

            ConvertError::MissingPayload(_)
            | ConvertError::MissingVariable(_)
            | ConvertError::MissingAttribute { .. }
            | ConvertError::AttributeType { .. }
            | ConvertError::MissingArgument { .. }
            | ConvertError::MissingBlock { .. }
            | ConvertError::Json(_)
            | ConvertError::InvalidConfiguration(_) => ErrorCategory::Descriptor,

            ConvertError::Io { .. } => ErrorCategory::Io,

            ConvertError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// True for the "we understood the program but cannot lower it" errors
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::UnsupportedOperation | ErrorCategory::UnsupportedConfiguration
        )
    }

    /// Check if this is an internal error (indicates a bug)
    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }

    pub(crate) fn unsupported_config(op_type: &str, detail: impl Into<String>) -> Self {
        ConvertError::UnsupportedConfiguration {
            op_type: op_type.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn format(variable: &str, source: FormatError) -> Self {
        ConvertError::Format {
            variable: variable.to_string(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Error category for reporting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Operator type not supported
    UnsupportedOperation,
    /// Operator supported, attributes not
    UnsupportedConfiguration,
    /// Tensor payload malformed
    Format,
    /// Program descriptor inconsistent or incomplete
    Descriptor,
    /// Filesystem failure
    Io,
    /// Bug in the converter
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::UnsupportedOperation => write!(f, "UnsupportedOperation"),
            ErrorCategory::UnsupportedConfiguration => write!(f, "UnsupportedConfiguration"),
            ErrorCategory::Format => write!(f, "Format"),
            ErrorCategory::Descriptor => write!(f, "Descriptor"),
            ErrorCategory::Io => write!(f, "Io"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Helper type alias for Results using ConvertError
pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

/// Create an internal error with context
///
/// # Examples
/// ```ignore
/// return Err(internal_error!("input port {:?} bound twice", port));
/// ```
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::ConvertError::InternalError($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ConvertError::InternalError(format!($fmt, $($arg)*))
    };
}
