use std::error::Error as StdError;
use std::fmt;

/// Layout operation that a type category refused to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutOperation {
    InstanceFieldOffsets,
    StaticFieldLayout,
}

impl LayoutOperation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutOperation::InstanceFieldOffsets => "instance field offsets",
            LayoutOperation::StaticFieldLayout => "static field layout",
        }
    }
}

impl fmt::Display for LayoutOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for layout computation.
#[derive(Debug)]
pub enum Error {
    /// The request is meaningless for the type's category; the caller must pick another
    /// access strategy.
    UnsupportedOperation {
        operation: LayoutOperation,
        type_name: String,
    },
    /// The type's declaration cannot be laid out.
    InvalidLayout { type_name: String, message: String },
}

/// Convenience result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    #[must_use]
    pub fn unsupported(operation: LayoutOperation, type_name: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation,
            type_name: type_name.into(),
        }
    }

    #[must_use]
    pub fn invalid_layout(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLayout {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedOperation { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedOperation {
                operation,
                type_name,
            } => write!(f, "unsupported operation: {operation} for `{type_name}`"),
            Error::InvalidLayout { type_name, message } => {
                write!(f, "invalid layout for `{type_name}`: {message}")
            }
        }
    }
}

impl StdError for Error {}
