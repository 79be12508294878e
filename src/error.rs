//! Errors surfaced to callers, and the class hierarchy they map onto.

use std::fmt;

use distbridge_engine::EngineError;
use distbridge_traits::DistributionDescriptor;
use distbridge_view::{EntityKind, LayoutMismatch, ViewError};

/// Errors raised by the registry, the dispatch table and the host API.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("incompatible layout for {entity}: {reason}")]
    IncompatibleLayout {
        entity: EntityKind,
        reason: LayoutMismatch,
    },

    #[error("matrix distribution {distribution} is not supported")]
    DistributionNotSupported {
        distribution: DistributionDescriptor,
    },

    #[error("type name '{name}' is taken by {existing}, cannot register {attempted}")]
    DuplicateRegistration {
        name: String,
        existing: String,
        attempted: String,
    },

    #[error("type {key} has no representable host name")]
    UnrepresentableType { key: String },

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("no type registered as '{name}'")]
    NotRegistered { name: String },

    #[error("{type_name} cannot be constructed from these arguments, expected {expected}")]
    InvalidArguments {
        type_name: String,
        expected: &'static str,
    },

    #[error("{type_name} has no attribute '{attr}'")]
    NoSuchAttribute { type_name: String, attr: String },

    #[error("{type_name} does not support {operation}")]
    UnsupportedOperation {
        type_name: String,
        operation: &'static str,
    },

    #[error("invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    View(ViewError),

    #[error(transparent)]
    Engine(EngineError),
}

// Layout failures are lifted to the top level wherever they come from so
// callers match on a single variant.
impl From<ViewError> for BridgeError {
    fn from(err: ViewError) -> Self {
        match err {
            ViewError::IncompatibleLayout { entity, reason } => {
                BridgeError::IncompatibleLayout { entity, reason }
            }
            other => BridgeError::View(other),
        }
    }
}

impl From<EngineError> for BridgeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::View(view) => view.into(),
            other => BridgeError::Engine(other),
        }
    }
}

/// Convenience alias for `Result<T, BridgeError>`.
pub type Result<T> = std::result::Result<T, BridgeError>;

// ============================================================================
// Error classes
// ============================================================================

/// Caller-visible error class.
///
/// Every class except [`Exception`](ErrorClass::Exception) derives directly
/// from `Exception`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Exception,
    IncompatibleMatrixException,
    IncompatibleNdarrayException,
    MatrixDistributionNotSupportedException,
    DuplicateRegistrationException,
    EngineException,
}

impl ErrorClass {
    pub const ALL: [ErrorClass; 6] = [
        ErrorClass::Exception,
        ErrorClass::IncompatibleMatrixException,
        ErrorClass::IncompatibleNdarrayException,
        ErrorClass::MatrixDistributionNotSupportedException,
        ErrorClass::DuplicateRegistrationException,
        ErrorClass::EngineException,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ErrorClass::Exception => "Exception",
            ErrorClass::IncompatibleMatrixException => "IncompatibleMatrixException",
            ErrorClass::IncompatibleNdarrayException => "IncompatibleNdarrayException",
            ErrorClass::MatrixDistributionNotSupportedException => {
                "MatrixDistributionNotSupportedException"
            }
            ErrorClass::DuplicateRegistrationException => "DuplicateRegistrationException",
            ErrorClass::EngineException => "EngineException",
        }
    }

    pub const fn parent(self) -> Option<ErrorClass> {
        match self {
            ErrorClass::Exception => None,
            _ => Some(ErrorClass::Exception),
        }
    }

    /// Whether `self` is `other` or derives from it.
    pub fn is_a(self, other: ErrorClass) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if c == other {
                return true;
            }
            class = c.parent();
        }
        false
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl BridgeError {
    /// The class a host raises this error as.
    pub fn class(&self) -> ErrorClass {
        match self {
            BridgeError::IncompatibleLayout { .. } => ErrorClass::IncompatibleNdarrayException,
            BridgeError::View(ViewError::NotAVector { .. } | ViewError::DataLength { .. }) => {
                ErrorClass::IncompatibleMatrixException
            }
            BridgeError::Engine(EngineError::AttachSizeMismatch { .. }) => {
                ErrorClass::IncompatibleMatrixException
            }
            BridgeError::DistributionNotSupported { .. } => {
                ErrorClass::MatrixDistributionNotSupportedException
            }
            BridgeError::DuplicateRegistration { .. } | BridgeError::UnrepresentableType { .. } => {
                ErrorClass::DuplicateRegistrationException
            }
            BridgeError::Engine(_) => ErrorClass::EngineException,
            _ => ErrorClass::Exception,
        }
    }
}
