//! Error types shared by field evaluation and curve fitting.
use thiserror::Error;
use zincfield_linalg::LinalgError;

/// Errors reported by field construction, evaluation and fitting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    /// Malformed input detected before any computation or mutation took place.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The field cannot be evaluated at the requested location.
    ///
    /// This is a capability failure rather than a fault, see [`FieldCache::is_defined`].
    ///
    /// [`FieldCache::is_defined`]: crate::cache::FieldCache::is_defined
    #[error("field `{field}` is not defined at the requested location: {reason}")]
    NotDefinedAtLocation { field: String, reason: String },
    /// A linear system could not be solved.
    #[error("singular system")]
    SingularSystem,
    /// Sample data is insufficient or degenerate.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
    /// Derivatives were requested from a field which can only provide values.
    #[error("field `{field}` cannot provide derivatives")]
    DerivativesUnavailable { field: String },
}

impl FieldError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn not_defined(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotDefinedAtLocation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Attributes a location-specific failure to `field`.
    pub(crate) fn for_field(self, field: &str) -> Self {
        match self {
            Self::NotDefinedAtLocation { reason, .. } => Self::NotDefinedAtLocation {
                field: field.to_string(),
                reason,
            },
            Self::DerivativesUnavailable { .. } => Self::DerivativesUnavailable {
                field: field.to_string(),
            },
            other => other,
        }
    }
}

impl From<LinalgError> for FieldError {
    fn from(error: LinalgError) -> Self {
        match error {
            LinalgError::Singular => FieldError::SingularSystem,
            LinalgError::DimensionMismatch { .. } => FieldError::InvalidArgument(error.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, FieldError>;
