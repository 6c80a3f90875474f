use thiserror::Error;

use ox_tensor::TensorError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error("unknown operator '{op}' in domain '{domain}'")]
    UnknownOperator { domain: String, op: String },
    #[error("operator '{op}' has no implementation for version {version}")]
    UnsupportedVersion { op: String, version: u32 },
    #[error("operator '{op}' already has a variant covering version {since}")]
    ConflictingVariant { op: String, since: u32 },
    #[error("invalid input for '{op}': {reason}")]
    InvalidOperatorInput { op: String, reason: String },
    #[error("invalid attribute '{attribute}' for '{op}': {reason}")]
    InvalidAttribute {
        op: String,
        attribute: String,
        reason: String,
    },
    #[error("shape mismatch in {op}: {detail}")]
    ShapeMismatch { op: String, detail: String },
    #[error("execution cancelled")]
    Cancelled,
}

impl RuntimeError {
    pub(crate) fn input(op: &str, reason: impl Into<String>) -> Self {
        RuntimeError::InvalidOperatorInput {
            op: op.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(op: &str, detail: impl Into<String>) -> Self {
        RuntimeError::ShapeMismatch {
            op: op.to_string(),
            detail: detail.into(),
        }
    }

    /// True for shape mismatches raised here or by the tensor layer.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            RuntimeError::ShapeMismatch { .. }
                | RuntimeError::Tensor(TensorError::ShapeMismatch { .. })
        )
    }

    pub fn is_unsupported_type(&self) -> bool {
        matches!(self, RuntimeError::Tensor(TensorError::UnsupportedType(_)))
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
