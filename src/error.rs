use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which validation pass rejected an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    Metadata,
    Params,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStage::Metadata => f.write_str("metadata"),
            ValidationStage::Params => f.write_str("params"),
        }
    }
}

/// Everything that can abort an invocation.
///
/// Rejected input is not in here; it is a `StepOutcome::Retryable` that the
/// prompt chain handles itself.
#[derive(Debug, Error)]
pub enum StencilError {
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("{path}: no export named {export}")]
    ExportNotFound { path: PathBuf, export: String },

    #[error("{path}: {reason}")]
    ScriptLoad { path: PathBuf, reason: String },

    #[error("{stage} validation failed: {reason}")]
    ValidationFailed {
        stage: ValidationStage,
        reason: String,
    },

    #[error("prompt failed: {0}")]
    PromptFailed(String),

    #[error("could not write {path}: {reason}")]
    Materialization { path: PathBuf, reason: String },

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 1;
    pub const TEMPLATE_FAILURE: i32 = 2;
    pub const VALIDATION_FAILURE: i32 = 3;
    pub const WRITE_FAILURE: i32 = 4;
    pub const INTERNAL: i32 = 5;
}

impl StencilError {
    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            stage: ValidationStage::Metadata,
            reason: reason.into(),
        }
    }

    pub fn params(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            stage: ValidationStage::Params,
            reason: reason.into(),
        }
    }

    pub fn script_load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::ScriptLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            StencilError::MissingParameter(_) | StencilError::Config(_) => exit_codes::USER_ERROR,
            StencilError::TemplateNotFound(_)
            | StencilError::ExportNotFound { .. }
            | StencilError::ScriptLoad { .. } => exit_codes::TEMPLATE_FAILURE,
            StencilError::ValidationFailed { .. } => exit_codes::VALIDATION_FAILURE,
            StencilError::Materialization { .. } => exit_codes::WRITE_FAILURE,
            StencilError::PromptFailed(_) | StencilError::Io(_) => exit_codes::INTERNAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, StencilError>;
