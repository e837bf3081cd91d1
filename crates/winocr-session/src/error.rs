use std::time::Duration;

use thiserror::Error;
use winocr_protocol::ErrorCode;

use crate::interpreter::InterpreterKind;

#[derive(Error, Debug)]
pub enum WinOcrError {
    #[error("no PowerShell interpreter found on PATH (looked for pwsh and powershell)")]
    NoInterpreter,

    #[error("{0} interpreter is not available")]
    InterpreterUnavailable(InterpreterKind),

    #[error("failed to start interpreter {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install helper script: {0}")]
    HelperInstall(#[source] std::io::Error),

    #[error("OCR environment error ({code}): {message}")]
    Environment { code: ErrorCode, message: String },

    #[error("recognition failed ({code}): {message}")]
    Recognition { code: ErrorCode, message: String },

    #[error("interpreter transport error: {0}")]
    Transport(String),

    #[error("no response from interpreter within {0:?}")]
    Timeout(Duration),

    #[error("session is broken and must be reopened: {0}")]
    SessionBroken(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Broad failure categories, each with its own recovery story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Interpreter or engine missing. Needs operator action.
    Environment,
    /// Bad image. The session stays usable.
    Input,
    /// The interpreter pipe failed. The session must be reopened.
    Transport,
}

impl ErrorCategory {
    /// Process exit code used by the CLI for this category.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Input => 1,
            ErrorCategory::Environment => 3,
            ErrorCategory::Transport => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Environment => "environment",
            ErrorCategory::Input => "input",
            ErrorCategory::Transport => "transport",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WinOcrError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WinOcrError::NoInterpreter
            | WinOcrError::InterpreterUnavailable(_)
            | WinOcrError::Spawn { .. }
            | WinOcrError::HelperInstall(_)
            | WinOcrError::Environment { .. } => ErrorCategory::Environment,
            WinOcrError::Recognition { .. }
            | WinOcrError::InvalidImage(_)
            | WinOcrError::Image(_)
            | WinOcrError::Io(_) => ErrorCategory::Input,
            WinOcrError::Transport(_)
            | WinOcrError::Timeout(_)
            | WinOcrError::SessionBroken(_)
            | WinOcrError::SessionClosed
            | WinOcrError::Serialization(_) => ErrorCategory::Transport,
        }
    }

    /// Helper error code, when the helper reported the failure.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            WinOcrError::Environment { code, .. } | WinOcrError::Recognition { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }

    /// Map a helper error code to the matching error variant.
    pub(crate) fn from_helper(code: ErrorCode, message: String) -> Self {
        match code {
            ErrorCode::LanguageUnavailable | ErrorCode::EngineUnavailable => {
                WinOcrError::Environment { code, message }
            }
            // the helper could not parse what we sent
            ErrorCode::InvalidRequest => {
                WinOcrError::Transport(format!("helper rejected request: {}", message))
            }
            _ => WinOcrError::Recognition { code, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, WinOcrError>;
