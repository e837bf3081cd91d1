//! Request types sent from the session to the helper.

use serde::{Deserialize, Serialize};

/// A request to the helper routine.
///
/// The `id` is echoed back on the matching response line, which lets the
/// session tell its answer apart from anything else the interpreter prints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelperRequest {
    /// Correlation id.
    pub id: String,

    /// Command to run.
    #[serde(flatten)]
    pub command: HelperCommand,
}

impl HelperRequest {
    /// Create a request with the given correlation id.
    pub fn new(id: impl Into<String>, command: HelperCommand) -> Self {
        Self {
            id: id.into(),
            command,
        }
    }

    /// Serialize the request as a single JSON line (without the newline).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Commands understood by the helper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HelperCommand {
    /// Report interpreter details and engine availability.
    Ready(ReadyRequest),

    /// Recognize text in an image file.
    Recognize(RecognizeRequest),
}

impl HelperCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            HelperCommand::Ready(_) => "ready",
            HelperCommand::Recognize(_) => "recognize",
        }
    }
}

/// Ready handshake parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadyRequest {
    /// BCP-47 tag of the language the session will recognize.
    pub language: String,
}

/// Recognition parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecognizeRequest {
    /// Absolute path of the image file.
    pub path: String,

    /// BCP-47 language tag for the recognizer.
    pub language: String,
}
