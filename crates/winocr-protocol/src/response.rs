//! Response types printed by the helper.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A response line from the helper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperResponse {
    /// Correlation id copied from the request.
    pub id: String,

    /// Whether the command succeeded.
    pub success: bool,

    /// Response data on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,

    /// Error details on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl HelperResponse {
    /// Create a successful response.
    pub fn success(id: impl Into<String>, data: ResponseData) -> Self {
        Self {
            id: id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            data: None,
            error: Some(ErrorInfo {
                code,
                message: message.into(),
            }),
        }
    }

    /// Parse one line of interpreter output.
    ///
    /// Returns `None` for anything that is not a response object: banners,
    /// prompts, echoed commands and blank lines all end up here.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim().trim_start_matches('\u{feff}');
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

/// Response data variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    /// Ready handshake.
    Ready(Handshake),

    /// Recognized text.
    Recognized(Recognition),
}

/// Interpreter and engine details reported by the ready handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Handshake {
    /// `$PSVersionTable.PSVersion` of the interpreter.
    pub version: String,

    /// `Desktop` for Windows PowerShell, `Core` for PowerShell 7.
    #[serde(default)]
    pub edition: String,

    /// Interpreter process id.
    pub pid: u32,

    /// Recognizer languages installed on the host.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Whether the requested language can be recognized.
    pub language_available: bool,

    /// Largest width or height the engine accepts, in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_image_dimension: Option<u32>,
}

/// Text recognized in one image.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Recognition {
    /// Full text, one line per recognized line.
    pub text: String,

    /// Detected text rotation in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_angle: Option<f64>,

    /// Recognized lines with their words.
    #[serde(default)]
    pub lines: Vec<OcrLine>,
}

impl Recognition {
    /// Total number of words across all lines.
    pub fn word_count(&self) -> usize {
        self.lines.iter().map(|l| l.words.len()).sum()
    }
}

/// A recognized line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrLine {
    /// Line text.
    pub text: String,

    /// Words in reading order.
    #[serde(default)]
    pub words: Vec<OcrWord>,
}

/// A recognized word and its bounding box in image pixels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

/// Error codes reported by the helper.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Image file does not exist or cannot be opened.
    #[error("file not found")]
    FileNotFound,

    /// Image file could not be decoded.
    #[error("decode failed")]
    DecodeFailed,

    /// Image exceeds the engine's maximum dimension.
    #[error("image too large")]
    ImageTooLarge,

    /// No recognizer is installed for the requested language.
    #[error("language unavailable")]
    LanguageUnavailable,

    /// The recognition engine or its bindings could not be loaded.
    #[error("engine unavailable")]
    EngineUnavailable,

    /// The engine failed while recognizing.
    #[error("recognition failed")]
    RecognitionFailed,

    /// The helper could not understand the request.
    #[error("invalid request")]
    InvalidRequest,

    /// Unexpected failure inside the helper.
    #[error("internal error")]
    #[serde(other)]
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let resp = HelperResponse::success(
            "abc",
            ResponseData::Recognized(Recognition {
                text: "HELLO WORLD".to_string(),
                ..Default::default()
            }),
        );

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"type\":\"recognized\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_error_response() {
        let resp = HelperResponse::error("abc", ErrorCode::FileNotFound, "no such file");

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"code\":\"file_not_found\""));
    }

    #[test]
    fn test_from_line_skips_noise() {
        assert!(HelperResponse::from_line("").is_none());
        assert!(HelperResponse::from_line("PowerShell 7.4.1").is_none());
        assert!(HelperResponse::from_line("PS C:\\> Invoke-WinOcr -Request 'e30='").is_none());
        assert!(HelperResponse::from_line("{not json").is_none());
        assert!(HelperResponse::from_line(r#"{"unrelated":true}"#).is_none());
    }

    #[test]
    fn test_from_line_parses_helper_output() {
        // Shape produced by ConvertTo-Json -Compress in Windows PowerShell
        let line = "\u{feff}{\"id\":\"r1\",\"success\":true,\"data\":{\"type\":\"recognized\",\
                    \"text\":\"HELLO WORLD\",\"text_angle\":null,\"lines\":[{\"text\":\"HELLO WORLD\",\
                    \"words\":[{\"text\":\"HELLO\",\"x\":10,\"y\":12,\"width\":80,\"height\":20},\
                    {\"text\":\"WORLD\",\"x\":96,\"y\":12,\"width\":85.5,\"height\":20}]}]}}\r";

        let resp = HelperResponse::from_line(line).unwrap();
        assert_eq!(resp.id, "r1");

        match resp.data {
            Some(ResponseData::Recognized(rec)) => {
                assert_eq!(rec.text, "HELLO WORLD");
                assert_eq!(rec.text_angle, None);
                assert_eq!(rec.word_count(), 2);
                assert_eq!(rec.lines[0].words[1].width, 85.5);
            }
            other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn test_handshake_parses() {
        let line = r#"{"id":"h","success":true,"data":{"type":"ready","version":"5.1.22621.2506","edition":"Desktop","pid":4242,"languages":["en-US","de-DE"],"language_available":true,"max_image_dimension":10000}}"#;

        let resp = HelperResponse::from_line(line).unwrap();
        match resp.data {
            Some(ResponseData::Ready(h)) => {
                assert_eq!(h.pid, 4242);
                assert_eq!(h.languages, vec!["en-US", "de-DE"]);
                assert!(h.language_available);
                assert_eq!(h.max_image_dimension, Some(10000));
            }
            other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_error_code_maps_to_internal() {
        let line = r#"{"id":"e","success":false,"error":{"code":"something_new","message":"boom"}}"#;

        let resp = HelperResponse::from_line(line).unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, ErrorCode::InternalError);
        assert_eq!(error.message, "boom");
    }
}
