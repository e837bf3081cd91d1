//! Output formatting for CLI responses.

use serde::Serialize;
use winocr_protocol::{ErrorCode, Handshake, Recognition};
use winocr_session::{Interpreter, WinOcrError};

/// Output formatter.
pub struct Output {
    json: bool,
}

/// One JSON line per result, shaped like the helper's own responses.
#[derive(Serialize)]
struct JsonLine<'a, T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError>,
}

#[derive(Serialize)]
struct JsonError {
    code: String,
    category: &'static str,
    message: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonData<'a> {
    Recognized {
        text: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        lines: Option<&'a [winocr_protocol::OcrLine]>,
    },
    Languages {
        languages: &'a [String],
        requested: &'a str,
        requested_available: bool,
    },
    Info {
        interpreter: String,
        program: String,
        version: &'a str,
        edition: &'a str,
        pid: u32,
        languages: &'a [String],
        #[serde(skip_serializing_if = "Option::is_none")]
        max_image_dimension: Option<u32>,
    },
}

impl Output {
    /// Create a new output formatter.
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print the result for one image.
    ///
    /// `header` prefixes the text with the image name, used when several
    /// images are recognized in one run.
    pub fn print_recognition(
        &self,
        image: &str,
        recognition: &Recognition,
        lines: bool,
        header: bool,
    ) {
        if self.json {
            let data = JsonData::Recognized {
                text: &recognition.text,
                lines: lines.then_some(recognition.lines.as_slice()),
            };
            self.print_json(Some(image), Some(data), None);
            return;
        }

        if header {
            println!("==> {} <==", image);
        }

        if lines {
            for line in &recognition.lines {
                println!("{}\t{}", line.words.len(), line.text);
            }
        } else if !recognition.text.is_empty() {
            println!("{}", recognition.text);
        }
    }

    /// Print the installed languages.
    pub fn print_languages(&self, handshake: &Handshake, requested: &str) {
        if self.json {
            let data = JsonData::Languages {
                languages: &handshake.languages,
                requested,
                requested_available: handshake.language_available,
            };
            self.print_json(None, Some(data), None);
        } else if handshake.languages.is_empty() {
            println!("No OCR languages installed");
        } else {
            for language in &handshake.languages {
                println!("{}", language);
            }
        }
    }

    /// Print interpreter and engine details.
    pub fn print_info(&self, interpreter: &Interpreter, handshake: &Handshake, language: &str) {
        if self.json {
            let data = JsonData::Info {
                interpreter: interpreter.kind().to_string(),
                program: interpreter.program().display().to_string(),
                version: &handshake.version,
                edition: &handshake.edition,
                pid: handshake.pid,
                languages: &handshake.languages,
                max_image_dimension: handshake.max_image_dimension,
            };
            self.print_json(None, Some(data), None);
            return;
        }

        println!("Interpreter: {}", interpreter.kind());
        println!("Program: {}", interpreter.program().display());
        println!("Version: {} ({})", handshake.version, handshake.edition);
        println!("PID: {}", handshake.pid);
        println!("Languages: {}", handshake.languages.join(", "));
        println!(
            "Language {}: {}",
            language,
            if handshake.language_available {
                "available"
            } else {
                "not installed"
            }
        );
        if let Some(max) = handshake.max_image_dimension {
            println!("Max image dimension: {}", max);
        }
    }

    /// Print an error, optionally tied to one image.
    pub fn print_error(&self, image: Option<&str>, err: &WinOcrError) {
        if self.json {
            let error = JsonError {
                code: error_code(err),
                category: err.category().as_str(),
                message: err.to_string(),
            };
            self.print_json::<JsonData>(image, None, Some(error));
        } else {
            match image {
                Some(image) => eprintln!("Error [{}]: {}: {}", error_code(err), image, err),
                None => eprintln!("Error [{}]: {}", error_code(err), err),
            }
        }
    }

    fn print_json<T: Serialize>(&self, image: Option<&str>, data: Option<T>, error: Option<JsonError>) {
        let line = JsonLine {
            success: error.is_none(),
            image,
            data,
            error,
        };
        match serde_json::to_string(&line) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error [internal_error]: failed to encode output: {}", e),
        }
    }
}

/// Stable snake_case code for an error.
pub fn error_code(err: &WinOcrError) -> String {
    if let Some(code) = err.code() {
        return helper_code(code);
    }

    match err {
        WinOcrError::NoInterpreter | WinOcrError::InterpreterUnavailable(_) => "no_interpreter",
        WinOcrError::Spawn { .. } => "spawn_failed",
        WinOcrError::HelperInstall(_) => "helper_install_failed",
        WinOcrError::Timeout(_) => "timeout",
        WinOcrError::SessionBroken(_) => "session_broken",
        WinOcrError::SessionClosed => "session_closed",
        WinOcrError::InvalidImage(_) | WinOcrError::Image(_) => "invalid_image",
        WinOcrError::Io(_) => "io_error",
        _ => "transport_error",
    }
    .to_string()
}

fn helper_code(code: ErrorCode) -> String {
    serde_json::to_value(code)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "internal_error".to_string())
}
