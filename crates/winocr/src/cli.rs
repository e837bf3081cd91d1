//! CLI command definitions using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use winocr_session::{InterpreterChoice, SessionOptions, DEFAULT_LANGUAGE};

pub mod commands;

/// Recognize text in images with the Windows OCR engine.
#[derive(Parser, Debug)]
#[command(name = "winocr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// PowerShell variant to use (auto, modern, legacy)
    #[arg(
        long,
        default_value = "auto",
        env = "WINOCR_INTERPRETER",
        global = true
    )]
    pub interpreter: InterpreterChoice,

    /// Explicit interpreter executable (overrides --interpreter)
    #[arg(long, env = "WINOCR_INTERPRETER_PATH", global = true)]
    pub interpreter_path: Option<PathBuf>,

    /// Recognition language as a BCP-47 tag
    #[arg(long, default_value = DEFAULT_LANGUAGE, env = "WINOCR_LANGUAGE", global = true)]
    pub language: String,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Per-image timeout in milliseconds
    #[arg(long, default_value = "30000", env = "WINOCR_TIMEOUT_MS", global = true)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Session options selected by the global flags.
    pub fn session_options(&self) -> SessionOptions {
        let mut options = SessionOptions::default()
            .with_interpreter(self.interpreter)
            .with_language(self.language.clone())
            .with_timeout(Duration::from_millis(self.timeout));

        if let Some(path) = &self.interpreter_path {
            options = options.with_program(path.clone());
        }

        options
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recognize text in one or more images
    Recognize(RecognizeArgs),

    /// List the installed OCR languages
    Languages,

    /// Show the interpreter and engine details
    Info,
}

/// Recognize command arguments.
#[derive(Args, Debug)]
pub struct RecognizeArgs {
    /// Image files or glob patterns
    #[arg(required = true, value_name = "IMAGE")]
    pub images: Vec<String>,

    /// Print one recognized line per output line with word counts
    #[arg(long)]
    pub lines: bool,
}
