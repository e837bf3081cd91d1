//! Windows OCR through a persistent PowerShell session.
//!
//! This crate starts one PowerShell interpreter, loads a helper that binds
//! the `Windows.Media.Ocr` engine, and then answers recognition requests
//! over the interpreter's stdin/stdout. The interpreter is reused for every
//! call because loading the engine is the expensive part.
//!
//! ```no_run
//! use winocr_session::{open_session, InterpreterChoice};
//!
//! let session = open_session(InterpreterChoice::Auto)?;
//! let text = session.recognize("scan.png")?;
//! println!("{}", text);
//! # Ok::<(), winocr_session::WinOcrError>(())
//! ```

mod error;
mod image_ref;
mod interpreter;
mod script;
mod session;
mod transport;

pub use error::{ErrorCategory, Result, WinOcrError};
pub use image_ref::ImageRef;
pub use interpreter::{Interpreter, InterpreterChoice, InterpreterKind};
pub use script::{quote_literal, HelperScript};
pub use session::{
    Session, SessionOptions, DEFAULT_LANGUAGE, DEFAULT_STARTUP_TIMEOUT, DEFAULT_TIMEOUT,
};
pub use winocr_protocol::{ErrorCode, Handshake, OcrLine, OcrWord, Recognition};

/// Open a session with default options and the given interpreter choice.
pub fn open_session(choice: InterpreterChoice) -> Result<Session> {
    Session::open(SessionOptions::default().with_interpreter(choice))
}
