//! Persistent recognition session.

use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;
use winocr_protocol::{
    ErrorCode, ErrorInfo, Handshake, HelperCommand, HelperRequest, HelperResponse, ReadyRequest,
    Recognition, RecognizeRequest, ResponseData,
};

use crate::error::{ErrorCategory, Result, WinOcrError};
use crate::image_ref::ImageRef;
use crate::interpreter::{Interpreter, InterpreterChoice};
use crate::script::{self, HelperScript};
use crate::transport::ProcessTransport;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for loading the helper and completing the handshake.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Default recognition language.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// How long `close` waits for the interpreter to exit on its own.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Options for opening a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Which interpreter variant to look for.
    pub interpreter: InterpreterChoice,
    /// Explicit interpreter executable. Overrides `interpreter`.
    pub program: Option<PathBuf>,
    /// BCP-47 recognition language.
    pub language: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Timeout for the ready handshake.
    pub startup_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            interpreter: InterpreterChoice::Auto,
            program: None,
            language: DEFAULT_LANGUAGE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

impl SessionOptions {
    pub fn with_interpreter(mut self, choice: InterpreterChoice) -> Self {
        self.interpreter = choice;
        self
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Resolve the interpreter these options select.
    pub fn resolve_interpreter(&self) -> Result<Interpreter> {
        match &self.program {
            Some(program) => Ok(Interpreter::from_program(program)),
            None => Interpreter::detect(self.interpreter),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Ready,
    Broken(String),
    Closed,
}

#[derive(Debug)]
struct Inner {
    state: State,
    transport: Option<ProcessTransport>,
    script: Option<HelperScript>,
}

impl Inner {
    fn check_usable(&self) -> Result<()> {
        match &self.state {
            State::Ready => Ok(()),
            State::Broken(reason) => Err(WinOcrError::SessionBroken(reason.clone())),
            State::Closed => Err(WinOcrError::SessionClosed),
        }
    }

    fn exchange(&mut self, request: &HelperRequest, timeout: Duration) -> Result<ResponseData> {
        let transport = self.transport.as_mut().ok_or(WinOcrError::SessionClosed)?;

        match exchange(transport, request, timeout) {
            Err(e) if e.category() == ErrorCategory::Transport => {
                self.mark_broken(&e);
                Err(e)
            }
            other => other,
        }
    }

    fn mark_broken(&mut self, cause: &WinOcrError) {
        warn!("Session broken: {}", cause);
        self.state = State::Broken(cause.to_string());
        if let Some(mut transport) = self.transport.take() {
            transport.kill();
        }
    }
}

/// A long-lived interpreter with the OCR helper loaded.
///
/// Opening a session spawns the interpreter, loads the helper and waits for
/// its ready handshake. Each [`recognize`](Session::recognize) call is one
/// request/response round trip with that process; calls from several threads
/// are serialized. Dropping the session closes it.
///
/// A transport failure (the process died, its pipe closed, or a request
/// timed out) leaves the session broken. It is never respawned; open a new
/// one instead.
#[derive(Debug)]
pub struct Session {
    interpreter: Interpreter,
    handshake: Handshake,
    language: String,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl Session {
    /// Open a session and check that the requested language is installed.
    pub fn open(options: SessionOptions) -> Result<Self> {
        let session = Self::start(options)?;

        if !session.handshake.language_available {
            let available = if session.handshake.languages.is_empty() {
                "none".to_string()
            } else {
                session.handshake.languages.join(", ")
            };
            return Err(WinOcrError::Environment {
                code: ErrorCode::LanguageUnavailable,
                message: format!(
                    "no OCR recognizer installed for '{}' (installed: {})",
                    session.language, available
                ),
            });
        }

        Ok(session)
    }

    /// Start an interpreter, report its handshake and shut it down again.
    ///
    /// Unlike [`open`](Session::open) this succeeds when the requested
    /// language is missing, so callers can list what is installed.
    pub fn probe(options: SessionOptions) -> Result<(Interpreter, Handshake)> {
        let session = Self::start(options)?;
        let details = (session.interpreter.clone(), session.handshake.clone());
        session.close()?;
        Ok(details)
    }

    fn start(options: SessionOptions) -> Result<Self> {
        let interpreter = options.resolve_interpreter()?;
        info!(
            "Starting {} session ({})",
            interpreter.kind(),
            interpreter.program().display()
        );

        let script = HelperScript::install(interpreter.kind())?;
        let mut transport = ProcessTransport::spawn(&interpreter)?;

        let request = HelperRequest::new(
            new_request_id(),
            HelperCommand::Ready(ReadyRequest {
                language: options.language.clone(),
            }),
        );

        // A failed load answers the ready request with engine_unavailable
        transport
            .send_line(&script.load_command(&request.id))
            .map_err(|e| WinOcrError::Transport(format!("failed to load helper: {}", e)))?;

        let handshake = match exchange(&mut transport, &request, options.startup_timeout)? {
            ResponseData::Ready(handshake) => handshake,
            other => {
                return Err(WinOcrError::Transport(format!(
                    "unexpected handshake response: {:?}",
                    other
                )))
            }
        };

        info!(
            "Interpreter ready: PowerShell {} {}, pid {}, languages {:?}",
            handshake.version, handshake.edition, handshake.pid, handshake.languages
        );

        Ok(Self {
            interpreter,
            handshake,
            language: options.language,
            timeout: options.timeout,
            inner: Mutex::new(Inner {
                state: State::Ready,
                transport: Some(transport),
                script: Some(script),
            }),
        })
    }

    /// Recognize the text in an image.
    pub fn recognize(&self, image: impl Into<ImageRef>) -> Result<String> {
        Ok(self.recognize_detailed(image)?.text)
    }

    /// Recognize an image, keeping line and word bounding boxes.
    pub fn recognize_detailed(&self, image: impl Into<ImageRef>) -> Result<Recognition> {
        let image = image.into();
        let description = image.describe();

        self.inner.lock().check_usable()?;

        // Materialize outside the lock, the temp file lives until this returns
        let prepared = image.prepare()?;

        let request = HelperRequest::new(
            new_request_id(),
            HelperCommand::Recognize(RecognizeRequest {
                path: prepared.path().to_string_lossy().into_owned(),
                language: self.language.clone(),
            }),
        );

        let started = Instant::now();
        let data = {
            let mut inner = self.inner.lock();
            inner.check_usable()?;
            inner.exchange(&request, self.timeout)?
        };

        match data {
            ResponseData::Recognized(recognition) => {
                debug!(
                    "Recognized {} lines from {} in {:?}",
                    recognition.lines.len(),
                    description,
                    started.elapsed()
                );
                Ok(recognition)
            }
            other => {
                let e = WinOcrError::Transport(format!(
                    "unexpected response to recognize: {:?}",
                    other
                ));
                self.inner.lock().mark_broken(&e);
                Err(e)
            }
        }
    }

    /// Terminate the interpreter. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        let (transport, script) = {
            let mut inner = self.inner.lock();
            if inner.state == State::Closed {
                return Ok(());
            }
            inner.state = State::Closed;
            (inner.transport.take(), inner.script.take())
        };

        if let Some(mut transport) = transport {
            debug!("Closing session (pid {})", transport.pid());
            transport.shutdown(CLOSE_GRACE);
        }

        if let Some(script) = script {
            script.remove();
        }

        Ok(())
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Details reported by the helper when the session started.
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Interpreter process id.
    pub fn pid(&self) -> u32 {
        self.handshake.pid
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn is_broken(&self) -> bool {
        matches!(self.inner.lock().state, State::Broken(_))
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().state == State::Closed
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close session: {}", e);
        }
    }
}

/// Send one request and wait for the response carrying its id.
fn exchange(
    transport: &mut ProcessTransport,
    request: &HelperRequest,
    timeout: Duration,
) -> Result<ResponseData> {
    let command = script::request_command(request)?;

    debug!("Sending {} request {}", request.command.name(), request.id);
    transport
        .send_line(&command)
        .map_err(|e| WinOcrError::Transport(format!("failed to write to interpreter: {}", e)))?;

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let line = match transport.recv_line(remaining) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => return Err(WinOcrError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(WinOcrError::Transport(
                    "interpreter exited before responding".to_string(),
                ))
            }
        };

        let Some(response) = HelperResponse::from_line(&line) else {
            trace!("Skipping interpreter output: {}", line);
            continue;
        };

        if response.id != request.id {
            debug!("Ignoring response for request {}", response.id);
            continue;
        }

        if response.success {
            return response.data.ok_or_else(|| {
                WinOcrError::Transport("helper response is missing data".to_string())
            });
        }

        let error = response.error.unwrap_or(ErrorInfo {
            code: ErrorCode::InternalError,
            message: "helper reported failure without details".to_string(),
        });
        debug!("Request {} failed: {} ({})", request.id, error.message, error.code);
        return Err(WinOcrError::from_helper(error.code, error.message));
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}
