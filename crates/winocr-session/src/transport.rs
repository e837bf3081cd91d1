//! Line-oriented pipe to the interpreter process.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{Result, WinOcrError};
use crate::interpreter::Interpreter;
use crate::script::EXIT_COMMAND;

/// How often `shutdown` checks whether the interpreter has exited.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A running interpreter with its stdin and a channel of stdout lines.
///
/// Stdout is read on a dedicated thread so that waiting for a line can be
/// bounded by a timeout. Stderr is drained on another thread into the log;
/// an undrained stderr pipe would eventually block the interpreter.
#[derive(Debug)]
pub struct ProcessTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    exited: bool,
}

impl ProcessTransport {
    /// Start the interpreter.
    pub fn spawn(interpreter: &Interpreter) -> Result<Self> {
        let program = interpreter.program();

        let mut cmd = Command::new(program);
        cmd.args(interpreter.launch_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;

            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let spawn_error = |source: io::Error| WinOcrError::Spawn {
            program: program.display().to_string(),
            source,
        };

        let mut child = cmd.spawn().map_err(spawn_error)?;
        let pid = child.id();
        debug!("Spawned interpreter {:?} (pid {})", program, pid);

        let stdin = child.stdin.take();
        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WinOcrError::Transport(
                    "interpreter pipes were not captured".to_string(),
                ));
            }
        };

        let (tx, lines) = mpsc::channel();

        let stdout_thread = thread::Builder::new()
            .name(format!("winocr-stdout-{}", pid))
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf)
                                .trim_end_matches(['\r', '\n'])
                                .to_string();
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("Interpreter stdout read failed: {}", e);
                            break;
                        }
                    }
                }
                trace!("Interpreter {} stdout closed", pid);
            });

        let stderr_thread = stdout_thread.and_then(|_| {
            thread::Builder::new()
                .name(format!("winocr-stderr-{}", pid))
                .spawn(move || drain_stderr(pid, stderr))
        });

        if let Err(e) = stderr_thread {
            let _ = child.kill();
            let _ = child.wait();
            return Err(spawn_error(e));
        }

        Ok(Self {
            child,
            stdin,
            lines,
            exited: false,
        })
    }

    /// Interpreter process id.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Write one command line and flush it.
    pub fn send_line(&mut self, line: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "interpreter stdin closed"))?;

        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()
    }

    /// Wait up to `timeout` for the next stdout line.
    pub fn recv_line(&self, timeout: Duration) -> std::result::Result<String, RecvTimeoutError> {
        self.lines.recv_timeout(timeout)
    }

    /// Ask the interpreter to exit, killing it if it does not within `grace`.
    pub fn shutdown(&mut self, grace: Duration) {
        if self.exited {
            return;
        }

        let pid = self.pid();
        if let Err(e) = self.send_line(EXIT_COMMAND) {
            trace!("Could not send exit to interpreter {}: {}", pid, e);
        }
        // EOF on stdin also ends the command loop
        self.stdin = None;

        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Interpreter {} exited with {}", pid, status);
                    self.exited = true;
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
                Ok(None) => {
                    warn!("Interpreter {} did not exit within {:?}, killing it", pid, grace);
                    break;
                }
                Err(e) => {
                    warn!("Failed to poll interpreter {}: {}", pid, e);
                    break;
                }
            }
        }

        self.kill();
    }

    /// Terminate the interpreter immediately.
    pub fn kill(&mut self) {
        if self.exited {
            return;
        }
        self.stdin = None;

        let pid = self.pid();
        if let Err(e) = self.child.kill() {
            // already gone
            trace!("Kill of interpreter {} failed: {}", pid, e);
        }
        match self.child.wait() {
            Ok(status) => debug!("Interpreter {} terminated ({})", pid, status),
            Err(e) => warn!("Failed to reap interpreter {}: {}", pid, e),
        }
        self.exited = true;
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        self.kill();
    }
}

fn drain_stderr(pid: u32, stderr: impl Read) {
    let reader = BufReader::new(stderr);
    for line in reader.split(b'\n').map_while(|l| l.ok()) {
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end();
        if !line.is_empty() {
            debug!("interpreter {} stderr: {}", pid, line);
        }
    }
}
