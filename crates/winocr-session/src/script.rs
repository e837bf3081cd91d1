//! Helper script installation and command encoding.

use std::path::{Path, PathBuf};

use base64::Engine;
use tempfile::TempDir;
use tracing::{debug, warn};
use winocr_protocol::HelperRequest;

use crate::error::{Result, WinOcrError};
use crate::interpreter::InterpreterKind;

/// Loader for Windows PowerShell 5.1.
const LEGACY_LOADER: &str = include_str!("scripts/legacy.ps1");

/// Loader for PowerShell 7.
const MODERN_LOADER: &str = include_str!("scripts/modern.ps1");

/// Request dispatcher shared by both variants.
const HELPER: &str = include_str!("scripts/helper.ps1");

/// File name of the installed helper.
const SCRIPT_NAME: &str = "winocr-helper.ps1";

/// Command that ends the interpreter loop.
pub(crate) const EXIT_COMMAND: &str = "exit";

/// The helper script written to a private temporary directory.
#[derive(Debug)]
pub struct HelperScript {
    dir: TempDir,
    path: PathBuf,
}

impl HelperScript {
    /// Full script text for the given interpreter variant.
    pub fn source(kind: InterpreterKind) -> String {
        let loader = match kind {
            InterpreterKind::Modern => MODERN_LOADER,
            InterpreterKind::Legacy => LEGACY_LOADER,
        };
        format!("{}\n{}", loader, HELPER)
    }

    /// Write the helper for `kind` into a fresh temporary directory.
    pub fn install(kind: InterpreterKind) -> Result<Self> {
        Self::install_in(kind, std::env::temp_dir())
    }

    /// Write the helper for `kind` into a fresh directory under `parent`.
    pub fn install_in(kind: InterpreterKind, parent: impl AsRef<Path>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("winocr-")
            .tempdir_in(parent)
            .map_err(WinOcrError::HelperInstall)?;
        let path = dir.path().join(SCRIPT_NAME);

        // Windows PowerShell reads BOM-less scripts in the ANSI code page
        let mut contents = Vec::from("\u{feff}".as_bytes());
        contents.extend_from_slice(Self::source(kind).as_bytes());
        std::fs::write(&path, contents).map_err(WinOcrError::HelperInstall)?;

        debug!("Wrote helper script to {:?}", path);
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Command that loads the helper into the running interpreter.
    ///
    /// The script path travels base64-encoded because redirected stdin is
    /// decoded in the console code page, which mangles non-ASCII profile
    /// directories. Loading prints nothing on success. On failure it answers
    /// `request_id` with an `engine_unavailable` response line.
    pub fn load_command(&self, request_id: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(self.path.to_string_lossy().as_bytes());

        format!(
            "try {{ $ErrorActionPreference = 'Stop'; \
             . ([System.Text.Encoding]::UTF8.GetString([Convert]::FromBase64String({path}))) }} \
             catch {{ [Console]::Out.WriteLine((ConvertTo-Json -Compress -InputObject @{{ \
             id = {id}; success = $false; error = @{{ code = 'engine_unavailable'; \
             message = 'failed to load helper: ' + $_.Exception.Message }} }})); \
             [Console]::Out.Flush() }}",
            path = quote_literal(&encoded),
            id = quote_literal(request_id),
        )
    }

    /// Remove the script directory.
    pub fn remove(self) {
        let dir = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove helper directory {:?}: {}", dir, e);
        } else {
            debug!("Removed helper directory {:?}", dir);
        }
    }
}

/// Quote a string as a PowerShell single-quoted literal.
///
/// Inside single quotes PowerShell only interprets the quote characters
/// themselves, and it treats the typographic single quotes as equivalent
/// to `'`. Each of them is doubled.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if is_single_quote(c) {
            quoted.push(c);
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

fn is_single_quote(c: char) -> bool {
    matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{201b}')
}

/// Encode a request as an interpreter command line (without the newline).
///
/// The JSON travels base64-encoded, so paths with quotes, `$`, backticks
/// or non-ASCII characters never reach the PowerShell parser.
pub fn request_command(request: &HelperRequest) -> Result<String> {
    let json = request.to_json()?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(json.as_bytes());
    Ok(format!("Invoke-WinOcr -Request {}", quote_literal(&encoded)))
}
