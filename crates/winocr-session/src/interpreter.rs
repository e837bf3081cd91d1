//! PowerShell interpreter discovery.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{Result, WinOcrError};

/// Arguments that turn the interpreter into a quiet stdin command loop.
const LAUNCH_ARGS: &[&str] = &[
    "-NoLogo",
    "-NoProfile",
    "-NonInteractive",
    "-ExecutionPolicy",
    "Bypass",
    "-Command",
    "-",
];

/// Supported interpreter variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterpreterKind {
    /// PowerShell 7 (`pwsh`).
    Modern,
    /// Windows PowerShell 5.1 (`powershell`).
    Legacy,
}

impl InterpreterKind {
    /// Executable name without extension.
    pub fn executable_name(self) -> &'static str {
        match self {
            InterpreterKind::Modern => "pwsh",
            InterpreterKind::Legacy => "powershell",
        }
    }
}

impl fmt::Display for InterpreterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterKind::Modern => write!(f, "PowerShell 7 (pwsh)"),
            InterpreterKind::Legacy => write!(f, "Windows PowerShell 5.1 (powershell)"),
        }
    }
}

/// Which interpreter the caller wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InterpreterChoice {
    /// Prefer modern, fall back to legacy.
    #[default]
    Auto,
    /// Require PowerShell 7.
    Modern,
    /// Require Windows PowerShell 5.1.
    Legacy,
}

impl FromStr for InterpreterChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(InterpreterChoice::Auto),
            "modern" | "7" | "pwsh" => Ok(InterpreterChoice::Modern),
            "legacy" | "5.1" | "powershell" => Ok(InterpreterChoice::Legacy),
            other => Err(format!(
                "unknown interpreter '{}' (expected auto, modern or legacy)",
                other
            )),
        }
    }
}

impl fmt::Display for InterpreterChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpreterChoice::Auto => "auto",
            InterpreterChoice::Modern => "modern",
            InterpreterChoice::Legacy => "legacy",
        };
        f.write_str(name)
    }
}

/// A resolved interpreter executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    kind: InterpreterKind,
    program: PathBuf,
}

impl Interpreter {
    /// Use a specific executable as the given variant.
    pub fn at(kind: InterpreterKind, program: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            program: program.into(),
        }
    }

    /// Use a specific executable, inferring the variant from its file name.
    pub fn from_program(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let kind = match program.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if stem.eq_ignore_ascii_case("pwsh") => InterpreterKind::Modern,
            _ => InterpreterKind::Legacy,
        };
        Self { kind, program }
    }

    /// Find an interpreter on `PATH`.
    pub fn detect(choice: InterpreterChoice) -> Result<Self> {
        let path = std::env::var_os("PATH").unwrap_or_default();
        Self::detect_in(choice, std::env::split_paths(&path))
    }

    /// Find an interpreter in the given directories.
    pub fn detect_in<I>(choice: InterpreterChoice, dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let dirs: Vec<PathBuf> = dirs.into_iter().collect();
        let find = |kind: InterpreterKind| {
            find_executable(kind.executable_name(), &dirs).map(|program| Self { kind, program })
        };

        let found = match choice {
            InterpreterChoice::Auto => find(InterpreterKind::Modern)
                .or_else(|| find(InterpreterKind::Legacy))
                .ok_or(WinOcrError::NoInterpreter)?,
            InterpreterChoice::Modern => find(InterpreterKind::Modern)
                .ok_or(WinOcrError::InterpreterUnavailable(InterpreterKind::Modern))?,
            InterpreterChoice::Legacy => find(InterpreterKind::Legacy)
                .ok_or(WinOcrError::InterpreterUnavailable(InterpreterKind::Legacy))?,
        };

        debug!("Selected {} at {:?}", found.kind, found.program);
        Ok(found)
    }

    pub fn kind(&self) -> InterpreterKind {
        self.kind
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments used to start the interpreter.
    pub fn launch_args(&self) -> &'static [&'static str] {
        LAUNCH_ARGS
    }
}

fn find_executable(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let extensions = executable_extensions();
    dirs.iter()
        .flat_map(|dir| {
            extensions
                .iter()
                .map(move |ext| dir.join(format!("{}{}", name, ext)))
        })
        .find(|candidate| candidate.is_file())
}

#[cfg(windows)]
fn executable_extensions() -> Vec<String> {
    let pathext = std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    let mut exts: Vec<String> = pathext
        .split(';')
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
        .collect();
    // .exe first
    if let Some(pos) = exts.iter().position(|e| e == ".exe") {
        let exe = exts.remove(pos);
        exts.insert(0, exe);
    }
    exts
}

#[cfg(not(windows))]
fn executable_extensions() -> Vec<String> {
    vec![String::new()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_exe(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(format!("{}{}", name, std::env::consts::EXE_SUFFIX));
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_auto_prefers_modern() {
        let legacy_dir = TempDir::new().unwrap();
        let modern_dir = TempDir::new().unwrap();
        fake_exe(legacy_dir.path(), "powershell");
        let pwsh = fake_exe(modern_dir.path(), "pwsh");

        let found = Interpreter::detect_in(
            InterpreterChoice::Auto,
            vec![legacy_dir.path().to_path_buf(), modern_dir.path().to_path_buf()],
        )
        .unwrap();

        assert_eq!(found.kind(), InterpreterKind::Modern);
        assert_eq!(found.program(), pwsh.as_path());
    }

    #[test]
    fn test_auto_falls_back_to_legacy() {
        let dir = TempDir::new().unwrap();
        fake_exe(dir.path(), "powershell");

        let found =
            Interpreter::detect_in(InterpreterChoice::Auto, vec![dir.path().to_path_buf()]).unwrap();
        assert_eq!(found.kind(), InterpreterKind::Legacy);
    }

    #[test]
    fn test_nothing_found() {
        let dir = TempDir::new().unwrap();

        let err = Interpreter::detect_in(InterpreterChoice::Auto, vec![dir.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, WinOcrError::NoInterpreter));
    }

    #[test]
    fn test_forced_variant_missing() {
        let dir = TempDir::new().unwrap();
        fake_exe(dir.path(), "pwsh");

        let err = Interpreter::detect_in(InterpreterChoice::Legacy, vec![dir.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(
            err,
            WinOcrError::InterpreterUnavailable(InterpreterKind::Legacy)
        ));
    }

    #[test]
    fn test_directories_are_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(format!("pwsh{}", std::env::consts::EXE_SUFFIX)))
            .unwrap();

        let err = Interpreter::detect_in(InterpreterChoice::Modern, vec![dir.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, WinOcrError::InterpreterUnavailable(_)));
    }

    #[test]
    fn test_choice_from_str() {
        assert_eq!("auto".parse::<InterpreterChoice>().unwrap(), InterpreterChoice::Auto);
        assert_eq!("Modern".parse::<InterpreterChoice>().unwrap(), InterpreterChoice::Modern);
        assert_eq!("7".parse::<InterpreterChoice>().unwrap(), InterpreterChoice::Modern);
        assert_eq!("5.1".parse::<InterpreterChoice>().unwrap(), InterpreterChoice::Legacy);
        assert!("cmd".parse::<InterpreterChoice>().is_err());
    }

    #[test]
    fn test_from_program_infers_kind() {
        let modern = Interpreter::from_program("/usr/local/bin/pwsh");
        assert_eq!(modern.kind(), InterpreterKind::Modern);

        let legacy = Interpreter::from_program("/opt/tools/powershell");
        assert_eq!(legacy.kind(), InterpreterKind::Legacy);
    }
}
