use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

static BUILD_CARAVEL: OnceLock<Result<(), String>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub command_line: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    #[must_use]
    pub fn transcript(&self) -> String {
        format!(
            "$ {}\n[exit: {}]\n[stdout]\n{}[stderr]\n{}",
            self.command_line, self.exit_code, self.stdout, self.stderr
        )
    }
}

/// Run the `caravel` binary as an external process with `workdir` as its
/// current directory.
///
/// `NO_PAGER=1` is always set to keep output deterministic for assertions.
///
/// # Errors
///
/// Returns an error if building/running the `caravel` binary fails.
pub fn run_caravel(
    workdir: &Path,
    args: &[&str],
    env_overrides: &[(String, String)],
) -> Result<RunResult, String> {
    ensure_caravel_built()?;
    let bin = caravel_bin()?;

    let mut command = Command::new(bin);
    command.env("NO_PAGER", "1");
    command.current_dir(workdir);
    command.args(args);

    let mut command_parts = vec!["caravel".to_string()];
    command_parts.extend(args.iter().map(|arg| (*arg).to_string()));

    for (name, value) in env_overrides {
        command.env(name, value);
    }

    let output = command
        .output()
        .map_err(|error| format!("failed to run caravel: {error}"))?;

    Ok(RunResult {
        command_line: command_parts.join(" "),
        exit_code: output.status.code().unwrap_or(1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Write a text file, creating parent directories if needed.
///
/// # Errors
///
/// Returns an error if directories or file contents cannot be written.
pub fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

/// Render a path for embedding in JSON config/snapshot files.
#[must_use]
pub fn to_json_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace('"', "\\\"")
}

fn ensure_caravel_built() -> Result<(), String> {
    match BUILD_CARAVEL.get_or_init(|| {
        let status = Command::new("cargo")
            .arg("build")
            .arg("-q")
            .arg("-p")
            .arg("caravel")
            .status()
            .map_err(|error| format!("failed to build caravel binary: {error}"))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!(
                "failed to build caravel binary: cargo exited with status {status}"
            ))
        }
    }) {
        Ok(()) => Ok(()),
        Err(error) => Err(error.clone()),
    }
}

fn caravel_bin() -> Result<PathBuf, String> {
    let mut path = std::env::current_exe()
        .map_err(|error| format!("failed to determine current executable: {error}"))?;
    if !path.pop() {
        return Err("failed to resolve test executable directory".to_string());
    }
    if path.ends_with("deps") {
        let _ = path.pop();
    }
    Ok(path.join(format!("caravel{}", std::env::consts::EXE_SUFFIX)))
}
