use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ExecuteError;

/// Locations of the external release tools.
///
/// Both tools are invoked in the installation's directory and inherit the
/// terminal: they may stream progress and prompt the operator, which is one
/// reason execution is strictly sequential.
#[derive(Debug, Clone)]
pub struct Toolchain {
    terraform: PathBuf,
    helm: PathBuf,
}

impl Toolchain {
    /// Resolve both tool binaries on PATH.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::ToolMissing`] naming the first absent tool.
    pub fn detect() -> Result<Self, ExecuteError> {
        let terraform =
            which::which("terraform").map_err(|_| ExecuteError::ToolMissing { tool: "terraform" })?;
        let helm = which::which("helm").map_err(|_| ExecuteError::ToolMissing { tool: "helm" })?;
        Ok(Self { terraform, helm })
    }

    #[must_use]
    pub const fn from_paths(terraform: PathBuf, helm: PathBuf) -> Self {
        Self { terraform, helm }
    }

    /// Run terraform in `dir`, blocking until it exits.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be spawned or exits
    /// non-zero.
    pub fn terraform<S: AsRef<OsStr>>(&self, dir: &Path, args: &[S]) -> Result<(), ExecuteError> {
        run_tool(&self.terraform, dir, args)
    }

    /// Run helm in `dir`, blocking until it exits.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be spawned or exits
    /// non-zero.
    pub fn helm<S: AsRef<OsStr>>(&self, dir: &Path, args: &[S]) -> Result<(), ExecuteError> {
        run_tool(&self.helm, dir, args)
    }
}

fn run_tool<S: AsRef<OsStr>>(program: &Path, dir: &Path, args: &[S]) -> Result<(), ExecuteError> {
    let rendered_args = render_args(args);
    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .status()
        .map_err(|source| ExecuteError::CommandSpawn {
            program: program.display().to_string(),
            args: rendered_args.clone(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(ExecuteError::CommandFailed {
            program: program.display().to_string(),
            args: rendered_args,
            status,
        })
    }
}

fn render_args<S: AsRef<OsStr>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| arg.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
