use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use caravel_domain::InstallationName;

use crate::error::WorkspaceError;

/// The local multi-application repository: one subdirectory per
/// installation, each pairing a Terraform stack and a Helm chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

pub const TERRAFORM_DIR: &str = "terraform";
pub const CHART_DIR: &str = "chart";
pub const BUILD_DIR: &str = ".build";
pub const CLUSTER_DIR: &str = "cluster";

impl Workspace {
    /// Locate the workspace by walking upward from `start` to the enclosing
    /// git repository root.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::NotARepository`] when `start` is not inside
    /// a repository, before any side effect occurs.
    pub fn discover(start: &Path) -> Result<Self, WorkspaceError> {
        let repo = git2::Repository::discover(start).map_err(|source| {
            if source.code() == git2::ErrorCode::NotFound {
                WorkspaceError::NotARepository {
                    start: start.to_path_buf(),
                }
            } else {
                WorkspaceError::Git {
                    context: format!("failed to open repository near {}", start.display()),
                    source,
                }
            }
        })?;

        let root = repo
            .workdir()
            .ok_or_else(|| WorkspaceError::BareRepository {
                path: repo.path().to_path_buf(),
            })?
            .to_path_buf();

        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open the underlying repository for diffing or committing.
    ///
    /// # Errors
    ///
    /// Returns an error when the repository cannot be reopened.
    pub fn repository(&self) -> Result<git2::Repository, WorkspaceError> {
        git2::Repository::open(&self.root).map_err(|source| WorkspaceError::Git {
            context: format!("failed to open repository at {}", self.root.display()),
            source,
        })
    }

    #[must_use]
    pub fn installation_dir(&self, name: &InstallationName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Whether the installation has a local checkout the operator can act
    /// on. Nodes without one are skipped, not failed.
    #[must_use]
    pub fn is_locally_configured(&self, name: &InstallationName) -> bool {
        let dir = self.installation_dir(name);
        dir.join(TERRAFORM_DIR).is_dir() || dir.join(CHART_DIR).is_dir()
    }

    /// Probe local configuration for many installations at once.
    #[must_use]
    pub fn locally_configured(&self, names: &[InstallationName]) -> BTreeSet<InstallationName> {
        names
            .par_iter()
            .filter(|name| self.is_locally_configured(name))
            .cloned()
            .collect()
    }

    /// Top-level directories that look like installations but are not in
    /// `known`. Surfaced as planning warnings, never acted on.
    #[must_use]
    pub fn unregistered_directories(&self, known: &BTreeSet<InstallationName>) -> Vec<String> {
        let mut unknown = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(dir_name) = entry.file_name().to_str() else {
                continue;
            };
            if dir_name.starts_with('.') || dir_name == CLUSTER_DIR {
                continue;
            }
            let Ok(name) = InstallationName::try_from(dir_name) else {
                continue;
            };
            if !known.contains(&name) && self.is_locally_configured(&name) {
                unknown.push(dir_name.to_string());
            }
        }
        unknown.sort();
        unknown
    }
}
