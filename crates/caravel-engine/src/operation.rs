use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use caravel_catalog::{Catalog, CatalogErrorKind};
use caravel_domain::{Installation, Workflow};

use crate::error::ExecuteError;
use crate::tools::Toolchain;
use crate::workspace::{BUILD_DIR, CHART_DIR, TERRAFORM_DIR, Workspace};

const SKIP_NOT_CONFIGURED: &str = "not configured locally";

/// Result of applying one workflow step to one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Applied { changed: bool },
    Skipped { reason: String },
}

/// One workflow step, applied per installation by the execution driver.
///
/// The driver is identical across build, deploy, and destroy; all
/// workflow-specific behavior lives behind this seam.
pub trait Operation {
    fn workflow(&self) -> Workflow;

    /// Apply this step to `installation`, blocking until done.
    ///
    /// # Errors
    ///
    /// Returns an error when an underlying tool or catalog call fails; the
    /// driver aborts the remainder of the plan on the first error.
    fn apply(
        &self,
        workspace: &Workspace,
        installation: &Installation,
    ) -> Result<NodeOutcome, ExecuteError>;
}

/// Render infrastructure artifacts into `<name>/.build` without touching
/// the cluster.
pub struct BuildOperation {
    tools: Toolchain,
}

impl BuildOperation {
    #[must_use]
    pub const fn new(tools: Toolchain) -> Self {
        Self { tools }
    }
}

impl Operation for BuildOperation {
    fn workflow(&self) -> Workflow {
        Workflow::Build
    }

    fn apply(
        &self,
        workspace: &Workspace,
        installation: &Installation,
    ) -> Result<NodeOutcome, ExecuteError> {
        if !workspace.is_locally_configured(&installation.name) {
            return Ok(NodeOutcome::Skipped {
                reason: SKIP_NOT_CONFIGURED.to_string(),
            });
        }

        let dir = workspace.installation_dir(&installation.name);
        let build_dir = dir.join(BUILD_DIR);
        fs::create_dir_all(&build_dir).map_err(|source| ExecuteError::Io {
            context: format!("failed to create {}", build_dir.display()),
            source,
        })?;
        let before = fingerprint_dir(&build_dir)?;

        let terraform_dir = dir.join(TERRAFORM_DIR);
        if terraform_dir.is_dir() {
            self.tools
                .terraform(&terraform_dir, &["init", "-input=false", "-backend=false"])?;
            let plan_file = build_dir.join("terraform.tfplan");
            self.tools.terraform(
                &terraform_dir,
                &[
                    "plan".to_string(),
                    "-input=false".to_string(),
                    format!("-out={}", plan_file.display()),
                ],
            )?;
        }

        let chart_dir = dir.join(CHART_DIR);
        if chart_dir.is_dir() {
            let manifest_dir = build_dir.join("manifests");
            self.tools.helm(
                &dir,
                &[
                    "template".to_string(),
                    installation.name.to_string(),
                    CHART_DIR.to_string(),
                    "--output-dir".to_string(),
                    manifest_dir.display().to_string(),
                ],
            )?;
        }

        let after = fingerprint_dir(&build_dir)?;
        Ok(NodeOutcome::Applied {
            changed: before != after,
        })
    }
}

/// Apply rendered infrastructure: terraform first, then the chart release.
pub struct DeployOperation {
    tools: Toolchain,
}

impl DeployOperation {
    #[must_use]
    pub const fn new(tools: Toolchain) -> Self {
        Self { tools }
    }
}

impl Operation for DeployOperation {
    fn workflow(&self) -> Workflow {
        Workflow::Deploy
    }

    fn apply(
        &self,
        workspace: &Workspace,
        installation: &Installation,
    ) -> Result<NodeOutcome, ExecuteError> {
        if !workspace.is_locally_configured(&installation.name) {
            return Ok(NodeOutcome::Skipped {
                reason: SKIP_NOT_CONFIGURED.to_string(),
            });
        }

        let dir = workspace.installation_dir(&installation.name);
        let terraform_dir = dir.join(TERRAFORM_DIR);
        if terraform_dir.is_dir() {
            self.tools
                .terraform(&terraform_dir, &["init", "-input=false"])?;
            self.tools.terraform(
                &terraform_dir,
                &["apply", "-input=false", "-auto-approve"],
            )?;
        }

        let chart_dir = dir.join(CHART_DIR);
        if chart_dir.is_dir() {
            self.tools.helm(
                &dir,
                &[
                    "upgrade",
                    "--install",
                    installation.name.as_str(),
                    CHART_DIR,
                    "--namespace",
                    installation.name.as_str(),
                    "--create-namespace",
                ],
            )?;
        }

        Ok(NodeOutcome::Applied { changed: true })
    }
}

/// Tear down the chart release and the Terraform stack; optionally drop the
/// catalog record afterwards.
pub struct DestroyOperation<'a> {
    tools: Toolchain,
    catalog: &'a dyn Catalog,
    delete_record: bool,
}

impl<'a> DestroyOperation<'a> {
    #[must_use]
    pub const fn new(tools: Toolchain, catalog: &'a dyn Catalog, delete_record: bool) -> Self {
        Self {
            tools,
            catalog,
            delete_record,
        }
    }
}

impl Operation for DestroyOperation<'_> {
    fn workflow(&self) -> Workflow {
        Workflow::Destroy
    }

    fn apply(
        &self,
        workspace: &Workspace,
        installation: &Installation,
    ) -> Result<NodeOutcome, ExecuteError> {
        if !workspace.is_locally_configured(&installation.name) {
            return Ok(NodeOutcome::Skipped {
                reason: SKIP_NOT_CONFIGURED.to_string(),
            });
        }

        let dir = workspace.installation_dir(&installation.name);
        let chart_dir = dir.join(CHART_DIR);
        if chart_dir.is_dir() {
            self.tools.helm(
                &dir,
                &[
                    "uninstall",
                    installation.name.as_str(),
                    "--namespace",
                    installation.name.as_str(),
                ],
            )?;
        }

        let terraform_dir = dir.join(TERRAFORM_DIR);
        if terraform_dir.is_dir() {
            self.tools
                .terraform(&terraform_dir, &["init", "-input=false"])?;
            self.tools.terraform(
                &terraform_dir,
                &["destroy", "-input=false", "-auto-approve"],
            )?;
        }

        if self.delete_record {
            match self.catalog.delete_installation(&installation.name) {
                Ok(()) => {}
                // An already-missing record is the desired end state.
                Err(error) if error.kind() == CatalogErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
        }

        Ok(NodeOutcome::Applied { changed: true })
    }
}

/// Content fingerprint of every file under `dir`, in path order.
fn fingerprint_dir(dir: &Path) -> Result<String, ExecuteError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut hasher = Sha256::new();
    for path in files {
        hasher.update(path.to_string_lossy().as_bytes());
        let contents = fs::read(&path).map_err(|source| ExecuteError::Io {
            context: format!("failed to read build artifact {}", path.display()),
            source,
        })?;
        hasher.update(&contents);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::fs;
    use std::path::PathBuf;

    use caravel_catalog::{Catalog, CatalogError, CatalogErrorKind};
    use caravel_domain::{Installation, InstallationName};

    use super::{BuildOperation, DestroyOperation, NodeOutcome, Operation, fingerprint_dir};
    use crate::tools::Toolchain;
    use crate::workspace::Workspace;

    struct RejectingCatalog;

    impl Catalog for RejectingCatalog {
        fn installations(&self) -> Result<Vec<Installation>, CatalogError> {
            Ok(Vec::new())
        }

        fn delete_installation(&self, _name: &InstallationName) -> Result<(), CatalogError> {
            Err(CatalogError::Remote {
                operation: "installation deletion",
                message: "no such record".to_string(),
                kind: CatalogErrorKind::NotFound,
            })
        }

        fn release_reservations(&self) -> Result<(), CatalogError> {
            Ok(())
        }
    }

    fn dummy_tools() -> Toolchain {
        Toolchain::from_paths(PathBuf::from("/nonexistent/tf"), PathBuf::from("/nonexistent/helm"))
    }

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let temp = tempfile::tempdir().expect("tempdir");
        git2::Repository::init(temp.path()).expect("init repository");
        let workspace = Workspace::discover(temp.path()).expect("discover workspace");
        (temp, workspace)
    }

    fn installation(value: &str) -> Installation {
        Installation::new(InstallationName::try_from(value).expect("valid name"))
    }

    #[test]
    fn unconfigured_installations_are_skipped_before_any_tool_runs() {
        let (_temp, workspace) = workspace();
        // The dummy tool paths would fail to spawn; a skip proves nothing
        // was invoked.
        let build = BuildOperation::new(dummy_tools());
        let outcome = build
            .apply(&workspace, &installation("ghost"))
            .expect("skip, not fail");
        assert_eq!(
            outcome,
            NodeOutcome::Skipped {
                reason: "not configured locally".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn destroy_tolerates_missing_catalog_records() {
        let (temp, workspace) = workspace();
        fs::create_dir_all(temp.path().join("app/chart")).expect("mkdir");

        // `true` stands in for tools that succeed; the catalog reports the
        // record as already gone, which must not abort the run.
        let tools =
            Toolchain::from_paths(PathBuf::from("/bin/true"), PathBuf::from("/bin/true"));
        let catalog = RejectingCatalog;
        let destroy = DestroyOperation::new(tools, &catalog, true);
        let outcome = destroy
            .apply(&workspace, &installation("app"))
            .expect("missing record is the desired end state");
        assert_eq!(outcome, NodeOutcome::Applied { changed: true });
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("artifacts");
        fs::create_dir_all(&dir).expect("mkdir");

        let empty = fingerprint_dir(&dir).expect("fingerprint empty");
        fs::write(dir.join("manifest.yaml"), "kind: Deployment\n").expect("write");
        let with_file = fingerprint_dir(&dir).expect("fingerprint populated");
        assert_ne!(empty, with_file);

        let unchanged = fingerprint_dir(&dir).expect("fingerprint again");
        assert_eq!(with_file, unchanged);
    }
}
