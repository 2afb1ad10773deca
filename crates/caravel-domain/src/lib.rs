use std::fmt;
use std::ops::Deref;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainValidationError {
    #[error("installation name must not be empty")]
    EmptyInstallationName,
    #[error("installation name must not contain path separators or whitespace: {name:?}")]
    InvalidInstallationName { name: String },
}

/// Name of a registered installation. Doubles as the name of its top-level
/// directory inside the workspace repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstallationName(String);

impl InstallationName {
    /// Create an installation name, rejecting values that cannot name a
    /// workspace directory.
    ///
    /// # Errors
    ///
    /// Returns an error when `name` is empty, contains path separators or
    /// whitespace, or is a relative path component.
    pub fn new(name: String) -> Result<Self, DomainValidationError> {
        if name.is_empty() {
            return Err(DomainValidationError::EmptyInstallationName);
        }
        let invalid = name == "." || name == ".." || name.chars().any(is_forbidden_name_char);
        if invalid {
            return Err(DomainValidationError::InvalidInstallationName { name });
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_forbidden_name_char(c: char) -> bool {
    c == '/' || c == '\\' || c.is_whitespace()
}

impl TryFrom<String> for InstallationName {
    type Error = DomainValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for InstallationName {
    type Error = DomainValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl AsRef<str> for InstallationName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for InstallationName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for InstallationName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

impl From<InstallationName> for String {
    fn from(value: InstallationName) -> Self {
        value.0
    }
}

/// One registered, deployable application as returned by the catalog.
///
/// Read-only to the engine; fetched fresh at the start of every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub name: InstallationName,
    /// Declaration order is meaningful: it is the scheduler's tie-break.
    #[serde(default)]
    pub dependencies: Vec<InstallationName>,
    #[serde(default)]
    pub min_client_version: Option<Version>,
    #[serde(default)]
    pub protected: bool,
}

impl Installation {
    #[must_use]
    pub const fn new(name: InstallationName) -> Self {
        Self {
            name,
            dependencies: Vec::new(),
            min_client_version: None,
            protected: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    Build,
    Deploy,
    Destroy,
}

impl Workflow {
    /// Destroy walks the dependency order back to front: dependents are
    /// torn down before the installations they depend on.
    #[must_use]
    pub const fn reverses_order(self) -> bool {
        matches!(self, Self::Destroy)
    }

    #[must_use]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::Destroy)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Deploy => "deploy",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// The ordered node sequence a run walks, plus the resume cursor.
///
/// The cursor is the index of the next node to process; `--from` sets it by
/// locating the named installation in the full order. It is never persisted:
/// resumption is the user re-supplying `--from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub workflow: Workflow,
    pub nodes: Vec<InstallationName>,
    pub cursor: usize,
}

impl ExecutionPlan {
    #[must_use]
    pub const fn new(workflow: Workflow, nodes: Vec<InstallationName>) -> Self {
        Self {
            workflow,
            nodes,
            cursor: 0,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> &[InstallationName] {
        self.nodes.get(self.cursor..).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.remaining().len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    Succeeded { changed: bool },
    Failed { error: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResult {
    pub name: InstallationName,
    #[serde(flatten)]
    pub status: NodeStatus,
}

impl NodeResult {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.status, NodeStatus::Failed { .. })
    }
}

/// Everything planning decided, with no side effects attached.
///
/// `caravel diff` renders exactly this; build/deploy/destroy hand it to the
/// execution driver together with the matching [`ExecutionPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReport {
    pub workflow: Workflow,
    /// Every registered installation, in catalog declaration order.
    pub installations: Vec<InstallationName>,
    /// Installations with pending local changes, in execution order.
    pub changed: Vec<InstallationName>,
    /// Full dependency order over the whole graph (reversed for destroy).
    pub execution_order: Vec<InstallationName>,
    /// The nodes actually selected for this run, from the cursor onward.
    pub selected: Vec<InstallationName>,
    pub warnings: Vec<String>,
}

impl PlanReport {
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.selected.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub plan: PlanReport,
    pub results: Vec<NodeResult>,
    /// Set when the run aborted: the node whose operation failed.
    pub aborted_at: Option<InstallationName>,
    pub errors: Vec<String>,
}

impl RunReport {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.aborted_at.is_some()
            || !self.errors.is_empty()
            || self.results.iter().any(NodeResult::is_failure)
    }

    /// The `--from` value that resumes an aborted run at the failing node.
    #[must_use]
    pub fn resume_from(&self) -> Option<&InstallationName> {
        self.aborted_at.as_ref()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::{
        DomainValidationError, ExecutionPlan, InstallationName, NodeResult, NodeStatus, PlanReport,
        RunReport, Workflow,
    };

    fn name(value: &str) -> InstallationName {
        InstallationName::try_from(value).expect("valid name")
    }

    #[test]
    fn installation_name_rejects_empty_values() {
        let error = InstallationName::try_from("").expect_err("empty names must be rejected");
        assert!(matches!(error, DomainValidationError::EmptyInstallationName));
    }

    #[test]
    fn installation_name_rejects_path_like_values() {
        for bad in ["a/b", "a\\b", "two words", ".", ".."] {
            let error = InstallationName::try_from(bad).expect_err("must be rejected");
            assert!(
                matches!(error, DomainValidationError::InvalidInstallationName { .. }),
                "{bad} produced {error:?}"
            );
        }
    }

    #[test]
    fn destroy_is_the_only_reversed_workflow() {
        assert!(Workflow::Destroy.reverses_order());
        assert!(!Workflow::Build.reverses_order());
        assert!(!Workflow::Deploy.reverses_order());
    }

    #[test]
    fn plan_remaining_honors_cursor() {
        let mut plan = ExecutionPlan::new(Workflow::Deploy, vec![name("a"), name("b"), name("c")]);
        assert_eq!(plan.len(), 3);

        plan.cursor = 2;
        assert_eq!(plan.remaining(), &[name("c")]);

        plan.cursor = 3;
        assert!(plan.is_empty());
    }

    #[test]
    fn run_report_failure_detection() {
        let plan = PlanReport {
            workflow: Workflow::Deploy,
            installations: vec![name("a")],
            changed: vec![name("a")],
            execution_order: vec![name("a")],
            selected: vec![name("a")],
            warnings: Vec::new(),
        };

        let clean = RunReport {
            plan: plan.clone(),
            results: vec![NodeResult {
                name: name("a"),
                status: NodeStatus::Succeeded { changed: true },
            }],
            aborted_at: None,
            errors: Vec::new(),
        };
        assert!(!clean.has_failures());

        let aborted = RunReport {
            plan,
            results: vec![NodeResult {
                name: name("a"),
                status: NodeStatus::Failed {
                    error: "terraform apply failed".to_string(),
                },
            }],
            aborted_at: Some(name("a")),
            errors: Vec::new(),
        };
        assert!(aborted.has_failures());
        assert_eq!(aborted.resume_from(), Some(&name("a")));
    }
}
