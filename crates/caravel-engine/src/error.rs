use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use semver::Version;
use thiserror::Error;

use caravel_catalog::CatalogError;
use caravel_domain::InstallationName;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("not inside a workspace repository (searched upward from {start})")]
    NotARepository { start: PathBuf },
    #[error("workspace repository at {path} has no working tree")]
    BareRepository { path: PathBuf },
    #[error("{context}")]
    Git {
        context: String,
        #[source]
        source: git2::Error,
    },
}

#[derive(Debug, Error)]
pub enum DiffError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("failed to diff working tree against HEAD")]
    Diff {
        #[source]
        source: git2::Error,
    },
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate installation in catalog: {name}")]
    DuplicateInstallation { name: InstallationName },
    #[error("dependency graph references unknown installations:\n  - {details}")]
    MissingDependency { details: String },
    #[error("dependency cycle detected among: {names}")]
    CyclicDependency { names: String },
    #[error("{message}")]
    Invariant { message: String },
}

#[derive(Debug, Error)]
pub enum PlanningError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error("unknown installation for {flag}: {name}")]
    UnknownInstallation { flag: &'static str, name: String },
    #[error(
        "{name} requires client version {required} or newer (this client is {client}); upgrade before continuing"
    )]
    ClientTooOld {
        name: InstallationName,
        required: Version,
        client: Version,
    },
    #[error("destruction of protected installation {name} was not confirmed")]
    ProtectedDeclined { name: InstallationName },
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("required tool \"{tool}\" not found on PATH")]
    ToolMissing { tool: &'static str },
    #[error("failed to execute {program} {args}")]
    CommandSpawn {
        program: String,
        args: String,
        #[source]
        source: io::Error,
    },
    #[error("command failed: {program} {args} (exit: {status})")]
    CommandFailed {
        program: String,
        args: String,
        status: ExitStatus,
    },
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("{context}")]
    Git {
        context: String,
        #[source]
        source: git2::Error,
    },
    #[error("the \"git\" binary is required to push but was not found on PATH")]
    GitBinaryMissing,
    #[error("failed to execute git push")]
    PushSpawn {
        #[source]
        source: io::Error,
    },
    #[error("git push failed (exit: {status})")]
    PushFailed { status: ExitStatus },
}
