mod changes;
mod context;
mod error;
mod execute;
mod graph;
mod guards;
mod operation;
mod pipeline;
mod plan;
mod teardown;
mod tools;
mod vcs;
mod workspace;

pub use changes::diffed_installations;
pub use context::RunContext;
pub use error::{
    DiffError, ExecuteError, GraphError, PlanningError, VcsError, WorkspaceError,
};
pub use execute::run_plan;
pub use graph::{DependencyGraph, restrict_order};
pub use guards::{AssumeYes, Confirmer, NonInteractive, check_version_gate, ensure_destroy_allowed};
pub use operation::{
    BuildOperation, DeployOperation, DestroyOperation, NodeOutcome, Operation,
};
pub use pipeline::{PlannedRun, plan_workflow};
pub use plan::{PlanRequest, Scope, build_plan};
pub use teardown::{TeardownOutcome, teardown_workspace};
pub use tools::Toolchain;
pub use vcs::{CommitOutcome, commit_and_push};
pub use workspace::Workspace;
