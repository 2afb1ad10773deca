use std::collections::{BTreeSet, HashMap};

use semver::Version;

use caravel_domain::{ExecutionPlan, Installation, InstallationName, PlanReport, Workflow};

use crate::error::PlanningError;
use crate::graph::{DependencyGraph, restrict_order};
use crate::guards::{Confirmer, check_version_gate, ensure_destroy_allowed};

/// Which installations a run covers, before `--from` is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The change-set default: installations with pending local diffs.
    Changed,
    /// Every registered installation (`--all`).
    All,
    /// Exactly one installation (`--only` / a named destroy target).
    Only(InstallationName),
}

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub workflow: Workflow,
    pub scope: Scope,
    /// Resume cursor: position of this name in the full (possibly
    /// reversed) order. Overrides the change-set narrowing.
    pub from: Option<InstallationName>,
    pub force: bool,
}

impl PlanRequest {
    #[must_use]
    pub const fn new(workflow: Workflow, scope: Scope) -> Self {
        Self {
            workflow,
            scope,
            from: None,
            force: false,
        }
    }

    #[must_use]
    pub fn needs_change_detection(&self) -> bool {
        matches!(self.scope, Scope::Changed) && self.from.is_none()
    }
}

/// Turn the catalog state plus user selectors into an executable plan.
///
/// Selector precedence: `--only` collapses the plan to one node; `--from`
/// takes the suffix of the full order regardless of the change set; the
/// default scope is the change set, widened by `--all`. Version gates and
/// protection guards run against every selected node so failures surface
/// before any side effect.
///
/// # Errors
///
/// Returns graph errors (duplicate, missing dependency, cycle), scope
/// errors for unknown `--only`/`--from` names, version-gate failures, and
/// declined protected confirmations.
pub fn build_plan(
    installations: &[Installation],
    changed: &BTreeSet<InstallationName>,
    request: &PlanRequest,
    client_version: &Version,
    confirmer: &dyn Confirmer,
    warnings: Vec<String>,
) -> Result<(ExecutionPlan, PlanReport), PlanningError> {
    let graph = DependencyGraph::build(installations)?;
    let mut full_order = graph.execution_order()?;
    if request.workflow.reverses_order() {
        full_order.reverse();
    }

    let mut plan = match (&request.scope, &request.from) {
        (Scope::Only(name), _) => {
            if !graph.contains(name) {
                return Err(PlanningError::UnknownInstallation {
                    flag: "--only",
                    name: name.to_string(),
                });
            }
            ExecutionPlan::new(request.workflow, vec![name.clone()])
        }
        (_, Some(from)) => {
            let cursor = full_order.iter().position(|name| name == from).ok_or_else(|| {
                PlanningError::UnknownInstallation {
                    flag: "--from",
                    name: from.to_string(),
                }
            })?;
            let mut resumed = ExecutionPlan::new(request.workflow, full_order.clone());
            resumed.cursor = cursor;
            resumed
        }
        (Scope::All, None) => ExecutionPlan::new(request.workflow, full_order.clone()),
        (Scope::Changed, None) => {
            ExecutionPlan::new(request.workflow, restrict_order(&full_order, changed))
        }
    };

    let by_name: HashMap<&InstallationName, &Installation> = installations
        .iter()
        .map(|installation| (&installation.name, installation))
        .collect();

    for name in plan.remaining() {
        let Some(installation) = by_name.get(name) else {
            // Unreachable for plans derived from the graph above.
            return Err(PlanningError::UnknownInstallation {
                flag: "plan",
                name: name.to_string(),
            });
        };
        check_version_gate(installation, client_version)?;
        if request.workflow.is_destructive() {
            ensure_destroy_allowed(installation, request.force, confirmer)?;
        }
    }

    let report = PlanReport {
        workflow: request.workflow,
        installations: installations
            .iter()
            .map(|installation| installation.name.clone())
            .collect(),
        changed: restrict_order(&full_order, changed),
        execution_order: full_order,
        selected: plan.remaining().to_vec(),
        warnings,
    };

    // Normalize: downstream consumers only ever walk from the cursor.
    plan.nodes = report.selected.clone();
    plan.cursor = 0;

    Ok((plan, report))
}
