use std::collections::BTreeSet;

use caravel_domain::{ExecutionPlan, Installation, InstallationName, PlanReport};

use crate::changes::diffed_installations;
use crate::context::RunContext;
use crate::error::PlanningError;
use crate::guards::Confirmer;
use crate::plan::{PlanRequest, build_plan};

/// Output of the planning phase: the fresh installation list plus the plan
/// the driver will walk.
pub struct PlannedRun {
    pub installations: Vec<Installation>,
    pub plan: ExecutionPlan,
    pub report: PlanReport,
}

/// Run the full planning phase: fetch the catalog, detect local changes
/// when the scope needs them, and build the execution plan.
///
/// # Errors
///
/// Returns an error for every planning-phase failure class: catalog
/// unavailable, duplicate/missing/cyclic graph, not-a-repository, unknown
/// scope names, version gates, declined protections.
pub fn plan_workflow(
    ctx: &RunContext<'_>,
    request: &PlanRequest,
    confirmer: &dyn Confirmer,
) -> Result<PlannedRun, PlanningError> {
    let installations = ctx.catalog.installations()?;

    let changed = if request.needs_change_detection() {
        diffed_installations(&ctx.workspace)?
    } else {
        BTreeSet::new()
    };

    let known: BTreeSet<InstallationName> = installations
        .iter()
        .map(|installation| installation.name.clone())
        .collect();
    let warnings = ctx
        .workspace
        .unregistered_directories(&known)
        .into_iter()
        .map(|dir| format!("directory \"{dir}\" is not a registered installation"))
        .collect();

    let (plan, mut report) = build_plan(
        &installations,
        &changed,
        request,
        &ctx.client_version,
        confirmer,
        warnings,
    )?;

    let configured = ctx.workspace.locally_configured(&report.selected);
    for name in &report.selected {
        if !configured.contains(name) {
            report
                .warnings
                .push(format!("{name} has no local checkout and will be skipped"));
        }
    }

    Ok(PlannedRun {
        installations,
        plan,
        report,
    })
}
