use std::collections::HashMap;

use caravel_domain::{
    ExecutionPlan, Installation, InstallationName, NodeResult, NodeStatus, PlanReport, RunReport,
};

use crate::operation::{NodeOutcome, Operation};
use crate::workspace::Workspace;

/// Walk the plan from its cursor, applying `operation` to one installation
/// at a time.
///
/// Strictly sequential and fail-fast: the first failing node aborts the
/// remainder of the plan, is recorded as `aborted_at`, and becomes the
/// `--from` resume point. Nothing already applied is rolled back, and no
/// node is ever retried.
#[must_use]
pub fn run_plan(
    workspace: &Workspace,
    installations: &[Installation],
    plan: &ExecutionPlan,
    report: PlanReport,
    operation: &dyn Operation,
) -> RunReport {
    let by_name: HashMap<&InstallationName, &Installation> = installations
        .iter()
        .map(|installation| (&installation.name, installation))
        .collect();

    let remaining = plan.remaining();
    let mut results = Vec::with_capacity(remaining.len());
    let mut errors = Vec::new();
    let mut aborted_at = None;

    for (index, name) in remaining.iter().enumerate() {
        let Some(installation) = by_name.get(name) else {
            errors.push(format!("plan referenced unregistered installation: {name}"));
            aborted_at = Some(name.clone());
            break;
        };

        match operation.apply(workspace, installation) {
            Ok(NodeOutcome::Applied { changed }) => {
                results.push(NodeResult {
                    name: name.clone(),
                    status: NodeStatus::Succeeded { changed },
                });
            }
            Ok(NodeOutcome::Skipped { reason }) => {
                results.push(NodeResult {
                    name: name.clone(),
                    status: NodeStatus::Skipped { reason },
                });
            }
            Err(error) => {
                let message = error.to_string();
                results.push(NodeResult {
                    name: name.clone(),
                    status: NodeStatus::Failed {
                        error: message.clone(),
                    },
                });
                errors.push(format!("{name} failed: {message}"));
                push_abort_message(&mut errors, index, remaining.len());
                aborted_at = Some(name.clone());
                break;
            }
        }
    }

    RunReport {
        plan: report,
        results,
        aborted_at,
        errors,
    }
}

fn push_abort_message(errors: &mut Vec<String>, index: usize, total: usize) {
    let not_attempted = total.saturating_sub(index + 1);
    if not_attempted > 0 {
        errors.push(format!(
            "aborting: {not_attempted} of {total} installations not attempted"
        ));
    }
}
