use caravel_catalog::{Catalog, CatalogErrorKind};

use crate::error::ExecuteError;
use crate::tools::Toolchain;
use crate::workspace::{CLUSTER_DIR, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownOutcome {
    pub reservations_released: bool,
    pub cluster_destroyed: bool,
}

/// Post-step of a full-workspace destroy.
///
/// Runs only after every node in the reverse-order walk succeeded: releases
/// cluster-level reservations (ACME/EAB credentials) held in the catalog,
/// then optionally destroys the management cluster itself (the `cluster/`
/// Terraform root at the workspace top level). Deliberately outside the
/// graph walk — the plan stays a list of installations that `--from` can
/// index into.
///
/// # Errors
///
/// Returns an error when the reservation release is rejected or the cluster
/// destroy fails.
pub fn teardown_workspace(
    workspace: &Workspace,
    catalog: &dyn Catalog,
    tools: &Toolchain,
    destroy_cluster: bool,
) -> Result<TeardownOutcome, ExecuteError> {
    let reservations_released = match catalog.release_reservations() {
        Ok(()) => true,
        // Snapshot catalogs hold no reservations.
        Err(error) if error.kind() == CatalogErrorKind::Unsupported => false,
        Err(error) => return Err(error.into()),
    };

    let cluster_dir = workspace.root().join(CLUSTER_DIR);
    let cluster_destroyed = if destroy_cluster && cluster_dir.is_dir() {
        tools.terraform(&cluster_dir, &["init", "-input=false"])?;
        tools.terraform(&cluster_dir, &["destroy", "-input=false", "-auto-approve"])?;
        true
    } else {
        false
    };

    Ok(TeardownOutcome {
        reservations_released,
        cluster_destroyed,
    })
}
