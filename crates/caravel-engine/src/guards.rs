use semver::Version;

use caravel_domain::Installation;

use crate::error::PlanningError;

/// Confirmation source for destructive operations on protected
/// installations. The CLI backs this with an interactive prompt; tests and
/// automation use the fixed policies below.
pub trait Confirmer {
    /// `true` allows the destruction of `installation`. Prompt failures
    /// count as a decline.
    fn confirm_destroy(&self, installation: &Installation) -> bool;
}

/// Affirms every confirmation (`--force`, `--yes`, `CARAVEL_ASSUME_YES`).
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm_destroy(&self, _installation: &Installation) -> bool {
        true
    }
}

/// Declines every confirmation; used when no terminal is attached.
pub struct NonInteractive;

impl Confirmer for NonInteractive {
    fn confirm_destroy(&self, _installation: &Installation) -> bool {
        false
    }
}

/// Fail when the installation demands a newer client than the one running.
///
/// Evaluated during planning for every selected node, so a too-old client
/// aborts before any side effect.
///
/// # Errors
///
/// Returns [`PlanningError::ClientTooOld`] when the gate is not satisfied.
pub fn check_version_gate(
    installation: &Installation,
    client: &Version,
) -> Result<(), PlanningError> {
    if let Some(required) = &installation.min_client_version
        && client < required
    {
        return Err(PlanningError::ClientTooOld {
            name: installation.name.clone(),
            required: required.clone(),
            client: client.clone(),
        });
    }
    Ok(())
}

/// Gate destructive plans on protected installations.
///
/// # Errors
///
/// Returns [`PlanningError::ProtectedDeclined`] when the installation is
/// protected, `force` is not set, and the confirmer declines.
pub fn ensure_destroy_allowed(
    installation: &Installation,
    force: bool,
    confirmer: &dyn Confirmer,
) -> Result<(), PlanningError> {
    if !installation.protected || force {
        return Ok(());
    }
    if confirmer.confirm_destroy(installation) {
        Ok(())
    } else {
        Err(PlanningError::ProtectedDeclined {
            name: installation.name.clone(),
        })
    }
}
