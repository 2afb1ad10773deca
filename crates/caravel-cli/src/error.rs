use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    ArgumentParse(#[from] clap::Error),
    #[error(transparent)]
    Name(#[from] caravel_domain::DomainValidationError),
    #[error(transparent)]
    Workspace(#[from] caravel_engine::WorkspaceError),
    #[error(transparent)]
    Config(#[from] caravel_catalog::ConfigError),
    #[error(transparent)]
    Catalog(#[from] caravel_catalog::CatalogError),
    #[error(transparent)]
    Planning(#[from] caravel_engine::PlanningError),
    #[error(transparent)]
    Execute(#[from] caravel_engine::ExecuteError),
    #[error(transparent)]
    Vcs(#[from] caravel_engine::VcsError),
    #[error(transparent)]
    Report(#[from] caravel_report::ReportError),
    #[error("destroy requires an installation name, --all, or --from")]
    MissingDestroyTarget,
    #[error(
        "confirmation required in a non-interactive session; pass --yes/--force or set CARAVEL_ASSUME_YES=1"
    )]
    ConfirmationRequired,
    #[error("destroy aborted")]
    DestroyDeclined,
    #[error("client version string is not a valid semantic version")]
    InvalidClientVersion {
        #[source]
        source: semver::Error,
    },
}
