use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use semver::Version;

use caravel_catalog::{Catalog, CatalogConfig, open_catalog};
use caravel_domain::{Installation, InstallationName, Workflow};
use caravel_engine::{
    AssumeYes, BuildOperation, Confirmer, DeployOperation, DestroyOperation, NonInteractive,
    PlanRequest, PlannedRun, RunContext, Scope, Toolchain, Workspace, commit_and_push,
    plan_workflow, run_plan, teardown_workspace,
};
use caravel_report::{
    ColorChoice, OutputFormat, RenderOptions, redact_sensitive, render_plan, render_run,
};
use minus::{ExitStrategy, Pager, page_all};

mod error;

pub use error::CliError;

#[derive(Debug, Parser)]
#[command(
    name = "caravel",
    about = "Dependency-ordered build, deploy, and destroy for terraform + helm workspaces"
)]
struct Cli {
    /// Working directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render infrastructure artifacts without touching the cluster
    Build {
        /// Build exactly this installation
        #[arg(long)]
        only: Option<String>,
        /// Build every installation instead of the changed set
        #[arg(long, conflicts_with = "only")]
        all: bool,
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        render: RenderFlags,
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
    },
    /// Apply changed installations to the cluster in dependency order
    Deploy {
        /// Deploy every installation instead of the changed set
        #[arg(long, conflicts_with = "only")]
        all: bool,
        /// Deploy exactly this installation
        #[arg(long)]
        only: Option<String>,
        /// Resume an interrupted run at this installation
        #[arg(long, conflicts_with = "only")]
        from: Option<String>,
        /// Commit message for recording the deploy (prompted if omitted)
        #[arg(long)]
        commit: Option<String>,
        /// Never prompt; skip the commit when no message is given
        #[arg(long)]
        silence: bool,
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        render: RenderFlags,
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
    },
    /// Tear installations down in reverse dependency order
    Destroy {
        /// Destroy exactly this installation
        app: Option<String>,
        /// Destroy the whole workspace
        #[arg(long, conflicts_with = "app")]
        all: bool,
        /// Resume an interrupted destroy at this installation
        #[arg(long, conflicts_with = "app")]
        from: Option<String>,
        /// Also remove the installation records from the catalog
        #[arg(long)]
        delete: bool,
        /// Also destroy the management cluster after a full destroy
        #[arg(long = "destroy-cluster", requires = "all")]
        destroy_cluster: bool,
        #[arg(long)]
        force: bool,
        /// Affirm all confirmations (for automation)
        #[arg(long, env = "CARAVEL_ASSUME_YES")]
        yes: bool,
        #[command(flatten)]
        render: RenderFlags,
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
    },
    /// Show changed installations in execution order; no side effects
    Diff {
        #[command(flatten)]
        render: RenderFlags,
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Args)]
struct RenderFlags {
    #[arg(long, value_enum, default_value_t = ColorArg::Auto)]
    color: ColorArg,
    #[arg(long)]
    verbose: bool,
}

impl RenderFlags {
    fn render_options(&self, target: &str) -> RenderOptions {
        RenderOptions {
            color: self.color.into(),
            verbose: self.verbose,
            target: Some(target.to_string()),
        }
    }
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

impl From<ColorArg> for ColorChoice {
    fn from(value: ColorArg) -> Self {
        match value {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Run the CLI using process arguments.
///
/// # Errors
///
/// Returns an error when argument parsing fails (excluding help/version) or
/// command execution fails.
pub fn run() -> std::result::Result<i32, CliError> {
    run_from(std::env::args_os())
}

fn run_from<I, T>(args: I) -> std::result::Result<i32, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(parsed) => parsed,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(error.into()),
        },
    };

    let start = cli.directory.clone().unwrap_or_else(|| PathBuf::from("."));
    let session = Session::open(&start)?;

    match cli.command {
        Commands::Build {
            only,
            all,
            force,
            render,
            format,
        } => {
            let scope = resolve_scope(only.as_deref(), all)?;
            let mut request = PlanRequest::new(Workflow::Build, scope);
            request.force = force;
            session.run_workflow(&request, &render, format.into(), WorkflowExtras::None)
        }
        Commands::Deploy {
            all,
            only,
            from,
            commit,
            silence,
            force,
            render,
            format,
        } => {
            let scope = resolve_scope(only.as_deref(), all)?;
            let mut request = PlanRequest::new(Workflow::Deploy, scope);
            request.from = parse_name(from.as_deref())?;
            request.force = force;
            session.run_workflow(
                &request,
                &render,
                format.into(),
                WorkflowExtras::Deploy { commit, silence },
            )
        }
        Commands::Destroy {
            app,
            all,
            from,
            delete,
            destroy_cluster,
            force,
            yes,
            render,
            format,
        } => {
            if app.is_none() && !all && from.is_none() {
                return Err(CliError::MissingDestroyTarget);
            }
            let scope = match app.as_deref() {
                Some(name) => Scope::Only(InstallationName::try_from(name)?),
                None => Scope::All,
            };
            let mut request = PlanRequest::new(Workflow::Destroy, scope);
            request.from = parse_name(from.as_deref())?;
            request.force = force || yes;
            session.run_workflow(
                &request,
                &render,
                format.into(),
                WorkflowExtras::Destroy {
                    delete,
                    destroy_cluster,
                    assume_yes: force || yes,
                    full: all,
                },
            )
        }
        Commands::Diff { render, format } => {
            let request = PlanRequest::new(Workflow::Deploy, Scope::Changed);
            let planned = session.plan(&request, &NonInteractive)?;
            let options = render.render_options(&session.target);
            let rendered = render_plan(&planned.report, format.into(), &options)?;
            session.emit(&rendered, format.into());
            Ok(0)
        }
    }
}

/// What a workflow does beyond the plan walk itself.
enum WorkflowExtras {
    None,
    Deploy {
        commit: Option<String>,
        silence: bool,
    },
    Destroy {
        delete: bool,
        destroy_cluster: bool,
        assume_yes: bool,
        full: bool,
    },
}

/// Per-invocation state: workspace, catalog handle, client version.
struct Session {
    workspace: Workspace,
    catalog: Box<dyn Catalog>,
    client_version: Version,
    target: String,
    sensitive: BTreeSet<String>,
}

impl Session {
    fn open(start: &std::path::Path) -> Result<Self, CliError> {
        let workspace = Workspace::discover(start)?;
        let config = CatalogConfig::load()?;
        let catalog = open_catalog(&config)?;

        let mut sensitive = BTreeSet::new();
        if let Some(token) = &config.token {
            sensitive.insert(token.clone());
        }

        let target = workspace.root().display().to_string();
        Ok(Self {
            workspace,
            catalog,
            client_version: client_version()?,
            target,
            sensitive,
        })
    }

    fn context(&self) -> RunContext<'_> {
        RunContext::new(
            self.workspace.clone(),
            self.catalog.as_ref(),
            self.client_version.clone(),
        )
    }

    fn plan(
        &self,
        request: &PlanRequest,
        confirmer: &dyn Confirmer,
    ) -> Result<PlannedRun, CliError> {
        Ok(plan_workflow(&self.context(), request, confirmer)?)
    }

    fn run_workflow(
        &self,
        request: &PlanRequest,
        render: &RenderFlags,
        format: OutputFormat,
        extras: WorkflowExtras,
    ) -> Result<i32, CliError> {
        let assume_yes = match &extras {
            WorkflowExtras::Destroy { assume_yes, .. } => *assume_yes,
            _ => false,
        };
        let prompter = PromptConfirmer;
        let confirmer: &dyn Confirmer = if assume_yes {
            &AssumeYes
        } else if std::io::stdin().is_terminal() {
            &prompter
        } else {
            &NonInteractive
        };

        let planned = self.plan(request, confirmer)?;
        let options = render.render_options(&self.target);

        if planned.plan.is_empty() {
            let rendered = render_plan(&planned.report, format, &options)?;
            self.emit(&rendered, format);
            return Ok(0);
        }

        if request.workflow.is_destructive() {
            self.confirm_destroy_run(&planned, assume_yes)?;
        }

        let tools = Toolchain::detect()?;
        let run = match &extras {
            WorkflowExtras::None => {
                let operation = BuildOperation::new(tools);
                run_plan(
                    &self.workspace,
                    &planned.installations,
                    &planned.plan,
                    planned.report,
                    &operation,
                )
            }
            WorkflowExtras::Deploy { .. } => {
                let operation = DeployOperation::new(tools);
                run_plan(
                    &self.workspace,
                    &planned.installations,
                    &planned.plan,
                    planned.report,
                    &operation,
                )
            }
            WorkflowExtras::Destroy { delete, .. } => {
                let operation = DestroyOperation::new(tools, self.catalog.as_ref(), *delete);
                run_plan(
                    &self.workspace,
                    &planned.installations,
                    &planned.plan,
                    planned.report,
                    &operation,
                )
            }
        };

        let rendered = render_run(&run, format, &options)?;
        self.emit(&rendered, format);

        if !run.has_failures() {
            match extras {
                WorkflowExtras::Deploy { commit, silence } => {
                    self.record_deploy(commit, silence)?;
                }
                WorkflowExtras::Destroy {
                    destroy_cluster,
                    full: true,
                    ..
                } => {
                    let tools = Toolchain::detect()?;
                    let outcome = teardown_workspace(
                        &self.workspace,
                        self.catalog.as_ref(),
                        &tools,
                        destroy_cluster,
                    )?;
                    if outcome.reservations_released {
                        eprintln!("released cluster reservations");
                    }
                    if outcome.cluster_destroyed {
                        eprintln!("destroyed management cluster");
                    }
                }
                _ => {}
            }
        }

        Ok(i32::from(run.has_failures()))
    }

    fn confirm_destroy_run(&self, planned: &PlannedRun, assume_yes: bool) -> Result<(), CliError> {
        if assume_yes {
            return Ok(());
        }
        if !std::io::stdin().is_terminal() {
            return Err(CliError::ConfirmationRequired);
        }
        let count = planned.plan.len();
        let noun = if count == 1 {
            "installation"
        } else {
            "installations"
        };
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Destroy {count} {noun} from {}?", self.target))
            .default(false)
            .interact()
            .unwrap_or(false);
        if confirmed {
            Ok(())
        } else {
            Err(CliError::DestroyDeclined)
        }
    }

    fn record_deploy(&self, commit: Option<String>, silence: bool) -> Result<(), CliError> {
        let message = match commit {
            Some(message) => Some(message),
            None if silence => None,
            None => prompt_commit_message(),
        };
        let Some(message) = message else {
            return Ok(());
        };

        let outcome = commit_and_push(&self.workspace, &message)?;
        if outcome.committed {
            eprintln!("recorded deploy: {message}");
        }
        if outcome.pushed {
            eprintln!("pushed to origin");
        }
        Ok(())
    }

    fn emit(&self, rendered: &str, format: OutputFormat) {
        let redacted = redact_sensitive(rendered, &self.sensitive);

        if format == OutputFormat::Text && should_use_pager() && page_output(&redacted).is_ok() {
            return;
        }

        if redacted.ends_with('\n') {
            print!("{redacted}");
        } else {
            println!("{redacted}");
        }
    }
}

struct PromptConfirmer;

impl Confirmer for PromptConfirmer {
    fn confirm_destroy(&self, installation: &Installation) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(format!(
                "{} is protected; destroy it anyway?",
                installation.name
            ))
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

fn resolve_scope(only: Option<&str>, all: bool) -> Result<Scope, CliError> {
    match only {
        Some(name) => Ok(Scope::Only(InstallationName::try_from(name)?)),
        None if all => Ok(Scope::All),
        None => Ok(Scope::Changed),
    }
}

fn parse_name(value: Option<&str>) -> Result<Option<InstallationName>, CliError> {
    value
        .map(|name| InstallationName::try_from(name).map_err(CliError::from))
        .transpose()
}

fn client_version() -> Result<Version, CliError> {
    Version::parse(env!("CARGO_PKG_VERSION"))
        .map_err(|source| CliError::InvalidClientVersion { source })
}

fn prompt_commit_message() -> Option<String> {
    if !std::io::stdin().is_terminal() {
        return None;
    }
    dialoguer::Input::<String>::new()
        .with_prompt("Commit message (empty skips the commit)")
        .allow_empty(true)
        .interact_text()
        .ok()
        .filter(|text| !text.trim().is_empty())
}

fn should_use_pager() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_PAGER").is_none()
}

fn page_output(rendered: &str) -> std::result::Result<(), minus::MinusError> {
    let pager = Pager::new();
    pager.set_exit_strategy(ExitStrategy::PagerQuit)?;
    pager.set_text(rendered)?;
    page_all(pager)
}
