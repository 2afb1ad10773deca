use std::collections::BTreeSet;
use std::fmt::Write;
use std::io::{self, IsTerminal};

use console::Style;
use caravel_domain::{NodeStatus, PlanReport, RunReport, Workflow};

mod error;
mod options;
mod redaction;

pub use error::ReportError;
pub use options::{ColorChoice, OutputFormat, RenderOptions};
pub use redaction::redact_sensitive;

/// Render a plan report in the requested output format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_plan(
    report: &PlanReport,
    format: OutputFormat,
    options: &RenderOptions,
) -> std::result::Result<String, ReportError> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|source| ReportError::JsonSerialize { source }),
        OutputFormat::Text => Ok(render_plan_text(report, options)),
    }
}

/// Render a run report in the requested output format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_run(
    report: &RunReport,
    format: OutputFormat,
    options: &RenderOptions,
) -> std::result::Result<String, ReportError> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|source| ReportError::JsonSerialize { source }),
        OutputFormat::Text => Ok(render_run_text(report, options)),
    }
}

// ---------------------------------------------------------------------------
// Plan text
// ---------------------------------------------------------------------------

fn render_plan_text(report: &PlanReport, options: &RenderOptions) -> String {
    let mut output = String::new();
    let style = TextStyle::new(options.color);
    let changed: BTreeSet<_> = report.changed.iter().collect();

    append_header(
        &mut output,
        &format!("caravel {} plan", report.workflow),
        options.target.as_deref(),
        &style,
    );

    append_warnings_and_errors(&mut output, &report.warnings, &[], &style);

    if report.selected.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "  Nothing to {}.", report.workflow);
        append_unselected_note(&mut output, report, &style);
        return output;
    }

    let _ = writeln!(output);
    for (position, name) in report.selected.iter().enumerate() {
        let (symbol, label) = plan_symbol_and_label(report.workflow, &style);
        let _ = writeln!(output, "  {symbol} {label}{}", style.primary_text(name));
        if options.verbose {
            let mut detail = format!("#{} of {}", position + 1, report.selected.len());
            if changed.contains(name) {
                detail.push_str(", local changes");
            }
            let _ = writeln!(output, "    {}", style.dim(&detail));
        }
    }

    append_unselected_note(&mut output, report, &style);

    if options.verbose && !report.execution_order.is_empty() {
        let order = report
            .execution_order
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        let _ = writeln!(output);
        let _ = writeln!(output, "  {}", style.dim(&format!("full order: {order}")));
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} {}",
        style.tally_label("Plan:"),
        plan_tally(report, &style)
    );

    output
}

fn append_unselected_note(output: &mut String, report: &PlanReport, style: &TextStyle) {
    let unselected = report
        .execution_order
        .len()
        .saturating_sub(report.selected.len());
    if unselected > 0 {
        let _ = writeln!(output);
        let noun = if unselected == 1 {
            "installation"
        } else {
            "installations"
        };
        let _ = writeln!(
            output,
            "  {}",
            style.dim(&format!("{unselected} {noun} not selected"))
        );
    }
}

fn plan_tally(report: &PlanReport, style: &TextStyle) -> String {
    let selected = report.selected.len();
    let unselected = report.execution_order.len().saturating_sub(selected);

    let mut parts = Vec::new();
    if selected > 0 {
        parts.push(style.change_label(&format!("{selected} to {}", report.workflow)));
    }
    if unselected > 0 {
        parts.push(style.dim(&format!("{unselected} not selected")));
    }
    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Run text
// ---------------------------------------------------------------------------

fn render_run_text(report: &RunReport, options: &RenderOptions) -> String {
    let mut output = String::new();
    let style = TextStyle::new(options.color);

    append_header(
        &mut output,
        &format!("caravel {}", report.plan.workflow),
        options.target.as_deref(),
        &style,
    );

    append_warnings_and_errors(&mut output, &report.plan.warnings, &report.errors, &style);

    if report.results.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "  Nothing to do.");
        return output;
    }

    let _ = writeln!(output);
    for result in &report.results {
        let (symbol, label) = run_symbol_and_label(report.plan.workflow, &result.status, &style);
        let _ = writeln!(
            output,
            "  {symbol} {label}{}",
            style.primary_text(&result.name)
        );
        match &result.status {
            NodeStatus::Failed { error } => {
                let _ = writeln!(output, "    {} {error}", style.error_prefix("error:"));
            }
            NodeStatus::Skipped { reason } if options.verbose => {
                let _ = writeln!(output, "    {}", style.dim(reason));
            }
            _ => {}
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} {}",
        style.tally_label("Result:"),
        run_tally(report, &style)
    );

    if let Some(name) = report.resume_from() {
        let _ = writeln!(
            output,
            "{}",
            style.dim(&format!(
                "resume with: caravel {} --from {name}",
                report.plan.workflow
            ))
        );
    }

    output
}

fn run_tally(report: &RunReport, style: &TextStyle) -> String {
    let mut applied = 0usize;
    let mut unchanged = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for result in &report.results {
        match &result.status {
            NodeStatus::Succeeded { changed: true } => applied += 1,
            NodeStatus::Succeeded { changed: false } => unchanged += 1,
            NodeStatus::Skipped { .. } => skipped += 1,
            NodeStatus::Failed { .. } => failed += 1,
        }
    }

    let not_attempted = report
        .plan
        .selected
        .len()
        .saturating_sub(report.results.len());

    let mut parts = Vec::new();
    if applied > 0 {
        parts.push(style.add_label(&format!(
            "{applied} {}",
            past_tense(report.plan.workflow)
        )));
    }
    if unchanged > 0 {
        parts.push(style.dim(&format!("{unchanged} unchanged")));
    }
    if skipped > 0 {
        parts.push(style.dim(&format!("{skipped} skipped")));
    }
    if failed > 0 {
        parts.push(style.error_op_label(&format!("{failed} failed")));
    }
    if not_attempted > 0 {
        parts.push(style.error_op_label(&format!("{not_attempted} not attempted")));
    }
    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Line renderers
// ---------------------------------------------------------------------------

fn append_header(output: &mut String, command: &str, target: Option<&str>, style: &TextStyle) {
    let _ = write!(output, "{}", style.header_command(command));
    if let Some(t) = target {
        let _ = write!(output, " {}", style.header_target(t));
    }
    let _ = writeln!(output);
}

fn append_warnings_and_errors(
    output: &mut String,
    warnings: &[String],
    errors: &[String],
    style: &TextStyle,
) {
    if warnings.is_empty() && errors.is_empty() {
        return;
    }
    let _ = writeln!(output);
    for w in warnings {
        let _ = writeln!(output, "  {} {w}", style.warn_prefix("warn:"));
    }
    for e in errors {
        let _ = writeln!(output, "  {} {e}", style.error_prefix("error:"));
    }
}

fn plan_symbol_and_label(workflow: Workflow, style: &TextStyle) -> (String, String) {
    match workflow {
        Workflow::Build => (
            style.add_symbol("+"),
            TextStyle::pad_label(&style.add_label("build")),
        ),
        Workflow::Deploy => (
            style.change_symbol("~"),
            TextStyle::pad_label(&style.change_label("deploy")),
        ),
        Workflow::Destroy => (
            style.remove_symbol("-"),
            TextStyle::pad_label(&style.remove_label("destroy")),
        ),
    }
}

fn run_symbol_and_label(
    workflow: Workflow,
    status: &NodeStatus,
    style: &TextStyle,
) -> (String, String) {
    match status {
        NodeStatus::Failed { .. } => (
            style.error_op_symbol("!"),
            TextStyle::pad_label(&style.error_op_label("failed")),
        ),
        NodeStatus::Skipped { .. } => (
            style.noop_symbol("="),
            TextStyle::pad_label(&style.noop_label("skipped")),
        ),
        NodeStatus::Succeeded { changed: false } => (
            style.noop_symbol("="),
            TextStyle::pad_label(&style.noop_label("unchanged")),
        ),
        NodeStatus::Succeeded { changed: true } => match workflow {
            Workflow::Build => (
                style.add_symbol("+"),
                TextStyle::pad_label(&style.add_label("built")),
            ),
            Workflow::Deploy => (
                style.add_symbol("+"),
                TextStyle::pad_label(&style.add_label("deployed")),
            ),
            Workflow::Destroy => (
                style.remove_symbol("-"),
                TextStyle::pad_label(&style.remove_label("destroyed")),
            ),
        },
    }
}

const fn past_tense(workflow: Workflow) -> &'static str {
    match workflow {
        Workflow::Build => "built",
        Workflow::Deploy => "deployed",
        Workflow::Destroy => "destroyed",
    }
}

// ---------------------------------------------------------------------------
// TextStyle
// ---------------------------------------------------------------------------

const LABEL_WIDTH: usize = 12;

#[derive(Debug, Clone)]
struct TextStyle {
    color_enabled: bool,
    add_sym_style: Style,
    change_sym_style: Style,
    remove_sym_style: Style,
    error_sym_style: Style,
    noop_sym_style: Style,
    add_label_style: Style,
    change_label_style: Style,
    remove_label_style: Style,
    error_label_style: Style,
    noop_label_style: Style,
    primary_style: Style,
    dim_style: Style,
    header_cmd_style: Style,
    header_target_style: Style,
    warn_prefix_style: Style,
    error_prefix_style: Style,
    tally_label_style: Style,
}

impl TextStyle {
    fn new(choice: ColorChoice) -> Self {
        Self {
            color_enabled: should_color(choice),
            add_sym_style: Style::new().green().bold(),
            change_sym_style: Style::new().cyan().bold(),
            remove_sym_style: Style::new().red().bold(),
            error_sym_style: Style::new().red().bold(),
            noop_sym_style: Style::new().dim(),
            add_label_style: Style::new().green(),
            change_label_style: Style::new().cyan(),
            remove_label_style: Style::new().red(),
            error_label_style: Style::new().red(),
            noop_label_style: Style::new().dim(),
            primary_style: Style::new().white(),
            dim_style: Style::new().dim(),
            header_cmd_style: Style::new().white().bold(),
            header_target_style: Style::new().dim(),
            warn_prefix_style: Style::new().yellow().bold(),
            error_prefix_style: Style::new().red().bold(),
            tally_label_style: Style::new().white().bold(),
        }
    }

    fn paint<T: std::fmt::Display>(&self, style: &Style, text: T) -> String {
        if self.color_enabled {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn pad_label(painted: &str) -> String {
        let visible_len = console::measure_text_width(painted);
        if visible_len < LABEL_WIDTH {
            format!("{painted}{}", " ".repeat(LABEL_WIDTH - visible_len))
        } else {
            format!("{painted} ")
        }
    }

    fn add_symbol(&self, s: &str) -> String {
        self.paint(&self.add_sym_style, s)
    }
    fn change_symbol(&self, s: &str) -> String {
        self.paint(&self.change_sym_style, s)
    }
    fn remove_symbol(&self, s: &str) -> String {
        self.paint(&self.remove_sym_style, s)
    }
    fn error_op_symbol(&self, s: &str) -> String {
        self.paint(&self.error_sym_style, s)
    }
    fn noop_symbol(&self, s: &str) -> String {
        self.paint(&self.noop_sym_style, s)
    }

    fn add_label(&self, s: &str) -> String {
        self.paint(&self.add_label_style, s)
    }
    fn change_label(&self, s: &str) -> String {
        self.paint(&self.change_label_style, s)
    }
    fn remove_label(&self, s: &str) -> String {
        self.paint(&self.remove_label_style, s)
    }
    fn error_op_label(&self, s: &str) -> String {
        self.paint(&self.error_label_style, s)
    }
    fn noop_label(&self, s: &str) -> String {
        self.paint(&self.noop_label_style, s)
    }

    fn primary_text(&self, s: &str) -> String {
        self.paint(&self.primary_style, s)
    }
    fn dim(&self, s: &str) -> String {
        self.paint(&self.dim_style, s)
    }

    fn header_command(&self, s: &str) -> String {
        self.paint(&self.header_cmd_style, s)
    }
    fn header_target(&self, s: &str) -> String {
        self.paint(&self.header_target_style, s)
    }

    fn warn_prefix(&self, s: &str) -> String {
        self.paint(&self.warn_prefix_style, s)
    }
    fn error_prefix(&self, s: &str) -> String {
        self.paint(&self.error_prefix_style, s)
    }

    fn tally_label(&self, s: &str) -> String {
        self.paint(&self.tally_label_style, s)
    }
}

fn should_color(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stdout().is_terminal(),
    }
}

#[cfg(test)]
mod tests;
