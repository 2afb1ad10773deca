#![allow(clippy::expect_used)]

use std::collections::BTreeSet;

use caravel_domain::{
    InstallationName, NodeResult, NodeStatus, PlanReport, RunReport, Workflow,
};

use super::{ColorChoice, OutputFormat, RenderOptions, redact_sensitive, render_plan, render_run};

fn name(value: &str) -> InstallationName {
    InstallationName::try_from(value).expect("valid name")
}

fn options() -> RenderOptions {
    RenderOptions {
        color: ColorChoice::Never,
        verbose: false,
        target: Some("/work/apps".to_string()),
    }
}

fn plan_report(selected: &[&str]) -> PlanReport {
    PlanReport {
        workflow: Workflow::Deploy,
        installations: vec![name("a"), name("b"), name("c")],
        changed: selected.iter().map(|value| name(value)).collect(),
        execution_order: vec![name("a"), name("b"), name("c")],
        selected: selected.iter().map(|value| name(value)).collect(),
        warnings: Vec::new(),
    }
}

#[test]
fn plan_text_lists_selected_nodes() {
    let rendered =
        render_plan(&plan_report(&["b"]), OutputFormat::Text, &options()).expect("render");

    assert!(rendered.contains("caravel deploy plan"));
    assert!(rendered.contains("/work/apps"));
    assert!(rendered.contains("deploy"));
    assert!(rendered.contains('b'));
    assert!(rendered.contains("2 installations not selected"));
    assert!(rendered.contains("Plan: 1 to deploy"));
}

#[test]
fn empty_plan_says_nothing_to_do() {
    let rendered =
        render_plan(&plan_report(&[]), OutputFormat::Text, &options()).expect("render");
    assert!(rendered.contains("Nothing to deploy."));
}

#[test]
fn plan_warnings_are_rendered() {
    let mut report = plan_report(&["b"]);
    report
        .warnings
        .push("directory \"rogue\" is not a registered installation".to_string());

    let rendered = render_plan(&report, OutputFormat::Text, &options()).expect("render");
    assert!(rendered.contains("warn:"));
    assert!(rendered.contains("rogue"));
}

#[test]
fn plan_json_round_trips() {
    let report = plan_report(&["b"]);
    let rendered = render_plan(&report, OutputFormat::Json, &options()).expect("render");
    let parsed: PlanReport = serde_json::from_str(&rendered).expect("parse rendered JSON");
    assert_eq!(parsed, report);
}

#[test]
fn run_text_reports_failure_and_resume_hint() {
    let report = RunReport {
        plan: plan_report(&["a", "b", "c"]),
        results: vec![
            NodeResult {
                name: name("a"),
                status: NodeStatus::Succeeded { changed: true },
            },
            NodeResult {
                name: name("b"),
                status: NodeStatus::Failed {
                    error: "terraform apply failed".to_string(),
                },
            },
        ],
        aborted_at: Some(name("b")),
        errors: vec!["b failed: terraform apply failed".to_string()],
    };

    let rendered = render_run(&report, OutputFormat::Text, &options()).expect("render");
    assert!(rendered.contains("deployed"));
    assert!(rendered.contains("failed"));
    assert!(rendered.contains("terraform apply failed"));
    assert!(rendered.contains("1 not attempted"));
    assert!(rendered.contains("resume with: caravel deploy --from b"));
}

#[test]
fn run_text_counts_skips_and_unchanged() {
    let report = RunReport {
        plan: plan_report(&["a", "b"]),
        results: vec![
            NodeResult {
                name: name("a"),
                status: NodeStatus::Skipped {
                    reason: "not configured locally".to_string(),
                },
            },
            NodeResult {
                name: name("b"),
                status: NodeStatus::Succeeded { changed: false },
            },
        ],
        aborted_at: None,
        errors: Vec::new(),
    };

    let rendered = render_run(&report, OutputFormat::Text, &options()).expect("render");
    assert!(rendered.contains("1 skipped"));
    assert!(rendered.contains("1 unchanged"));
    assert!(!rendered.contains("resume with"));
}

#[test]
fn destroy_runs_use_removal_wording() {
    let mut plan = plan_report(&["c"]);
    plan.workflow = Workflow::Destroy;
    plan.execution_order.reverse();

    let report = RunReport {
        plan,
        results: vec![NodeResult {
            name: name("c"),
            status: NodeStatus::Succeeded { changed: true },
        }],
        aborted_at: None,
        errors: Vec::new(),
    };

    let rendered = render_run(&report, OutputFormat::Text, &options()).expect("render");
    assert!(rendered.contains("destroyed"));
    assert!(rendered.contains("caravel destroy"));
}

#[test]
fn redaction_masks_tokens_longest_first() {
    let sensitive: BTreeSet<String> =
        ["secret-token".to_string(), "secret".to_string()].into();
    let masked = redact_sensitive("bearer secret-token and secret", &sensitive);
    assert_eq!(masked, "bearer [REDACTED] and [REDACTED]");
    assert!(!masked.contains("secret"));
}

#[test]
fn short_values_are_never_redacted() {
    let sensitive: BTreeSet<String> = ["ab".to_string()].into();
    let untouched = redact_sensitive("ab stays", &sensitive);
    assert_eq!(untouched, "ab stays");
}
