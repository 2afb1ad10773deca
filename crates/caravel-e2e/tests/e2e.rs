#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use caravel_e2e::harness::{RunResult, run_caravel, to_json_path, write_file};

/// A catalog snapshot plus a git workspace with one terraform root per app.
struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new(catalog_json: &str, apps: &[&str]) -> Self {
        let temp = TempDir::new().expect("tempdir");

        let workspace = temp.path().join("workspace");
        let repo = git2::Repository::init(&workspace).expect("init repository");
        let mut config = repo.config().expect("repo config");
        config.set_str("user.name", "test").expect("set user.name");
        config
            .set_str("user.email", "test@example.com")
            .expect("set user.email");

        for app in apps {
            write_file(
                &workspace.join(app).join("terraform/main.tf"),
                "# empty stack\n",
            )
            .expect("write terraform root");
        }
        commit_all(&repo);

        let catalog_path = temp.path().join("catalog.json");
        write_file(&catalog_path, catalog_json).expect("write catalog snapshot");
        write_file(
            &temp.path().join("config.json"),
            &format!("{{ \"source\": \"{}\" }}\n", to_json_path(&catalog_path)),
        )
        .expect("write client config");

        Self { temp }
    }

    fn workspace(&self) -> PathBuf {
        self.temp.path().join("workspace")
    }

    fn env(&self) -> Vec<(String, String)> {
        vec![(
            "CARAVEL_CONFIG".to_string(),
            self.temp.path().join("config.json").display().to_string(),
        )]
    }

    fn touch(&self, relative: &str, content: &str) {
        write_file(&self.workspace().join(relative), content).expect("write workspace file");
    }

    fn run(&self, args: &[&str]) -> RunResult {
        let output =
            run_caravel(&self.workspace(), args, &self.env()).expect("run caravel");
        println!("{}", output.transcript());
        output
    }
}

fn commit_all(repo: &git2::Repository) {
    let mut index = repo.index().expect("repo index");
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .expect("stage files");
    index.write().expect("write index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    let signature = repo.signature().expect("signature");
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, "setup", &tree, &parents)
        .expect("commit");
}

const CHAIN: &str = r#"[
  { "name": "a" },
  { "name": "b", "dependencies": ["a"] },
  { "name": "c", "dependencies": ["b"] }
]"#;

#[test]
fn diff_reports_only_changed_installations() {
    let fixture = Fixture::new(CHAIN, &["a", "b", "c"]);
    fixture.touch("b/terraform/main.tf", "changed\n");

    let output = fixture.run(&["diff", "--color", "never"]);
    assert_eq!(output.exit_code, 0, "diff is read-only and must succeed");
    assert!(
        output.stdout.contains("Plan: 1 to deploy"),
        "expected a single selected installation, got:\n{}",
        output.stdout
    );
    assert!(
        output
            .stdout
            .lines()
            .any(|line| line.contains("deploy") && line.trim_end().ends_with(" b")),
        "expected b in the plan, got:\n{}",
        output.stdout
    );
}

#[test]
fn diff_on_a_clean_tree_has_nothing_to_do() {
    let fixture = Fixture::new(CHAIN, &["a", "b", "c"]);

    let output = fixture.run(&["diff", "--color", "never"]);
    assert_eq!(output.exit_code, 0);
    assert!(
        output.stdout.contains("Nothing to deploy."),
        "expected empty plan, got:\n{}",
        output.stdout
    );
}

#[test]
fn diff_is_idempotent_without_filesystem_changes() {
    let fixture = Fixture::new(CHAIN, &["a", "b", "c"]);
    fixture.touch("b/terraform/main.tf", "changed\n");

    let first = fixture.run(&["diff", "--color", "never"]);
    let second = fixture.run(&["diff", "--color", "never"]);
    assert_eq!(first.exit_code, 0);
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn dependency_cycle_fails_before_any_side_effect() {
    let cyclic = r#"[
      { "name": "a", "dependencies": ["b"] },
      { "name": "b", "dependencies": ["a"] }
    ]"#;
    let fixture = Fixture::new(cyclic, &["a", "b"]);

    let output = fixture.run(&["diff"]);
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("dependency cycle detected"),
        "expected cycle details, got:\n{}",
        output.stderr
    );
}

#[test]
fn missing_dependency_is_reported_with_its_name() {
    let dangling = r#"[
      { "name": "a", "dependencies": ["ghost"] }
    ]"#;
    let fixture = Fixture::new(dangling, &["a"]);

    let output = fixture.run(&["diff"]);
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("unregistered installation ghost"),
        "expected missing dependency details, got:\n{}",
        output.stderr
    );
}

#[test]
fn duplicate_installations_are_rejected() {
    let duplicated = r#"[
      { "name": "a" },
      { "name": "a" }
    ]"#;
    let fixture = Fixture::new(duplicated, &["a"]);

    let output = fixture.run(&["diff"]);
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("duplicate installation"),
        "expected duplicate error, got:\n{}",
        output.stderr
    );
}

#[test]
fn running_outside_a_repository_fails_closed() {
    let fixture = Fixture::new(CHAIN, &["a"]);
    let outside = fixture.temp.path().join("elsewhere");
    std::fs::create_dir_all(&outside).expect("create non-repo directory");

    let output = run_caravel(&outside, &["diff"], &fixture.env()).expect("run caravel");
    println!("{}", output.transcript());
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("not inside a workspace repository"),
        "expected repository error, got:\n{}",
        output.stderr
    );
}

#[test]
fn unknown_only_target_is_a_scope_error() {
    let fixture = Fixture::new(CHAIN, &["a", "b", "c"]);

    let output = fixture.run(&["build", "--only", "ghost"]);
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("unknown installation for --only"),
        "expected scope error, got:\n{}",
        output.stderr
    );
}

#[test]
fn destroy_requires_an_explicit_target() {
    let fixture = Fixture::new(CHAIN, &["a", "b", "c"]);

    let output = fixture.run(&["destroy"]);
    assert_eq!(output.exit_code, 1);
    assert!(
        output
            .stderr
            .contains("destroy requires an installation name, --all, or --from"),
        "expected target error, got:\n{}",
        output.stderr
    );
}

#[test]
fn help_exits_zero() {
    let fixture = Fixture::new(CHAIN, &["a"]);
    let output = run_caravel(Path::new("."), &["--help"], &fixture.env()).expect("run caravel");
    assert_eq!(output.exit_code, 0);
    assert!(output.stdout.contains("deploy"));
}
