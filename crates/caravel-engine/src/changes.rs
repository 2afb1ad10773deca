use std::collections::BTreeSet;
use std::path::Component;

use caravel_domain::InstallationName;

use crate::error::DiffError;
use crate::workspace::Workspace;

/// Installations whose directories differ from the last-recorded state.
///
/// Compares the working tree (index included, untracked included) against
/// the `HEAD` tree and maps every delta to its top-level directory. A clean
/// tree yields the empty set; a repository without commits yet reports every
/// populated directory. Read-only and idempotent.
///
/// # Errors
///
/// Returns an error when the repository cannot be opened or diffed.
pub fn diffed_installations(
    workspace: &Workspace,
) -> Result<BTreeSet<InstallationName>, DiffError> {
    let repo = workspace.repository()?;

    let head_tree = match repo.head() {
        Ok(head) => Some(
            head.peel_to_tree()
                .map_err(|source| DiffError::Diff { source })?,
        ),
        Err(error)
            if matches!(
                error.code(),
                git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
            ) =>
        {
            None
        }
        Err(source) => return Err(DiffError::Diff { source }),
    };

    let mut options = git2::DiffOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_typechange(true);

    let diff = repo
        .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut options))
        .map_err(|source| DiffError::Diff { source })?;

    let mut changed = BTreeSet::new();
    for delta in diff.deltas() {
        for file in [delta.old_file(), delta.new_file()] {
            let Some(path) = file.path() else {
                continue;
            };
            let mut components = path.components();
            let Some(Component::Normal(first)) = components.next() else {
                continue;
            };
            // Top-level files (README, config) do not belong to any
            // installation.
            let Some(Component::Normal(second)) = components.next() else {
                continue;
            };
            // Tool caches and rendered artifacts (.terraform, .build) are
            // not source changes.
            if second.to_str().is_some_and(|entry| entry.starts_with('.')) {
                continue;
            }
            let Some(text) = first.to_str() else {
                continue;
            };
            if let Ok(name) = InstallationName::try_from(text) {
                changed.insert(name);
            }
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::fs;
    use std::path::Path;

    use caravel_domain::InstallationName;

    use super::diffed_installations;
    use crate::workspace::Workspace;

    fn name(value: &str) -> InstallationName {
        InstallationName::try_from(value).expect("valid name")
    }

    fn init_repo(root: &Path) -> git2::Repository {
        let repo = git2::Repository::init(root).expect("init repository");
        let mut config = repo.config().expect("repo config");
        config.set_str("user.name", "test").expect("set user.name");
        config
            .set_str("user.email", "test@example.com")
            .expect("set user.email");
        repo
    }

    fn commit_all(repo: &git2::Repository, message: &str) {
        let mut index = repo.index().expect("repo index");
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .expect("stage files");
        index.write().expect("write index");
        let tree_id = index.write_tree().expect("write tree");
        let tree = repo.find_tree(tree_id).expect("find tree");
        let signature = repo.signature().expect("signature");

        let parent = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .expect("commit");
    }

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directories");
        }
        fs::write(path, content).expect("write file");
    }

    #[test]
    fn clean_tree_reports_no_changes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = init_repo(temp.path());
        write_file(&temp.path().join("app/terraform/main.tf"), "resource {}\n");
        commit_all(&repo, "initial");

        let workspace = Workspace::discover(temp.path()).expect("discover workspace");
        let changed = diffed_installations(&workspace).expect("diff");
        assert!(changed.is_empty());
    }

    #[test]
    fn modified_and_untracked_directories_are_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = init_repo(temp.path());
        write_file(&temp.path().join("app/terraform/main.tf"), "resource {}\n");
        write_file(&temp.path().join("base/chart/Chart.yaml"), "name: base\n");
        commit_all(&repo, "initial");

        write_file(&temp.path().join("app/terraform/main.tf"), "changed\n");
        write_file(&temp.path().join("fresh/chart/Chart.yaml"), "name: fresh\n");

        let workspace = Workspace::discover(temp.path()).expect("discover workspace");
        let changed = diffed_installations(&workspace).expect("diff");
        assert_eq!(
            changed.into_iter().collect::<Vec<_>>(),
            vec![name("app"), name("fresh")]
        );
    }

    #[test]
    fn top_level_files_are_not_installations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = init_repo(temp.path());
        write_file(&temp.path().join("app/terraform/main.tf"), "resource {}\n");
        commit_all(&repo, "initial");

        write_file(&temp.path().join("README.md"), "docs\n");

        let workspace = Workspace::discover(temp.path()).expect("discover workspace");
        let changed = diffed_installations(&workspace).expect("diff");
        assert!(changed.is_empty());
    }

    #[test]
    fn tool_caches_and_build_artifacts_are_ignored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = init_repo(temp.path());
        write_file(&temp.path().join("app/terraform/main.tf"), "resource {}\n");
        commit_all(&repo, "initial");

        write_file(&temp.path().join("app/.build/terraform.tfplan"), "plan\n");
        write_file(
            &temp.path().join("app/.terraform/providers/lock"),
            "cache\n",
        );

        let workspace = Workspace::discover(temp.path()).expect("discover workspace");
        let changed = diffed_installations(&workspace).expect("diff");
        assert!(changed.is_empty(), "artifacts must not count as changes");
    }

    #[test]
    fn diff_is_idempotent_without_filesystem_changes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = init_repo(temp.path());
        write_file(&temp.path().join("app/terraform/main.tf"), "resource {}\n");
        commit_all(&repo, "initial");
        write_file(&temp.path().join("app/terraform/main.tf"), "changed\n");

        let workspace = Workspace::discover(temp.path()).expect("discover workspace");
        let first = diffed_installations(&workspace).expect("first diff");
        let second = diffed_installations(&workspace).expect("second diff");
        assert_eq!(first, second);
    }
}
