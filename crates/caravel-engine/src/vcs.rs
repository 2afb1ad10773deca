use std::process::Command;

use crate::error::VcsError;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub committed: bool,
    pub pushed: bool,
}

/// Record a completed deploy: stage everything, commit, and push.
///
/// A clean tree commits nothing. Pushing requires an `origin` remote and
/// the `git` binary (its credential helpers do the authentication); without
/// a remote the commit stays local.
///
/// # Errors
///
/// Returns an error when staging/committing fails or the push exits
/// non-zero.
pub fn commit_and_push(workspace: &Workspace, message: &str) -> Result<CommitOutcome, VcsError> {
    let repo = workspace.repository()?;
    let committed = commit_all(&repo, message)?;

    let has_origin = repo.find_remote("origin").is_ok();
    let pushed = if committed && has_origin {
        push(workspace)?;
        true
    } else {
        false
    };

    Ok(CommitOutcome { committed, pushed })
}

fn git_err(context: &str, source: git2::Error) -> VcsError {
    VcsError::Git {
        context: context.to_string(),
        source,
    }
}

fn commit_all(repo: &git2::Repository, message: &str) -> Result<bool, VcsError> {
    let mut index = repo
        .index()
        .map_err(|source| git_err("failed to open the index", source))?;
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .map_err(|source| git_err("failed to stage new and modified files", source))?;
    index
        .update_all(["*"].iter(), None)
        .map_err(|source| git_err("failed to stage deletions", source))?;
    index
        .write()
        .map_err(|source| git_err("failed to write the index", source))?;

    let tree_id = index
        .write_tree()
        .map_err(|source| git_err("failed to write the index tree", source))?;
    let tree = repo
        .find_tree(tree_id)
        .map_err(|source| git_err("failed to look up the index tree", source))?;

    let parent = match repo.head() {
        Ok(head) => Some(
            head.peel_to_commit()
                .map_err(|source| git_err("failed to resolve HEAD", source))?,
        ),
        Err(error)
            if matches!(
                error.code(),
                git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
            ) =>
        {
            None
        }
        Err(source) => return Err(git_err("failed to read HEAD", source)),
    };

    // Clean tree: nothing to record.
    if let Some(parent) = &parent
        && parent.tree_id() == tree_id
    {
        return Ok(false);
    }

    let signature = repo
        .signature()
        .map_err(|source| git_err("failed to resolve the committer identity", source))?;
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )
    .map_err(|source| git_err("failed to create the commit", source))?;

    Ok(true)
}

fn push(workspace: &Workspace) -> Result<(), VcsError> {
    let git_bin = which::which("git").map_err(|_| VcsError::GitBinaryMissing)?;
    let status = Command::new(git_bin)
        .arg("-C")
        .arg(workspace.root())
        .arg("push")
        .status()
        .map_err(|source| VcsError::PushSpawn { source })?;

    if status.success() {
        Ok(())
    } else {
        Err(VcsError::PushFailed { status })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::fs;
    use std::path::Path;

    use super::commit_and_push;
    use crate::workspace::Workspace;

    fn init_repo(root: &Path) -> git2::Repository {
        let repo = git2::Repository::init(root).expect("init repository");
        let mut config = repo.config().expect("repo config");
        config.set_str("user.name", "test").expect("set user.name");
        config
            .set_str("user.email", "test@example.com")
            .expect("set user.email");
        repo
    }

    #[test]
    fn commits_pending_changes_without_a_remote() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = init_repo(temp.path());
        fs::create_dir_all(temp.path().join("app/terraform")).expect("mkdir");
        fs::write(temp.path().join("app/terraform/main.tf"), "resource {}\n").expect("write");

        let workspace = Workspace::discover(temp.path()).expect("discover workspace");
        let outcome = commit_and_push(&workspace, "deploy app").expect("commit");

        assert!(outcome.committed);
        assert!(!outcome.pushed, "no origin remote configured");

        let head = repo.head().expect("HEAD after commit");
        let commit = head.peel_to_commit().expect("commit object");
        assert_eq!(commit.message(), Some("deploy app"));
    }

    #[test]
    fn clean_tree_commits_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_repo(temp.path());
        fs::write(temp.path().join("file.txt"), "content\n").expect("write");

        let workspace = Workspace::discover(temp.path()).expect("discover workspace");
        let first = commit_and_push(&workspace, "first").expect("first commit");
        assert!(first.committed);

        let second = commit_and_push(&workspace, "second").expect("second commit");
        assert!(!second.committed, "nothing left to record");
    }
}
