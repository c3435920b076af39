//! Git repository inspection for branch-aware restarts.

use crate::error::Result;
use git2::Repository;
use std::path::{Path, PathBuf};

/// Name of the branch `HEAD` points at, or `None` for a detached HEAD.
///
/// Works on a freshly initialised repository whose branch has no commits yet.
pub fn current_branch(project_root: &Path) -> Result<Option<String>> {
    let repo = Repository::open(project_root)?;
    let head = repo.find_reference("HEAD")?;
    Ok(head
        .symbolic_target()
        .and_then(|target| target.strip_prefix("refs/heads/"))
        .map(str::to_string))
}

/// Like [`current_branch`] but treats a missing repository as "no branch".
pub fn current_branch_or_none(project_root: &Path) -> Option<String> {
    match current_branch(project_root) {
        Ok(branch) => branch,
        Err(e) => {
            tracing::debug!(
                "Could not read HEAD in {}: {}",
                project_root.display(),
                e
            );
            None
        }
    }
}

/// File holding a ref, found the way git resolves short ref names.
///
/// Candidates are tried in order: `<ref>`, `refs/<ref>`, `refs/tags/<ref>`,
/// `refs/heads/<ref>`, `refs/remotes/<ref>`, `refs/remotes/<ref>/HEAD`.
/// Refs that only exist in `packed-refs` have no file and yield `None`.
pub fn resolve_ref_path(git_dir: &Path, refname: &str) -> Option<PathBuf> {
    let candidates = [
        git_dir.join(refname),
        git_dir.join("refs").join(refname),
        git_dir.join("refs/tags").join(refname),
        git_dir.join("refs/heads").join(refname),
        git_dir.join("refs/remotes").join(refname),
        git_dir.join("refs/remotes").join(refname).join("HEAD"),
    ];
    candidates.into_iter().find(|path| path.is_file())
}

/// Ref file of the remote-tracking branch for `branch` on `remote`.
pub fn remote_branch_ref(git_dir: &Path, remote: &str, branch: &str) -> Option<PathBuf> {
    resolve_ref_path(git_dir, &format!("{}/{}", remote, branch))
}

/// Location of the `HEAD` file that changes on checkout.
pub fn head_path(git_dir: &Path) -> PathBuf {
    git_dir.join("HEAD")
}
