use crate::error::Result;
use crate::models::{Branch, CommitDetails, FileChange, FileDiff, RawCommit};

/// Read-only access to a repository. Implementations are shared across
/// concurrently running queries, so every method takes `&self`.
pub trait RepositoryBackend: Send + Sync {
    /// Local and remote branches in backend order; sorting is the branch
    /// index's job.
    fn list_branches(&self) -> Result<Vec<Branch>>;

    /// Short name of the checked-out branch, `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<String>>;

    /// Commit HEAD points at, `None` for a repository without commits.
    fn head_commit(&self) -> Result<Option<String>>;

    /// Resolves a full ref name such as `refs/heads/main` to a commit id.
    /// Unknown refs are `Ok(None)`.
    fn resolve_ref(&self, full_ref: &str) -> Result<Option<String>>;

    /// Walks history from `start` in reverse-chronological committer-time
    /// order. `None` walks the whole ancestry.
    fn log(&self, start: &str, limit: Option<usize>) -> Result<Vec<RawCommit>>;

    fn commit_details(&self, full_id: &str) -> Result<CommitDetails>;

    /// Diff of one path against the commit's first parent.
    fn file_diff(&self, full_id: &str, path: &str) -> Result<FileDiff>;

    /// Tree-to-tree changes going from `from` to `to`.
    fn tree_diff_stats(&self, from: &str, to: &str) -> Result<Vec<FileChange>>;
}
