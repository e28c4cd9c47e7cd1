use std::path::{Path, PathBuf};
use std::time::Instant;

use log::debug;

use crate::backend::RepositoryBackend;
use crate::error::{RadarError, Result};
use crate::git::GitRunner;
use crate::log_parser::{
    FIELD_SEP, LOG_FORMAT, parse_branch_refs, parse_file_changes, parse_git_log_records,
    parse_unified_hunks,
};
use crate::models::{Branch, CommitDetails, FileChange, FileDiff, ParentSummary, RawCommit};

/// Object id of the empty tree, used as the "parent" of root commits.
const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Large enough to make git emit the whole file as one hunk; the collapser
/// trims unchanged runs afterwards.
const FULL_CONTEXT: &str = "--unified=1000000";

/// [`RepositoryBackend`] over the git command line.
#[derive(Debug, Clone)]
pub struct GitBackend {
    git: GitRunner,
    repo: PathBuf,
}

impl GitBackend {
    /// Opens the repository containing `path`. Fails with
    /// `BackendUnavailable` when there is no repository to query.
    pub fn open(git: GitRunner, path: &Path) -> Result<Self> {
        let repo = git.discover_repo_root(path).map_err(|err| match err {
            RadarError::InvalidRepository(p) => RadarError::BackendUnavailable(format!(
                "{} is not inside a git repository",
                p.display()
            )),
            other => other,
        })?;
        git.validate_repo(&repo)
            .map_err(|err| RadarError::BackendUnavailable(err.to_string()))?;
        Ok(Self { git, repo })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let started = Instant::now();
        let out = self.git.exec(&self.repo, args, false)?;
        debug!(
            "git {} took {:?}",
            args.first().copied().unwrap_or_default(),
            started.elapsed()
        );
        Ok(out.stdout)
    }

    /// Runs a query whose non-zero exit means "nothing there".
    fn run_optional(&self, args: &[&str]) -> Result<Option<String>> {
        let out = self.git.exec(&self.repo, args, true)?;
        if !out.success() {
            return Ok(None);
        }
        let value = out.stdout.trim();
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(value.to_string()))
    }

    fn parents_of(&self, full_id: &str) -> Result<Vec<String>> {
        let out = self.run(&["rev-list", "--parents", "-n", "1", full_id])?;
        let mut ids = out.split_whitespace().map(ToString::to_string);
        match ids.next() {
            Some(_) => Ok(ids.collect()),
            None => Err(RadarError::UnknownCommit(full_id.to_string())),
        }
    }

    fn diff_changes(&self, from: &str, to: &str) -> Result<Vec<FileChange>> {
        let numstat = self.run(&[
            "-c",
            "core.quotePath=false",
            "diff",
            "--numstat",
            "--no-color",
            "--no-ext-diff",
            "--find-renames",
            from,
            to,
        ])?;
        let name_status = self.run(&[
            "-c",
            "core.quotePath=false",
            "diff",
            "--name-status",
            "--no-color",
            "--no-ext-diff",
            "--find-renames",
            from,
            to,
        ])?;
        Ok(parse_file_changes(&numstat, &name_status))
    }

    fn parent_summaries(&self, parents: &[String]) -> Result<Vec<ParentSummary>> {
        let mut args = vec!["show", "-s", "--no-color", LOG_FORMAT];
        args.extend(parents.iter().map(String::as_str));
        let records = parse_git_log_records(&self.run(&args)?)?;
        Ok(records
            .into_iter()
            .map(|raw| ParentSummary {
                short_id: raw.short_id,
                full_id: raw.id,
                message: raw.subject,
                branch: None,
            })
            .collect())
    }
}

impl RepositoryBackend for GitBackend {
    fn list_branches(&self) -> Result<Vec<Branch>> {
        let head_ref = self.run_optional(&["symbolic-ref", "--quiet", "HEAD"])?;
        let format = format!("--format=%(refname){FIELD_SEP}%(objectname){FIELD_SEP}%(symref)");
        let out = self.run(&["for-each-ref", &format, "refs/heads", "refs/remotes"])?;
        Ok(parse_branch_refs(&out, head_ref.as_deref()))
    }

    fn current_branch(&self) -> Result<Option<String>> {
        self.run_optional(&["symbolic-ref", "--quiet", "--short", "HEAD"])
    }

    fn head_commit(&self) -> Result<Option<String>> {
        self.run_optional(&["rev-parse", "--verify", "--quiet", "HEAD^{commit}"])
    }

    fn resolve_ref(&self, full_ref: &str) -> Result<Option<String>> {
        let rev = format!("{full_ref}^{{commit}}");
        self.run_optional(&["rev-parse", "--verify", "--quiet", &rev])
    }

    fn log(&self, start: &str, limit: Option<usize>) -> Result<Vec<RawCommit>> {
        let limit_arg = limit.map(|n| format!("--max-count={n}"));
        let mut args = vec![
            "-c",
            "color.ui=never",
            "log",
            "--date-order",
            "--no-show-signature",
            "--no-notes",
            LOG_FORMAT,
        ];
        if let Some(limit_arg) = limit_arg.as_deref() {
            args.push(limit_arg);
        }
        args.push(start);
        args.push("--");
        parse_git_log_records(&self.run(&args)?)
    }

    fn commit_details(&self, full_id: &str) -> Result<CommitDetails> {
        let parents = self.parents_of(full_id)?;
        let base = parents.first().map(String::as_str).unwrap_or(EMPTY_TREE);
        let files = self.diff_changes(base, full_id)?;
        let parent_summaries = if parents.len() > 1 {
            self.parent_summaries(&parents)?
        } else {
            Vec::new()
        };
        Ok(CommitDetails {
            parents: parent_summaries,
            files,
        })
    }

    fn file_diff(&self, full_id: &str, path: &str) -> Result<FileDiff> {
        let parents = self.parents_of(full_id)?;
        let root = parents.is_empty();
        let base = parents.first().map(String::as_str).unwrap_or(EMPTY_TREE);
        let patch = self.run(&[
            "-c",
            "core.quotePath=false",
            "diff",
            "--no-color",
            "--no-ext-diff",
            FULL_CONTEXT,
            base,
            full_id,
            "--",
            path,
        ])?;
        Ok(FileDiff {
            root,
            hunks: parse_unified_hunks(&patch),
        })
    }

    fn tree_diff_stats(&self, from: &str, to: &str) -> Result<Vec<FileChange>> {
        self.diff_changes(from, to)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::GitBackend;
    use crate::backend::RepositoryBackend;
    use crate::git::GitRunner;
    use crate::git::test_repo::{commit_file, git, has_git, init_repo};
    use crate::models::{FileStatus, HunkKind};

    #[test]
    fn open_outside_repository_is_backend_unavailable() {
        if !has_git() {
            return;
        }
        let tmp = TempDir::new().expect("tempdir");
        let err = GitBackend::open(GitRunner::default(), tmp.path()).expect_err("no repo");
        assert!(err.is_backend_unavailable());
    }

    #[test]
    fn empty_repository_has_no_head() {
        if !has_git() {
            return;
        }
        let tmp = TempDir::new().expect("tempdir");
        init_repo(tmp.path());
        let backend = GitBackend::open(GitRunner::default(), tmp.path()).expect("open");
        assert_eq!(backend.head_commit().expect("head"), None);
        assert!(backend.list_branches().expect("branches").is_empty());
    }

    #[test]
    fn lists_branches_and_walks_log() {
        if !has_git() {
            return;
        }
        let tmp = TempDir::new().expect("tempdir");
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.txt", "a\n", "first");
        git(tmp.path(), &["branch", "feature"]);
        commit_file(tmp.path(), "a.txt", "a\nb\n", "second");

        let backend = GitBackend::open(GitRunner::default(), tmp.path()).expect("open");
        let branches = backend.list_branches().expect("branches");
        let main = branches.iter().find(|b| b.name == "main").expect("main");
        assert!(main.is_head);
        assert!(branches.iter().any(|b| b.name == "feature" && !b.is_head));
        assert_eq!(
            backend.current_branch().expect("current").as_deref(),
            Some("main")
        );

        let commits = backend.log(&main.tip, None).expect("log");
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].subject, "second");
        assert_eq!(commits[1].parents.len(), 0);
        assert_eq!(
            backend
                .resolve_ref("refs/heads/feature")
                .expect("resolve")
                .as_deref(),
            Some(commits[1].id.as_str())
        );
        assert_eq!(backend.resolve_ref("refs/heads/nope").expect("resolve"), None);
    }

    #[test]
    fn reads_details_and_root_diff() {
        if !has_git() {
            return;
        }
        let tmp = TempDir::new().expect("tempdir");
        init_repo(tmp.path());
        commit_file(tmp.path(), "notes.txt", "line one\nline two\n", "add notes");
        commit_file(tmp.path(), "notes.txt", "line one\nline 2\n", "edit notes");

        let backend = GitBackend::open(GitRunner::default(), tmp.path()).expect("open");
        let head = backend.head_commit().expect("head").expect("some head");
        let commits = backend.log(&head, None).expect("log");
        let root = &commits[1];

        let details = backend.commit_details(&root.id).expect("details");
        assert_eq!(details.files.len(), 1);
        assert_eq!(details.files[0].status, FileStatus::Added);
        assert_eq!(details.files[0].additions, 2);

        let diff = backend.file_diff(&root.id, "notes.txt").expect("root diff");
        assert!(diff.root);
        assert!(diff.hunks.iter().all(|h| h.kind == HunkKind::Add));

        let diff = backend.file_diff(&head, "notes.txt").expect("diff");
        assert!(!diff.root);
        assert!(diff.hunks.iter().any(|h| h.kind == HunkKind::Delete));
        assert_eq!(diff.hunks[0].kind, HunkKind::Equal);

        let stats = backend.tree_diff_stats(&root.id, &head).expect("stats");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].status, FileStatus::Modified);
    }
}
