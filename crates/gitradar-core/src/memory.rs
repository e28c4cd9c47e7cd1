//! An in-memory repository used by the test suites and the `--demo` mode.
//!
//! Commits are described as edits on top of their first parent; each commit
//! keeps a full snapshot of its tree so tree-to-tree diffs and per-file diffs
//! are computed the same way for any pair of commits.

use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

use crate::backend::RepositoryBackend;
use crate::error::{RadarError, Result};
use crate::models::{
    Branch, CommitDetails, FileChange, FileDiff, FileStatus, HunkKind, ParentSummary, RawCommit,
    RawHunk,
};

type Tree = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    ListBranches,
    Log,
    CommitDetails,
    FileDiff,
    TreeDiff,
}

#[derive(Debug, Clone)]
pub struct MemoryCommit {
    id: String,
    parents: Vec<String>,
    author: String,
    time: i64,
    message: String,
    writes: Vec<(String, Option<String>)>,
}

impl MemoryCommit {
    pub fn new(id: impl Into<String>, parents: &[&str], time: i64) -> Self {
        let id = id.into();
        Self {
            message: format!("commit {id}"),
            id,
            parents: parents.iter().map(|p| p.to_string()).collect(),
            author: "Test".to_string(),
            time,
            writes: Vec::new(),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn write(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.writes.push((path.into(), Some(content.into())));
        self
    }

    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.writes.push((path.into(), None));
        self
    }
}

#[derive(Debug, Clone)]
struct StoredCommit {
    raw: RawCommit,
    tree: Tree,
}

#[derive(Debug, Clone, Default)]
enum Head {
    #[default]
    Unborn,
    Branch(String),
    Detached(String),
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    commits: HashMap<String, StoredCommit>,
    refs: BTreeMap<String, String>,
    head: Head,
    failing: HashSet<MemoryOp>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a commit. Parents must already exist; the tree starts from the
    /// first parent's tree.
    pub fn add_commit(&mut self, commit: MemoryCommit) -> Result<()> {
        let mut tree = match commit.parents.first() {
            Some(parent) => self
                .commits
                .get(parent)
                .map(|c| c.tree.clone())
                .ok_or_else(|| RadarError::UnknownCommit(parent.clone()))?,
            None => Tree::new(),
        };
        if let Some(missing) = commit
            .parents
            .iter()
            .find(|p| !self.commits.contains_key(p.as_str()))
        {
            return Err(RadarError::UnknownCommit(missing.clone()));
        }
        for (path, content) in commit.writes {
            match content {
                Some(content) => tree.insert(path, content),
                None => tree.remove(&path),
            };
        }
        let short_id = commit.id.chars().take(7).collect();
        let raw = RawCommit {
            id: commit.id.clone(),
            short_id,
            parents: commit.parents,
            author_name: commit.author,
            author_email: "test@example.com".to_string(),
            authored_unix: commit.time,
            committed_unix: commit.time,
            subject: commit.message,
        };
        self.commits.insert(commit.id, StoredCommit { raw, tree });
        Ok(())
    }

    /// Points `refs/heads/<name>` at `tip`.
    pub fn set_branch(&mut self, name: &str, tip: &str) {
        self.refs
            .insert(format!("refs/heads/{name}"), tip.to_string());
    }

    /// Points `refs/remotes/<name>` at `tip`, e.g. `origin/main`.
    pub fn set_remote_branch(&mut self, name: &str, tip: &str) {
        self.refs
            .insert(format!("refs/remotes/{name}"), tip.to_string());
    }

    pub fn checkout(&mut self, branch: &str) {
        self.head = Head::Branch(format!("refs/heads/{branch}"));
    }

    pub fn detach(&mut self, id: &str) {
        self.head = Head::Detached(id.to_string());
    }

    pub fn fail(&mut self, op: MemoryOp) {
        self.failing.insert(op);
    }

    fn check(&self, op: MemoryOp) -> Result<()> {
        if self.failing.contains(&op) {
            return Err(RadarError::BackendUnavailable(format!(
                "injected failure for {op:?}"
            )));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<&StoredCommit> {
        self.commits
            .get(id)
            .ok_or_else(|| RadarError::UnknownCommit(id.to_string()))
    }

    fn base_tree(&self, commit: &StoredCommit) -> Result<Tree> {
        match commit.raw.parents.first() {
            Some(parent) => Ok(self.get(parent)?.tree.clone()),
            None => Ok(Tree::new()),
        }
    }
}

impl RepositoryBackend for MemoryBackend {
    fn list_branches(&self) -> Result<Vec<Branch>> {
        self.check(MemoryOp::ListBranches)?;
        let head_ref = match &self.head {
            Head::Branch(full_ref) => Some(full_ref.as_str()),
            _ => None,
        };
        Ok(self
            .refs
            .iter()
            .filter_map(|(full_ref, tip)| {
                let (name, is_remote) = match full_ref.strip_prefix("refs/heads/") {
                    Some(name) => (name, false),
                    None => (full_ref.strip_prefix("refs/remotes/")?, true),
                };
                Some(Branch {
                    name: name.to_string(),
                    full_ref: full_ref.clone(),
                    tip: tip.clone(),
                    is_remote,
                    is_head: head_ref == Some(full_ref.as_str()),
                })
            })
            .collect())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        Ok(match &self.head {
            Head::Branch(full_ref) => full_ref.strip_prefix("refs/heads/").map(str::to_string),
            _ => None,
        })
    }

    fn head_commit(&self) -> Result<Option<String>> {
        Ok(match &self.head {
            Head::Branch(full_ref) => self.refs.get(full_ref).cloned(),
            Head::Detached(id) => Some(id.clone()),
            Head::Unborn => None,
        })
    }

    fn resolve_ref(&self, full_ref: &str) -> Result<Option<String>> {
        Ok(self.refs.get(full_ref).cloned())
    }

    fn log(&self, start: &str, limit: Option<usize>) -> Result<Vec<RawCommit>> {
        self.check(MemoryOp::Log)?;
        let limit = limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = BinaryHeap::new();
        let first = self.get(start)?;
        queue.push((first.raw.committed_unix, first.raw.id.clone()));
        seen.insert(first.raw.id.clone());
        while let Some((_, id)) = queue.pop() {
            if out.len() >= limit {
                break;
            }
            let commit = self.get(&id)?;
            for parent in &commit.raw.parents {
                if seen.insert(parent.clone()) {
                    let parent_commit = self.get(parent)?;
                    queue.push((parent_commit.raw.committed_unix, parent.clone()));
                }
            }
            out.push(commit.raw.clone());
        }
        Ok(out)
    }

    fn commit_details(&self, full_id: &str) -> Result<CommitDetails> {
        self.check(MemoryOp::CommitDetails)?;
        let commit = self.get(full_id)?;
        let files = diff_trees(&self.base_tree(commit)?, &commit.tree);
        let parents = if commit.raw.parents.len() > 1 {
            commit
                .raw
                .parents
                .iter()
                .map(|id| {
                    let parent = self.get(id)?;
                    Ok(ParentSummary {
                        short_id: parent.raw.short_id.clone(),
                        full_id: parent.raw.id.clone(),
                        message: parent.raw.subject.clone(),
                        branch: None,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        Ok(CommitDetails { parents, files })
    }

    fn file_diff(&self, full_id: &str, path: &str) -> Result<FileDiff> {
        self.check(MemoryOp::FileDiff)?;
        let commit = self.get(full_id)?;
        let base = self.base_tree(commit)?;
        let old = base.get(path).map(String::as_str);
        let new = commit.tree.get(path).map(String::as_str);
        let hunks = if old == new {
            Vec::new()
        } else {
            line_hunks(old.unwrap_or_default(), new.unwrap_or_default())
        };
        Ok(FileDiff {
            root: commit.raw.parents.is_empty(),
            hunks,
        })
    }

    fn tree_diff_stats(&self, from: &str, to: &str) -> Result<Vec<FileChange>> {
        self.check(MemoryOp::TreeDiff)?;
        Ok(diff_trees(&self.get(from)?.tree, &self.get(to)?.tree))
    }
}

fn diff_trees(old: &Tree, new: &Tree) -> Vec<FileChange> {
    let paths: std::collections::BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    paths
        .into_iter()
        .filter_map(|path| {
            let before = old.get(path);
            let after = new.get(path);
            let status = match (before, after) {
                (None, Some(_)) => FileStatus::Added,
                (Some(_), None) => FileStatus::Deleted,
                (Some(a), Some(b)) if a != b => FileStatus::Modified,
                _ => return None,
            };
            let hunks = line_hunks(
                before.map(String::as_str).unwrap_or_default(),
                after.map(String::as_str).unwrap_or_default(),
            );
            let count = |kind: HunkKind| -> u32 {
                hunks
                    .iter()
                    .filter(|h| h.kind == kind)
                    .map(|h| h.lines.len() as u32)
                    .sum()
            };
            Some(FileChange {
                status,
                path: path.clone(),
                additions: count(HunkKind::Add),
                deletions: count(HunkKind::Delete),
            })
        })
        .collect()
}

/// Longest-common-subsequence line diff; fixture files are small.
fn line_hunks(old: &str, new: &str) -> Vec<RawHunk> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();
    let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut hunks: Vec<RawHunk> = Vec::new();
    let mut push = |kind: HunkKind, line: &str| match hunks.last_mut() {
        Some(last) if last.kind == kind => last.lines.push(line.to_string()),
        _ => hunks.push(RawHunk {
            kind,
            lines: vec![line.to_string()],
        }),
    };
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            push(HunkKind::Equal, a[i]);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            push(HunkKind::Delete, a[i]);
            i += 1;
        } else {
            push(HunkKind::Add, b[j]);
            j += 1;
        }
    }
    for line in &a[i..] {
        push(HunkKind::Delete, line);
    }
    for line in &b[j..] {
        push(HunkKind::Add, line);
    }
    hunks
}

/// A small repository with diverged `main` and `feature/logging` branches,
/// used by `git-radar --demo`.
pub fn demo_repository(now_unix: i64) -> Result<MemoryBackend> {
    const HOUR: i64 = 3600;
    const DAY: i64 = 24 * HOUR;
    let t = |ago: i64| now_unix - ago;
    let service_v1 = "package service\n\nfunc Run() error {\n\treturn nil\n}\n";
    let service_v2 = "package service\n\nimport \"log\"\n\nfunc Run() error {\n\tlog.Println(\"run\")\n\treturn nil\n}\n";
    let service_v3 = "package service\n\nfunc Run() error {\n\tif err := auth(); err != nil {\n\t\treturn err\n\t}\n\treturn nil\n}\n";

    let mut repo = MemoryBackend::new();
    repo.add_commit(
        MemoryCommit::new("a1b2c3d4e5f60718293a4b5c6d7e8f9012345678", &[], t(6 * DAY))
            .message("initial project setup")
            .write("README.md", "# demo\n")
            .write("service.go", service_v1)
            .write("main.go", "package main\n\nfunc main() {}\n"),
    )?;
    repo.add_commit(
        MemoryCommit::new(
            "b2c3d4e5f60718293a4b5c6d7e8f901234567890",
            &["a1b2c3d4e5f60718293a4b5c6d7e8f9012345678"],
            t(5 * DAY),
        )
        .message("update dependencies")
        .write("go.mod", "module demo\n\ngo 1.22\n"),
    )?;
    repo.add_commit(
        MemoryCommit::new(
            "c3d4e5f60718293a4b5c6d7e8f9012345678901a",
            &["b2c3d4e5f60718293a4b5c6d7e8f901234567890"],
            t(2 * DAY),
        )
        .message("fix auth bug")
        .author("Tomiwa")
        .write("service.go", service_v3)
        .write("auth.go", "package service\n\nfunc auth() error { return nil }\n"),
    )?;
    repo.add_commit(
        MemoryCommit::new(
            "d4e5f60718293a4b5c6d7e8f9012345678901a2b",
            &["b2c3d4e5f60718293a4b5c6d7e8f901234567890"],
            t(5 * HOUR),
        )
        .message("refactor git service")
        .write("service.go", service_v2),
    )?;
    repo.add_commit(
        MemoryCommit::new(
            "e5f60718293a4b5c6d7e8f9012345678901a2b3c",
            &["d4e5f60718293a4b5c6d7e8f9012345678901a2b"],
            t(2 * HOUR),
        )
        .message("add logging to service")
        .write("logger.go", "package service\n\nvar verbose = true\n")
        .write(
            "main.go",
            "package main\n\nimport \"demo/service\"\n\nfunc main() {\n\t_ = service.Run()\n}\n",
        ),
    )?;
    repo.set_branch("main", "c3d4e5f60718293a4b5c6d7e8f9012345678901a");
    repo.set_branch("feature/logging", "e5f60718293a4b5c6d7e8f9012345678901a2b3c");
    repo.set_remote_branch("origin/main", "b2c3d4e5f60718293a4b5c6d7e8f901234567890");
    repo.checkout("feature/logging");
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::{MemoryBackend, MemoryCommit, MemoryOp, demo_repository, line_hunks};
    use crate::backend::RepositoryBackend;
    use crate::models::{FileStatus, HunkKind};

    #[test]
    fn log_is_reverse_chronological() {
        let mut repo = MemoryBackend::new();
        repo.add_commit(MemoryCommit::new("c1", &[], 100)).unwrap();
        repo.add_commit(MemoryCommit::new("c2", &["c1"], 200)).unwrap();
        repo.add_commit(MemoryCommit::new("c3", &["c1"], 300)).unwrap();
        repo.add_commit(MemoryCommit::new("m", &["c2", "c3"], 400))
            .unwrap();
        let ids: Vec<String> = repo
            .log("m", None)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["m", "c3", "c2", "c1"]);
        assert_eq!(repo.log("m", Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn rejects_unknown_parent() {
        let mut repo = MemoryBackend::new();
        assert!(repo.add_commit(MemoryCommit::new("c1", &["nope"], 1)).is_err());
    }

    #[test]
    fn details_track_tree_edits() {
        let mut repo = MemoryBackend::new();
        repo.add_commit(MemoryCommit::new("c1", &[], 1).write("a", "x\ny\n"))
            .unwrap();
        repo.add_commit(
            MemoryCommit::new("c2", &["c1"], 2)
                .write("a", "x\nz\n")
                .write("b", "new\n")
                .delete("a"),
        )
        .unwrap();
        let details = repo.commit_details("c2").unwrap();
        let statuses: Vec<(String, FileStatus)> = details
            .files
            .iter()
            .map(|f| (f.path.clone(), f.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("a".to_string(), FileStatus::Deleted),
                ("b".to_string(), FileStatus::Added)
            ]
        );
    }

    #[test]
    fn line_diff_marks_changes() {
        let hunks = line_hunks("a\nb\nc\n", "a\nB\nc\n");
        let kinds: Vec<HunkKind> = hunks.iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![
                HunkKind::Equal,
                HunkKind::Delete,
                HunkKind::Add,
                HunkKind::Equal
            ]
        );
    }

    #[test]
    fn injected_failures_surface_as_errors() {
        let mut repo = MemoryBackend::new();
        repo.fail(MemoryOp::ListBranches);
        assert!(repo.list_branches().is_err());
    }

    #[test]
    fn demo_repository_has_diverged_branches() {
        let repo = demo_repository(10 * 24 * 3600).expect("demo");
        let branches = repo.list_branches().unwrap();
        assert_eq!(branches.len(), 3);
        assert_eq!(
            repo.current_branch().unwrap().as_deref(),
            Some("feature/logging")
        );
    }
}
