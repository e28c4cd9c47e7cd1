use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub full_ref: String,
    pub tip: String,
    pub is_remote: bool,
    pub is_head: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
}

impl FileStatus {
    pub fn as_char(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub status: FileStatus,
    pub path: String,
    pub additions: u32,
    pub deletions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentSummary {
    pub short_id: String,
    pub full_id: String,
    pub message: String,
    pub branch: Option<String>,
}

/// A log record as the backend walks it, before branch annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommit {
    pub id: String,
    pub short_id: String,
    pub parents: Vec<String>,
    pub author_name: String,
    pub author_email: String,
    pub authored_unix: i64,
    pub committed_unix: i64,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub short_id: String,
    pub full_id: String,
    pub message: String,
    pub author: String,
    pub date: String,
    pub committed_unix: i64,
    pub parents: Vec<String>,
    pub is_merge: bool,
    pub branches: Vec<String>,
    /// `None` until details were loaded for this commit.
    pub files: Option<Vec<FileChange>>,
    pub parent_summaries: Option<Vec<ParentSummary>>,
}

impl CommitRecord {
    pub fn has_details(&self) -> bool {
        self.files.is_some()
    }

    /// Fills in lazily loaded details. Only called with details for this
    /// record's own id.
    pub fn apply_details(&mut self, details: &CommitDetails) {
        self.files = Some(details.files.clone());
        self.parent_summaries = Some(details.parents.clone());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetails {
    /// Summaries of every parent, filled for merge commits only.
    pub parents: Vec<ParentSummary>,
    pub files: Vec<FileChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitGraph {
    pub reference: String,
    pub start: Option<String>,
    pub commits: Vec<CommitRecord>,
}

impl CommitGraph {
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn find(&self, full_id: &str) -> Option<&CommitRecord> {
        self.commits.iter().find(|c| c.full_id == full_id)
    }

    /// Merges lazily loaded details into the record with `full_id`. Returns
    /// false when no record has that id.
    pub fn enrich(&mut self, full_id: &str, details: &CommitDetails) -> bool {
        match self.commits.iter_mut().find(|c| c.full_id == full_id) {
            Some(record) => {
                record.apply_details(details);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HunkKind {
    Equal,
    Add,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHunk {
    pub kind: HunkKind,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    /// The commit has no parent, so everything it contains is new.
    pub root: bool,
    pub hunks: Vec<RawHunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffLine {
    Equal(String),
    Add(String),
    Delete(String),
    Collapsed { hidden: usize },
}

impl DiffLine {
    pub fn is_equal(&self) -> bool {
        matches!(self, Self::Equal(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Equal(text) | Self::Add(text) | Self::Delete(text) => text,
            Self::Collapsed { .. } => "",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub files: usize,
    pub additions: u64,
    pub deletions: u64,
}

impl DiffStats {
    pub fn from_changes(changes: &[FileChange]) -> Self {
        changes.iter().fold(Self::default(), |mut acc, change| {
            acc.files += 1;
            acc.additions += u64::from(change.additions);
            acc.deletions += u64::from(change.deletions);
            acc
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivergenceResult {
    pub target: String,
    pub source: String,
    pub merge_base: Option<CommitRecord>,
    /// Reachable from the target tip but not from the source tip.
    pub incoming: Vec<CommitRecord>,
    /// Reachable from the source tip but not from the target tip.
    pub outgoing: Vec<CommitRecord>,
    pub stats: DiffStats,
    /// Paths touched on both sides. A hint, not a merge simulation.
    pub conflict_files: BTreeSet<String>,
    pub warnings: Vec<String>,
}

impl DivergenceResult {
    pub fn ahead(&self) -> usize {
        self.outgoing.len()
    }

    pub fn behind(&self) -> usize {
        self.incoming.len()
    }

    pub fn enrich(&mut self, full_id: &str, details: &CommitDetails) -> bool {
        let mut found = false;
        for record in self
            .incoming
            .iter_mut()
            .chain(self.outgoing.iter_mut())
            .filter(|c| c.full_id == full_id)
        {
            record.apply_details(details);
            found = true;
        }
        found
    }
}
