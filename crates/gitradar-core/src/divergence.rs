//! Merge base, ahead/behind partitions and aggregate stats between two
//! branches.
//!
//! Everything is derived from plain parent-link walks of the two tips, so the
//! only backend primitive needed is a full `log` of each tip.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use log::{debug, warn};

use crate::backend::RepositoryBackend;
use crate::branch_index::BranchIndex;
use crate::error::Result;
use crate::graph::{StartPoint, annotate, resolve_start};
use crate::models::{CommitDetails, CommitRecord, DiffStats, DivergenceResult, RawCommit};

/// The commits reachable from one tip, keyed by id, plus walk order.
#[derive(Debug, Clone, Default)]
pub struct Ancestry {
    tip: Option<String>,
    order: Vec<String>,
    commits: HashMap<String, RawCommit>,
}

impl Ancestry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the ancestor closure of `tip` by following parent links through
    /// `walked`. Parents missing from `walked` (shallow history) end the walk.
    pub fn from_walk(tip: &str, walked: Vec<RawCommit>) -> Self {
        let order: Vec<String> = walked.iter().map(|c| c.id.clone()).collect();
        let mut table: HashMap<String, RawCommit> =
            walked.into_iter().map(|c| (c.id.clone(), c)).collect();

        let mut reachable = HashSet::new();
        let mut stack = vec![tip.to_string()];
        while let Some(id) = stack.pop() {
            if !table.contains_key(&id) || !reachable.insert(id.clone()) {
                continue;
            }
            stack.extend(table[&id].parents.iter().cloned());
        }
        table.retain(|id, _| reachable.contains(id));

        Self {
            tip: Some(tip.to_string()),
            order: order
                .into_iter()
                .filter(|id| reachable.contains(id))
                .collect(),
            commits: table,
        }
    }

    pub fn load(backend: &dyn RepositoryBackend, tip: &str) -> Result<Self> {
        let started = Instant::now();
        let walked = backend.log(tip, None)?;
        let ancestry = Self::from_walk(tip, walked);
        debug!(
            "ancestry of {tip}: {} commits in {:?}",
            ancestry.len(),
            started.elapsed()
        );
        Ok(ancestry)
    }

    pub fn tip(&self) -> Option<&str> {
        self.tip.as_deref()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.commits.contains_key(id)
    }

    /// Commits of `self` that `other` cannot reach, newest committer time
    /// first; walk order breaks ties.
    pub fn exclusive_of(&self, other: &Ancestry) -> Vec<&RawCommit> {
        let mut out: Vec<&RawCommit> = self
            .order
            .iter()
            .filter(|id| !other.contains(id))
            .filter_map(|id| self.commits.get(id))
            .collect();
        out.sort_by(|a, b| b.committed_unix.cmp(&a.committed_unix));
        out
    }
}

/// Best common ancestor of two tips, or `None` for unrelated histories.
///
/// Candidates are the lowest common ancestors (common commits with no common
/// child); the most recent committer time wins and the smallest id breaks a
/// tie.
pub fn merge_base<'a>(target: &'a Ancestry, source: &Ancestry) -> Option<&'a RawCommit> {
    let common: Vec<&RawCommit> = target
        .commits
        .values()
        .filter(|c| source.contains(&c.id))
        .collect();
    let shadowed: HashSet<&str> = common
        .iter()
        .flat_map(|c| c.parents.iter().map(String::as_str))
        .collect();
    common
        .into_iter()
        .filter(|c| !shadowed.contains(c.id.as_str()))
        .min_by(|a, b| {
            b.committed_unix
                .cmp(&a.committed_unix)
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Reachable from the target tip but not from the source tip.
pub fn incoming<'a>(target: &'a Ancestry, source: &Ancestry) -> Vec<&'a RawCommit> {
    target.exclusive_of(source)
}

/// Reachable from the source tip but not from the target tip.
pub fn outgoing<'a>(target: &Ancestry, source: &'a Ancestry) -> Vec<&'a RawCommit> {
    source.exclusive_of(target)
}

/// Paths that at least one incoming and at least one outgoing commit touch.
///
/// This is an overlap heuristic: a flagged path may merge cleanly and an
/// unflagged one may still conflict. No three-way merge is attempted.
pub fn conflict_files(incoming: &[CommitRecord], outgoing: &[CommitRecord]) -> BTreeSet<String> {
    let paths = |records: &[CommitRecord]| -> BTreeSet<String> {
        records
            .iter()
            .filter_map(|r| r.files.as_ref())
            .flatten()
            .map(|f| f.path.clone())
            .collect()
    };
    let theirs = paths(incoming);
    paths(outgoing)
        .into_iter()
        .filter(|path| theirs.contains(path))
        .collect()
}

/// Compares `source` against `target` (both branch names).
///
/// Each part degrades on its own: a failed query empties that part of the
/// result and adds a warning, the rest is still computed.
pub fn analyze(
    backend: &dyn RepositoryBackend,
    index: &BranchIndex,
    target: &str,
    source: &str,
    default_remote: &str,
) -> DivergenceResult {
    let started = Instant::now();
    let mut warnings = Vec::new();
    let mut side = |name: &str| -> Ancestry {
        let loaded = resolve_tip(backend, name, default_remote)
            .and_then(|tip| match tip {
                Tip::Commit(tip) => Ancestry::load(backend, &tip).map(Some),
                Tip::Unborn => Ok(Some(Ancestry::empty())),
                Tip::Missing => Ok(None),
            });
        match loaded {
            Ok(Some(ancestry)) => ancestry,
            Ok(None) => {
                warn!("branch {name:?} not found");
                warnings.push(format!("branch {name} not found"));
                Ancestry::empty()
            }
            Err(err) => {
                warn!("history of {name:?} unavailable: {err}");
                warnings.push(format!("history of {name} unavailable: {err}"));
                Ancestry::empty()
            }
        }
    };
    let target_side = side(target);
    let source_side = side(source);

    let now = Utc::now().timestamp();
    let record = |raw: &RawCommit| annotate(raw.clone(), index, now);
    let merge_base = merge_base(&target_side, &source_side).map(record);
    let mut incoming: Vec<CommitRecord> = incoming(&target_side, &source_side)
        .into_iter()
        .map(record)
        .collect();
    let mut outgoing: Vec<CommitRecord> = outgoing(&target_side, &source_side)
        .into_iter()
        .map(record)
        .collect();

    let stats = match (target_side.tip(), source_side.tip()) {
        (Some(t), Some(s)) => match backend.tree_diff_stats(t, s) {
            Ok(changes) => DiffStats::from_changes(&changes),
            Err(err) => {
                warn!("tree diff {target}..{source} failed: {err}");
                warnings.push(format!("diff stats unavailable: {err}"));
                DiffStats::default()
            }
        },
        _ => DiffStats::default(),
    };

    let mut failed_details = 0usize;
    for commit in incoming.iter_mut().chain(outgoing.iter_mut()) {
        match backend.commit_details(&commit.full_id) {
            Ok(details) => commit.apply_details(&label_parents(details, index)),
            Err(err) => {
                debug!("details for {} failed: {err}", commit.short_id);
                failed_details += 1;
            }
        }
    }
    if failed_details > 0 {
        warnings.push(format!(
            "file changes unavailable for {failed_details} commit(s); conflict hints are partial"
        ));
    }
    let conflict_files = conflict_files(&incoming, &outgoing);

    debug!(
        "divergence {target}..{source}: {} incoming, {} outgoing in {:?}",
        incoming.len(),
        outgoing.len(),
        started.elapsed()
    );
    DivergenceResult {
        target: target.to_string(),
        source: source.to_string(),
        merge_base,
        incoming,
        outgoing,
        stats,
        conflict_files,
        warnings,
    }
}

enum Tip {
    Commit(String),
    Unborn,
    Missing,
}

/// Unlike the graph, a comparison never substitutes HEAD for a named branch
/// that no longer resolves.
fn resolve_tip(backend: &dyn RepositoryBackend, name: &str, default_remote: &str) -> Result<Tip> {
    Ok(match resolve_start(backend, name, default_remote)? {
        StartPoint::Head(_) if !name.is_empty() => Tip::Missing,
        StartPoint::Empty if !name.is_empty() => Tip::Missing,
        StartPoint::Empty => Tip::Unborn,
        StartPoint::LocalBranch(id) | StartPoint::RemoteBranch(id) | StartPoint::Head(id) => {
            Tip::Commit(id)
        }
    })
}

/// Fills the branch label of each parent summary from the index.
pub fn label_parents(mut details: CommitDetails, index: &BranchIndex) -> CommitDetails {
    for parent in &mut details.parents {
        if parent.branch.is_none() {
            parent.branch = index.primary_label(&parent.full_id).map(str::to_string);
        }
    }
    details
}
