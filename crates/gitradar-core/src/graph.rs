use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::backend::RepositoryBackend;
use crate::branch_index::BranchIndex;
use crate::error::{RadarError, Result};
use crate::models::{CommitGraph, CommitRecord, RawCommit};

/// Where a requested ref ended up pointing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPoint {
    LocalBranch(String),
    RemoteBranch(String),
    /// The requested ref was unknown (or empty) and HEAD was used.
    Head(String),
    /// No commits at all.
    Empty,
}

impl StartPoint {
    pub fn commit_id(&self) -> Option<&str> {
        match self {
            Self::LocalBranch(id) | Self::RemoteBranch(id) | Self::Head(id) => Some(id),
            Self::Empty => None,
        }
    }
}

/// Local branch, then a remote branch named exactly `reference` (such as
/// `origin/main`), then `<default_remote>/<reference>`, then HEAD. Lookup
/// errors fall through to the next step unless the backend is gone
/// altogether.
pub fn resolve_start(
    backend: &dyn RepositoryBackend,
    reference: &str,
    default_remote: &str,
) -> Result<StartPoint> {
    if !reference.is_empty() {
        let local = format!("refs/heads/{reference}");
        if let Some(id) = lookup(backend, &local)? {
            return Ok(StartPoint::LocalBranch(id));
        }
        let remotes = [
            format!("refs/remotes/{reference}"),
            format!("refs/remotes/{default_remote}/{reference}"),
        ];
        for remote in &remotes {
            if let Some(id) = lookup(backend, remote)? {
                return Ok(StartPoint::RemoteBranch(id));
            }
        }
        info!("ref {reference:?} not found, falling back to HEAD");
    }
    match backend.head_commit() {
        Ok(Some(id)) => Ok(StartPoint::Head(id)),
        Ok(None) => Ok(StartPoint::Empty),
        Err(err) if err.is_backend_unavailable() => Err(err),
        Err(err) => {
            warn!("HEAD fallback failed: {err}");
            Err(RadarError::RefResolution {
                reference: reference.to_string(),
            })
        }
    }
}

fn lookup(backend: &dyn RepositoryBackend, full_ref: &str) -> Result<Option<String>> {
    match backend.resolve_ref(full_ref) {
        Ok(found) => Ok(found),
        Err(err) if err.is_backend_unavailable() => Err(err),
        Err(err) => {
            warn!("resolving {full_ref} failed: {err}");
            Ok(None)
        }
    }
}

/// Resolves `reference` and returns up to `limit` annotated commits, newest
/// first. File changes are left unloaded.
pub fn build_graph(
    backend: &dyn RepositoryBackend,
    index: &BranchIndex,
    reference: &str,
    limit: usize,
    default_remote: &str,
) -> Result<CommitGraph> {
    let started = Instant::now();
    let start = resolve_start(backend, reference, default_remote)?;
    let Some(start_id) = start.commit_id() else {
        return Ok(CommitGraph {
            reference: reference.to_string(),
            start: None,
            commits: Vec::new(),
        });
    };
    let now = Utc::now().timestamp();
    let commits = backend
        .log(start_id, Some(limit))?
        .into_iter()
        .take(limit)
        .map(|raw| annotate(raw, index, now))
        .collect::<Vec<_>>();
    debug!(
        "graph for {reference:?}: {} commits in {:?}",
        commits.len(),
        started.elapsed()
    );
    Ok(CommitGraph {
        reference: reference.to_string(),
        start: Some(start_id.to_string()),
        commits,
    })
}

pub fn annotate(raw: RawCommit, index: &BranchIndex, now_unix: i64) -> CommitRecord {
    let is_merge = raw.parents.len() > 1;
    CommitRecord {
        branches: index.labels_for(&raw.id).to_vec(),
        date: format_relative_time(raw.authored_unix, now_unix),
        message: first_line(&raw.subject),
        short_id: raw.short_id,
        full_id: raw.id,
        author: raw.author_name,
        committed_unix: raw.committed_unix,
        parents: raw.parents,
        is_merge,
        files: None,
        parent_summaries: None,
    }
}

fn first_line(message: &str) -> String {
    message.trim().lines().next().unwrap_or_default().to_string()
}

pub fn format_relative_time(then_unix: i64, now_unix: i64) -> String {
    let (Some(then), Some(now)) = (
        DateTime::<Utc>::from_timestamp(then_unix, 0),
        DateTime::<Utc>::from_timestamp(now_unix, 0),
    ) else {
        return String::new();
    };
    let elapsed = now.signed_duration_since(then);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();
    if minutes < 1 {
        "just now".to_string()
    } else if hours < 1 {
        plural(minutes, "minute")
    } else if days < 1 {
        plural(hours, "hour")
    } else if days == 1 {
        "yesterday".to_string()
    } else if days < 7 {
        plural(days, "day")
    } else if days < 30 {
        plural(days / 7, "week")
    } else if days < 365 {
        plural(days / 30, "month")
    } else {
        plural(days / 365, "year")
    }
}
