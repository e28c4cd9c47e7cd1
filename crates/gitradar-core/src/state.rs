//! The dashboard state the controller owns and the renderer reads.

use std::collections::HashSet;

use crate::branch_index::comparable_branches;
use crate::models::{Branch, CommitGraph, CommitRecord, DiffLine, DivergenceResult, FileChange};
use crate::search::{SearchQuery, filter_commits, filter_files};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Graph,
    Divergence,
    CommitDetail,
    Diff,
}

/// At most one overlay is open at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Overlay {
    #[default]
    None,
    /// Index into [`AppState::branches`].
    BranchSwitch { selected: usize },
    /// Index into [`AppState::compare_candidates`].
    CompareSelect { selected: usize },
    Legend,
    /// Graph filter being typed.
    Search { input: String },
    /// File filter being typed.
    Filter { input: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pane {
    Incoming,
    #[default]
    Outgoing,
}

impl Pane {
    pub fn toggle(self) -> Self {
        match self {
            Self::Incoming => Self::Outgoing,
            Self::Outgoing => Self::Incoming,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
    pub generation: u64,
}

/// Something fetched in the background: not requested, in flight, there, or
/// failed with a message for the screen that wanted it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Loadable<T> {
    #[default]
    NotLoaded,
    Loading,
    Ready(T),
    Error(String),
}

impl<T> Loadable<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub target: String,
    pub source: String,
}

/// The commit open in the detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub commit: CommitRecord,
    /// Set when loading this commit's file changes failed.
    pub error: Option<String>,
    /// Index into the filtered file list.
    pub selected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffView {
    pub commit_id: String,
    pub path: String,
    pub lines: Loadable<Vec<DiffLine>>,
    pub scroll: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub screen: Screen,
    /// Where `esc` from the detail view goes. One level only.
    pub previous_screen: Screen,
    pub overlay: Overlay,
    pub alert: Option<Alert>,
    pub alert_generation: u64,

    pub branches: Vec<Branch>,
    pub branches_loaded: bool,
    /// Branch whose history the graph shows; empty means HEAD.
    pub current_branch: String,

    pub graph: Loadable<CommitGraph>,
    /// Index into [`AppState::visible_commits`].
    pub graph_selected: usize,
    /// Committed graph filter.
    pub search: String,
    /// Commit ids with a detail query running.
    pub details_in_flight: HashSet<String>,

    pub comparison: Option<Comparison>,
    pub divergence: Loadable<DivergenceResult>,
    pub active_pane: Pane,
    pub incoming_selected: usize,
    pub outgoing_selected: usize,

    pub detail: Option<DetailView>,
    /// Committed file filter of the detail view.
    pub file_filter: String,
    pub diff: Option<DiffView>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph filter in effect, including one still being typed.
    pub fn active_search(&self) -> &str {
        match &self.overlay {
            Overlay::Search { input } => input,
            _ => &self.search,
        }
    }

    pub fn active_file_filter(&self) -> &str {
        match &self.overlay {
            Overlay::Filter { input } => input,
            _ => &self.file_filter,
        }
    }

    /// Indices into the graph's commits that pass the graph filter.
    pub fn visible_commits(&self) -> Vec<usize> {
        let Some(graph) = self.graph.ready() else {
            return Vec::new();
        };
        filter_commits(&graph.commits, &SearchQuery::substring(self.active_search()))
            .unwrap_or_default()
    }

    pub fn selected_commit(&self) -> Option<&CommitRecord> {
        let graph = self.graph.ready()?;
        let idx = *self.visible_commits().get(self.graph_selected)?;
        graph.commits.get(idx)
    }

    /// Branches the compare modal offers: all but the current one.
    pub fn compare_candidates(&self) -> Vec<&Branch> {
        comparable_branches(&self.branches, &self.current_branch)
    }

    pub fn pane_commits(&self, pane: Pane) -> &[CommitRecord] {
        match (self.divergence.ready(), pane) {
            (Some(result), Pane::Incoming) => &result.incoming,
            (Some(result), Pane::Outgoing) => &result.outgoing,
            (None, _) => &[],
        }
    }

    pub fn pane_selected(&self, pane: Pane) -> usize {
        match pane {
            Pane::Incoming => self.incoming_selected,
            Pane::Outgoing => self.outgoing_selected,
        }
    }

    pub fn selected_divergence_commit(&self) -> Option<&CommitRecord> {
        self.pane_commits(self.active_pane)
            .get(self.pane_selected(self.active_pane))
    }

    /// Indices into the open commit's files that pass the file filter.
    pub fn visible_files(&self) -> Vec<usize> {
        match self.detail.as_ref().and_then(|d| d.commit.files.as_ref()) {
            Some(files) => filter_files(files, self.active_file_filter()),
            None => Vec::new(),
        }
    }

    pub fn selected_file(&self) -> Option<&FileChange> {
        let detail = self.detail.as_ref()?;
        let idx = *self.visible_files().get(detail.selected)?;
        detail.commit.files.as_ref()?.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppState, Loadable, Overlay, Pane};
    use crate::models::{CommitGraph, CommitRecord};

    fn record(id: &str, message: &str) -> CommitRecord {
        CommitRecord {
            short_id: id.to_string(),
            full_id: id.to_string(),
            message: message.to_string(),
            author: "Ada".to_string(),
            date: String::new(),
            committed_unix: 0,
            parents: Vec::new(),
            is_merge: false,
            branches: Vec::new(),
            files: None,
            parent_summaries: None,
        }
    }

    #[test]
    fn live_search_input_narrows_the_visible_list() {
        let mut state = AppState::new();
        state.graph = Loadable::Ready(CommitGraph {
            reference: "main".to_string(),
            start: Some("c3".to_string()),
            commits: vec![record("c3", "fix auth"), record("c2", "docs"), record("c1", "auth")],
        });
        assert_eq!(state.visible_commits(), vec![0, 1, 2]);

        state.overlay = Overlay::Search {
            input: "AUTH".to_string(),
        };
        assert_eq!(state.visible_commits(), vec![0, 2]);
        state.graph_selected = 1;
        assert_eq!(state.selected_commit().map(|c| c.full_id.as_str()), Some("c1"));
    }

    #[test]
    fn empty_divergence_has_no_pane_commits() {
        let state = AppState::new();
        assert!(state.pane_commits(Pane::Incoming).is_empty());
        assert!(state.selected_divergence_commit().is_none());
        assert_eq!(Pane::Incoming.toggle(), Pane::Outgoing);
    }
}
