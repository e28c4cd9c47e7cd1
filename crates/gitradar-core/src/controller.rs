//! The dashboard state machine: `update(state, msg) -> (state, effects)`.
//!
//! Nothing here blocks or touches the repository. Queries and timers are
//! requested as [`Effect`]s and come back later as [`Msg`]s, possibly out of
//! order; every completion is checked against the live state before it is
//! applied.

use std::mem;

use log::debug;

use crate::branch_index::BranchIndex;
use crate::divergence::label_parents;
use crate::models::{CommitDetails, CommitGraph, CommitRecord, DiffLine, DivergenceResult};
use crate::msg::{BranchListing, Effect, Key, Msg};
use crate::state::{
    Alert, AppState, Comparison, DetailView, DiffView, Loadable, Overlay, Pane, Screen,
};

pub const PAGE_SIZE: usize = 10;
pub const COPIED_ALERT: &str = "Hash copied!";

/// Effects to run once at startup.
pub fn init(state: AppState) -> (AppState, Vec<Effect>) {
    (state, vec![Effect::LoadBranches])
}

pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Key(key) => on_key(&mut state, key),
        Msg::BranchesLoaded { result } => on_branches_loaded(&mut state, result),
        Msg::GraphLoaded { reference, result } => on_graph_loaded(&mut state, reference, result),
        Msg::DivergenceLoaded {
            target,
            source,
            result,
        } => on_divergence_loaded(&mut state, target, source, result),
        Msg::DetailTimerFired { full_id } => on_detail_timer(&mut state, full_id),
        Msg::DetailsLoaded { full_id, result } => on_details_loaded(&mut state, full_id, result),
        Msg::DiffLoaded {
            full_id,
            path,
            result,
        } => on_diff_loaded(&mut state, full_id, path, result),
        Msg::AlertExpired { generation } => {
            if state.alert.as_ref().is_some_and(|a| a.generation == generation) {
                state.alert = None;
            }
            Vec::new()
        }
        Msg::ShowAlert(message) => vec![raise_alert(&mut state, message)],
    };
    (state, effects)
}

fn raise_alert(state: &mut AppState, message: impl Into<String>) -> Effect {
    state.alert_generation += 1;
    let generation = state.alert_generation;
    state.alert = Some(Alert {
        message: message.into(),
        generation,
    });
    Effect::ScheduleAlertClear { generation }
}

fn on_branches_loaded(state: &mut AppState, result: Result<BranchListing, String>) -> Vec<Effect> {
    let first_load = !state.branches_loaded;
    match result {
        Ok(listing) => {
            state.branches = listing.branches;
            state.branches_loaded = true;
            if let Overlay::BranchSwitch { selected } = &mut state.overlay {
                *selected = (*selected).min(state.branches.len().saturating_sub(1));
            }
            if !first_load {
                return Vec::new();
            }
            if state.current_branch.is_empty() {
                state.current_branch = listing.current.unwrap_or_default();
            }
            request_graph(state)
        }
        Err(message) => {
            let mut effects = vec![raise_alert(
                state,
                format!("Failed to load branches: {message}"),
            )];
            if first_load {
                // HEAD still gives a graph without a branch list
                effects.extend(request_graph(state));
            }
            effects
        }
    }
}

fn request_graph(state: &mut AppState) -> Vec<Effect> {
    state.graph = Loadable::Loading;
    state.graph_selected = 0;
    vec![Effect::LoadGraph {
        reference: state.current_branch.clone(),
    }]
}

fn on_graph_loaded(
    state: &mut AppState,
    reference: String,
    result: Result<CommitGraph, String>,
) -> Vec<Effect> {
    if reference != state.current_branch {
        debug!("dropping graph for {reference:?}, showing {:?}", state.current_branch);
        return Vec::new();
    }
    match result {
        Ok(graph) => {
            state.graph = Loadable::Ready(graph);
            state.graph_selected = 0;
            schedule_selected_details(state)
        }
        Err(message) => {
            state.graph = Loadable::Error(message);
            Vec::new()
        }
    }
}

fn request_divergence(state: &mut AppState, target: String, source: String) -> Vec<Effect> {
    state.comparison = Some(Comparison {
        target: target.clone(),
        source: source.clone(),
    });
    state.divergence = Loadable::Loading;
    state.incoming_selected = 0;
    state.outgoing_selected = 0;
    vec![Effect::LoadDivergence { target, source }]
}

fn on_divergence_loaded(
    state: &mut AppState,
    target: String,
    source: String,
    result: Result<DivergenceResult, String>,
) -> Vec<Effect> {
    let current = state
        .comparison
        .as_ref()
        .is_some_and(|c| c.target == target && c.source == source);
    if !current {
        debug!("dropping divergence {target}..{source}");
        return Vec::new();
    }
    state.divergence = match result {
        Ok(result) => Loadable::Ready(result),
        Err(message) => Loadable::Error(message),
    };
    state.incoming_selected = 0;
    state.outgoing_selected = 0;
    Vec::new()
}

/// A delayed fetch for the highlighted commit, if it still lacks details.
fn schedule_selected_details(state: &AppState) -> Vec<Effect> {
    match state.selected_commit() {
        Some(commit) if !commit.has_details() => vec![Effect::ScheduleDetails {
            full_id: commit.full_id.clone(),
        }],
        _ => Vec::new(),
    }
}

fn request_details(state: &mut AppState, full_id: String) -> Vec<Effect> {
    if !state.details_in_flight.insert(full_id.clone()) {
        return Vec::new();
    }
    vec![Effect::LoadDetails { full_id }]
}

fn on_detail_timer(state: &mut AppState, full_id: String) -> Vec<Effect> {
    let still_selected = state
        .selected_commit()
        .is_some_and(|c| c.full_id == full_id && !c.has_details());
    if !still_selected {
        return Vec::new();
    }
    request_details(state, full_id)
}

fn on_details_loaded(
    state: &mut AppState,
    full_id: String,
    result: Result<CommitDetails, String>,
) -> Vec<Effect> {
    state.details_in_flight.remove(&full_id);
    let open = state
        .detail
        .as_mut()
        .filter(|detail| detail.commit.full_id == full_id);
    match result {
        Ok(details) => {
            let details = label_parents(details, &BranchIndex::new(state.branches.clone()));
            if let Some(detail) = open {
                detail.commit.apply_details(&details);
                detail.error = None;
            }
            if let Some(graph) = state.graph.ready_mut() {
                graph.enrich(&full_id, &details);
            }
            if let Some(result) = state.divergence.ready_mut() {
                result.enrich(&full_id, &details);
            }
        }
        Err(message) => match open {
            Some(detail) => detail.error = Some(message),
            None => debug!("details for {full_id} failed: {message}"),
        },
    }
    Vec::new()
}

fn on_diff_loaded(
    state: &mut AppState,
    full_id: String,
    path: String,
    result: Result<Vec<DiffLine>, String>,
) -> Vec<Effect> {
    let Some(diff) = state
        .diff
        .as_mut()
        .filter(|d| d.commit_id == full_id && d.path == path)
    else {
        debug!("dropping diff for {full_id}:{path}");
        return Vec::new();
    };
    diff.lines = match result {
        Ok(lines) => Loadable::Ready(lines),
        Err(message) => Loadable::Error(message),
    };
    diff.scroll = 0;
    Vec::new()
}

fn on_key(state: &mut AppState, key: Key) -> Vec<Effect> {
    if key == Key::CtrlC {
        return vec![Effect::Quit];
    }
    match state.overlay {
        Overlay::None => {}
        Overlay::BranchSwitch { .. } => return branch_switch_key(state, key),
        Overlay::CompareSelect { .. } => return compare_select_key(state, key),
        Overlay::Legend => {
            if matches!(key, Key::Esc | Key::Char('?')) {
                state.overlay = Overlay::None;
            }
            return Vec::new();
        }
        Overlay::Search { .. } => return search_key(state, key),
        Overlay::Filter { .. } => {
            filter_key(state, key);
            return Vec::new();
        }
    }

    match key {
        Key::Char('q') => return vec![Effect::Quit],
        Key::Char('?') => {
            state.overlay = Overlay::Legend;
            return Vec::new();
        }
        Key::Char('r') => {
            let mut effects = vec![Effect::LoadBranches];
            effects.extend(request_graph(state));
            return effects;
        }
        _ => {}
    }

    match state.screen {
        Screen::Graph => graph_key(state, key),
        Screen::Divergence => divergence_key(state, key),
        Screen::CommitDetail => detail_key(state, key),
        Screen::Diff => diff_key(state, key),
    }
}

/// New cursor position for a navigation key, clamped to `len`.
fn move_cursor(current: usize, len: usize, key: Key) -> Option<usize> {
    let last = len.saturating_sub(1);
    let next = match key {
        Key::Up | Key::Char('k') => current.saturating_sub(1),
        Key::Down | Key::Char('j') => current + 1,
        Key::PageUp => current.saturating_sub(PAGE_SIZE),
        Key::PageDown => current + PAGE_SIZE,
        Key::Home | Key::Char('g') => 0,
        Key::End | Key::Char('G') => last,
        _ => return None,
    };
    Some(next.min(last))
}

fn graph_key(state: &mut AppState, key: Key) -> Vec<Effect> {
    let len = state.visible_commits().len();
    if let Some(next) = move_cursor(state.graph_selected, len, key) {
        if next == state.graph_selected {
            return Vec::new();
        }
        state.graph_selected = next;
        return schedule_selected_details(state);
    }
    match key {
        Key::Enter => match state.selected_commit().cloned() {
            Some(commit) => open_detail(state, commit),
            None => Vec::new(),
        },
        Key::Char('c') => open_compare(state),
        Key::Char('b') => open_branch_switch(state),
        Key::Char('/') => {
            state.overlay = Overlay::Search {
                input: state.search.clone(),
            };
            Vec::new()
        }
        Key::Char('y') => match state.selected_commit().map(|c| c.full_id.clone()) {
            Some(full_id) => copy_hash(state, full_id),
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn divergence_key(state: &mut AppState, key: Key) -> Vec<Effect> {
    let pane = state.active_pane;
    let len = state.pane_commits(pane).len();
    if let Some(next) = move_cursor(state.pane_selected(pane), len, key) {
        match pane {
            Pane::Incoming => state.incoming_selected = next,
            Pane::Outgoing => state.outgoing_selected = next,
        }
        return Vec::new();
    }
    match key {
        Key::Tab | Key::BackTab | Key::Left | Key::Right | Key::Char('h') | Key::Char('l') => {
            state.active_pane = pane.toggle();
            Vec::new()
        }
        Key::Enter => match state.selected_divergence_commit().cloned() {
            Some(commit) => open_detail(state, commit),
            None => Vec::new(),
        },
        Key::Char('c') => open_compare(state),
        Key::Char('b') => open_branch_switch(state),
        Key::Char('y') => match state.selected_divergence_commit().map(|c| c.full_id.clone()) {
            Some(full_id) => copy_hash(state, full_id),
            None => Vec::new(),
        },
        Key::Esc => {
            state.screen = Screen::Graph;
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn open_detail(state: &mut AppState, commit: CommitRecord) -> Vec<Effect> {
    let missing = !commit.has_details();
    let full_id = commit.full_id.clone();
    state.previous_screen = state.screen;
    state.screen = Screen::CommitDetail;
    state.file_filter.clear();
    state.diff = None;
    state.detail = Some(DetailView {
        commit,
        error: None,
        selected: 0,
    });
    if missing {
        request_details(state, full_id)
    } else {
        Vec::new()
    }
}

fn detail_key(state: &mut AppState, key: Key) -> Vec<Effect> {
    let len = state.visible_files().len();
    let Some(detail) = state.detail.as_mut() else {
        state.screen = state.previous_screen;
        return Vec::new();
    };
    if let Some(next) = move_cursor(detail.selected, len, key) {
        detail.selected = next;
        return Vec::new();
    }
    match key {
        Key::Enter => {
            let full_id = detail.commit.full_id.clone();
            match state.selected_file().map(|f| f.path.clone()) {
                Some(path) => {
                    state.screen = Screen::Diff;
                    show_diff(state, full_id, path)
                }
                None => Vec::new(),
            }
        }
        Key::Esc => {
            state.screen = state.previous_screen;
            Vec::new()
        }
        Key::Char('/') => {
            state.overlay = Overlay::Filter {
                input: state.file_filter.clone(),
            };
            Vec::new()
        }
        Key::Char('y') => {
            let full_id = detail.commit.full_id.clone();
            copy_hash(state, full_id)
        }
        _ => Vec::new(),
    }
}

fn show_diff(state: &mut AppState, full_id: String, path: String) -> Vec<Effect> {
    state.diff = Some(DiffView {
        commit_id: full_id.clone(),
        path: path.clone(),
        lines: Loadable::Loading,
        scroll: 0,
    });
    vec![Effect::LoadDiff { full_id, path }]
}

fn diff_key(state: &mut AppState, key: Key) -> Vec<Effect> {
    match key {
        Key::Esc => {
            state.screen = Screen::CommitDetail;
            state.diff = None;
            Vec::new()
        }
        Key::Left | Key::Char('h') => cycle_file(state, false),
        Key::Right | Key::Char('l') => cycle_file(state, true),
        Key::Char('y') => match state.diff.as_ref().map(|d| d.commit_id.clone()) {
            Some(full_id) => copy_hash(state, full_id),
            None => Vec::new(),
        },
        _ => {
            if let Some(diff) = state.diff.as_mut() {
                let len = diff.lines.ready().map(Vec::len).unwrap_or_default();
                if let Some(next) = move_cursor(diff.scroll, len, key) {
                    diff.scroll = next;
                }
            }
            Vec::new()
        }
    }
}

/// Moves the diff view to the next or previous file of the open commit.
fn cycle_file(state: &mut AppState, forward: bool) -> Vec<Effect> {
    let count = state.visible_files().len();
    let Some(detail) = state.detail.as_mut() else {
        return Vec::new();
    };
    if count == 0 {
        return Vec::new();
    }
    detail.selected = if forward {
        (detail.selected + 1) % count
    } else {
        (detail.selected + count - 1) % count
    };
    let full_id = detail.commit.full_id.clone();
    match state.selected_file().map(|f| f.path.clone()) {
        Some(path) => show_diff(state, full_id, path),
        None => Vec::new(),
    }
}

fn copy_hash(state: &mut AppState, full_id: String) -> Vec<Effect> {
    let clear = raise_alert(state, COPIED_ALERT);
    vec![Effect::CopyToClipboard { text: full_id }, clear]
}

fn open_compare(state: &mut AppState) -> Vec<Effect> {
    if state.compare_candidates().is_empty() {
        return vec![raise_alert(state, "No other branch to compare against")];
    }
    state.overlay = Overlay::CompareSelect { selected: 0 };
    Vec::new()
}

fn open_branch_switch(state: &mut AppState) -> Vec<Effect> {
    if state.branches.is_empty() {
        return vec![raise_alert(state, "No branches loaded")];
    }
    let selected = state
        .branches
        .iter()
        .position(|b| b.name == state.current_branch)
        .unwrap_or_default();
    state.overlay = Overlay::BranchSwitch { selected };
    Vec::new()
}

fn branch_switch_key(state: &mut AppState, key: Key) -> Vec<Effect> {
    let Overlay::BranchSwitch { selected } = state.overlay else {
        return Vec::new();
    };
    if let Some(next) = move_cursor(selected, state.branches.len(), key) {
        state.overlay = Overlay::BranchSwitch { selected: next };
        return Vec::new();
    }
    match key {
        Key::Esc | Key::Char('b') => {
            state.overlay = Overlay::None;
            Vec::new()
        }
        Key::Enter => {
            state.overlay = Overlay::None;
            match state.branches.get(selected).map(|b| b.name.clone()) {
                Some(name) => switch_branch(state, name),
                None => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Shows `name` in the graph. In the divergence view the comparison is
/// re-run with `name` as the new source.
fn switch_branch(state: &mut AppState, name: String) -> Vec<Effect> {
    state.current_branch = name.clone();
    let mut effects = request_graph(state);
    if state.screen == Screen::Divergence
        && let Some(target) = state.comparison.as_ref().map(|c| c.target.clone())
    {
        effects.extend(request_divergence(state, target, name));
    }
    effects
}

fn compare_select_key(state: &mut AppState, key: Key) -> Vec<Effect> {
    let Overlay::CompareSelect { selected } = state.overlay else {
        return Vec::new();
    };
    let candidates: Vec<String> = state
        .compare_candidates()
        .into_iter()
        .map(|b| b.name.clone())
        .collect();
    if let Some(next) = move_cursor(selected, candidates.len(), key) {
        state.overlay = Overlay::CompareSelect { selected: next };
        return Vec::new();
    }
    match key {
        Key::Esc | Key::Char('c') => {
            state.overlay = Overlay::None;
            Vec::new()
        }
        Key::Enter => {
            state.overlay = Overlay::None;
            let Some(target) = candidates.get(selected).cloned() else {
                return Vec::new();
            };
            let source = state.current_branch.clone();
            state.screen = Screen::Divergence;
            state.active_pane = Pane::Outgoing;
            request_divergence(state, target, source)
        }
        _ => Vec::new(),
    }
}

fn search_key(state: &mut AppState, key: Key) -> Vec<Effect> {
    let Overlay::Search { input } = &mut state.overlay else {
        return Vec::new();
    };
    match key {
        Key::Char(c) => input.push(c),
        Key::Backspace => {
            input.pop();
        }
        Key::Enter => {
            state.search = mem::take(input);
            state.overlay = Overlay::None;
            return Vec::new();
        }
        Key::Esc => {
            state.overlay = Overlay::None;
            state.search.clear();
        }
        _ => return Vec::new(),
    }
    state.graph_selected = 0;
    schedule_selected_details(state)
}

fn filter_key(state: &mut AppState, key: Key) {
    let Overlay::Filter { input } = &mut state.overlay else {
        return;
    };
    match key {
        Key::Char(c) => input.push(c),
        Key::Backspace => {
            input.pop();
        }
        Key::Enter => {
            state.file_filter = mem::take(input);
            state.overlay = Overlay::None;
            return;
        }
        Key::Esc => {
            state.overlay = Overlay::None;
            state.file_filter.clear();
        }
        _ => return,
    }
    if let Some(detail) = state.detail.as_mut() {
        detail.selected = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{COPIED_ALERT, init, update};
    use crate::models::{
        Branch, CommitDetails, CommitGraph, CommitRecord, DiffLine, DiffStats, DivergenceResult,
        FileChange, FileStatus, ParentSummary,
    };
    use crate::msg::{BranchListing, Effect, Key, Msg};
    use crate::state::{AppState, Loadable, Overlay, Pane, Screen};

    fn branch(name: &str, tip: &str, is_head: bool) -> Branch {
        Branch {
            name: name.to_string(),
            full_ref: format!("refs/heads/{name}"),
            tip: tip.to_string(),
            is_remote: false,
            is_head,
        }
    }

    fn record(id: &str, message: &str) -> CommitRecord {
        CommitRecord {
            short_id: id.to_string(),
            full_id: id.to_string(),
            message: message.to_string(),
            author: "Ada".to_string(),
            date: "1 hour ago".to_string(),
            committed_unix: 0,
            parents: Vec::new(),
            is_merge: false,
            branches: Vec::new(),
            files: None,
            parent_summaries: None,
        }
    }

    fn details(paths: &[&str]) -> CommitDetails {
        CommitDetails {
            parents: Vec::new(),
            files: paths
                .iter()
                .map(|path| FileChange {
                    status: FileStatus::Modified,
                    path: path.to_string(),
                    additions: 1,
                    deletions: 0,
                })
                .collect(),
        }
    }

    fn send(state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
        update(state, msg)
    }

    fn key(state: AppState, key: Key) -> (AppState, Vec<Effect>) {
        update(state, Msg::Key(key))
    }

    /// Branches main (checked out) and feature, graph of main loaded with
    /// commits c3, c2, c1 and nothing else pending.
    fn loaded() -> AppState {
        let (state, effects) = init(AppState::new());
        assert_eq!(effects, vec![Effect::LoadBranches]);
        let (state, effects) = send(
            state,
            Msg::BranchesLoaded {
                result: Ok(BranchListing {
                    branches: vec![branch("feature", "f1", false), branch("main", "c3", true)],
                    current: Some("main".to_string()),
                }),
            },
        );
        assert_eq!(
            effects,
            vec![Effect::LoadGraph {
                reference: "main".to_string()
            }]
        );
        let (state, effects) = send(
            state,
            Msg::GraphLoaded {
                reference: "main".to_string(),
                result: Ok(CommitGraph {
                    reference: "main".to_string(),
                    start: Some("c3".to_string()),
                    commits: vec![
                        record("c3", "fix auth bug"),
                        record("c2", "update deps"),
                        record("c1", "initial"),
                    ],
                }),
            },
        );
        assert_eq!(
            effects,
            vec![Effect::ScheduleDetails {
                full_id: "c3".to_string()
            }]
        );
        state
    }

    fn graph_record<'a>(state: &'a AppState, id: &str) -> &'a CommitRecord {
        state
            .graph
            .ready()
            .and_then(|g| g.find(id))
            .expect("record in graph")
    }

    #[test]
    fn stale_graph_is_dropped() {
        let state = loaded();
        let (state, effects) = send(
            state,
            Msg::GraphLoaded {
                reference: "feature".to_string(),
                result: Ok(CommitGraph::default()),
            },
        );
        assert!(effects.is_empty());
        assert_eq!(state.graph.ready().map(CommitGraph::len), Some(3));
    }

    #[test]
    fn debounced_details_apply_only_for_the_live_selection() {
        let state = loaded();
        let (state, effects) = key(state, Key::Down);
        assert_eq!(
            effects,
            vec![Effect::ScheduleDetails {
                full_id: "c2".to_string()
            }]
        );
        let (state, effects) = key(state, Key::Char('j'));
        assert_eq!(
            effects,
            vec![Effect::ScheduleDetails {
                full_id: "c1".to_string()
            }]
        );

        // the timer for the commit we moved past is a no-op
        let (state, effects) = send(
            state,
            Msg::DetailTimerFired {
                full_id: "c2".to_string(),
            },
        );
        assert!(effects.is_empty());
        let (state, effects) = send(
            state,
            Msg::DetailTimerFired {
                full_id: "c1".to_string(),
            },
        );
        assert_eq!(
            effects,
            vec![Effect::LoadDetails {
                full_id: "c1".to_string()
            }]
        );

        let (state, _) = send(
            state,
            Msg::DetailsLoaded {
                full_id: "c1".to_string(),
                result: Ok(details(&["b.go"])),
            },
        );
        assert!(graph_record(&state, "c1").has_details());
        assert!(!graph_record(&state, "c2").has_details());

        // a late completion for another id touches only that id
        let (state, _) = send(
            state,
            Msg::DetailsLoaded {
                full_id: "c3".to_string(),
                result: Ok(details(&["a.go"])),
            },
        );
        let c1_files = graph_record(&state, "c1").files.clone().expect("files");
        assert_eq!(c1_files[0].path, "b.go");
        assert!(state.details_in_flight.is_empty());
    }

    #[test]
    fn timer_does_not_refetch_loaded_or_in_flight_details() {
        let state = loaded();
        let fire = || Msg::DetailTimerFired {
            full_id: "c3".to_string(),
        };
        let (state, effects) = send(state, fire());
        assert_eq!(effects.len(), 1);
        let (state, effects) = send(state, fire());
        assert!(effects.is_empty());
        let (state, _) = send(
            state,
            Msg::DetailsLoaded {
                full_id: "c3".to_string(),
                result: Ok(details(&["a.go"])),
            },
        );
        let (_, effects) = send(state, fire());
        assert!(effects.is_empty());
    }

    #[test]
    fn enter_opens_detail_and_esc_goes_back() {
        let state = loaded();
        let (state, effects) = key(state, Key::Enter);
        assert_eq!(state.screen, Screen::CommitDetail);
        assert_eq!(
            effects,
            vec![Effect::LoadDetails {
                full_id: "c3".to_string()
            }]
        );
        let (state, _) = send(
            state,
            Msg::DetailsLoaded {
                full_id: "c3".to_string(),
                result: Ok(CommitDetails {
                    parents: vec![ParentSummary {
                        short_id: "f1".to_string(),
                        full_id: "f1".to_string(),
                        message: "feature work".to_string(),
                        branch: None,
                    }],
                    files: vec![],
                }),
            },
        );
        let detail = state.detail.as_ref().expect("detail");
        let parents = detail.commit.parent_summaries.as_ref().expect("parents");
        assert_eq!(parents[0].branch.as_deref(), Some("feature"));
        assert!(graph_record(&state, "c3").has_details());

        let (state, _) = key(state, Key::Esc);
        assert_eq!(state.screen, Screen::Graph);
    }

    #[test]
    fn failed_details_show_in_the_open_detail_view() {
        let state = loaded();
        let (state, _) = key(state, Key::Enter);
        let (state, _) = send(
            state,
            Msg::DetailsLoaded {
                full_id: "c3".to_string(),
                result: Err("object not found".to_string()),
            },
        );
        let detail = state.detail.as_ref().expect("detail");
        assert_eq!(detail.error.as_deref(), Some("object not found"));
        assert!(detail.commit.files.is_none());
    }

    fn divergence(target: &str, source: &str) -> DivergenceResult {
        DivergenceResult {
            target: target.to_string(),
            source: source.to_string(),
            merge_base: Some(record("c2", "update deps")),
            incoming: vec![record("f1", "feature work")],
            outgoing: vec![record("c3", "fix auth bug")],
            stats: DiffStats::default(),
            conflict_files: Default::default(),
            warnings: Vec::new(),
        }
    }

    fn comparing() -> AppState {
        let state = loaded();
        let (state, effects) = key(state, Key::Char('c'));
        assert!(effects.is_empty());
        assert_eq!(state.overlay, Overlay::CompareSelect { selected: 0 });
        let (state, effects) = key(state, Key::Enter);
        assert_eq!(state.overlay, Overlay::None);
        assert_eq!(state.screen, Screen::Divergence);
        assert_eq!(state.active_pane, Pane::Outgoing);
        assert_eq!(
            effects,
            vec![Effect::LoadDivergence {
                target: "feature".to_string(),
                source: "main".to_string()
            }]
        );
        state
    }

    #[test]
    fn divergence_completions_must_match_the_comparison() {
        let state = comparing();
        let (state, _) = send(
            state,
            Msg::DivergenceLoaded {
                target: "main".to_string(),
                source: "feature".to_string(),
                result: Ok(divergence("main", "feature")),
            },
        );
        assert!(state.divergence.is_loading());

        let (state, _) = send(
            state,
            Msg::DivergenceLoaded {
                target: "feature".to_string(),
                source: "main".to_string(),
                result: Ok(divergence("feature", "main")),
            },
        );
        assert_eq!(
            state
                .selected_divergence_commit()
                .map(|c| c.full_id.as_str()),
            Some("c3")
        );
        let (state, _) = key(state, Key::Tab);
        assert_eq!(state.active_pane, Pane::Incoming);
        let (state, effects) = key(state, Key::Enter);
        assert_eq!(state.screen, Screen::CommitDetail);
        assert_eq!(
            effects,
            vec![Effect::LoadDetails {
                full_id: "f1".to_string()
            }]
        );
        let (state, _) = key(state, Key::Esc);
        assert_eq!(state.screen, Screen::Divergence);
        let (state, _) = key(state, Key::Esc);
        assert_eq!(state.screen, Screen::Graph);
    }

    #[test]
    fn switching_branch_in_divergence_reruns_the_comparison() {
        let state = comparing();
        let (state, effects) = key(state, Key::Char('b'));
        assert!(effects.is_empty());
        // main is selected; move up to feature
        assert_eq!(state.overlay, Overlay::BranchSwitch { selected: 1 });
        let (state, _) = key(state, Key::Up);
        let (state, effects) = key(state, Key::Enter);
        assert_eq!(state.current_branch, "feature");
        assert_eq!(
            effects,
            vec![
                Effect::LoadGraph {
                    reference: "feature".to_string()
                },
                Effect::LoadDivergence {
                    target: "feature".to_string(),
                    source: "feature".to_string()
                },
            ]
        );
    }

    #[test]
    fn one_overlay_at_a_time() {
        let state = loaded();
        let (state, _) = key(state, Key::Char('b'));
        let (state, effects) = key(state, Key::Char('c'));
        assert!(effects.is_empty());
        assert!(matches!(state.overlay, Overlay::BranchSwitch { .. }));
        let (state, _) = key(state, Key::Char('b'));
        assert_eq!(state.overlay, Overlay::None);

        let (state, _) = key(state, Key::Char('?'));
        assert_eq!(state.overlay, Overlay::Legend);
        let (state, effects) = key(state, Key::Char('q'));
        assert!(effects.is_empty());
        let (state, _) = key(state, Key::Esc);
        assert_eq!(state.overlay, Overlay::None);
    }

    #[test]
    fn newer_alert_wins_over_older_timer() {
        let state = loaded();
        let (state, effects) = key(state, Key::Char('y'));
        assert_eq!(
            effects,
            vec![
                Effect::CopyToClipboard {
                    text: "c3".to_string()
                },
                Effect::ScheduleAlertClear { generation: 1 },
            ]
        );
        assert_eq!(
            state.alert.as_ref().map(|a| a.message.as_str()),
            Some(COPIED_ALERT)
        );
        let (state, effects) = send(state, Msg::ShowAlert("clipboard unavailable".to_string()));
        assert_eq!(effects, vec![Effect::ScheduleAlertClear { generation: 2 }]);

        let (state, _) = send(state, Msg::AlertExpired { generation: 1 });
        assert_eq!(
            state.alert.as_ref().map(|a| a.message.as_str()),
            Some("clipboard unavailable")
        );
        let (state, _) = send(state, Msg::AlertExpired { generation: 2 });
        assert!(state.alert.is_none());
    }

    #[test]
    fn search_bar_filters_live_and_takes_text() {
        let state = loaded();
        let (mut state, _) = key(state, Key::Char('/'));
        for c in "DEPS".chars() {
            state = key(state, Key::Char(c)).0;
        }
        assert_eq!(state.visible_commits(), vec![1]);
        let (state, effects) = key(state, Key::Char('q'));
        assert!(!effects.contains(&Effect::Quit));
        let (state, _) = key(state, Key::Backspace);
        let (state, _) = key(state, Key::Enter);
        assert_eq!(state.search, "DEPS");
        assert_eq!(state.overlay, Overlay::None);
        assert_eq!(state.visible_commits(), vec![1]);

        let (state, _) = key(state, Key::Char('/'));
        let (state, _) = key(state, Key::Esc);
        assert!(state.search.is_empty());
        assert_eq!(state.visible_commits().len(), 3);
    }

    #[test]
    fn quit_keys() {
        let state = loaded();
        let (state, effects) = key(state, Key::Char('q'));
        assert_eq!(effects, vec![Effect::Quit]);
        let (state, _) = key(state, Key::Char('/'));
        let (_, effects) = key(state, Key::CtrlC);
        assert_eq!(effects, vec![Effect::Quit]);
    }

    fn in_detail_with_files() -> AppState {
        let state = loaded();
        let (state, _) = key(state, Key::Enter);
        let (state, _) = send(
            state,
            Msg::DetailsLoaded {
                full_id: "c3".to_string(),
                result: Ok(details(&["auth.go", "main.go", "service.go"])),
            },
        );
        state
    }

    #[test]
    fn diff_view_cycles_files_and_drops_stale_diffs() {
        let state = in_detail_with_files();
        let (state, _) = key(state, Key::Down);
        let (state, effects) = key(state, Key::Enter);
        assert_eq!(state.screen, Screen::Diff);
        assert_eq!(
            effects,
            vec![Effect::LoadDiff {
                full_id: "c3".to_string(),
                path: "main.go".to_string()
            }]
        );

        let (state, effects) = key(state, Key::Right);
        assert_eq!(
            effects,
            vec![Effect::LoadDiff {
                full_id: "c3".to_string(),
                path: "service.go".to_string()
            }]
        );
        let (state, _) = send(
            state,
            Msg::DiffLoaded {
                full_id: "c3".to_string(),
                path: "main.go".to_string(),
                result: Ok(vec![DiffLine::Add("stale".to_string())]),
            },
        );
        assert!(state.diff.as_ref().expect("diff").lines.is_loading());

        let (state, _) = send(
            state,
            Msg::DiffLoaded {
                full_id: "c3".to_string(),
                path: "service.go".to_string(),
                result: Err("bad object".to_string()),
            },
        );
        assert_eq!(
            state.diff.as_ref().expect("diff").lines,
            Loadable::Error("bad object".to_string())
        );

        // wraps around to the first file
        let (state, effects) = key(state, Key::Char('l'));
        assert_eq!(
            effects,
            vec![Effect::LoadDiff {
                full_id: "c3".to_string(),
                path: "auth.go".to_string()
            }]
        );
        let (state, _) = key(state, Key::Esc);
        assert_eq!(state.screen, Screen::CommitDetail);
        let (state, _) = key(state, Key::Esc);
        assert_eq!(state.screen, Screen::Graph);
    }

    #[test]
    fn file_filter_narrows_the_detail_list() {
        let state = in_detail_with_files();
        let (mut state, _) = key(state, Key::Char('/'));
        for c in "SERV".chars() {
            state = key(state, Key::Char(c)).0;
        }
        let (state, _) = key(state, Key::Enter);
        assert_eq!(state.file_filter, "SERV");
        assert_eq!(
            state.selected_file().map(|f| f.path.as_str()),
            Some("service.go")
        );
    }

    #[test]
    fn failed_branch_reload_keeps_previous_list() {
        let state = loaded();
        let (state, effects) = key(state, Key::Char('r'));
        assert_eq!(
            effects,
            vec![
                Effect::LoadBranches,
                Effect::LoadGraph {
                    reference: "main".to_string()
                }
            ]
        );
        let (state, effects) = send(
            state,
            Msg::BranchesLoaded {
                result: Err("git not found".to_string()),
            },
        );
        assert_eq!(effects, vec![Effect::ScheduleAlertClear { generation: 1 }]);
        assert_eq!(state.branches.len(), 2);
        assert!(
            state
                .alert
                .as_ref()
                .is_some_and(|a| a.message.contains("git not found"))
        );
    }

    #[test]
    fn detached_head_graphs_head() {
        let (state, _) = init(AppState::new());
        let (state, effects) = send(
            state,
            Msg::BranchesLoaded {
                result: Ok(BranchListing {
                    branches: vec![branch("main", "c3", false)],
                    current: None,
                }),
            },
        );
        assert_eq!(
            effects,
            vec![Effect::LoadGraph {
                reference: String::new()
            }]
        );
        let (state, _) = send(
            state,
            Msg::GraphLoaded {
                reference: String::new(),
                result: Err("repository backend unavailable".to_string()),
            },
        );
        assert!(state.graph.error().is_some());
    }

    #[test]
    fn compare_needs_another_branch() {
        let (state, _) = init(AppState::new());
        let (state, _) = send(
            state,
            Msg::BranchesLoaded {
                result: Ok(BranchListing {
                    branches: vec![branch("main", "c3", true)],
                    current: Some("main".to_string()),
                }),
            },
        );
        let (state, effects) = key(state, Key::Char('c'));
        assert_eq!(state.overlay, Overlay::None);
        assert!(matches!(
            effects.as_slice(),
            [Effect::ScheduleAlertClear { .. }]
        ));
    }
}
