//! Draws an [`AppState`] snapshot. Nothing here mutates state.

use std::cmp::min;

use gitradar_core::state::DetailView;
use gitradar_core::{
    AppState, CommitRecord, DiffLine, DivergenceResult, FileStatus, Loadable, Overlay, Pane,
    Screen,
};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

const COMMIT_GLYPH: &str = "●";
const MERGE_GLYPH: &str = "◆";
const CONFLICT_GLYPH: &str = "!";

pub fn draw(frame: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_header(frame, chunks[0], state);
    match state.screen {
        Screen::Graph => draw_graph(frame, chunks[1], state),
        Screen::Divergence => draw_divergence(frame, chunks[1], state),
        Screen::CommitDetail => draw_detail(frame, chunks[1], state),
        Screen::Diff => draw_diff(frame, chunks[1], state),
    }
    draw_footer(frame, chunks[2], state);

    match &state.overlay {
        Overlay::BranchSwitch { selected } => {
            let names: Vec<String> = state.branches.iter().map(branch_label).collect();
            draw_picker(frame, "Switch branch (enter select, esc close)", &names, *selected);
        }
        Overlay::CompareSelect { selected } => {
            let names: Vec<String> = state
                .compare_candidates()
                .into_iter()
                .map(branch_label)
                .collect();
            let title = format!("Compare {} against (enter select, esc close)", state.current_branch);
            draw_picker(frame, &title, &names, *selected);
        }
        Overlay::Legend => draw_legend(frame),
        Overlay::None | Overlay::Search { .. } | Overlay::Filter { .. } => {}
    }

    if let Some(alert) = &state.alert {
        draw_alert(frame, &alert.message);
    }
}

fn branch_label(branch: &gitradar_core::Branch) -> String {
    if branch.is_head {
        format!("* {}", branch.name)
    } else {
        format!("  {}", branch.name)
    }
}

fn draw_header(frame: &mut Frame, area: Rect, state: &AppState) {
    let branch = if state.current_branch.is_empty() {
        "HEAD"
    } else {
        state.current_branch.as_str()
    };
    let mut spans = vec![
        Span::styled(
            "git-radar",
            Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format!("branch: {branch}"), Style::default().fg(Color::Yellow)),
    ];
    if let Some(graph) = state.graph.ready() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("commits: {}", graph.len()),
            Style::default().fg(Color::Gray),
        ));
    }
    if let Some(comparison) = &state.comparison
        && state.screen == Screen::Divergence
    {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} vs {}", comparison.source, comparison.target),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &AppState) {
    let line = match &state.overlay {
        Overlay::Search { input } => input_line("search", input),
        Overlay::Filter { input } => input_line("filter", input),
        _ => {
            let hints = match state.screen {
                Screen::Graph => {
                    "j/k move | enter open | c compare | b branch | / search | y copy | r reload | ? legend | q quit"
                }
                Screen::Divergence => {
                    "tab pane | j/k move | enter open | c compare | b branch | y copy | esc back | q quit"
                }
                Screen::CommitDetail => "j/k move | enter diff | / filter | y copy | esc back | q quit",
                Screen::Diff => "j/k scroll | h/l prev/next file | y copy | esc back | q quit",
            };
            Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray)))
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn input_line(label: &str, input: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{label}: "),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(sanitize_terminal_text(input)),
        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ])
}

fn focused_border(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::LightCyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn highlight_style() -> Style {
    Style::default()
        .bg(Color::Rgb(16, 70, 140))
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

/// Status text in place of a list that has nothing to show yet.
fn placeholder<T>(loadable: &Loadable<T>, what: &str) -> Option<Line<'static>> {
    match loadable {
        Loadable::NotLoaded | Loadable::Loading => Some(Line::from(Span::styled(
            format!("loading {what}..."),
            Style::default().fg(Color::Gray),
        ))),
        Loadable::Error(message) => Some(Line::from(Span::styled(
            format!("failed to load {what}: {}", sanitize_terminal_text(message)),
            Style::default().fg(Color::LightRed),
        ))),
        Loadable::Ready(_) => None,
    }
}

fn commit_line(commit: &CommitRecord, flagged: bool) -> Line<'static> {
    let (glyph, glyph_color) = if commit.is_merge {
        (MERGE_GLYPH, Color::Magenta)
    } else {
        (COMMIT_GLYPH, Color::Cyan)
    };
    let mut spans = vec![
        Span::styled(format!("{glyph} "), Style::default().fg(glyph_color)),
        Span::styled(
            format!("{} ", commit.short_id),
            Style::default().fg(Color::Yellow),
        ),
    ];
    for branch in &commit.branches {
        spans.push(Span::styled(
            format!("[{}] ", sanitize_terminal_text(branch)),
            Style::default()
                .fg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if flagged {
        spans.push(Span::styled(
            format!("{CONFLICT_GLYPH} "),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        ));
    }
    spans.push(Span::raw(sanitize_terminal_text(&commit.message)));
    spans.push(Span::styled(
        format!("  {} ({})", sanitize_terminal_text(&commit.author), commit.date),
        Style::default().fg(Color::DarkGray),
    ));
    Line::from(spans)
}

fn draw_list(
    frame: &mut Frame,
    area: Rect,
    title: String,
    lines: Vec<Line<'static>>,
    selected: usize,
    focused: bool,
) {
    let height = inner_block_area(area)
        .map(|a| a.height as usize)
        .unwrap_or(0);
    let (start, end, selected_local) = visible_window(lines.len(), selected, height);
    let has_rows = !lines.is_empty();
    let items = lines
        .into_iter()
        .skip(start)
        .take(end - start)
        .map(ListItem::new);
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(focused_border(focused)),
        )
        .highlight_style(highlight_style())
        .highlight_symbol("▸ ");
    let mut list_state = ListState::default();
    if focused && has_rows {
        list_state.select(Some(selected_local));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_message(frame: &mut Frame, area: Rect, title: String, line: Line<'static>) {
    let widget = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn draw_graph(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = if state.active_search().is_empty() {
        "Commit Graph".to_string()
    } else {
        format!("Commit Graph (filter: {})", sanitize_terminal_text(state.active_search()))
    };
    if let Some(line) = placeholder(&state.graph, "history") {
        draw_message(frame, area, title, line);
        return;
    }
    let Some(graph) = state.graph.ready() else {
        return;
    };
    let lines: Vec<Line<'static>> = state
        .visible_commits()
        .into_iter()
        .filter_map(|idx| graph.commits.get(idx))
        .map(|commit| commit_line(commit, false))
        .collect();
    if lines.is_empty() {
        let text = if graph.is_empty() {
            "no commits"
        } else {
            "no commits match the filter"
        };
        draw_message(frame, area, title, Line::from(text));
        return;
    }
    draw_list(frame, area, title, lines, state.graph_selected, true);
}

fn touches_conflict(commit: &CommitRecord, result: &DivergenceResult) -> bool {
    commit
        .files
        .as_ref()
        .is_some_and(|files| files.iter().any(|f| result.conflict_files.contains(&f.path)))
}

fn draw_divergence(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = "Divergence".to_string();
    if let Some(line) = placeholder(&state.divergence, "comparison") {
        draw_message(frame, area, title, line);
        return;
    }
    let Some(result) = state.divergence.ready() else {
        return;
    };

    let summary = divergence_summary(result);
    let summary_height = u16::try_from(summary.len() + 2).unwrap_or(u16::MAX);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(summary_height), Constraint::Min(3)])
        .split(area);
    let widget = Paragraph::new(Text::from(summary))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, chunks[0]);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    for (pane, area) in [(Pane::Incoming, panes[0]), (Pane::Outgoing, panes[1])] {
        let commits = state.pane_commits(pane);
        let title = match pane {
            Pane::Incoming => format!("Incoming from {} ({})", result.target, commits.len()),
            Pane::Outgoing => format!("Outgoing on {} ({})", result.source, commits.len()),
        };
        let lines = commits
            .iter()
            .map(|commit| commit_line(commit, touches_conflict(commit, result)))
            .collect();
        draw_list(
            frame,
            area,
            title,
            lines,
            state.pane_selected(pane),
            state.active_pane == pane,
        );
    }
}

fn divergence_summary(result: &DivergenceResult) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{} ahead", result.ahead()),
            Style::default().fg(Color::LightGreen),
        ),
        Span::raw(", "),
        Span::styled(
            format!("{} behind", result.behind()),
            Style::default().fg(Color::LightRed),
        ),
        Span::raw(format!(
            "  |  {} files  +{}  -{}",
            result.stats.files, result.stats.additions, result.stats.deletions
        )),
    ])];
    lines.push(match &result.merge_base {
        Some(base) => Line::from(vec![
            Span::raw("merge base: "),
            Span::styled(base.short_id.clone(), Style::default().fg(Color::Yellow)),
            Span::raw(format!(" {}", sanitize_terminal_text(&base.message))),
        ]),
        None => Line::from(Span::styled(
            "no common history",
            Style::default().fg(Color::Gray),
        )),
    });
    if !result.conflict_files.is_empty() {
        let files: Vec<&str> = result.conflict_files.iter().map(String::as_str).collect();
        lines.push(Line::from(Span::styled(
            format!("{CONFLICT_GLYPH} possible conflicts: {}", files.join(", ")),
            Style::default().fg(Color::LightRed),
        )));
    }
    for warning in &result.warnings {
        lines.push(Line::from(Span::styled(
            format!("warning: {}", sanitize_terminal_text(warning)),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines
}

fn draw_detail(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(detail) = &state.detail else {
        draw_message(frame, area, "Commit".to_string(), Line::from("no commit selected"));
        return;
    };
    let header = detail_header(detail);
    let header_height = u16::try_from(header.len() + 2).unwrap_or(u16::MAX);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(header_height), Constraint::Min(3)])
        .split(area);
    let widget = Paragraph::new(Text::from(header))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Commit {}", detail.commit.short_id)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, chunks[0]);

    let filter = state.active_file_filter();
    let title = if filter.is_empty() {
        "Files".to_string()
    } else {
        format!("Files (filter: {})", sanitize_terminal_text(filter))
    };
    let Some(files) = &detail.commit.files else {
        let line = match &detail.error {
            Some(message) => Line::from(Span::styled(
                format!("no data: {}", sanitize_terminal_text(message)),
                Style::default().fg(Color::LightRed),
            )),
            None => Line::from(Span::styled(
                "loading file changes...",
                Style::default().fg(Color::Gray),
            )),
        };
        draw_message(frame, chunks[1], title, line);
        return;
    };
    let lines: Vec<Line<'static>> = state
        .visible_files()
        .into_iter()
        .filter_map(|idx| files.get(idx))
        .map(|file| {
            let color = match file.status {
                FileStatus::Added => Color::LightGreen,
                FileStatus::Modified => Color::Yellow,
                FileStatus::Deleted => Color::LightRed,
            };
            Line::from(vec![
                Span::styled(
                    format!("{} ", file.status.as_char()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(sanitize_terminal_text(&file.path)),
                Span::styled(
                    format!("  +{}", file.additions),
                    Style::default().fg(Color::LightGreen),
                ),
                Span::styled(
                    format!(" -{}", file.deletions),
                    Style::default().fg(Color::LightRed),
                ),
            ])
        })
        .collect();
    if lines.is_empty() {
        let text = if files.is_empty() {
            "no file changes"
        } else {
            "no files match the filter"
        };
        draw_message(frame, chunks[1], title, Line::from(text));
        return;
    }
    draw_list(frame, chunks[1], title, lines, detail.selected, true);
}

fn detail_header(detail: &DetailView) -> Vec<Line<'static>> {
    let commit = &detail.commit;
    let label = Style::default().fg(Color::Gray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("id:      ", label),
            Span::styled(commit.full_id.clone(), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::styled("author:  ", label),
            Span::raw(format!(
                "{} ({})",
                sanitize_terminal_text(&commit.author),
                commit.date
            )),
        ]),
        Line::from(vec![
            Span::styled("message: ", label),
            Span::raw(sanitize_terminal_text(&commit.message)),
        ]),
    ];
    if !commit.branches.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("refs:    ", label),
            Span::styled(
                commit.branches.join(", "),
                Style::default().fg(Color::LightGreen),
            ),
        ]));
    }
    match &commit.parent_summaries {
        Some(parents) if !parents.is_empty() => {
            for parent in parents {
                let branch = parent
                    .branch
                    .as_deref()
                    .map(|b| format!(" [{b}]"))
                    .unwrap_or_default();
                lines.push(Line::from(vec![
                    Span::styled("parent:  ", label),
                    Span::styled(parent.short_id.clone(), Style::default().fg(Color::Yellow)),
                    Span::styled(branch, Style::default().fg(Color::LightGreen)),
                    Span::raw(format!(" {}", sanitize_terminal_text(&parent.message))),
                ]));
            }
        }
        _ if !commit.parents.is_empty() => {
            let short: Vec<&str> = commit
                .parents
                .iter()
                .map(|p| p.get(..7).unwrap_or(p))
                .collect();
            lines.push(Line::from(vec![
                Span::styled("parents: ", label),
                Span::raw(short.join(", ")),
            ]));
        }
        _ => {}
    }
    lines
}

fn draw_diff(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(diff) = &state.diff else {
        draw_message(frame, area, "Diff".to_string(), Line::from("no file selected"));
        return;
    };
    let short = diff.commit_id.get(..7).unwrap_or(&diff.commit_id);
    let title = format!("{} @ {short}", sanitize_terminal_text(&diff.path));
    if let Some(line) = placeholder(&diff.lines, "diff") {
        draw_message(frame, area, title, line);
        return;
    }
    let Some(lines) = diff.lines.ready() else {
        return;
    };
    if lines.is_empty() {
        draw_message(frame, area, title, Line::from("(no changes)"));
        return;
    }
    let height = inner_block_area(area)
        .map(|a| a.height as usize)
        .unwrap_or(0);
    let start = min(diff.scroll, lines.len().saturating_sub(1));
    let rendered: Vec<Line<'static>> = lines
        .iter()
        .skip(start)
        .take(height)
        .map(diff_line)
        .collect();
    let widget = Paragraph::new(Text::from(rendered))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(widget, area);
}

fn diff_line(line: &DiffLine) -> Line<'static> {
    match line {
        DiffLine::Equal(text) => Line::from(format!("  {}", sanitize_terminal_text(text))),
        DiffLine::Add(text) => Line::from(Span::styled(
            format!("+ {}", sanitize_terminal_text(text)),
            Style::default().fg(Color::LightGreen),
        )),
        DiffLine::Delete(text) => Line::from(Span::styled(
            format!("- {}", sanitize_terminal_text(text)),
            Style::default().fg(Color::LightRed),
        )),
        DiffLine::Collapsed { hidden } => Line::from(Span::styled(
            format!("  ⋯ {hidden} unchanged lines"),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )),
    }
}

fn draw_picker(frame: &mut Frame, title: &str, names: &[String], selected: usize) {
    let area = centered_rect(frame.area(), 60, 60);
    frame.render_widget(Clear, area);
    let lines = names
        .iter()
        .map(|name| Line::from(sanitize_terminal_text(name)))
        .collect();
    draw_list(frame, area, title.to_string(), lines, selected, true);
}

fn draw_legend(frame: &mut Frame) {
    let area = centered_rect(frame.area(), 60, 60);
    frame.render_widget(Clear, area);
    let key = Style::default().fg(Color::Yellow);
    let lines = vec![
        Line::from(vec![
            Span::styled(format!("{COMMIT_GLYPH}  "), Style::default().fg(Color::Cyan)),
            Span::raw("commit"),
        ]),
        Line::from(vec![
            Span::styled(format!("{MERGE_GLYPH}  "), Style::default().fg(Color::Magenta)),
            Span::raw("merge commit"),
        ]),
        Line::from(vec![
            Span::styled("[x] ", Style::default().fg(Color::LightGreen)),
            Span::raw("branch tip"),
        ]),
        Line::from(vec![
            Span::styled(format!("{CONFLICT_GLYPH}  "), Style::default().fg(Color::LightRed)),
            Span::raw("touches a file changed on both sides"),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled("c ", key), Span::raw("compare against a branch")]),
        Line::from(vec![Span::styled("b ", key), Span::raw("switch branch")]),
        Line::from(vec![Span::styled("/ ", key), Span::raw("search or filter")]),
        Line::from(vec![Span::styled("y ", key), Span::raw("copy the full commit id")]),
        Line::from(vec![Span::styled("r ", key), Span::raw("reload")]),
    ];
    let widget = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Legend (? or esc to close)")
            .border_style(focused_border(true)),
    );
    frame.render_widget(widget, area);
}

fn draw_alert(frame: &mut Frame, message: &str) {
    let screen = frame.area();
    let text = sanitize_terminal_text(message);
    let width = u16::try_from(text.chars().count() + 4)
        .unwrap_or(u16::MAX)
        .min(screen.width);
    let height = 3.min(screen.height);
    let area = Rect {
        x: screen.x + screen.width.saturating_sub(width),
        y: screen.y,
        width,
        height,
    };
    frame.render_widget(Clear, area);
    let widget = Paragraph::new(text)
        .style(Style::default().fg(Color::Black).bg(Color::LightYellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(widget, area);
}

fn sanitize_terminal_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_escape = false;
    let mut in_csi = false;

    for ch in input.chars() {
        if in_escape {
            in_escape = false;
            in_csi = ch == '[';
            continue;
        }
        if in_csi {
            if ('@'..='~').contains(&ch) {
                in_csi = false;
            }
            continue;
        }
        match ch {
            '\u{1b}' => in_escape = true,
            '\t' => out.push_str("    "),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn centered_rect(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100 - height_percent) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}

fn inner_block_area(area: Rect) -> Option<Rect> {
    let inner = area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    (inner.width > 0 && inner.height > 0).then_some(inner)
}

/// Rows `start..end` to draw so `selected` stays in view, and the selection's
/// position inside that window.
fn visible_window(total: usize, selected: usize, height: usize) -> (usize, usize, usize) {
    if total == 0 || height == 0 {
        return (0, 0, 0);
    }
    let selected = min(selected, total - 1);
    let start = selected.saturating_sub(height - 1);
    let end = min(start + height, total);
    (start, end, selected - start)
}
