use crate::models::{DiffLine, FileDiff, HunkKind};

pub const DEFAULT_COLLAPSE_THRESHOLD: usize = 8;
pub const DEFAULT_COLLAPSE_CONTEXT: usize = 3;

/// Flattens one file's hunks into display lines. Everything in a root commit
/// is an addition, whatever the backend tagged it as.
pub fn classify_lines(diff: &FileDiff) -> Vec<DiffLine> {
    diff.hunks
        .iter()
        .flat_map(|hunk| {
            hunk.lines.iter().map(move |line| {
                let text = line.clone();
                match hunk.kind {
                    _ if diff.root => DiffLine::Add(text),
                    HunkKind::Equal => DiffLine::Equal(text),
                    HunkKind::Add => DiffLine::Add(text),
                    HunkKind::Delete => DiffLine::Delete(text),
                }
            })
        })
        .collect()
}

/// Replaces the middle of every run of unchanged lines longer than
/// `threshold` with a single `Collapsed` marker, keeping `context` lines on
/// each side. Runs that would hide nothing are kept whole.
pub fn collapse_runs(lines: Vec<DiffLine>, threshold: usize, context: usize) -> Vec<DiffLine> {
    let mut out = Vec::with_capacity(lines.len());
    let mut run: Vec<DiffLine> = Vec::new();
    for line in lines {
        if line.is_equal() {
            run.push(line);
            continue;
        }
        flush_run(&mut out, &mut run, threshold, context);
        out.push(line);
    }
    flush_run(&mut out, &mut run, threshold, context);
    out
}

fn flush_run(out: &mut Vec<DiffLine>, run: &mut Vec<DiffLine>, threshold: usize, context: usize) {
    let len = run.len();
    if len <= threshold || len <= 2 * context {
        out.append(run);
        return;
    }
    let tail = run.split_off(len - context);
    run.truncate(context);
    out.append(run);
    out.push(DiffLine::Collapsed {
        hidden: len - 2 * context,
    });
    out.extend(tail);
}

/// Classify then collapse, the way the diff view shows a file.
pub fn render_file_diff(diff: &FileDiff, threshold: usize, context: usize) -> Vec<DiffLine> {
    collapse_runs(classify_lines(diff), threshold, context)
}
