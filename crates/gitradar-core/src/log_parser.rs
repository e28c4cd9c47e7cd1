use std::collections::HashMap;

use crate::error::{RadarError, Result};
use crate::models::{Branch, FileChange, FileStatus, HunkKind, RawCommit, RawHunk};

pub const FIELD_SEP: char = '\u{001f}';
pub const RECORD_SEP: char = '\u{001e}';

/// `git log --pretty` format matching [`parse_git_log_records`].
pub const LOG_FORMAT: &str = "--pretty=format:%H%x1f%h%x1f%P%x1f%an%x1f%ae%x1f%at%x1f%ct%x1f%s%x1e";

const LOG_FIELDS: usize = 8;

pub fn parse_git_log_records(stdout: &str) -> Result<Vec<RawCommit>> {
    let mut commits = Vec::new();
    for raw_record in stdout.split(RECORD_SEP) {
        let record = raw_record.trim_matches(['\r', '\n', ' ']);
        if record.is_empty() {
            continue;
        }
        let fields: Vec<&str> = record.splitn(LOG_FIELDS, FIELD_SEP).collect();
        if fields.len() != LOG_FIELDS {
            return Err(RadarError::Parse(format!(
                "expected {LOG_FIELDS} fields, got {} in record {:?}",
                fields.len(),
                record
            )));
        }
        let authored_unix = parse_unix(fields[5], "authored")?;
        let committed_unix = parse_unix(fields[6], "committed")?;
        let parents = fields[2]
            .split_whitespace()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        commits.push(RawCommit {
            id: fields[0].to_string(),
            short_id: fields[1].to_string(),
            parents,
            author_name: fields[3].to_string(),
            author_email: fields[4].to_string(),
            authored_unix,
            committed_unix,
            subject: fields[7].to_string(),
        });
    }
    Ok(commits)
}

fn parse_unix(raw: &str, which: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|e| {
        RadarError::Parse(format!("invalid {which} unix timestamp {raw:?}: {e}"))
    })
}

/// Parses `git for-each-ref --format=%(refname)%x1f%(objectname)%x1f%(symref)`.
/// Symbolic refs such as `refs/remotes/origin/HEAD` are not branches and are
/// skipped. `head_ref` is the full name HEAD points at, if any.
pub fn parse_branch_refs(stdout: &str, head_ref: Option<&str>) -> Vec<Branch> {
    stdout
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }
            let mut parts = trimmed.splitn(3, FIELD_SEP);
            let full_ref = parts.next().map(str::trim).unwrap_or_default();
            let tip = parts.next().map(str::trim).unwrap_or_default();
            let symref = parts.next().map(str::trim).unwrap_or_default();
            if full_ref.is_empty() || tip.is_empty() || !symref.is_empty() {
                return None;
            }
            let (name, is_remote) = if let Some(name) = full_ref.strip_prefix("refs/heads/") {
                (name, false)
            } else if let Some(name) = full_ref.strip_prefix("refs/remotes/") {
                (name, true)
            } else {
                return None;
            };
            Some(Branch {
                name: name.to_string(),
                full_ref: full_ref.to_string(),
                tip: tip.to_string(),
                is_remote,
                is_head: !is_remote && head_ref == Some(full_ref),
            })
        })
        .collect()
}

/// Combines `--numstat` and `--name-status` output for the same range into
/// file changes, in numstat order.
pub fn parse_file_changes(numstat: &str, name_status: &str) -> Vec<FileChange> {
    let statuses: HashMap<String, FileStatus> = name_status
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let code = parts.next()?.trim();
            let path = parts.last()?.trim();
            if code.is_empty() || path.is_empty() {
                return None;
            }
            let status = match code.chars().next()? {
                'A' | 'C' => FileStatus::Added,
                'D' => FileStatus::Deleted,
                _ => FileStatus::Modified,
            };
            Some((path.to_string(), status))
        })
        .collect();

    numstat
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }
            let mut parts = trimmed.splitn(3, '\t');
            let additions = parse_numstat_value(parts.next()?);
            let deletions = parse_numstat_value(parts.next()?);
            let path = normalize_numstat_path(parts.next()?);
            if path.is_empty() {
                return None;
            }
            let status = statuses
                .get(&path)
                .copied()
                .unwrap_or(FileStatus::Modified);
            Some(FileChange {
                status,
                path,
                additions,
                deletions,
            })
        })
        .collect()
}

/// Binary files report `-`; they count as zero changed lines.
fn parse_numstat_value(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(0)
}

pub fn normalize_numstat_path(raw: &str) -> String {
    let mut path = raw.trim().trim_matches('"').to_string();
    if path.is_empty() {
        return path;
    }

    if path.contains('{') && path.contains(" => ") {
        let chars = path.chars().collect::<Vec<_>>();
        let mut out = String::with_capacity(path.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '{'
                && let Some(close) = chars[i + 1..].iter().position(|c| *c == '}')
            {
                let end = i + 1 + close;
                let inner = chars[i + 1..end].iter().collect::<String>();
                if let Some((_, rhs)) = inner.split_once(" => ") {
                    out.push_str(rhs.trim());
                    i = end + 1;
                    continue;
                }
            }
            out.push(chars[i]);
            i += 1;
        }
        path = out.replace("//", "/");
    }

    if let Some((_, rhs)) = path.rsplit_once(" => ") {
        path = rhs.trim().to_string();
    }

    path
}

/// Splits a unified diff for a single file into runs of same-kind lines.
/// Everything before the first `@@` header is file metadata and ignored.
pub fn parse_unified_hunks(patch: &str) -> Vec<RawHunk> {
    let mut hunks: Vec<RawHunk> = Vec::new();
    let mut in_body = false;
    for line in patch.lines() {
        if line.starts_with("@@") {
            in_body = true;
            continue;
        }
        if !in_body {
            continue;
        }
        let (kind, text) = match line.as_bytes().first() {
            Some(b'+') => (HunkKind::Add, &line[1..]),
            Some(b'-') => (HunkKind::Delete, &line[1..]),
            Some(b' ') => (HunkKind::Equal, &line[1..]),
            // "\ No newline at end of file"
            Some(b'\\') => continue,
            None => (HunkKind::Equal, ""),
            Some(_) => {
                // A new file section; a single-path diff should not have one.
                in_body = false;
                continue;
            }
        };
        match hunks.last_mut() {
            Some(last) if last.kind == kind => last.lines.push(text.to_string()),
            _ => hunks.push(RawHunk {
                kind,
                lines: vec![text.to_string()],
            }),
        }
    }
    hunks
}

#[cfg(test)]
mod tests {
    use super::{
        FIELD_SEP, RECORD_SEP, normalize_numstat_path, parse_branch_refs, parse_file_changes,
        parse_git_log_records, parse_unified_hunks,
    };
    use crate::models::{FileStatus, HunkKind};

    #[test]
    fn parses_one_record() {
        let rec = format!(
            "aaaaaaaa{f}aaaaaaa{f}bbbbbbbb cccccccc{f}Alice{f}alice@example.com{f}1700000000{f}1700000001{f}Merge feature{r}",
            f = FIELD_SEP,
            r = RECORD_SEP
        );
        let parsed = parse_git_log_records(&rec).expect("parse records");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "aaaaaaaa");
        assert_eq!(parsed[0].parents, vec!["bbbbbbbb", "cccccccc"]);
        assert_eq!(parsed[0].committed_unix, 1_700_000_001);
        assert_eq!(parsed[0].subject, "Merge feature");
    }

    #[test]
    fn rejects_truncated_record() {
        let rec = format!("aaaa{f}aaa{f}{r}", f = FIELD_SEP, r = RECORD_SEP);
        assert!(parse_git_log_records(&rec).is_err());
    }

    #[test]
    fn parses_branches_and_skips_symbolic_refs() {
        let out = format!(
            "refs/heads/main{f}111{f}\nrefs/heads/feature{f}222{f}\nrefs/remotes/origin/HEAD{f}111{f}refs/remotes/origin/main\nrefs/remotes/origin/main{f}111{f}\n",
            f = FIELD_SEP
        );
        let branches = parse_branch_refs(&out, Some("refs/heads/main"));
        assert_eq!(branches.len(), 3);
        assert!(branches[0].is_head);
        assert!(!branches[1].is_head);
        assert!(branches[2].is_remote);
        assert_eq!(branches[2].name, "origin/main");
    }

    #[test]
    fn combines_numstat_and_name_status() {
        let numstat = "3\t0\tnew.rs\n1\t1\tsrc/lib.rs\n0\t7\told.rs\n-\t-\tlogo.png\n";
        let name_status = "A\tnew.rs\nM\tsrc/lib.rs\nD\told.rs\nM\tlogo.png\n";
        let changes = parse_file_changes(numstat, name_status);
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0].status, FileStatus::Added);
        assert_eq!(changes[2].status, FileStatus::Deleted);
        assert_eq!(changes[2].deletions, 7);
        assert_eq!(changes[3].additions, 0);
    }

    #[test]
    fn normalize_numstat_paths_for_renames() {
        assert_eq!(normalize_numstat_path("README.md"), "README.md");
        assert_eq!(normalize_numstat_path("old.txt => new.txt"), "new.txt");
        assert_eq!(
            normalize_numstat_path("src/{old => new}/mod.rs"),
            "src/new/mod.rs"
        );
        assert_eq!(
            normalize_numstat_path("\"src/{old => new}/mod.rs\""),
            "src/new/mod.rs"
        );
    }

    #[test]
    fn splits_unified_diff_into_runs() {
        let patch = "diff --git a/f.txt b/f.txt\nindex 1..2 100644\n--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n+extra\n three\n\\ No newline at end of file\n";
        let hunks = parse_unified_hunks(patch);
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
        assert_eq!(hunks[2].lines, vec!["TWO", "extra"]);
    }
}
