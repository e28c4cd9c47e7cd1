use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{RadarError, Result};
use crate::models::{CommitRecord, FileChange};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub case_sensitive: bool,
    pub use_regex: bool,
}

impl SearchQuery {
    /// Plain case-insensitive substring search, what the search bar uses.
    pub fn substring(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Indices of the commits whose message, short id or author match. An empty
/// query matches everything.
pub fn filter_commits(commits: &[CommitRecord], query: &SearchQuery) -> Result<Vec<usize>> {
    let needle = query.text.trim();
    if needle.is_empty() {
        return Ok((0..commits.len()).collect());
    }

    if query.use_regex {
        let regex = RegexBuilder::new(needle)
            .case_insensitive(!query.case_sensitive)
            .build()
            .map_err(|e| RadarError::Parse(format!("invalid regex {needle:?}: {e}")))?;
        return Ok(matching(commits, |part| regex.is_match(part)));
    }

    if query.case_sensitive {
        return Ok(matching(commits, |part| part.contains(needle)));
    }

    let normalized = needle.to_lowercase();
    Ok(matching(commits, |part| {
        part.to_lowercase().contains(&normalized)
    }))
}

fn matching(commits: &[CommitRecord], mut matches: impl FnMut(&str) -> bool) -> Vec<usize> {
    commits
        .iter()
        .enumerate()
        .filter(|(_, commit)| {
            matches(&commit.message) || matches(&commit.short_id) || matches(&commit.author)
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Indices of the files whose path contains `needle`, ignoring case.
pub fn filter_files(files: &[FileChange], needle: &str) -> Vec<usize> {
    let needle = needle.trim().to_lowercase();
    files
        .iter()
        .enumerate()
        .filter(|(_, f)| needle.is_empty() || f.path.to_lowercase().contains(&needle))
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{SearchQuery, filter_commits, filter_files};
    use crate::models::{CommitRecord, FileChange, FileStatus};

    fn commit(short_id: &str, message: &str, author: &str) -> CommitRecord {
        CommitRecord {
            short_id: short_id.to_string(),
            full_id: format!("{short_id}000000"),
            message: message.to_string(),
            author: author.to_string(),
            date: "1 hour ago".to_string(),
            committed_unix: 0,
            parents: Vec::new(),
            is_merge: false,
            branches: Vec::new(),
            files: None,
            parent_summaries: None,
        }
    }

    fn sample() -> Vec<CommitRecord> {
        vec![
            commit("a1b2c3d", "Add parser", "Alice"),
            commit("e5f6a7b", "Fix ui", "Bob"),
            commit("c9d8e7f", "parser cleanup", "Carol"),
        ]
    }

    #[test]
    fn substring_ignores_case() {
        let hits = filter_commits(&sample(), &SearchQuery::substring("PARSER")).expect("search");
        assert_eq!(hits, vec![0, 2]);
        let hits = filter_commits(&sample(), &SearchQuery::substring("bob")).expect("search");
        assert_eq!(hits, vec![1]);
        let hits = filter_commits(&sample(), &SearchQuery::substring("e5f6")).expect("search");
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn empty_query_keeps_everything() {
        let hits = filter_commits(&sample(), &SearchQuery::substring("  ")).expect("search");
        assert_eq!(hits, vec![0, 1, 2]);
    }

    #[test]
    fn case_sensitive_and_regex_modes() {
        let query = SearchQuery {
            text: "Add".to_string(),
            case_sensitive: true,
            use_regex: false,
        };
        assert_eq!(filter_commits(&sample(), &query).expect("search"), vec![0]);

        let query = SearchQuery {
            text: "^Fix\\s".to_string(),
            case_sensitive: false,
            use_regex: true,
        };
        assert_eq!(filter_commits(&sample(), &query).expect("search"), vec![1]);

        let query = SearchQuery {
            text: "(".to_string(),
            case_sensitive: false,
            use_regex: true,
        };
        assert!(filter_commits(&sample(), &query).is_err());
    }

    #[test]
    fn filters_file_paths() {
        let files: Vec<FileChange> = ["src/Auth.go", "README.md", "internal/auth_test.go"]
            .iter()
            .map(|path| FileChange {
                status: FileStatus::Modified,
                path: path.to_string(),
                additions: 0,
                deletions: 0,
            })
            .collect();
        assert_eq!(filter_files(&files, "auth"), vec![0, 2]);
        assert_eq!(filter_files(&files, ""), vec![0, 1, 2]);
    }
}
