pub mod backend;
pub mod branch_index;
pub mod config;
pub mod controller;
pub mod diff;
pub mod divergence;
pub mod error;
pub mod git;
pub mod git_backend;
pub mod graph;
pub mod log_parser;
pub mod memory;
pub mod models;
pub mod msg;
pub mod runtime;
pub mod search;
pub mod state;

pub use backend::RepositoryBackend;
pub use branch_index::BranchIndex;
pub use config::{Config, ConfigStore};
pub use controller::{init, update};
pub use diff::{classify_lines, collapse_runs, render_file_diff};
pub use divergence::analyze;
pub use error::{RadarError, Result};
pub use git::{GitOutput, GitRunner};
pub use git_backend::GitBackend;
pub use graph::{StartPoint, build_graph, resolve_start};
pub use memory::{MemoryBackend, MemoryCommit, demo_repository};
pub use models::{
    Branch, CommitDetails, CommitGraph, CommitRecord, DiffLine, DiffStats, DivergenceResult,
    FileChange, FileDiff, FileStatus, ParentSummary,
};
pub use msg::{BranchListing, Effect, Key, Msg};
pub use runtime::EffectRunner;
pub use search::{SearchQuery, filter_commits, filter_files};
pub use state::{AppState, Loadable, Overlay, Pane, Screen};
