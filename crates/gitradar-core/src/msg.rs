use crate::models::{Branch, CommitDetails, CommitGraph, DiffLine, DivergenceResult};

/// Keys as the controller sees them, independent of the terminal library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Esc,
    Tab,
    BackTab,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    Backspace,
    CtrlC,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchListing {
    pub branches: Vec<Branch>,
    /// Checked-out branch, `None` when HEAD is detached.
    pub current: Option<String>,
}

/// Everything the controller reacts to. Query completions carry the request
/// they answer so stale ones can be told apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    Key(Key),
    BranchesLoaded {
        result: Result<BranchListing, String>,
    },
    GraphLoaded {
        reference: String,
        result: Result<CommitGraph, String>,
    },
    DivergenceLoaded {
        target: String,
        source: String,
        result: Result<DivergenceResult, String>,
    },
    DetailTimerFired {
        full_id: String,
    },
    DetailsLoaded {
        full_id: String,
        result: Result<CommitDetails, String>,
    },
    DiffLoaded {
        full_id: String,
        path: String,
        result: Result<Vec<DiffLine>, String>,
    },
    AlertExpired {
        generation: u64,
    },
    /// Raised by the front-end, e.g. when the clipboard is unavailable.
    ShowAlert(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadBranches,
    LoadGraph { reference: String },
    LoadDivergence { target: String, source: String },
    /// Posts `DetailTimerFired` after the debounce delay.
    ScheduleDetails { full_id: String },
    LoadDetails { full_id: String },
    LoadDiff { full_id: String, path: String },
    /// Posts `AlertExpired` after the alert delay.
    ScheduleAlertClear { generation: u64 },
    CopyToClipboard { text: String },
    Quit,
}
