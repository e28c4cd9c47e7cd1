//! Runs controller effects off the event loop.
//!
//! Repository queries go to tokio's blocking pool, timers are `sleep` tasks.
//! Every query posts exactly one completion into the controller's queue, a
//! failure included.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::backend::RepositoryBackend;
use crate::branch_index::BranchIndex;
use crate::config::Config;
use crate::diff::render_file_diff;
use crate::divergence::analyze;
use crate::error::Result;
use crate::graph::build_graph;
use crate::models::{CommitGraph, DiffLine, DivergenceResult};
use crate::msg::{BranchListing, Effect, Msg};

pub fn load_branches(backend: &dyn RepositoryBackend) -> Result<BranchListing> {
    let index = BranchIndex::load(backend)?;
    let current = backend.current_branch()?;
    Ok(BranchListing {
        branches: index.into_branches(),
        current,
    })
}

/// Branch labels for annotating commits. A failed listing leaves commits
/// unlabelled rather than failing the query that asked for them.
fn labels(backend: &dyn RepositoryBackend) -> Option<BranchIndex> {
    match BranchIndex::load(backend) {
        Ok(index) => Some(index),
        Err(err) => {
            warn!("branch labels unavailable: {err}");
            None
        }
    }
}

pub fn load_graph(
    backend: &dyn RepositoryBackend,
    reference: &str,
    limit: usize,
    default_remote: &str,
) -> Result<CommitGraph> {
    let index = labels(backend).unwrap_or_default();
    build_graph(backend, &index, reference, limit, default_remote)
}

pub fn load_divergence(
    backend: &dyn RepositoryBackend,
    target: &str,
    source: &str,
    default_remote: &str,
) -> Result<DivergenceResult> {
    let index = labels(backend);
    let labelled = index.is_some();
    let mut result = analyze(backend, &index.unwrap_or_default(), target, source, default_remote);
    if !labelled {
        result.warnings.push("branch labels unavailable".to_string());
    }
    Ok(result)
}

pub fn load_diff(
    backend: &dyn RepositoryBackend,
    full_id: &str,
    path: &str,
    threshold: usize,
    context: usize,
) -> Result<Vec<DiffLine>> {
    let diff = backend.file_diff(full_id, path)?;
    Ok(render_file_diff(&diff, threshold, context))
}

fn reported<T>(what: &str, result: Result<T>) -> std::result::Result<T, String> {
    result.map_err(|err| {
        warn!("{what} failed: {err}");
        err.to_string()
    })
}

pub struct EffectRunner {
    backend: Arc<dyn RepositoryBackend>,
    tx: UnboundedSender<Msg>,
    config: Config,
}

impl EffectRunner {
    pub fn new(backend: Arc<dyn RepositoryBackend>, tx: UnboundedSender<Msg>, config: Config) -> Self {
        Self {
            backend,
            tx,
            config,
        }
    }

    /// Starts the work behind `effect`. Effects only the front-end can carry
    /// out (quitting, the clipboard) are handed back.
    pub fn spawn(&self, effect: Effect) -> Option<Effect> {
        match effect {
            Effect::LoadBranches => self.query("branch listing", |backend| Msg::BranchesLoaded {
                result: reported("branch listing", load_branches(backend)),
            }),
            Effect::LoadGraph { reference } => {
                let limit = self.config.log_limit;
                let remote = self.config.default_remote.clone();
                self.query("graph", move |backend| {
                    let result = load_graph(backend, &reference, limit, &remote);
                    Msg::GraphLoaded {
                        result: reported("graph", result),
                        reference,
                    }
                })
            }
            Effect::LoadDivergence { target, source } => {
                let remote = self.config.default_remote.clone();
                self.query("divergence", move |backend| {
                    let result = load_divergence(backend, &target, &source, &remote);
                    Msg::DivergenceLoaded {
                        result: reported("divergence", result),
                        target,
                        source,
                    }
                })
            }
            Effect::LoadDetails { full_id } => self.query("details", move |backend| {
                let result = backend.commit_details(&full_id);
                Msg::DetailsLoaded {
                    result: reported("commit details", result),
                    full_id,
                }
            }),
            Effect::LoadDiff { full_id, path } => {
                let threshold = self.config.collapse_threshold;
                let context = self.config.collapse_context;
                self.query("diff", move |backend| {
                    let result = load_diff(backend, &full_id, &path, threshold, context);
                    Msg::DiffLoaded {
                        result: reported("file diff", result),
                        full_id,
                        path,
                    }
                })
            }
            Effect::ScheduleDetails { full_id } => {
                self.after(self.config.debounce(), Msg::DetailTimerFired { full_id })
            }
            Effect::ScheduleAlertClear { generation } => {
                self.after(self.config.alert_duration(), Msg::AlertExpired { generation })
            }
            Effect::CopyToClipboard { .. } | Effect::Quit => return Some(effect),
        }
        None
    }

    fn query<F>(&self, label: &'static str, job: F)
    where
        F: FnOnce(&dyn RepositoryBackend) -> Msg + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let msg = job(backend.as_ref());
            debug!("{label} query finished in {:?}", started.elapsed());
            if tx.send(msg).is_err() {
                debug!("event loop is gone, dropping {label} completion");
            }
        });
    }

    fn after(&self, delay: Duration, msg: Msg) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // the receiver only goes away on shutdown
            let _ = tx.send(msg);
        });
    }
}
