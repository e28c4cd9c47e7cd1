use std::collections::HashMap;
use std::time::Instant;

use log::debug;

use crate::backend::RepositoryBackend;
use crate::error::Result;
use crate::models::Branch;

/// Sorted branches plus the reverse map from commit id to the branch names
/// pointing at it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchIndex {
    branches: Vec<Branch>,
    labels: HashMap<String, Vec<String>>,
}

impl BranchIndex {
    pub fn new(mut branches: Vec<Branch>) -> Self {
        sort_branches(&mut branches);
        let mut labels: HashMap<String, Vec<String>> = HashMap::new();
        for branch in &branches {
            labels
                .entry(branch.tip.clone())
                .or_default()
                .push(branch.name.clone());
        }
        Self { branches, labels }
    }

    /// Lists every branch. A backend failure propagates as is; a partial
    /// listing is never returned.
    pub fn load(backend: &dyn RepositoryBackend) -> Result<Self> {
        let started = Instant::now();
        let index = Self::new(backend.list_branches()?);
        debug!(
            "loaded {} branches in {:?}",
            index.branches.len(),
            started.elapsed()
        );
        Ok(index)
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn into_branches(self) -> Vec<Branch> {
        self.branches
    }

    pub fn labels_for(&self, commit_id: &str) -> &[String] {
        self.labels
            .get(commit_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First branch label for a commit, local branches first.
    pub fn primary_label(&self, commit_id: &str) -> Option<&str> {
        self.labels_for(commit_id).first().map(String::as_str)
    }

    pub fn head(&self) -> Option<&Branch> {
        self.branches.iter().find(|b| b.is_head)
    }
}

/// Local branches before remote ones, each group by name.
pub fn sort_branches(branches: &mut [Branch]) {
    branches.sort_by(|a, b| {
        a.is_remote
            .cmp(&b.is_remote)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Branch names a comparison can target: everything but `current`.
pub fn comparable_branches<'a>(branches: &'a [Branch], current: &str) -> Vec<&'a Branch> {
    branches.iter().filter(|b| b.name != current).collect()
}
