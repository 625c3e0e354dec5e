// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Mode change session.
//!
//! Chain the pipeline stages together. A session scans a selection once into
//! a [`ChangeSet`], and later applies whatever the policy layer left
//! actionable. Traversal and classification problems never abort a scan.
//! They are collected, and surfaced once the scan completes.

use crate::{
    batch::{group_by_connection, ProviderBatch},
    changeset::ChangeSet,
    classify::{ClassifyError, FileClassifier, ModePatterns, SyncSource},
    mode::Mode,
    resource::{Depth, ResourceRef, ResourceTree, TraversalError},
    status::{AggregatedStatus, BatchApplier, Cancellation, StatusAggregator},
    walk::ResourceWalker,
};

use tracing::{info, instrument};

/// Problem hit while scanning a selection.
#[derive(Debug, thiserror::Error)]
pub enum ScanProblem {
    #[error(transparent)]
    Traversal(#[from] TraversalError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// Result of scanning a selection.
#[derive(Debug, Default)]
pub struct Scan {
    pub change_set: ChangeSet,
    pub problems: Vec<ScanProblem>,
}

/// Pipeline over a resource tree and its sync metadata.
#[derive(Debug)]
pub struct ModeSession<'a, W>
where
    W: ResourceTree + SyncSource,
{
    workspace: &'a W,
    patterns: ModePatterns,
}

impl<'a, W> ModeSession<'a, W>
where
    W: ResourceTree + SyncSource,
{
    /// Construct new mode session.
    pub fn new(workspace: &'a W, patterns: ModePatterns) -> Self {
        Self {
            workspace,
            patterns,
        }
    }

    /// Walk and classify a selection.
    #[instrument(skip(self, roots), level = "debug")]
    pub fn scan(&self, roots: &[ResourceRef], depth: Depth, target: Option<Mode>) -> Scan {
        let walk = ResourceWalker::new(self.workspace).walk(roots, depth);
        let classified =
            FileClassifier::new(self.workspace, &self.patterns).classify_all(&walk.files, target);

        let mut problems = walk
            .errors
            .into_iter()
            .map(ScanProblem::from)
            .collect::<Vec<_>>();
        problems.extend(classified.errors.into_iter().map(ScanProblem::from));

        let change_set = ChangeSet::build(classified.records);
        info!(
            "scanned {} files into {} records with {} problems",
            walk.files.len(),
            change_set.len(),
            problems.len()
        );

        Scan {
            change_set,
            problems,
        }
    }

    /// Batch what is actionable in change set.
    pub fn batches(&self, change_set: &ChangeSet) -> Vec<ProviderBatch> {
        group_by_connection(change_set.actionable_records())
    }

    /// Apply what is actionable in change set.
    #[instrument(skip(self, change_set, applier, cancellation), level = "debug")]
    pub fn apply<A, C>(&self, change_set: &ChangeSet, applier: &mut A, cancellation: &C) -> AggregatedStatus
    where
        A: BatchApplier + ?Sized,
        C: Cancellation + ?Sized,
    {
        let batches = self.batches(change_set);
        StatusAggregator::new(cancellation).apply(&batches, applier)
    }
}
