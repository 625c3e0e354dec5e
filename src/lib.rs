// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Keyword substitution mode reclassification.
//!
//! Change the keyword substitution mode of many versioned files at once. A
//! selection of resources is walked into a deduplicated set of files, each
//! file is classified by its sync state and given a proposed mode, the
//! resulting [`ChangeSet`] is narrowed by an [`InclusionPolicy`], and
//! whatever remains actionable is applied one connection at a time, with all
//! outcomes merged into a single [`AggregatedStatus`].
//!
//! The engine only talks to repositories through the [`ResourceTree`],
//! [`SyncSource`], and [`BatchApplier`] traits. [`git::GitWorkspace`]
//! implements all three on top of libgit2.

pub mod batch;
pub mod changeset;
pub mod classify;
pub mod config;
pub mod git;
pub mod mode;
pub mod path;
pub mod policy;
pub mod resource;
pub mod session;
pub mod status;
pub mod walk;

#[cfg(test)]
mod testing;

pub use batch::{group_by_connection, ProviderBatch};
pub use changeset::{ChangeSet, ChangeSetError, Classification, FileChangeRecord};
pub use classify::{FileClassifier, ModePattern, ModePatterns, SyncInfo, SyncSource, SyncState};
pub use mode::{Mode, ModeError};
pub use policy::InclusionPolicy;
pub use resource::{ConnectionId, Depth, FileHandle, ResourceKind, ResourceRef, ResourceTree};
pub use session::{ModeSession, Scan, ScanProblem};
pub use status::{AggregatedStatus, BatchApplier, Cancellation, NeverCancel, Severity, Status, StatusAggregator};
pub use walk::{ResourceWalker, WalkReport};
