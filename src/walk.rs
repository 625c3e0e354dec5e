// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Resource selection traversal.
//!
//! Flatten a user selection of resources into the set of versioned files it
//! covers. Selections frequently overlap, e.g., a folder and a file inside of
//! it, so the walker keeps track of everything it has already seen across
//! the whole call.

use crate::resource::{Depth, FileHandle, ResourceKind, ResourceRef, ResourceTree, TraversalError};

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// Result of walking a resource selection.
#[derive(Debug, Default)]
pub struct WalkReport {
    /// Every file covered by the selection, at most once.
    pub files: BTreeSet<FileHandle>,

    /// Roots that had to be skipped.
    pub errors: Vec<TraversalError>,
}

/// Deduplicating, depth bounded traversal over a [`ResourceTree`].
#[derive(Debug)]
pub struct ResourceWalker<'a, T>
where
    T: ResourceTree,
{
    tree: &'a T,
}

impl<'a, T> ResourceWalker<'a, T>
where
    T: ResourceTree,
{
    /// Construct new resource walker.
    pub fn new(tree: &'a T) -> Self {
        Self { tree }
    }

    /// Walk roots down to target depth.
    ///
    /// Only existing files owned by some connection are emitted. Containers
    /// are traversed but never emitted. A root whose traversal fails is
    /// skipped in full, and its error is recorded in the report.
    #[instrument(skip(self, roots), level = "debug")]
    pub fn walk(&self, roots: &[ResourceRef], depth: Depth) -> WalkReport {
        let mut state = WalkState::default();
        let mut errors = Vec::new();

        for root in roots {
            // INVARIANT: Failed roots must not leak partial results.
            let visited = self
                .tree
                .resolve(root)
                .and_then(|root| self.visit(&root, depth, &mut state));
            match visited {
                Ok(()) => state.commit(),
                Err(error) => {
                    warn!("skip root {root}: {error}");
                    state.rollback();
                    errors.push(error);
                }
            }
        }

        debug!("walked {} roots into {} files", roots.len(), state.files.len());
        WalkReport {
            files: state.files,
            errors,
        }
    }

    fn visit(&self, resource: &ResourceRef, depth: Depth, state: &mut WalkState) -> Result<(), TraversalError> {
        match self.tree.kind(resource)? {
            None => {
                debug!("{resource} does not exist");
                Ok(())
            }
            Some(ResourceKind::File) => {
                if !state.mark_seen(resource) {
                    return Ok(());
                }

                match self.tree.connection(resource) {
                    Some(connection) => state.add_file(FileHandle::new(resource.as_path(), connection)),
                    None => debug!("{resource} is not shared with any repository"),
                }

                Ok(())
            }
            Some(ResourceKind::Container) => {
                // INVARIANT: Only expand containers when we can reach deeper than before.
                if !state.mark_expanded(resource, depth) {
                    return Ok(());
                }

                let Some(next) = depth.descend() else {
                    return Ok(());
                };

                for member in self.tree.members(resource)? {
                    self.visit(&member, next, state)?;
                }

                Ok(())
            }
        }
    }
}

/// Everything visited so far, across all roots.
///
/// Changes made while visiting the current root are journaled, so a failing
/// root can be undone without copying the whole state up front.
#[derive(Debug, Default)]
struct WalkState {
    files: BTreeSet<FileHandle>,
    seen: HashSet<ResourceRef>,
    expanded: HashMap<ResourceRef, Depth>,
    journal: Vec<Undo>,
}

#[derive(Debug)]
enum Undo {
    File(FileHandle),
    Seen(ResourceRef),
    Expanded(ResourceRef, Option<Depth>),
}

impl WalkState {
    fn mark_seen(&mut self, resource: &ResourceRef) -> bool {
        if !self.seen.insert(resource.clone()) {
            return false;
        }

        self.journal.push(Undo::Seen(resource.clone()));
        true
    }

    fn add_file(&mut self, file: FileHandle) {
        if self.files.insert(file.clone()) {
            self.journal.push(Undo::File(file));
        }
    }

    fn mark_expanded(&mut self, resource: &ResourceRef, depth: Depth) -> bool {
        let previous = self.expanded.get(resource).copied();
        if previous.is_some_and(|expanded| expanded >= depth) {
            return false;
        }

        self.expanded.insert(resource.clone(), depth);
        self.journal.push(Undo::Expanded(resource.clone(), previous));
        true
    }

    fn commit(&mut self) {
        self.journal.clear();
    }

    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::File(file) => {
                    self.files.remove(&file);
                }
                Undo::Seen(resource) => {
                    self.seen.remove(&resource);
                }
                Undo::Expanded(resource, Some(depth)) => {
                    self.expanded.insert(resource, depth);
                }
                Undo::Expanded(resource, None) => {
                    self.expanded.remove(&resource);
                }
            }
        }
    }
}
