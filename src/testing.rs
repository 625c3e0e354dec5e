// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! In-memory workspace fixture for unit tests.

use crate::{
    classify::{ClassifyError, SyncInfo, SyncSource, SyncState},
    mode::{Mode, ModeError},
    resource::{ConnectionId, FileHandle, ResourceKind, ResourceRef, ResourceTree, TraversalError},
};

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::{Path, PathBuf},
};

#[derive(Debug, Default)]
pub(crate) struct MemoryWorkspace {
    files: BTreeMap<PathBuf, Option<SyncInfo>>,
    connections: Vec<(PathBuf, ConnectionId)>,
    failing_listings: HashSet<PathBuf>,
    failing_syncs: HashSet<PathBuf>,
}

impl MemoryWorkspace {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_connection(&mut self, id: &str, root: impl Into<PathBuf>) -> &mut Self {
        self.connections.push((root.into(), ConnectionId::new(id)));
        self
    }

    pub(crate) fn added(&mut self, path: &str, mode: Mode) -> &mut Self {
        self.tracked(path, SyncState::Added, mode)
    }

    pub(crate) fn modified(&mut self, path: &str, mode: Mode) -> &mut Self {
        self.tracked(path, SyncState::Modified, mode)
    }

    pub(crate) fn clean(&mut self, path: &str, mode: Mode) -> &mut Self {
        self.tracked(path, SyncState::Clean, mode)
    }

    pub(crate) fn deleted(&mut self, path: &str, mode: Mode) -> &mut Self {
        self.tracked(path, SyncState::Deleted, mode)
    }

    pub(crate) fn untracked(&mut self, path: &str) -> &mut Self {
        self.files.insert(PathBuf::from(path), None);
        self
    }

    pub(crate) fn unshared_file(&mut self, path: &str) -> &mut Self {
        self.untracked(path)
    }

    pub(crate) fn fail_listing(&mut self, path: &str) -> &mut Self {
        self.failing_listings.insert(PathBuf::from(path));
        self
    }

    pub(crate) fn fail_sync(&mut self, path: &str) -> &mut Self {
        self.failing_syncs.insert(PathBuf::from(path));
        self.untracked(path)
    }

    fn tracked(&mut self, path: &str, state: SyncState, mode: Mode) -> &mut Self {
        self.files
            .insert(PathBuf::from(path), Some(SyncInfo::new(state, mode)));
        self
    }

    fn is_container(&self, path: &Path) -> bool {
        self.files
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }
}

impl ResourceTree for MemoryWorkspace {
    fn kind(&self, resource: &ResourceRef) -> Result<Option<ResourceKind>, TraversalError> {
        let path = resource.as_path();
        if self.files.contains_key(path) {
            Ok(Some(ResourceKind::File))
        } else if self.is_container(path) {
            Ok(Some(ResourceKind::Container))
        } else {
            Ok(None)
        }
    }

    fn members(&self, container: &ResourceRef) -> Result<Vec<ResourceRef>, TraversalError> {
        let path = container.as_path();
        if self.failing_listings.contains(path) {
            return Err(TraversalError::Read {
                source: std::io::Error::other("listing refused"),
                path: path.to_path_buf(),
            });
        }

        let members = self
            .files
            .keys()
            .filter_map(|file| file.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|first| path.join(first))
            .collect::<BTreeSet<_>>();

        Ok(members.into_iter().map(ResourceRef::new).collect())
    }

    fn connection(&self, resource: &ResourceRef) -> Option<ConnectionId> {
        self.connections
            .iter()
            .filter(|(root, _)| resource.as_path().starts_with(root))
            .max_by_key(|(root, _)| root.components().count())
            .map(|(_, id)| id.clone())
    }
}

impl SyncSource for MemoryWorkspace {
    fn sync_info(&self, file: &FileHandle) -> Result<Option<SyncInfo>, ClassifyError> {
        if self.failing_syncs.contains(file.path()) {
            return Err(ClassifyError::MalformedMode {
                source: ModeError::Unknown("-kz".into()),
                path: file.path().to_path_buf(),
            });
        }

        Ok(self.files.get(file.path()).copied().flatten())
    }
}
