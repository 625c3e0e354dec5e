// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Resource identities.
//!
//! The engine never touches live repository objects. Instead, resources are
//! referred to through small value types: a [`ResourceRef`] for anything the
//! user selected, a [`FileHandle`] for a concrete versioned file, and a
//! [`ConnectionId`] for the repository location a file belongs to.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

/// Identity of a repository location.
///
/// Stable for the lifetime of a session. Batching groups files by this
/// value, never by a live connection object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Construct new connection identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ConnectionId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a single versioned file.
///
/// Immutable once discovered. The owning connection is resolved at
/// discovery time and never recomputed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle {
    connection: ConnectionId,
    path: PathBuf,
}

impl FileHandle {
    /// Construct new file handle.
    pub fn new(path: impl Into<PathBuf>, connection: ConnectionId) -> Self {
        Self {
            connection,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn connection(&self) -> &ConnectionId {
        &self.connection
    }
}

impl Display for FileHandle {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.path.display())
    }
}

/// Opaque reference to a selected resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef(PathBuf);

impl ResourceRef {
    /// Construct new resource reference.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

impl Display for ResourceRef {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.0.display())
    }
}

impl<P: Into<PathBuf>> From<P> for ResourceRef {
    fn from(path: P) -> Self {
        Self::new(path)
    }
}

/// Kind of resource found in a resource tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    File,
    Container,
}

/// How far to descend from a selected resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Depth {
    /// Selected resources only.
    Zero,

    /// Selected resources and their immediate children.
    One,

    /// Full subtree of selected resources.
    #[default]
    Infinite,
}

impl Depth {
    /// Depth left for children of a resource visited at this depth.
    pub fn descend(self) -> Option<Self> {
        match self {
            Self::Zero => None,
            Self::One => Some(Self::Zero),
            Self::Infinite => Some(Self::Infinite),
        }
    }
}

/// Source of resource structure.
///
/// Layer of indirection over whatever resource system holds the selected
/// resources, e.g., a file system work tree.
pub trait ResourceTree {
    /// Kind of resource, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`TraversalError`] if resource cannot be inspected.
    fn kind(&self, resource: &ResourceRef) -> Result<Option<ResourceKind>, TraversalError>;

    /// Immediate members of a container.
    ///
    /// # Errors
    ///
    /// - Return [`TraversalError`] if container cannot be listed.
    fn members(&self, container: &ResourceRef) -> Result<Vec<ResourceRef>, TraversalError>;

    /// Connection owning a resource, or `None` if no repository shares it.
    fn connection(&self, resource: &ResourceRef) -> Option<ConnectionId>;

    /// Bring a selected root into the form members are reported in.
    ///
    /// Called once per root before it is walked, so relative or otherwise
    /// unusual spellings of a resource still find their connection.
    ///
    /// # Errors
    ///
    /// - Return [`TraversalError`] if resource cannot be resolved.
    fn resolve(&self, resource: &ResourceRef) -> Result<ResourceRef, TraversalError> {
        Ok(resource.clone())
    }
}

/// Resource traversal error types.
#[derive(Debug, thiserror::Error)]
pub enum TraversalError {
    /// Resource cannot be read from.
    #[error("failed to read resource {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Container members cannot be listed by the resource system.
    #[error("failed to list members of container {:?}", path.display())]
    List {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        path: PathBuf,
    },
}
