// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git provider.
//!
//! Back the engine with real Git repositories through libgit2. Each
//! repository discovered from the user's selection becomes one connection,
//! identified by the canonical path of its work tree.
//!
//! Keyword substitution modes are recorded as `ksubst` gitattributes, see
//! [`attributes`] for the exact layout. A file without a `ksubst` attribute
//! is binary if Git already treats it as such through `-text` (or the
//! `binary` macro), and text with the default text mode otherwise.

pub mod attributes;

use crate::{
    batch::ProviderBatch,
    classify::{ClassifyError, SyncInfo, SyncSource, SyncState},
    mode::{Mode, ModeError},
    resource::{ConnectionId, FileHandle, ResourceKind, ResourceRef, ResourceTree, TraversalError},
    status::{BatchApplier, Status},
};

use attributes::{AttributesDrafter, KSUBST_ATTR};
use git2::{AttrCheckFlags, AttrValue, Repository, Status as GitStatus};
use ignore::WalkBuilder;
use std::{
    fs::{canonicalize, symlink_metadata},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Set of Git repositories acting as connections.
pub struct GitWorkspace {
    connections: Vec<GitConnection>,
    default_text_mode: Mode,
}

struct GitConnection {
    id: ConnectionId,
    workdir: PathBuf,
    repository: Repository,
}

impl GitConnection {
    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.workdir).unwrap_or(path)
    }
}

impl GitWorkspace {
    /// Open every repository containing one of the paths.
    ///
    /// Paths sharing a repository open it only once.
    ///
    /// # Errors
    ///
    /// - Return [`GitError::Discover`] if a path is not inside a repository.
    /// - Return [`GitError::Bare`] if a repository has no work tree.
    /// - Return [`GitError::Canonicalize`] if a work tree path cannot be
    ///   resolved.
    #[instrument(skip(paths), level = "debug")]
    pub fn discover(paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Result<Self> {
        let mut connections: Vec<GitConnection> = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let repository = Repository::discover(path).map_err(|err| GitError::Discover {
                source: err,
                path: path.to_path_buf(),
            })?;
            let workdir = repository.workdir().ok_or_else(|| GitError::Bare {
                gitdir: repository.path().to_path_buf(),
            })?;
            let workdir = canonicalize(workdir).map_err(|err| GitError::Canonicalize {
                source: err,
                path: workdir.to_path_buf(),
            })?;

            if connections.iter().any(|conn| conn.workdir == workdir) {
                continue;
            }

            info!("open repository at {:?}", workdir.display());
            connections.push(GitConnection {
                id: ConnectionId::new(workdir.to_string_lossy()),
                workdir,
                repository,
            });
        }

        Ok(Self {
            connections,
            default_text_mode: Mode::default(),
        })
    }

    /// Use a different mode for text files without a `ksubst` attribute.
    pub fn with_default_text_mode(mut self, mode: Mode) -> Self {
        self.default_text_mode = mode;
        self
    }

    /// Identities of every open connection.
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionId> {
        self.connections.iter().map(|conn| &conn.id)
    }

    fn find(&self, id: &ConnectionId) -> Option<&GitConnection> {
        self.connections.iter().find(|conn| &conn.id == id)
    }
}

/// Mode of file as Git currently sees it through its attributes.
fn effective_mode(repository: &Repository, relative: &Path, default_text_mode: Mode) -> Result<Mode, ClassifyError> {
    let inspect_failed = |err: git2::Error| ClassifyError::Status {
        source: GitError::Inspect(err).into(),
        path: relative.to_path_buf(),
    };
    let malformed = |err: ModeError| ClassifyError::MalformedMode {
        source: err,
        path: relative.to_path_buf(),
    };

    // INVARIANT: Attribute values must reach AttrValue untouched.
    //   - libgit2 marks set and unset attributes with sentinel pointers, a copy of
    //     the value loses them.
    let ksubst = repository
        .get_attr_bytes(relative, KSUBST_ATTR, AttrCheckFlags::FILE_THEN_INDEX)
        .map_err(inspect_failed)?;
    match AttrValue::from_bytes(ksubst) {
        AttrValue::String(keyword) => return Mode::from_option(keyword).map_err(malformed),
        AttrValue::Bytes(keyword) => {
            return Mode::from_option(String::from_utf8_lossy(keyword)).map_err(malformed)
        }
        _ => {}
    }

    let text = repository
        .get_attr_bytes(relative, "text", AttrCheckFlags::FILE_THEN_INDEX)
        .map_err(inspect_failed)?;
    match AttrValue::from_bytes(text) {
        AttrValue::False => Ok(Mode::Binary),
        _ => Ok(default_text_mode),
    }
}

impl ResourceTree for GitWorkspace {
    fn kind(&self, resource: &ResourceRef) -> Result<Option<ResourceKind>, TraversalError> {
        match symlink_metadata(resource.as_path()) {
            Ok(meta) if meta.is_dir() => Ok(Some(ResourceKind::Container)),
            Ok(_) => Ok(Some(ResourceKind::File)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(TraversalError::Read {
                source: err,
                path: resource.as_path().to_path_buf(),
            }),
        }
    }

    fn members(&self, container: &ResourceRef) -> Result<Vec<ResourceRef>, TraversalError> {
        let mut members = Vec::new();
        let walker = WalkBuilder::new(container.as_path())
            .max_depth(Some(1))
            .hidden(false)
            .filter_entry(|entry| entry.file_name() != ".git")
            .sort_by_file_name(|lhs, rhs| lhs.cmp(rhs))
            .build();

        for entry in walker {
            let entry = entry.map_err(|err| TraversalError::List {
                source: GitError::Listing(err).into(),
                path: container.as_path().to_path_buf(),
            })?;

            // INVARIANT: Walker yields the container itself at depth zero.
            if entry.depth() == 0 {
                continue;
            }

            members.push(ResourceRef::new(entry.into_path()));
        }

        Ok(members)
    }

    fn connection(&self, resource: &ResourceRef) -> Option<ConnectionId> {
        self.connections
            .iter()
            .filter(|conn| resource.as_path().starts_with(&conn.workdir))
            .max_by_key(|conn| conn.workdir.components().count())
            .map(|conn| conn.id.clone())
    }

    fn resolve(&self, resource: &ResourceRef) -> Result<ResourceRef, TraversalError> {
        let path = resource.as_path();

        // INVARIANT: Only resolve parent of selected file, so selected symlinks stay symlinks.
        let resolved = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) if parent.as_os_str().is_empty() => {
                canonicalize(".").map(|parent| parent.join(name))
            }
            (Some(parent), Some(name)) => canonicalize(parent).map(|parent| parent.join(name)),
            _ => canonicalize(path),
        };

        match resolved {
            Ok(resolved) => Ok(ResourceRef::new(resolved)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(resource.clone()),
            Err(err) => Err(TraversalError::Read {
                source: err,
                path: path.to_path_buf(),
            }),
        }
    }
}

impl SyncSource for GitWorkspace {
    fn sync_info(&self, file: &FileHandle) -> Result<Option<SyncInfo>, ClassifyError> {
        let conn = self
            .find(file.connection())
            .ok_or_else(|| ClassifyError::UnknownConnection {
                path: file.path().to_path_buf(),
                connection: file.connection().to_string(),
            })?;

        let relative = conn.relative(file.path());
        let status = conn
            .repository
            .status_file(relative)
            .map_err(|err| ClassifyError::Status {
                source: GitError::Inspect(err).into(),
                path: file.path().to_path_buf(),
            })?;

        let Some(state) = sync_state(status) else {
            return Ok(None);
        };

        let mode = effective_mode(&conn.repository, relative, self.default_text_mode)?;
        debug!("{file} is {state:?} with mode {mode}");
        Ok(Some(SyncInfo::new(state, mode)))
    }
}

impl GitWorkspace {
    /// Record new modes of batch in `.gitattributes`, and stage it.
    ///
    /// Failures are reported as [`Status`] data. Failures of libgit2 itself
    /// carry the server error sub-code. Once written, every mode is read back
    /// through Git, so rules of other attributes files that take precedence
    /// over `.gitattributes` at the top of the work tree are reported as an
    /// error instead of passing silently.
    #[instrument(skip(self, batch), level = "debug")]
    pub fn apply(&self, batch: &ProviderBatch) -> Status {
        let Some(conn) = self.find(&batch.connection) else {
            return Status::error(format!("{} is not an open repository", batch.connection));
        };

        let by_mode = batch.by_mode();
        for (mode, files) in &by_mode {
            debug!("{}: {} files become {}", batch.connection, files.len(), mode.long_display());
        }

        let drafter = AttributesDrafter::new(&conn.workdir);
        let written = drafter.edit(|rules| {
            for (mode, files) in &by_mode {
                rules.set_modes(files.iter().map(|file| (conn.relative(file.path()), *mode)));
            }
        });
        match written {
            Ok(true) => info!("updated {:?}", drafter.path().display()),
            Ok(false) => debug!("{:?} already up to date", drafter.path().display()),
            Err(error) => return Status::error(format!("{}: {error}", batch.connection)),
        }

        if let Err(error) = stage_attributes(&conn.repository) {
            return Status::server_error(format!("{}: {error}", batch.connection));
        }

        // INVARIANT: Read modes back through a fresh repository handle.
        //   - libgit2 caches attribute files per repository handle.
        let repository = match Repository::open(&conn.workdir) {
            Ok(repository) => repository,
            Err(error) => return Status::server_error(format!("{}: {error}", batch.connection)),
        };
        let overridden = batch
            .entries
            .iter()
            .filter_map(|(file, mode)| {
                let relative = conn.relative(file.path());
                match effective_mode(&repository, relative, self.default_text_mode) {
                    Ok(effective) if effective == *mode => None,
                    Ok(effective) => Some(format!("{} stays {effective}", relative.display())),
                    Err(error) => Some(format!("{} ({error})", relative.display())),
                }
            })
            .collect::<Vec<_>>();
        if !overridden.is_empty() {
            warn!("{} files in {} kept their mode", overridden.len(), batch.connection);
            return Status::error(format!(
                "{}: other gitattributes rules take precedence, {}",
                batch.connection,
                overridden.join(", ")
            ));
        }

        if batch.text_conversions.is_empty() {
            return Status::ok(format!(
                "{}: changed mode of {} files",
                batch.connection,
                batch.len()
            ));
        }

        warn!(
            "{} files in {} converted to text",
            batch.text_conversions.len(),
            batch.connection
        );
        let converted = batch
            .text_conversions
            .iter()
            .map(|file| conn.relative(file.path()).display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Status::warning(format!(
            "{}: changed mode of {} files, renormalise line endings of {converted}",
            batch.connection,
            batch.len()
        ))
    }
}

impl BatchApplier for GitWorkspace {
    fn apply_batch(&mut self, batch: &ProviderBatch) -> Status {
        self.apply(batch)
    }
}

fn stage_attributes(repository: &Repository) -> Result<(), git2::Error> {
    let mut index = repository.index()?;
    index.add_path(Path::new(".gitattributes"))?;
    index.write()
}

/// Map status flags of a file onto its sync state.
///
/// Return `None` for untracked and ignored files.
fn sync_state(status: GitStatus) -> Option<SyncState> {
    let modified = GitStatus::INDEX_MODIFIED
        | GitStatus::INDEX_RENAMED
        | GitStatus::INDEX_TYPECHANGE
        | GitStatus::WT_MODIFIED
        | GitStatus::WT_RENAMED
        | GitStatus::WT_TYPECHANGE
        | GitStatus::CONFLICTED;

    if status.intersects(GitStatus::INDEX_DELETED | GitStatus::WT_DELETED) {
        Some(SyncState::Deleted)
    } else if status.contains(GitStatus::INDEX_NEW) {
        Some(SyncState::Added)
    } else if status.intersects(modified) {
        Some(SyncState::Modified)
    } else if status.is_empty() {
        Some(SyncState::Clean)
    } else {
        None
    }
}

/// Git provider error types.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// Path does not belong to any repository.
    #[error("failed to find repository containing {:?}", path.display())]
    Discover {
        #[source]
        source: git2::Error,
        path: PathBuf,
    },

    /// Repository has no work tree to apply modes to.
    #[error("repository at {:?} has no work tree", gitdir.display())]
    Bare { gitdir: PathBuf },

    /// Work tree path cannot be resolved.
    #[error("failed to resolve work tree path {:?}", path.display())]
    Canonicalize {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Libgit2 cannot report on a file.
    #[error("libgit2 failed to inspect file")]
    Inspect(#[source] git2::Error),

    /// Directory entries cannot be listed.
    #[error("failed to list directory entries")]
    Listing(#[source] ignore::Error),
}

/// Friendly result alias :3
pub type Result<T, E = GitError> = std::result::Result<T, E>;
