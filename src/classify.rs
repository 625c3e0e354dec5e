// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File classification.
//!
//! Turn walked file handles into [`FileChangeRecord`]s. Each file's tracked
//! sync metadata is read through a [`SyncSource`], its sync state is mapped
//! onto a [`Classification`], and the mode it should end up with is either
//! taken from an explicit target mode, or inferred from the
//! [`ModePatterns`] table.
//!
//! Untracked files produce no record at all. They are invisible to every
//! later stage, which is different from a tracked file marked for deletion
//! that is recorded as [`Classification::Skip`].

pub mod pattern;

use crate::{
    changeset::{Classification, FileChangeRecord},
    mode::{Mode, ModeError},
    resource::FileHandle,
};

pub use pattern::{ModePattern, ModePatterns};

use std::path::PathBuf;
use tracing::{debug, instrument, warn};

/// Sync state of a tracked file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Scheduled for addition, never committed.
    Added,

    /// Committed with local modifications.
    Modified,

    /// Committed without local modifications.
    Clean,

    /// Scheduled for deletion.
    Deleted,
}

impl From<SyncState> for Classification {
    fn from(state: SyncState) -> Self {
        match state {
            SyncState::Added => Classification::Added,
            SyncState::Modified => Classification::Changed,
            SyncState::Clean => Classification::Unchanged,
            SyncState::Deleted => Classification::Skip,
        }
    }
}

/// Tracked sync metadata of a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncInfo {
    pub state: SyncState,
    pub mode: Mode,
}

impl SyncInfo {
    /// Construct new sync metadata.
    pub fn new(state: SyncState, mode: Mode) -> Self {
        Self { state, mode }
    }
}

/// Source of tracked sync metadata.
pub trait SyncSource {
    /// Sync metadata of file, or `None` if file is not tracked.
    ///
    /// # Errors
    ///
    /// - Return [`ClassifyError`] if metadata cannot be obtained.
    fn sync_info(&self, file: &FileHandle) -> Result<Option<SyncInfo>>;
}

/// Result of classifying many files.
#[derive(Debug, Default)]
pub struct ClassifyReport {
    /// Records of tracked files, in input order.
    pub records: Vec<FileChangeRecord>,

    /// Files whose metadata could not be read.
    pub errors: Vec<ClassifyError>,
}

/// Classify files against their repository.
#[derive(Debug)]
pub struct FileClassifier<'a, S>
where
    S: SyncSource,
{
    source: &'a S,
    patterns: &'a ModePatterns,
}

impl<'a, S> FileClassifier<'a, S>
where
    S: SyncSource,
{
    /// Construct new file classifier.
    pub fn new(source: &'a S, patterns: &'a ModePatterns) -> Self {
        Self { source, patterns }
    }

    /// Classify a single file.
    ///
    /// Records are created even when proposed mode equals current mode, so
    /// callers can still display them.
    ///
    /// # Errors
    ///
    /// - Return [`ClassifyError`] if sync metadata cannot be obtained.
    pub fn classify(&self, file: &FileHandle, target: Option<Mode>) -> Result<Option<FileChangeRecord>> {
        let Some(info) = self.source.sync_info(file)? else {
            debug!("{file} is not tracked");
            return Ok(None);
        };

        let proposed = target.unwrap_or_else(|| self.patterns.infer(file.path()));
        Ok(Some(FileChangeRecord::new(
            file.clone(),
            info.state.into(),
            info.mode,
            proposed,
        )))
    }

    /// Classify many files, collecting failures instead of aborting.
    #[instrument(skip(self, files), level = "debug")]
    pub fn classify_all<'f>(
        &self,
        files: impl IntoIterator<Item = &'f FileHandle>,
        target: Option<Mode>,
    ) -> ClassifyReport {
        let mut report = ClassifyReport::default();
        for file in files {
            match self.classify(file, target) {
                Ok(Some(record)) => report.records.push(record),
                Ok(None) => {}
                Err(error) => {
                    warn!("cannot classify {file}: {error}");
                    report.errors.push(error);
                }
            }
        }

        report
    }
}

/// Classification error types.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// Recorded mode of file is not a known mode.
    #[error("file {:?} carries a malformed mode", path.display())]
    MalformedMode {
        #[source]
        source: ModeError,
        path: PathBuf,
    },

    /// Repository status of file cannot be determined.
    #[error("failed to query status of {:?}", path.display())]
    Status {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        path: PathBuf,
    },

    /// File belongs to a connection that is not open.
    #[error("file {:?} belongs to unknown connection {connection}", path.display())]
    UnknownConnection { path: PathBuf, connection: String },
}

/// Friendly result alias :3
pub type Result<T, E = ClassifyError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resource::ConnectionId, testing::MemoryWorkspace};
    use simple_test_case::test_case;

    fn workspace() -> MemoryWorkspace {
        let mut workspace = MemoryWorkspace::new();
        workspace
            .with_connection("x", "proj")
            .added("proj/new.png", Mode::TextWithExpansion)
            .modified("proj/edit.c", Mode::Binary)
            .clean("proj/clean.txt", Mode::TextWithExpansion)
            .deleted("proj/gone.c", Mode::TextWithExpansion)
            .untracked("proj/scratch.c")
            .fail_sync("proj/broken.c");
        workspace
    }

    fn handle(path: &str) -> FileHandle {
        FileHandle::new(path, ConnectionId::new("x"))
    }

    #[test_case(SyncState::Added, Classification::Added; "added")]
    #[test_case(SyncState::Modified, Classification::Changed; "modified")]
    #[test_case(SyncState::Clean, Classification::Unchanged; "clean")]
    #[test_case(SyncState::Deleted, Classification::Skip; "deleted")]
    #[test]
    fn sync_state_maps_to_classification(state: SyncState, expect: Classification) {
        pretty_assertions::assert_eq!(Classification::from(state), expect);
    }

    #[test]
    fn classify_infers_proposed_mode() -> anyhow::Result<()> {
        let workspace = workspace();
        let patterns = ModePatterns::builtin(Mode::TextWithExpansion, Mode::Binary);
        let classifier = FileClassifier::new(&workspace, &patterns);

        let record = classifier.classify(&handle("proj/new.png"), None)?;
        let expect = FileChangeRecord::new(
            handle("proj/new.png"),
            Classification::Added,
            Mode::TextWithExpansion,
            Mode::Binary,
        );
        pretty_assertions::assert_eq!(record, Some(expect));

        let record = classifier.classify(&handle("proj/edit.c"), None)?;
        pretty_assertions::assert_eq!(
            record.map(|record| (record.classification, record.proposed_mode)),
            Some((Classification::Changed, Mode::TextWithExpansion))
        );

        Ok(())
    }

    #[test]
    fn classify_prefers_target_mode() -> anyhow::Result<()> {
        let workspace = workspace();
        let patterns = ModePatterns::builtin(Mode::TextWithExpansion, Mode::Binary);
        let classifier = FileClassifier::new(&workspace, &patterns);

        let record = classifier.classify(&handle("proj/clean.txt"), Some(Mode::Text))?;
        pretty_assertions::assert_eq!(record.map(|record| record.proposed_mode), Some(Mode::Text));

        Ok(())
    }

    #[test]
    fn unchanged_mode_is_still_recorded() -> anyhow::Result<()> {
        let workspace = workspace();
        let patterns = ModePatterns::builtin(Mode::TextWithExpansion, Mode::Binary);
        let classifier = FileClassifier::new(&workspace, &patterns);

        let record = classifier
            .classify(&handle("proj/clean.txt"), None)?
            .expect("clean file is tracked");
        pretty_assertions::assert_eq!(record.proposed_mode, record.current_mode);
        assert!(!record.is_actionable());

        Ok(())
    }

    #[test]
    fn untracked_file_has_no_record() -> anyhow::Result<()> {
        let workspace = workspace();
        let patterns = ModePatterns::new(Mode::Binary);
        let classifier = FileClassifier::new(&workspace, &patterns);
        pretty_assertions::assert_eq!(classifier.classify(&handle("proj/scratch.c"), None)?, None);
        Ok(())
    }

    #[test]
    fn classify_all_collects_errors() {
        let workspace = workspace();
        let patterns = ModePatterns::new(Mode::Binary);
        let classifier = FileClassifier::new(&workspace, &patterns);
        let files = [
            handle("proj/broken.c"),
            handle("proj/new.png"),
            handle("proj/scratch.c"),
            handle("proj/gone.c"),
        ];

        let report = classifier.classify_all(&files, Some(Mode::Binary));
        let classes = report
            .records
            .iter()
            .map(|record| record.classification)
            .collect::<Vec<_>>();
        pretty_assertions::assert_eq!(classes, vec![Classification::Added, Classification::Skip]);
        pretty_assertions::assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn classification_is_idempotent() {
        let workspace = workspace();
        let patterns = ModePatterns::builtin(Mode::TextWithExpansion, Mode::Binary);
        let classifier = FileClassifier::new(&workspace, &patterns);
        let files = [handle("proj/new.png"), handle("proj/edit.c"), handle("proj/clean.txt")];

        let first = classifier.classify_all(&files, None).records;
        let second = classifier.classify_all(&files, None).records;
        pretty_assertions::assert_eq!(first, second);
    }
}
