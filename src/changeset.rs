// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Change set model.
//!
//! A __change set__ holds one [`FileChangeRecord`] per classified file. The
//! set is built once per scan, and then lives for the rest of the session.
//! Policy decisions mutate records in place through explicit setters, i.e.,
//! mode overrides and exclusions. Later stages only read from it.
//!
//! # Actionable Records
//!
//! A record is __actionable__ if and only if it is not excluded, its
//! proposed mode differs from its current mode, and it is not classified as
//! [`Classification::Skip`]. Only actionable records ever reach a provider.

use crate::{mode::Mode, resource::FileHandle};

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{debug, instrument, warn};

/// Relationship of a tracked file to its last committed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    /// Tracked but never committed.
    Added,

    /// Tracked, committed, and locally modified.
    Changed,

    /// Tracked, committed, and clean.
    Unchanged,

    /// Tracked but marked for deletion.
    Skip,
}

impl Classification {
    /// All classifications.
    pub const ALL: [Classification; 4] = [
        Classification::Added,
        Classification::Changed,
        Classification::Unchanged,
        Classification::Skip,
    ];

    /// Mask of every classification.
    pub fn all() -> BTreeSet<Classification> {
        Self::ALL.into_iter().collect()
    }
}

impl Display for Classification {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Added => "added",
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
            Self::Skip => "skip",
        };
        fmt.write_str(label)
    }
}

/// Desired versus current mode of a single file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChangeRecord {
    pub file: FileHandle,
    pub classification: Classification,
    pub current_mode: Mode,
    pub proposed_mode: Mode,
    pub excluded: bool,
}

impl FileChangeRecord {
    /// Construct new record that is not excluded.
    pub fn new(file: FileHandle, classification: Classification, current_mode: Mode, proposed_mode: Mode) -> Self {
        Self {
            file,
            classification,
            current_mode,
            proposed_mode,
            excluded: false,
        }
    }

    /// Check if record would cause a change when applied.
    pub fn is_actionable(&self) -> bool {
        !self.excluded
            && self.proposed_mode != self.current_mode
            && self.classification != Classification::Skip
    }

    /// Check if change moves file from binary to text.
    ///
    /// Providers must fix up line endings of such files before applying
    /// the new mode.
    pub fn needs_text_conversion(&self) -> bool {
        self.current_mode.is_binary() && !self.proposed_mode.is_binary()
    }
}

/// Ordered collection of change records keyed by file.
///
/// # Invariant
///
/// - No two records share a [`FileHandle`].
/// - Iteration follows insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    records: Vec<FileChangeRecord>,
    index: HashMap<FileHandle, usize>,
}

impl ChangeSet {
    /// Build change set from classified records.
    ///
    /// Duplicate records for the same file are dropped, first one wins.
    #[instrument(skip(records), level = "debug")]
    pub fn build(records: impl IntoIterator<Item = FileChangeRecord>) -> Self {
        let mut change_set = Self::default();
        for record in records {
            if change_set.index.contains_key(&record.file) {
                warn!("drop duplicate record for {}", record.file);
                continue;
            }

            change_set
                .index
                .insert(record.file.clone(), change_set.records.len());
            change_set.records.push(record);
        }

        debug!("built change set with {} records", change_set.records.len());
        change_set
    }

    /// Records whose classification is in mask, in insertion order.
    pub fn filter(&self, mask: &BTreeSet<Classification>) -> Vec<&FileChangeRecord> {
        self.records
            .iter()
            .filter(|record| mask.contains(&record.classification))
            .collect()
    }

    /// Exclude or include a record.
    ///
    /// # Errors
    ///
    /// - Return [`ChangeSetError::NotFound`] if file is not in change set.
    pub fn set_excluded(&mut self, file: &FileHandle, excluded: bool) -> Result<()> {
        self.get_mut(file)?.excluded = excluded;
        Ok(())
    }

    /// Override proposed mode of a record.
    ///
    /// # Errors
    ///
    /// - Return [`ChangeSetError::NotFound`] if file is not in change set.
    pub fn set_proposed_mode(&mut self, file: &FileHandle, mode: Mode) -> Result<()> {
        self.get_mut(file)?.proposed_mode = mode;
        Ok(())
    }

    /// Every actionable record, recomputed on each call.
    pub fn actionable_records(&self) -> Vec<&FileChangeRecord> {
        self.records
            .iter()
            .filter(|record| record.is_actionable())
            .collect()
    }

    /// Lookup record of file.
    pub fn get(&self, file: &FileHandle) -> Option<&FileChangeRecord> {
        self.index.get(file).map(|at| &self.records[*at])
    }

    /// Iterate over records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FileChangeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count records per classification.
    pub fn summary(&self) -> BTreeMap<Classification, usize> {
        let mut summary = BTreeMap::new();
        for record in &self.records {
            *summary.entry(record.classification).or_insert(0) += 1;
        }

        summary
    }

    /// Apply a mutation to every record.
    pub(crate) fn for_each_mut(&mut self, mut edit: impl FnMut(&mut FileChangeRecord)) {
        self.records.iter_mut().for_each(&mut edit);
    }

    fn get_mut(&mut self, file: &FileHandle) -> Result<&mut FileChangeRecord> {
        let at = *self
            .index
            .get(file)
            .ok_or_else(|| ChangeSetError::NotFound {
                path: file.path().to_path_buf(),
                connection: file.connection().to_string(),
            })?;

        Ok(&mut self.records[at])
    }
}

/// Change set error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChangeSetError {
    /// File is not part of change set.
    #[error("{:?} of connection {connection} is not part of the change set", path.display())]
    NotFound { path: PathBuf, connection: String },
}

/// Friendly result alias :3
type Result<T, E = ChangeSetError> = std::result::Result<T, E>;
