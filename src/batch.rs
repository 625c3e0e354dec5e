// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-connection batching.
//!
//! Partition actionable change records by owning connection, so each
//! connection can receive all of its mode changes in one request.

use crate::{
    changeset::FileChangeRecord,
    mode::Mode,
    resource::{ConnectionId, FileHandle},
};

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// One connection's worth of file to mode changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderBatch {
    pub connection: ConnectionId,
    pub entries: BTreeMap<FileHandle, Mode>,

    /// Entries moving from binary to a text mode.
    pub text_conversions: BTreeSet<FileHandle>,
}

impl ProviderBatch {
    /// Construct new empty batch.
    pub fn new(connection: ConnectionId) -> Self {
        Self {
            connection,
            entries: BTreeMap::new(),
            text_conversions: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Group entries by target mode.
    pub fn by_mode(&self) -> BTreeMap<Mode, Vec<&FileHandle>> {
        let mut groups: BTreeMap<Mode, Vec<&FileHandle>> = BTreeMap::new();
        for (file, mode) in &self.entries {
            groups.entry(*mode).or_default().push(file);
        }

        groups
    }
}

/// Group actionable records by owning connection.
///
/// Records that are not actionable are ignored. Order of returned batches
/// carries no meaning.
#[instrument(skip(records), level = "debug")]
pub fn group_by_connection<'a>(records: impl IntoIterator<Item = &'a FileChangeRecord>) -> Vec<ProviderBatch> {
    let mut batches: BTreeMap<ConnectionId, ProviderBatch> = BTreeMap::new();
    for record in records {
        if !record.is_actionable() {
            debug!("ignore non-actionable record {}", record.file);
            continue;
        }

        let connection = record.file.connection();
        let batch = batches
            .entry(connection.clone())
            .or_insert_with(|| ProviderBatch::new(connection.clone()));
        batch.entries.insert(record.file.clone(), record.proposed_mode);
        if record.needs_text_conversion() {
            batch.text_conversions.insert(record.file.clone());
        }
    }

    debug!("grouped records into {} batches", batches.len());
    batches.into_values().collect()
}
