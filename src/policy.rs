// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Graduated inclusion policy.
//!
//! Changing the mode of a file is not equally disruptive for every class of
//! file. A file that was never committed can be changed freely. A clean
//! committed file forces a server side change. A committed file with local
//! edits forces a server side change on top of uncommitted work. Thus,
//! inclusion is graduated:
//!
//! - [`Classification::Added`] files are always included.
//! - [`Classification::Unchanged`] files are included on opt-in.
//! - [`Classification::Changed`] files are included on opt-in, and only if
//!   unchanged files were opted into as well.
//!
//! The change set does not enforce any of this by itself. The policy simply
//! rewrites exclusion flags, so it can be re-applied whenever the caller
//! flips an opt-in without classifying anything again.

use crate::changeset::{ChangeSet, Classification};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Opt-ins for the graduated inclusion policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InclusionPolicy {
    /// Include clean committed files.
    #[serde(default)]
    pub include_unchanged: bool,

    /// Include committed files with local edits.
    #[serde(default)]
    pub include_changed: bool,
}

impl InclusionPolicy {
    /// Construct new inclusion policy.
    pub fn new(include_unchanged: bool, include_changed: bool) -> Self {
        Self {
            include_unchanged,
            include_changed,
        }
    }

    /// Check if policy admits a classification.
    pub fn admits(&self, classification: Classification) -> bool {
        match classification {
            Classification::Added => true,
            Classification::Unchanged => self.include_unchanged,
            Classification::Changed => self.include_unchanged && self.include_changed,
            Classification::Skip => false,
        }
    }

    /// Rewrite exclusion flag of every record in change set.
    ///
    /// Overwrites any exclusion made by hand before.
    #[instrument(skip(change_set), level = "debug")]
    pub fn apply(&self, change_set: &mut ChangeSet) {
        change_set.for_each_mut(|record| record.excluded = !self.admits(record.classification));
        debug!(
            "{} actionable records after policy",
            change_set.actionable_records().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        changeset::FileChangeRecord,
        mode::Mode,
        resource::{ConnectionId, FileHandle},
    };
    use simple_test_case::test_case;

    #[test_case(false, false, vec![Classification::Added]; "nothing opted in")]
    #[test_case(true, false, vec![Classification::Added, Classification::Unchanged]; "unchanged")]
    #[test_case(false, true, vec![Classification::Added]; "changed without unchanged")]
    #[test_case(
        true,
        true,
        vec![Classification::Added, Classification::Changed, Classification::Unchanged];
        "everything"
    )]
    #[test]
    fn graduated_admission(unchanged: bool, changed: bool, expect: Vec<Classification>) {
        let policy = InclusionPolicy::new(unchanged, changed);
        let admitted = Classification::ALL
            .into_iter()
            .filter(|class| policy.admits(*class))
            .collect::<Vec<_>>();
        pretty_assertions::assert_eq!(admitted, expect);
    }

    #[test]
    fn policy_can_be_reapplied() {
        let record = |path: &str, classification| {
            FileChangeRecord::new(
                FileHandle::new(path, ConnectionId::new("x")),
                classification,
                Mode::Text,
                Mode::Binary,
            )
        };
        let mut change_set = ChangeSet::build([
            record("a", Classification::Added),
            record("b", Classification::Changed),
            record("c", Classification::Unchanged),
        ]);

        InclusionPolicy::new(true, true).apply(&mut change_set);
        pretty_assertions::assert_eq!(change_set.actionable_records().len(), 3);

        InclusionPolicy::default().apply(&mut change_set);
        let actionable = change_set
            .actionable_records()
            .into_iter()
            .map(|record| record.file.to_string())
            .collect::<Vec<_>>();
        pretty_assertions::assert_eq!(actionable, vec!["a"]);
    }
}
