// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that ksubst uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.

use crate::{
    classify::{ModePattern, ModePatterns},
    mode::Mode,
    policy::InclusionPolicy,
};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Mode definition layout.
///
/// A __mode definition__ tells ksubst which keyword substitution mode a file
/// should end up with, and which classes of file it may touch without asking.
///
/// # General Layout
///
/// A mode definition is composed of two basic parts: settings and patterns.
/// The settings section defines the fallback mode, the mode of text files
/// without any recorded mode, and the default inclusion policy. The pattern
/// section lists file name patterns along with the mode matching files
/// should get. Modes are written without their leading dash, e.g., "kb".
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ModeDefinition {
    /// Settings for mode inference.
    #[serde(default)]
    pub settings: ModeSettings,

    /// Listing of file name patterns.
    #[serde(rename = "pattern")]
    pub patterns: Option<Vec<PatternEntry>>,
}

impl ModeDefinition {
    /// Build mode inference table.
    ///
    /// User patterns come after builtin patterns, so they win over builtins
    /// of equal specificity.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Pattern`] if a pattern is not a valid glob.
    pub fn mode_patterns(&self) -> Result<ModePatterns> {
        let mut patterns = if self.settings.builtin_patterns {
            ModePatterns::builtin(self.settings.default_text_mode, self.settings.fallback)
        } else {
            ModePatterns::new(self.settings.fallback)
        };

        for entry in self.patterns.iter().flatten() {
            patterns.insert(entry.parse_pattern()?, entry.mode);
        }

        Ok(patterns)
    }

    /// Default inclusion policy.
    pub fn policy(&self) -> InclusionPolicy {
        InclusionPolicy::new(
            self.settings.include_unchanged,
            self.settings.include_changed,
        )
    }
}

impl FromStr for ModeDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let definition: ModeDefinition =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Reject malformed patterns before anything gets walked.
        for entry in definition.patterns.iter().flatten() {
            entry.parse_pattern()?;
        }

        Ok(definition)
    }
}

impl Display for ModeDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Mode inference settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModeSettings {
    /// Mode of files no pattern matches.
    pub fallback: Mode,

    /// Mode of text files, both for builtin text patterns and for files
    /// whose mode was never recorded.
    pub default_text_mode: Mode,

    /// Include clean committed files by default.
    pub include_unchanged: bool,

    /// Include committed files with local edits by default.
    pub include_changed: bool,

    /// Seed pattern table with common binary and text file types.
    pub builtin_patterns: bool,
}

impl Default for ModeSettings {
    fn default() -> Self {
        Self {
            fallback: Mode::Binary,
            default_text_mode: Mode::TextWithExpansion,
            include_unchanged: false,
            include_changed: false,
            builtin_patterns: true,
        }
    }
}

/// File name pattern listing.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PatternEntry {
    /// File name, extension, or glob pattern, e.g., "*.png".
    pub pattern: String,

    /// Mode of matching files.
    pub mode: Mode,
}

impl PatternEntry {
    /// Construct new pattern listing.
    pub fn new(pattern: impl Into<String>, mode: Mode) -> Self {
        Self {
            pattern: pattern.into(),
            mode,
        }
    }

    fn parse_pattern(&self) -> Result<ModePattern> {
        self.pattern.parse().map_err(|err| ConfigError::Pattern {
            source: err,
            pattern: self.pattern.clone(),
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Pattern is not a valid glob.
    #[error("invalid file pattern {pattern:?}")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
