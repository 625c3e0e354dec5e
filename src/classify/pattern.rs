// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File name pattern to mode table.
//!
//! When no explicit target mode is requested, the mode a file _should_ have
//! is inferred from its name. The table holds three kinds of patterns:
//!
//! 1. Exact names, e.g., "Makefile".
//! 2. Extension patterns, e.g., "*.png" or "*.tar.gz".
//! 3. General globs, e.g., "docs/**/*.svg" or "README*".
//!
//! Extensions match regardless of ASCII case, e.g., "*.png" covers
//! "LOGO.PNG". The most specific matching pattern wins. Exact names beat
//! extensions, extensions beat globs. Longer extensions beat shorter ones, and globs
//! with more literal characters beat vaguer ones. Remaining ties go to the
//! rule added last, so user supplied rules override built-in rules.
//! Unmatched names get the fallback mode.

use crate::mode::Mode;

use glob::{MatchOptions, Pattern};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

const BUILTIN_BINARY_EXTENSIONS: &[&str] = &[
    "7z", "bmp", "class", "dll", "doc", "docx", "exe", "gif", "gz", "ico", "jar", "jpeg", "jpg",
    "mp3", "mp4", "o", "pdf", "png", "so", "tar", "tgz", "war", "xls", "xlsx", "zip",
];

const BUILTIN_TEXT_EXTENSIONS: &[&str] = &[
    "c", "cpp", "css", "h", "htm", "html", "java", "js", "json", "md", "properties", "py", "rs",
    "sh", "sql", "svg", "toml", "txt", "xml", "yaml", "yml",
];

const BUILTIN_TEXT_NAMES: &[&str] = &[
    ".cvsignore", ".gitattributes", ".gitignore", "ChangeLog", "Makefile", "README",
];

/// A single file name pattern.
#[derive(Clone, Debug)]
pub enum ModePattern {
    /// Exact file name.
    Name(String),

    /// File name extension without the leading dot.
    Extension(String),

    /// Anything else, matched against the file name. Globs containing a path
    /// separator are matched against trailing portions of the path instead.
    Glob(Pattern),
}

impl ModePattern {
    fn matches(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();

        match self {
            Self::Name(expect) => name == expect.as_str(),
            // INVARIANT: Extensions compare ASCII case-insensitively, stem must not be empty.
            Self::Extension(ext) => name
                .len()
                .checked_sub(ext.len() + 1)
                .filter(|stem| *stem > 0)
                .and_then(|stem| name.get(stem..))
                .and_then(|suffix| suffix.strip_prefix('.'))
                .is_some_and(|suffix| suffix.eq_ignore_ascii_case(ext)),
            Self::Glob(pattern) if pattern.as_str().contains('/') => {
                let options = MatchOptions {
                    require_literal_separator: true,
                    ..MatchOptions::new()
                };
                let components = path.components().collect::<Vec<_>>();
                (0..components.len()).any(|start| {
                    let tail = components[start..].iter().collect::<PathBuf>();
                    pattern.matches_path_with(&tail, options)
                })
            }
            Self::Glob(pattern) => pattern.matches(name.as_ref()),
        }
    }

    /// Rank of pattern, higher is more specific.
    fn specificity(&self) -> (u8, usize) {
        match self {
            Self::Name(name) => (2, name.len()),
            Self::Extension(ext) => (1, ext.len()),
            Self::Glob(pattern) => (
                0,
                pattern
                    .as_str()
                    .chars()
                    .filter(|ch| !matches!(ch, '*' | '?' | '[' | ']' | '!'))
                    .count(),
            ),
        }
    }
}

impl FromStr for ModePattern {
    type Err = glob::PatternError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let is_wild = |text: &str| text.contains(['*', '?', '[']);

        if !is_wild(data) && !data.contains('/') {
            return Ok(Self::Name(data.to_string()));
        }

        if let Some(ext) = data.strip_prefix("*.") {
            if !ext.is_empty() && !is_wild(ext) && !ext.contains('/') {
                return Ok(Self::Extension(ext.to_string()));
            }
        }

        Pattern::new(data).map(Self::Glob)
    }
}

impl Display for ModePattern {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Name(name) => fmt.write_str(name),
            Self::Extension(ext) => write!(fmt, "*.{ext}"),
            Self::Glob(pattern) => fmt.write_str(pattern.as_str()),
        }
    }
}

/// Deterministic file name to mode table.
#[derive(Clone, Debug)]
pub struct ModePatterns {
    rules: Vec<(ModePattern, Mode)>,
    fallback: Mode,
}

impl ModePatterns {
    /// Construct empty table with fallback mode.
    pub fn new(fallback: Mode) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Construct table pre-filled with common binary and text file types.
    ///
    /// Text types get `text_mode`, anything unmatched gets `fallback`.
    pub fn builtin(text_mode: Mode, fallback: Mode) -> Self {
        let mut patterns = Self::new(fallback);
        for ext in BUILTIN_BINARY_EXTENSIONS {
            patterns.insert(ModePattern::Extension(ext.to_string()), Mode::Binary);
        }
        for ext in BUILTIN_TEXT_EXTENSIONS {
            patterns.insert(ModePattern::Extension(ext.to_string()), text_mode);
        }
        for name in BUILTIN_TEXT_NAMES {
            patterns.insert(ModePattern::Name(name.to_string()), text_mode);
        }

        patterns
    }

    /// Insert a rule.
    pub fn insert(&mut self, pattern: ModePattern, mode: Mode) {
        self.rules.push((pattern, mode));
    }

    /// Parse and insert a rule.
    ///
    /// # Errors
    ///
    /// - Return [`glob::PatternError`] if pattern is not a valid glob.
    pub fn insert_str(&mut self, pattern: &str, mode: Mode) -> Result<(), glob::PatternError> {
        self.insert(pattern.parse()?, mode);
        Ok(())
    }

    /// Infer mode of file from its path.
    pub fn infer(&self, path: impl AsRef<Path>) -> Mode {
        let path = path.as_ref();
        self.rules
            .iter()
            .filter(|(pattern, _)| pattern.matches(path))
            // INVARIANT: max_by_key keeps the last maximum, so later rules win ties.
            .max_by_key(|(pattern, _)| pattern.specificity())
            .map(|(_, mode)| *mode)
            .unwrap_or(self.fallback)
    }
}
