// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Attribute rule handling.
//!
//! Utilities to manage the `ksubst` attribute rules recorded in the
//! top-level `.gitattributes` file of a work tree.
//!
//! # Why Git Attributes?
//!
//! Git has no notion of a keyword substitution mode that travels with each
//! tracked file. What it does have is __gitattributes__, a per-path key
//! value store that is versioned right along with the files it describes.
//! Thus, the mode of a file is recorded as a `ksubst` attribute, e.g.,
//! `ksubst=kb`. Git itself only understands the accompanying `text` or
//! `-text` attribute, which controls line ending normalisation, so every
//! managed rule carries one of those as well.
//!
//! # Managed Rules
//!
//! Rules written by this module always anchor a single path to the top of
//! the work tree, and only ever list the `ksubst` attribute followed by the
//! `text` attribute:
//!
//! ```text
//! /assets/logo.png ksubst=kb -text
//! /src/main.c ksubst=kkv text
//! ```
//!
//! Every other line is __foreign__. Foreign lines are kept verbatim and in
//! place, no matter what they contain.
//!
//! # See Also
//!
//! - [Man page gitattributes](https://git-scm.com/docs/gitattributes)

use crate::mode::Mode;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

/// Name of attribute holding keyword substitution mode.
pub const KSUBST_ATTR: &str = "ksubst";

/// Manage attribute rules in a `.gitattributes` file.
#[derive(Clone, Debug)]
pub struct AttributesDrafter {
    attributes_path: PathBuf,
}

impl AttributesDrafter {
    /// Construct new attribute rule drafter for a work tree.
    ///
    /// The attributes file is only created once an edit changes something.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            attributes_path: workdir.into().join(".gitattributes"),
        }
    }

    pub fn path(&self) -> &Path {
        self.attributes_path.as_path()
    }

    /// Edit attribute rules.
    ///
    /// Read current rules into [`AttributesEdit`] instance, and directly
    /// edit them before writing the results back into the attributes file.
    /// Return whether anything had to be written.
    ///
    /// # Errors
    ///
    /// - Return [`AttributesError::Read`] if attributes file cannot be read.
    /// - Return [`AttributesError::Write`] if rules cannot be written to
    ///   attributes file.
    pub fn edit<E>(&self, editor: E) -> Result<bool>
    where
        E: FnOnce(&mut AttributesEdit),
    {
        let mut rules = AttributesEdit::from(self.read()?.as_str());
        editor(&mut rules);

        if !rules.changed {
            return Ok(false);
        }

        write(&self.attributes_path, rules.to_string().as_bytes()).map_err(|err| {
            AttributesError::Write {
                source: err,
                attributes_path: self.attributes_path.clone(),
            }
        })?;

        Ok(true)
    }

    fn read(&self) -> Result<String> {
        match read_to_string(&self.attributes_path) {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(AttributesError::Read {
                source: err,
                attributes_path: self.attributes_path.clone(),
            }),
        }
    }
}

/// Attribute rule editor.
///
/// # Invariant
///
/// - At most one managed rule per path.
/// - Foreign lines are never touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AttributesEdit {
    lines: Vec<AttributesLine>,
    changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttributesLine {
    Foreign(String),
    Managed { pattern: String, mode: Mode },
}

impl AttributesEdit {
    /// Set mode of a path relative to the work tree.
    ///
    /// A changed rule moves to the end of the file, so no earlier rule can
    /// override it.
    pub fn set_mode(&mut self, path: impl AsRef<Path>, mode: Mode) {
        let pattern = anchored_pattern(path.as_ref());
        if self.mode_of_pattern(&pattern) == Some(mode) {
            return;
        }

        self.lines.retain(|line| {
            !matches!(line, AttributesLine::Managed { pattern: existing, .. } if *existing == pattern)
        });
        self.lines.push(AttributesLine::Managed { pattern, mode });
        self.changed = true;
    }

    /// Set modes of a listing of paths.
    pub fn set_modes<'a>(&mut self, entries: impl IntoIterator<Item = (&'a Path, Mode)>) {
        for (path, mode) in entries {
            self.set_mode(path, mode);
        }
    }

    fn mode_of_pattern(&self, pattern: &str) -> Option<Mode> {
        self.lines.iter().rev().find_map(|line| match line {
            AttributesLine::Managed { pattern: existing, mode } if existing == pattern => Some(*mode),
            _ => None,
        })
    }
}

impl Display for AttributesEdit {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        for line in &self.lines {
            match line {
                AttributesLine::Foreign(line) => writeln!(fmt, "{line}")?,
                AttributesLine::Managed { pattern, mode } => {
                    let text = if mode.is_binary() { "-text" } else { "text" };
                    writeln!(fmt, "{pattern} {KSUBST_ATTR}={} {text}", mode.keyword())?;
                }
            }
        }

        Ok(())
    }
}

impl From<&str> for AttributesEdit {
    fn from(content: &str) -> Self {
        let lines = content.lines().map(parse_line).collect::<Vec<_>>();

        Self {
            lines,
            changed: false,
        }
    }
}

impl From<String> for AttributesEdit {
    fn from(content: String) -> Self {
        Self::from(content.as_str())
    }
}

fn parse_line(line: &str) -> AttributesLine {
    let foreign = || AttributesLine::Foreign(line.to_string());

    let mut tokens = line.split_whitespace();
    let (Some(pattern), Some(ksubst), Some(text), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return foreign();
    };

    // INVARIANT: Only lines exactly like the ones we write are managed.
    let Some(mode) = ksubst
        .strip_prefix(KSUBST_ATTR)
        .and_then(|rest| rest.strip_prefix('='))
        .filter(|keyword| !keyword.is_empty())
        .and_then(|keyword| Mode::from_option(keyword).ok())
    else {
        return foreign();
    };

    let expect_text = if mode.is_binary() { "-text" } else { "text" };
    if !pattern.starts_with('/') || text != expect_text {
        return foreign();
    }

    AttributesLine::Managed {
        pattern: pattern.to_string(),
        mode,
    }
}

/// Build pattern matching exactly one path relative to work tree.
///
/// Wildcard characters and whitespace are escaped, so the pattern never
/// matches anything but the path itself.
pub fn anchored_pattern(path: &Path) -> String {
    let mut pattern = String::new();
    for component in path.components() {
        let Component::Normal(name) = component else {
            continue;
        };

        pattern.push('/');
        for ch in name.to_string_lossy().chars() {
            match ch {
                ch if ch.is_whitespace() => pattern.push_str("[[:space:]]"),
                '*' | '?' | '[' | '\\' => {
                    pattern.push('\\');
                    pattern.push(ch);
                }
                ch => pattern.push(ch),
            }
        }
    }

    pattern
}

/// Attribute rule management error types.
#[derive(Debug, thiserror::Error)]
pub enum AttributesError {
    /// Attributes file cannot be read from.
    #[error("failed to read from attributes file at {:?}", attributes_path.display())]
    Read {
        #[source]
        source: std::io::Error,
        attributes_path: PathBuf,
    },

    /// Attributes file cannot be written to.
    #[error("failed to write to attributes file at {:?}", attributes_path.display())]
    Write {
        #[source]
        source: std::io::Error,
        attributes_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = AttributesError> = std::result::Result<T, E>;
