// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Keyword substitution modes.
//!
//! Every tracked file carries a __keyword substitution mode__ that tells the
//! version control system how to treat its content during transfer. Binary
//! files are transferred untouched, while text files get their line endings
//! translated and may have RCS keywords like `$Id$` expanded.
//!
//! The set of modes is closed. Modes are written in their classic option
//! form, e.g., "-kb", although the leading dash may be dropped when parsing,
//! e.g., "kb" is accepted as well. An empty option string names the default
//! mode, "-kkv".

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Keyword substitution mode of a tracked file.
///
/// Variant order is the canonical display order. It carries no other
/// meaning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    /// Binary content, no keyword expansion or line ending translation.
    Binary,

    /// ASCII text without keyword expansion.
    Text,

    /// ASCII text with keyword expansion.
    #[default]
    TextWithExpansion,

    /// ASCII text with keyword expansion including the locker name.
    TextWithExpansionLocker,

    /// ASCII text that only keeps keyword names.
    KeywordsOnly,

    /// ASCII text that only keeps keyword values.
    ValuesOnly,
}

impl Mode {
    /// All modes in canonical display order.
    pub const ALL: [Mode; 6] = [
        Mode::Binary,
        Mode::Text,
        Mode::TextWithExpansion,
        Mode::TextWithExpansionLocker,
        Mode::KeywordsOnly,
        Mode::ValuesOnly,
    ];

    /// Parse mode from option string.
    ///
    /// # Errors
    ///
    /// - Return [`ModeError::Unknown`] if option does not name a mode.
    pub fn from_option(option: impl AsRef<str>) -> Result<Self> {
        let raw = option.as_ref().trim();
        if raw.is_empty() {
            return Ok(Self::TextWithExpansion);
        }

        let keyword = raw
            .strip_prefix("-k")
            .or_else(|| raw.strip_prefix('k'))
            .ok_or_else(|| ModeError::Unknown(raw.to_string()))?;

        match keyword {
            "b" => Ok(Self::Binary),
            "o" => Ok(Self::Text),
            "kv" => Ok(Self::TextWithExpansion),
            "kvl" => Ok(Self::TextWithExpansionLocker),
            "k" => Ok(Self::KeywordsOnly),
            "v" => Ok(Self::ValuesOnly),
            _ => Err(ModeError::Unknown(raw.to_string())),
        }
    }

    /// Option string of mode, e.g., "-kb".
    pub fn option(&self) -> &'static str {
        match self {
            Self::Binary => "-kb",
            Self::Text => "-ko",
            Self::TextWithExpansion => "-kkv",
            Self::TextWithExpansionLocker => "-kkvl",
            Self::KeywordsOnly => "-kk",
            Self::ValuesOnly => "-kv",
        }
    }

    /// Option string without leading dash, e.g., "kb".
    pub fn keyword(&self) -> &'static str {
        &self.option()[1..]
    }

    /// Mode requires no data translation during transfer.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary)
    }

    /// Short human readable description.
    pub fn short_display(&self) -> &'static str {
        match self {
            Self::Binary => "Binary",
            Self::Text => "ASCII",
            Self::TextWithExpansion => "ASCII -kkv",
            Self::TextWithExpansionLocker => "ASCII -kkvl",
            Self::KeywordsOnly => "ASCII -kk",
            Self::ValuesOnly => "ASCII -kv",
        }
    }

    /// Long human readable description.
    pub fn long_display(&self) -> &'static str {
        match self {
            Self::Binary => "Binary (-kb)",
            Self::Text => "ASCII without keyword substitution (-ko)",
            Self::TextWithExpansion => "ASCII with keyword expansion (-kkv)",
            Self::TextWithExpansionLocker => "ASCII with keyword expansion and locker (-kkvl)",
            Self::KeywordsOnly => "ASCII with keyword names only (-kk)",
            Self::ValuesOnly => "ASCII with keyword values only (-kv)",
        }
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::from_option(data)
    }
}

impl TryFrom<String> for Mode {
    type Error = ModeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_option(value)
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.keyword().to_string()
    }
}

impl Display for Mode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.option())
    }
}

/// Mode parsing error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    /// Option string does not name a keyword substitution mode.
    #[error("unknown keyword substitution mode {0:?}")]
    Unknown(String),
}

/// Friendly result alias :3
type Result<T, E = ModeError> = std::result::Result<T, E>;
