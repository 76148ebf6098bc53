//! Shared types for the announcement toolchain.
//!
//! This crate holds the data model both halves of the workspace agree on:
//! voice keys, the static voice catalog, and the table of engine binaries
//! per platform. It has no I/O of its own; provisioning and synthesis crates
//! depend on it for lookups so the two subsystems never disagree about which
//! files a voice needs.

pub mod catalog;
pub mod platform;

pub use catalog::{AssetEntry, AssetFile, AssetKind, Catalog, VoiceSpec};
pub use platform::{EngineBinary, Platform};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Speaker gender as exposed by the voice catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }

    /// Capitalised label used in human-facing listings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Female => "Female",
            Self::Male => "Male",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ParseGenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Ok(Self::Female),
            "male" | "m" => Ok(Self::Male),
            _ => Err(ParseGenderError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown gender label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown gender: {0}")]
pub struct ParseGenderError(pub String);

/// Identifies one synthesis voice: a language code plus a gender.
///
/// Language codes are stored lowercased so `"EN"` and `"en"` address the
/// same catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoiceKey {
    pub language: String,
    pub gender: Gender,
}

impl VoiceKey {
    pub fn new(language: impl AsRef<str>, gender: Gender) -> Self {
        Self {
            language: language.as_ref().trim().to_ascii_lowercase(),
            gender,
        }
    }
}

impl fmt::Display for VoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language, self.gender)
    }
}
