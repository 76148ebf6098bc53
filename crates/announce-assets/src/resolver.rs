//! Read-only probe of which catalog voices are usable in a directory.

use announce_types::{AssetEntry, AssetKind, Catalog, VoiceKey, VoiceSpec};
use std::path::{Path, PathBuf};

/// A voice with at least one absent file, and exactly which ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingVoice {
    pub voice: VoiceSpec,
    pub files: Vec<AssetEntry>,
}

impl MissingVoice {
    pub fn is_missing(&self, kind: AssetKind) -> bool {
        self.files.iter().any(|f| f.kind == kind)
    }
}

/// Snapshot of voice availability. Never cached: every call re-probes disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    pub voices_dir: PathBuf,
    pub present: Vec<VoiceSpec>,
    pub missing: Vec<MissingVoice>,
}

impl ResolutionReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn is_present(&self, key: &VoiceKey) -> bool {
        self.present.iter().any(|v| &v.key == key)
    }

    /// Absent files across all voices, in catalog order.
    pub fn missing_entries(&self) -> Vec<AssetEntry> {
        self.missing
            .iter()
            .flat_map(|m| m.files.iter().cloned())
            .collect()
    }

    pub fn missing_file_count(&self) -> usize {
        self.missing.iter().map(|m| m.files.len()).sum()
    }
}

/// An asset counts as present only if it is a regular, non-empty file.
pub fn is_asset_present(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Classifies every catalog voice as present or missing under `voices_dir`.
pub fn resolve(catalog: &Catalog, voices_dir: &Path) -> ResolutionReport {
    let mut present = Vec::new();
    let mut missing = Vec::new();

    for voice in catalog.voices() {
        let absent: Vec<AssetEntry> = voice
            .entries()
            .into_iter()
            .filter(|entry| !is_asset_present(&entry.path_in(voices_dir)))
            .collect();

        if absent.is_empty() {
            present.push(voice.clone());
        } else {
            missing.push(MissingVoice {
                voice: voice.clone(),
                files: absent,
            });
        }
    }

    ResolutionReport {
        voices_dir: voices_dir.to_path_buf(),
        present,
        missing,
    }
}
