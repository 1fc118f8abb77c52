//! Per-session settings document: which members want which buffs, and per-caster limits.
//!
//! Stored as `bubblebuff-<session>.json` with PascalCase keys. Missing or unreadable files
//! load as an empty document. Version 0 documents keyed characters by display name and are
//! migrated to stable ids; records whose names no longer resolve are quarantined under
//! `Unmigrated` and retried on later loads.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::roster::Character;
use crate::engine::buff::{BubbleBuff, BuffGroup, HideReason, NO_CAP};
use crate::engine::keys::{CasterKey, CharacterId, EffectKey};
use crate::error::{MigrationError, PersistError};

pub const CURRENT_VERSION: u32 = 1;

pub fn settings_path(dir: impl AsRef<Path>, session_id: &str) -> PathBuf {
    dir.as_ref().join(format!("bubblebuff-{session_id}.json"))
}

fn no_cap() -> i32 {
    NO_CAP
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SavedCasterState {
    #[serde(default)]
    pub banned: bool,
    #[serde(default = "no_cap")]
    pub cap: i32,
    #[serde(default)]
    pub share_transmutation: bool,
    #[serde(default)]
    pub powerful_change: bool,
}

impl Default for SavedCasterState {
    fn default() -> Self {
        Self {
            banned: false,
            cap: NO_CAP,
            share_transmutation: false,
            powerful_change: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SavedBuffState {
    #[serde(default)]
    pub blacklisted: bool,
    #[serde(default, alias = "InGroup")]
    pub group: BuffGroup,
    #[serde(default)]
    pub wanted: BTreeSet<CharacterId>,
    #[serde(default)]
    pub casters: BTreeMap<CasterKey, SavedCasterState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SavedBufferState {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub buffs: BTreeMap<EffectKey, SavedBuffState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unmigrated: BTreeMap<EffectKey, SavedBuffState>,
}

impl Default for SavedBufferState {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            buffs: BTreeMap::new(),
            unmigrated: BTreeMap::new(),
        }
    }
}

/// Outcome of [SavedBufferState::migrate].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    pub recovered: usize,
    pub quarantined: Vec<(EffectKey, MigrationError)>,
}

/// Display name to id lookup over every character the session knows about.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    by_name: HashMap<String, CharacterId>,
}

impl NameIndex {
    /// First character with a given name wins.
    pub fn from_characters<'a, I>(characters: I) -> Self
    where
        I: IntoIterator<Item = &'a Character>,
    {
        let mut by_name = HashMap::new();
        for character in characters {
            by_name
                .entry(character.name.clone())
                .or_insert_with(|| character.id.clone());
        }
        Self { by_name }
    }

    pub fn resolve(&self, name: &str) -> Result<CharacterId, MigrationError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| MigrationError::UnresolvedName {
                name: name.to_string(),
            })
    }
}

impl SavedBufferState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ok(None) when no file exists.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Option<Self>, PersistError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path).map_err(|source| PersistError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let state = serde_json::from_str(&raw).map_err(|source| PersistError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(state))
    }

    /// Never fails: a missing or corrupt document yields an empty one.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(Some(state)) => {
                debug!(path = %path.display(), records = state.buffs.len(), "loaded saved state");
                state
            }
            Ok(None) => {
                debug!(path = %path.display(), "no saved state; starting empty");
                Self::default()
            }
            Err(error) => {
                warn!(%error, "saved state unreadable; starting empty");
                Self::default()
            }
        }
    }

    /// Writes the whole document, creating the parent directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(PersistError::Serialize)?;
        fs::write(path, json).map_err(|source| PersistError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn needs_migration(&self) -> bool {
        self.version < CURRENT_VERSION || !self.unmigrated.is_empty()
    }

    /// Rewrites legacy name keys to ids. Each record migrates on its own; failures are
    /// quarantined rather than dropped. Previously quarantined records are retried.
    pub fn migrate(&mut self, names: &NameIndex) -> MigrationReport {
        let mut report = MigrationReport::default();
        if self.version < CURRENT_VERSION {
            let legacy = std::mem::take(&mut self.buffs);
            for (key, record) in legacy {
                match migrate_record(&record, names) {
                    Ok(migrated) => {
                        self.buffs.insert(key, migrated);
                        report.migrated += 1;
                    }
                    Err(error) => {
                        warn!(effect = %key, %error, "quarantining legacy record");
                        report.quarantined.push((key.clone(), error));
                        self.unmigrated.insert(key, record);
                    }
                }
            }
            self.version = CURRENT_VERSION;
        } else if !self.unmigrated.is_empty() {
            let pending = std::mem::take(&mut self.unmigrated);
            for (key, record) in pending {
                match migrate_record(&record, names) {
                    Ok(migrated) => {
                        // A record written since the upgrade is newer than the legacy one.
                        self.buffs.entry(key).or_insert(migrated);
                        report.recovered += 1;
                    }
                    Err(_) => {
                        self.unmigrated.insert(key, record);
                    }
                }
            }
        }
        info!(
            migrated = report.migrated,
            recovered = report.recovered,
            quarantined = report.quarantined.len(),
            pending = self.unmigrated.len(),
            "saved state migration finished"
        );
        report
    }

    /// Writes live buff state into the document. Records with no wanted members and no
    /// blacklist are removed; new records are only created when something is requested or
    /// blacklisted.
    pub fn reconcile(&mut self, buffs: &[BubbleBuff], roster: &[CharacterId]) {
        for buff in buffs {
            let blacklisted = buff.hide_because(HideReason::Blacklisted);
            if let Some(record) = self.buffs.get_mut(&buff.key) {
                buff.write_to_save(record, roster);
                if record.wanted.is_empty() && !blacklisted {
                    self.buffs.remove(&buff.key);
                }
            } else if buff.requested() > 0 || blacklisted {
                let mut record = SavedBuffState::default();
                buff.write_to_save(&mut record, roster);
                self.buffs.insert(buff.key.clone(), record);
            }
        }
        self.version = CURRENT_VERSION;
    }

    pub fn record(&self, key: &EffectKey) -> Option<&SavedBuffState> {
        self.buffs.get(key)
    }
}

fn migrate_record(
    record: &SavedBuffState,
    names: &NameIndex,
) -> Result<SavedBuffState, MigrationError> {
    let wanted = record
        .wanted
        .iter()
        .map(|name| names.resolve(name.as_str()))
        .collect::<Result<BTreeSet<_>, _>>()?;
    let casters = record
        .casters
        .iter()
        .map(|(key, state)| {
            let character = names.resolve(key.character.as_str())?;
            Ok((CasterKey::new(character, key.source), state.clone()))
        })
        .collect::<Result<BTreeMap<_, _>, MigrationError>>()?;
    Ok(SavedBuffState {
        blacklisted: record.blacklisted,
        group: record.group,
        wanted,
        casters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::keys::CasterSource;
    use uuid::Uuid;

    fn effect(n: u128) -> EffectKey {
        EffectKey::from_buffs([Uuid::from_u128(n)]).unwrap()
    }

    #[test]
    fn caster_state_defaults_to_no_cap() {
        let state: SavedCasterState = serde_json::from_str("{}").unwrap();
        assert_eq!(state.cap, NO_CAP);
        let doc: SavedBufferState = serde_json::from_str("{}").unwrap();
        assert_eq!(doc.version, 0);
        assert!(doc.needs_migration());
    }

    #[test]
    fn pascal_case_layout_and_legacy_group_name() {
        let json = r#"{"Blacklisted":true,"InGroup":"Long","Wanted":["a"],"Casters":{}}"#;
        let record: SavedBuffState = serde_json::from_str(json).unwrap();
        assert!(record.blacklisted);
        assert_eq!(record.group, BuffGroup::Normal);

        let out = serde_json::to_value(&record).unwrap();
        assert!(out.get("Wanted").is_some());
        assert!(out.get("Group").is_some());
    }

    #[test]
    fn unmigrated_is_omitted_when_empty() {
        let doc = SavedBufferState::new();
        let out = serde_json::to_value(&doc).unwrap();
        assert!(out.get("Unmigrated").is_none());
        assert_eq!(out["Version"], 1);
    }

    #[test]
    fn migration_quarantines_only_unresolvable_records() {
        let names = NameIndex::from_characters(&[
            Character::new("id-seelah", "Seelah"),
            Character::new("id-ember", "Ember"),
        ]);
        let mut doc = SavedBufferState {
            version: 0,
            ..SavedBufferState::default()
        };
        let mut good = SavedBuffState::default();
        good.wanted.insert(CharacterId::new("Seelah"));
        good.casters.insert(
            CasterKey::new(CharacterId::new("Ember"), CasterSource::Innate),
            SavedCasterState {
                cap: 2,
                ..SavedCasterState::default()
            },
        );
        let mut bad = SavedBuffState::default();
        bad.wanted.insert(CharacterId::new("Lann"));
        doc.buffs.insert(effect(1), good);
        doc.buffs.insert(effect(2), bad.clone());

        let report = doc.migrate(&names);
        assert_eq!(report.migrated, 1);
        assert_eq!(report.quarantined.len(), 1);
        assert_eq!(doc.version, CURRENT_VERSION);

        let migrated = doc.record(&effect(1)).unwrap();
        assert!(migrated.wanted.contains(&CharacterId::new("id-seelah")));
        let caster = CasterKey::new(CharacterId::new("id-ember"), CasterSource::Innate);
        assert_eq!(migrated.casters.get(&caster).map(|c| c.cap), Some(2));
        assert_eq!(doc.unmigrated.get(&effect(2)), Some(&bad));

        let names = NameIndex::from_characters(&[Character::new("id-lann", "Lann")]);
        let report = doc.migrate(&names);
        assert_eq!(report.recovered, 1);
        assert!(doc.unmigrated.is_empty());
        assert!(doc
            .record(&effect(2))
            .unwrap()
            .wanted
            .contains(&CharacterId::new("id-lann")));
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(dir.path(), "s1");
        fs::write(&path, "{ not json").unwrap();
        assert!(SavedBufferState::try_load(&path).is_err());
        let doc = SavedBufferState::load(&path);
        assert!(doc.buffs.is_empty());
        assert_eq!(doc.version, CURRENT_VERSION);
    }
}
