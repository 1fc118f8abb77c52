//! Identity keys: characters, casters, and semantic effects.
//!
//! All three serialize as plain strings so they can be used as JSON object keys in the
//! settings document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KeyParseError;

/// Stable roster member id. Display names are editable and never used as keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CharacterId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Resource-bearing source on one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CasterSource {
    /// A spellbook, identified by its blueprint id.
    Spellbook(Uuid),
    /// The character's innate abilities.
    Innate,
}

impl fmt::Display for CasterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spellbook(id) => write!(f, "spellbook:{id}"),
            Self::Innate => f.write_str("innate"),
        }
    }
}

impl FromStr for CasterSource {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "innate" {
            return Ok(Self::Innate);
        }
        s.strip_prefix("spellbook:")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(Self::Spellbook)
            .ok_or_else(|| KeyParseError::UnknownSource(s.to_string()))
    }
}

/// (character, source) pair. Text form: `<character>|<source>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CasterKey {
    pub character: CharacterId,
    pub source: CasterSource,
}

impl CasterKey {
    pub fn new(character: CharacterId, source: CasterSource) -> Self {
        Self { character, source }
    }
}

impl fmt::Display for CasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.character, self.source)
    }
}

impl FromStr for CasterKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Character ids are host strings and may contain '|'; the source never does.
        let (character, source) = s
            .rsplit_once('|')
            .ok_or_else(|| KeyParseError::MissingSeparator(s.to_string()))?;
        Ok(Self {
            character: CharacterId::new(character),
            source: source.parse()?,
        })
    }
}

impl From<CasterKey> for String {
    fn from(key: CasterKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for CasterKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Identity of a semantic effect: the sorted set of buff blueprints an ability applies.
/// Two abilities applying the same buffs share one key regardless of their names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EffectKey {
    buffs: Vec<Uuid>,
}

impl EffectKey {
    /// Returns None when no buff is applied; such abilities are not cataloged.
    pub fn from_buffs<I>(buffs: I) -> Option<Self>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut buffs: Vec<Uuid> = buffs.into_iter().collect();
        if buffs.is_empty() {
            return None;
        }
        buffs.sort_unstable();
        buffs.dedup();
        Some(Self { buffs })
    }

    pub fn buffs(&self) -> &[Uuid] {
        &self.buffs
    }

    pub fn contains(&self, buff: &Uuid) -> bool {
        self.buffs.binary_search(buff).is_ok()
    }
}

impl fmt::Display for EffectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.buffs.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl FromStr for EffectKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ids = s
            .split('+')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                Uuid::parse_str(part.trim()).map_err(|_| KeyParseError::BadBuffId(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_buffs(ids).ok_or(KeyParseError::EmptyEffect)
    }
}

impl From<EffectKey> for String {
    fn from(key: EffectKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for EffectKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
