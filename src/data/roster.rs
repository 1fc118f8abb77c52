//! Roster facts supplied by the host: characters, spellbooks, innate abilities, and the
//! ability blueprints they can cast. The engine reads these and never mutates them.
//!
//! Fixtures are JSON or YAML (picked by file extension).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::keys::CharacterId;
use crate::error::RosterError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterFile {
    /// Party members in roster order.
    pub party: Vec<Character>,
    /// Characters known to the session but not currently in the party.
    #[serde(default)]
    pub reserve: Vec<Character>,
}

impl RosterFile {
    /// Party first, then reserve. Used to resolve legacy names during migration.
    pub fn known_characters(&self) -> impl Iterator<Item = &Character> {
        self.party.iter().chain(self.reserve.iter())
    }

    pub fn all_characters(&self) -> Vec<Character> {
        self.known_characters().cloned().collect()
    }
}

/// Load a roster fixture. YAML when the extension is `.yaml`/`.yml`, JSON otherwise.
pub fn load_roster(path: impl AsRef<Path>) -> Result<RosterFile, RosterError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| RosterError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&raw).map_err(|source| RosterError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_json::from_str(&raw).map_err(|source| RosterError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub spellbooks: Vec<Spellbook>,
    #[serde(default)]
    pub abilities: Vec<InnateAbility>,
    #[serde(default)]
    pub capabilities: CasterCapabilities,
    /// Buff blueprints this character cannot receive.
    #[serde(default)]
    pub immune_to: Vec<Uuid>,
}

impl Character {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(id),
            name: name.into(),
            spellbooks: Vec::new(),
            abilities: Vec::new(),
            capabilities: CasterCapabilities::default(),
            immune_to: Vec::new(),
        }
    }

    pub fn with_spellbook(mut self, book: Spellbook) -> Self {
        self.spellbooks.push(book);
        self
    }

    pub fn with_ability(mut self, ability: InnateAbility) -> Self {
        self.abilities.push(ability);
        self
    }

    pub fn with_capabilities(mut self, capabilities: CasterCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn immune_to(mut self, buff: Uuid) -> Self {
        self.immune_to.push(buff);
        self
    }
}

/// Feats that unlock per-caster toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasterCapabilities {
    #[serde(default)]
    pub share_transmutation: bool,
    #[serde(default)]
    pub powerful_change: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellbookKind {
    Spontaneous,
    Prepared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spellbook {
    pub id: Uuid,
    pub name: String,
    pub kind: SpellbookKind,
    /// Known spells and daily allotment per level (spontaneous books).
    #[serde(default)]
    pub levels: Vec<SpellLevel>,
    /// Individual prepared slots (prepared books).
    #[serde(default)]
    pub memorized: Vec<MemorizedSlot>,
}

impl Spellbook {
    pub fn spontaneous(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: SpellbookKind::Spontaneous,
            levels: Vec::new(),
            memorized: Vec::new(),
        }
    }

    pub fn prepared(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            kind: SpellbookKind::Prepared,
            ..Self::spontaneous(id, name)
        }
    }

    pub fn with_level(mut self, level: u8, per_day: i32, known: Vec<AbilityBlueprint>) -> Self {
        self.levels.push(SpellLevel {
            level,
            per_day,
            known,
            custom: Vec::new(),
        });
        self
    }

    pub fn with_memorized(mut self, level: u8, spell: AbilityBlueprint) -> Self {
        self.memorized.push(MemorizedSlot { level, spell });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellLevel {
    pub level: u8,
    pub per_day: i32,
    #[serde(default)]
    pub known: Vec<AbilityBlueprint>,
    /// Spells added to the book outside normal progression (scrolls, mythic picks).
    #[serde(default)]
    pub custom: Vec<AbilityBlueprint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorizedSlot {
    pub level: u8,
    pub spell: AbilityBlueprint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnateAbility {
    pub blueprint: AbilityBlueprint,
    /// Uses per rest. None means unlimited.
    #[serde(default)]
    pub resource_max: Option<i32>,
    #[serde(default)]
    pub source_item: Option<SourceItem>,
}

impl InnateAbility {
    pub fn new(blueprint: AbilityBlueprint) -> Self {
        Self {
            blueprint,
            resource_max: None,
            source_item: None,
        }
    }

    pub fn with_resource(mut self, max: i32) -> Self {
        self.resource_max = Some(max);
        self
    }

    pub fn from_item(mut self, name: impl Into<String>, spends_charges: bool) -> Self {
        self.source_item = Some(SourceItem {
            name: name.into(),
            spends_charges,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub name: String,
    #[serde(default)]
    pub spends_charges: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAnchor {
    #[default]
    Unit,
    Owner,
    Point,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellSchool {
    #[default]
    None,
    Abjuration,
    Conjuration,
    Divination,
    Enchantment,
    Evocation,
    Illusion,
    Necromancy,
    Transmutation,
    Universalist,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationRate {
    #[default]
    Rounds,
    Minutes,
    TenMinutes,
    Hours,
    Days,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyBuff {
    pub buff: Uuid,
    #[serde(default)]
    pub permanent: bool,
    /// Fixed duration. When set the buff is long if it lasts a minute or more.
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub rate: DurationRate,
}

impl ApplyBuff {
    pub fn new(buff: Uuid, rate: DurationRate) -> Self {
        Self {
            buff,
            permanent: false,
            duration_seconds: None,
            rate,
        }
    }

    pub fn rounds(buff: Uuid) -> Self {
        Self::new(buff, DurationRate::Rounds)
    }

    pub fn minutes(buff: Uuid) -> Self {
        Self::new(buff, DurationRate::Minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectAction {
    ApplyBuff(ApplyBuff),
    Conditional {
        #[serde(default)]
        then: Vec<EffectAction>,
        #[serde(default)]
        otherwise: Vec<EffectAction>,
    },
    Other {
        #[serde(default)]
        name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityBlueprint {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub target: TargetAnchor,
    #[serde(default)]
    pub school: SpellSchool,
    /// Area effect: one cast covers every unit around the target.
    #[serde(default)]
    pub targets_around: bool,
    #[serde(default)]
    pub actions: Vec<EffectAction>,
    /// Touch spells deliver their effect through a second ability.
    #[serde(default)]
    pub sticky_touch: Option<Box<AbilityBlueprint>>,
    #[serde(default)]
    pub variants: Vec<AbilityBlueprint>,
}

impl AbilityBlueprint {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            target: TargetAnchor::Unit,
            school: SpellSchool::None,
            targets_around: false,
            actions: Vec::new(),
            sticky_touch: None,
            variants: Vec::new(),
        }
    }

    pub fn applying(mut self, buff: ApplyBuff) -> Self {
        self.actions.push(EffectAction::ApplyBuff(buff));
        self
    }

    pub fn with_action(mut self, action: EffectAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn targeting(mut self, target: TargetAnchor) -> Self {
        self.target = target;
        self
    }

    pub fn school(mut self, school: SpellSchool) -> Self {
        self.school = school;
        self
    }

    pub fn around(mut self) -> Self {
        self.targets_around = true;
        self
    }

    pub fn touch(mut self, delivery: AbilityBlueprint) -> Self {
        self.sticky_touch = Some(Box::new(delivery));
        self
    }

    pub fn with_variant(mut self, variant: AbilityBlueprint) -> Self {
        self.variants.push(variant);
        self
    }

    /// Every ApplyBuff reachable through nested actions, in declaration order.
    pub fn direct_buffs(&self) -> Vec<&ApplyBuff> {
        let mut out = Vec::new();
        flatten(&self.actions, &mut out);
        out
    }

    /// Direct buffs, or the touch delivery's buffs when the ability applies none itself.
    /// Also reports whether the effect lands as an area.
    pub fn effective_buffs(&self) -> (Vec<&ApplyBuff>, bool) {
        let direct = self.direct_buffs();
        if !direct.is_empty() {
            return (direct, self.targets_around);
        }
        match &self.sticky_touch {
            Some(touch) => (
                touch.direct_buffs(),
                self.targets_around || touch.targets_around,
            ),
            None => (direct, self.targets_around),
        }
    }

    pub fn variant_depth(&self) -> usize {
        self.variants
            .iter()
            .map(|variant| 1 + variant.variant_depth())
            .max()
            .unwrap_or(0)
    }
}

fn flatten<'a>(actions: &'a [EffectAction], out: &mut Vec<&'a ApplyBuff>) {
    for action in actions {
        match action {
            EffectAction::ApplyBuff(apply) => out.push(apply),
            EffectAction::Conditional { then, otherwise } => {
                flatten(then, out);
                flatten(otherwise, out);
            }
            EffectAction::Other { .. } => {}
        }
    }
}
