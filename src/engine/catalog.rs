//! Builds the buff catalog from roster facts: one [BubbleBuff] per distinct effect, with
//! every caster able to provide it registered in build order.

use std::collections::HashMap;

use tracing::{debug, info, trace, warn};

use crate::data::roster::{
    AbilityBlueprint, ApplyBuff, Character, DurationRate, InnateAbility, SpellSchool, Spellbook,
    SpellbookKind, TargetAnchor,
};
use crate::data::saved_state::SavedBufferState;
use crate::engine::buff::{BubbleBuff, Category, Provider};
use crate::engine::credit::{CreditPool, CreditPools, PoolId, UNLIMITED_CREDITS};
use crate::engine::keys::{CasterKey, CasterSource, CharacterId, EffectKey};
use crate::error::CatalogError;

pub const MAX_VARIANT_DEPTH: usize = 8;

/// Buffs lasting under this many seconds, or measured in rounds, are "short".
pub const SHORT_DURATION_SECONDS: u32 = 60;

/// A character, spellbook level, or ability skipped during the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub character: CharacterId,
    pub context: String,
    pub error: CatalogError,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    buffs: Vec<BubbleBuff>,
    index: HashMap<EffectKey, usize>,
    pools: CreditPools,
    failures: Vec<BuildFailure>,
    roster: Vec<CharacterId>,
}

impl Catalog {
    pub fn build(roster: &[Character]) -> Self {
        let mut builder = CatalogBuilder {
            catalog: Catalog {
                roster: roster.iter().map(|c| c.id.clone()).collect(),
                ..Catalog::default()
            },
        };
        for (index, character) in roster.iter().enumerate() {
            builder.add_character(index, character);
        }
        let catalog = builder.catalog;
        info!(
            members = catalog.roster.len(),
            buffs = catalog.buffs.len(),
            pools = catalog.pools.len(),
            failures = catalog.failures.len(),
            "catalog built"
        );
        catalog
    }

    pub fn buffs(&self) -> &[BubbleBuff] {
        &self.buffs
    }

    pub fn get(&self, key: &EffectKey) -> Option<&BubbleBuff> {
        self.index.get(key).and_then(|&i| self.buffs.get(i))
    }

    pub fn buff_mut(&mut self, key: &EffectKey) -> Option<&mut BubbleBuff> {
        let index = *self.index.get(key)?;
        self.buffs.get_mut(index)
    }

    pub(crate) fn buff_and_pools_mut(
        &mut self,
        key: &EffectKey,
    ) -> Option<(&mut BubbleBuff, &CreditPools)> {
        let index = *self.index.get(key)?;
        let buff = self.buffs.get_mut(index)?;
        Some((buff, &self.pools))
    }

    /// Case-insensitive lookup by display name; first in build order wins.
    pub fn find_by_name(&self, name: &str) -> Option<&BubbleBuff> {
        self.buffs
            .iter()
            .find(|buff| buff.name.eq_ignore_ascii_case(name))
    }

    pub fn pools(&self) -> &CreditPools {
        &self.pools
    }

    pub fn failures(&self) -> &[BuildFailure] {
        &self.failures
    }

    pub fn roster(&self) -> &[CharacterId] {
        &self.roster
    }

    pub fn len(&self) -> usize {
        self.buffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffs.is_empty()
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [BubbleBuff], &mut CreditPools) {
        (&mut self.buffs, &mut self.pools)
    }

    /// Applies persisted preferences to every buff that has a saved record.
    pub(crate) fn hydrate(&mut self, saved: &SavedBufferState) {
        let mut applied = 0usize;
        for buff in &mut self.buffs {
            if let Some(record) = saved.buffs.get(&buff.key) {
                buff.initialise_from_save(record, &self.roster);
                applied += 1;
            }
        }
        debug!(applied, "hydrated catalog from saved state");
    }
}

/// Where a provider's credits come from while registering one ability tree.
struct Source<'a> {
    character: &'a Character,
    owner_index: usize,
    caster: CasterKey,
    source_name: String,
    pool: PoolId,
    category: Category,
}

struct CatalogBuilder {
    catalog: Catalog,
}

impl CatalogBuilder {
    fn add_character(&mut self, index: usize, character: &Character) {
        debug!(character = %character.name, id = %character.id, "cataloguing character");
        for book in &character.spellbooks {
            match book.kind {
                SpellbookKind::Spontaneous => self.add_spontaneous(index, character, book),
                SpellbookKind::Prepared => self.add_prepared(index, character, book),
            }
        }
        for ability in &character.abilities {
            if let Err(error) = self.add_innate(index, character, ability) {
                self.fail(character, &ability.blueprint.name, error);
            }
        }
    }

    fn add_spontaneous(&mut self, index: usize, character: &Character, book: &Spellbook) {
        let caster = CasterKey::new(character.id.clone(), CasterSource::Spellbook(book.id));
        for level in book.levels.iter().filter(|level| level.level > 0) {
            if level.per_day < 0 {
                let error = CatalogError::NegativeAllotment {
                    book: book.name.clone(),
                    level: level.level,
                    per_day: level.per_day,
                };
                self.fail(character, &format!("{} level {}", book.name, level.level), error);
                continue;
            }
            let pool = self.catalog.pools.add(CreditPool::new(
                format!("{} / {} L{}", character.name, book.name, level.level),
                level.per_day,
            ));
            let source = Source {
                character,
                owner_index: index,
                caster: caster.clone(),
                source_name: book.name.clone(),
                pool,
                category: Category::Spell,
            };
            for spell in level.known.iter().chain(level.custom.iter()) {
                self.register_checked(&source, spell);
            }
        }
    }

    fn add_prepared(&mut self, index: usize, character: &Character, book: &Spellbook) {
        let caster = CasterKey::new(character.id.clone(), CasterSource::Spellbook(book.id));
        for slot in &book.memorized {
            let pool = self.catalog.pools.add(CreditPool::new(
                format!(
                    "{} / {} L{} {}",
                    character.name, book.name, slot.level, slot.spell.name
                ),
                1,
            ));
            let source = Source {
                character,
                owner_index: index,
                caster: caster.clone(),
                source_name: book.name.clone(),
                pool,
                category: Category::Spell,
            };
            self.register_checked(&source, &slot.spell);
        }
    }

    fn add_innate(
        &mut self,
        index: usize,
        character: &Character,
        ability: &InnateAbility,
    ) -> Result<(), CatalogError> {
        if let Some(item) = &ability.source_item {
            if item.spends_charges {
                trace!(ability = %ability.blueprint.name, item = %item.name, "skipping charge-backed ability");
                return Ok(());
            }
        }
        check_depth(&ability.blueprint)?;
        let capacity = match ability.resource_max {
            Some(max) if max < 0 => {
                return Err(CatalogError::NegativeResource {
                    ability: ability.blueprint.name.clone(),
                    max,
                })
            }
            Some(max) => max,
            None => UNLIMITED_CREDITS,
        };
        let (category, source_name) = match &ability.source_item {
            Some(item) => (Category::Item, item.name.clone()),
            None => (Category::Ability, "innate".to_string()),
        };
        let pool = self.catalog.pools.add(CreditPool::new(
            format!("{} / {}", character.name, ability.blueprint.name),
            capacity,
        ));
        let source = Source {
            character,
            owner_index: index,
            caster: CasterKey::new(character.id.clone(), CasterSource::Innate),
            source_name,
            pool,
            category,
        };
        self.register(&source, &ability.blueprint, None, ability.blueprint.target);
        Ok(())
    }

    fn register_checked(&mut self, source: &Source<'_>, spell: &AbilityBlueprint) {
        match check_depth(spell) {
            Ok(()) => self.register(source, spell, None, spell.target),
            Err(error) => self.fail(source.character, &spell.name, error),
        }
    }

    /// Variants register as separate providers sharing the parent's pool and targeting. A
    /// caster already providing the effect gains `source.pool` as another credit instead.
    fn register(
        &mut self,
        source: &Source<'_>,
        spell: &AbilityBlueprint,
        base: Option<&str>,
        anchor: TargetAnchor,
    ) {
        if !spell.variants.is_empty() {
            for variant in &spell.variants {
                self.register(source, variant, Some(&spell.name), anchor);
            }
            return;
        }
        let (applied, is_mass) = spell.effective_buffs();
        let Some(key) = EffectKey::from_buffs(applied.iter().map(|apply| apply.buff)) else {
            trace!(spell = %spell.name, "applies no buff; not cataloged");
            return;
        };
        let provider = Provider::new(
            source.caster.clone(),
            source.owner_index,
            source.character.name.clone(),
            source.source_name.clone(),
            spell.id,
            spell.name.clone(),
            base.map(str::to_string),
            source.pool,
            anchor == TargetAnchor::Owner,
            spell.school == SpellSchool::Transmutation,
            source.character.capabilities,
        );
        if let Some(buff) = self.catalog.buff_mut(&key) {
            buff.add_provider(provider);
            return;
        }
        let mut buff = BubbleBuff::new(
            key.clone(),
            spell.name.clone(),
            spell.id,
            source.category,
            is_mass,
            is_short(&applied),
            self.catalog.roster.len(),
        );
        buff.add_provider(provider);
        self.catalog.index.insert(key, self.catalog.buffs.len());
        self.catalog.buffs.push(buff);
    }

    fn fail(&mut self, character: &Character, context: &str, error: CatalogError) {
        warn!(character = %character.name, context, %error, "skipping during catalog build");
        self.catalog.failures.push(BuildFailure {
            character: character.id.clone(),
            context: context.to_string(),
            error,
        });
    }
}

fn check_depth(spell: &AbilityBlueprint) -> Result<(), CatalogError> {
    if spell.variant_depth() > MAX_VARIANT_DEPTH {
        return Err(CatalogError::VariantDepth {
            ability: spell.name.clone(),
            limit: MAX_VARIANT_DEPTH,
        });
    }
    Ok(())
}

/// Short unless some applied buff is permanent, lasts a minute or more, or is measured in
/// anything coarser than rounds.
pub fn is_short(applied: &[&ApplyBuff]) -> bool {
    !applied.iter().any(|apply| {
        apply.permanent
            || apply
                .duration_seconds
                .is_some_and(|secs| secs >= SHORT_DURATION_SECONDS)
            || apply.rate != DurationRate::Rounds
    })
}
