#![allow(dead_code)]

use bubblebuff::data::roster::{
    AbilityBlueprint, ApplyBuff, Character, InnateAbility, SpellSchool, Spellbook, TargetAnchor,
};
use uuid::Uuid;

pub const BLESS_BUFF: u128 = 0x1_0001;
pub const SHIELD_BUFF: u128 = 0x1_0002;
pub const HASTE_BUFF: u128 = 0x1_0003;
pub const ARMOR_BUFF: u128 = 0x1_0004;
pub const ENLARGE_BUFF: u128 = 0x1_0005;

pub fn uuid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub fn bless() -> AbilityBlueprint {
    AbilityBlueprint::new(uuid(0x10), "Bless").applying(ApplyBuff::minutes(uuid(BLESS_BUFF)))
}

pub fn shield_of_faith() -> AbilityBlueprint {
    AbilityBlueprint::new(uuid(0x11), "Shield of Faith")
        .applying(ApplyBuff::minutes(uuid(SHIELD_BUFF)))
}

pub fn mass_haste() -> AbilityBlueprint {
    AbilityBlueprint::new(uuid(0x12), "Haste")
        .applying(ApplyBuff::rounds(uuid(HASTE_BUFF)))
        .around()
}

pub fn mage_armor() -> AbilityBlueprint {
    AbilityBlueprint::new(uuid(0x13), "Mage Armor").applying(ApplyBuff::minutes(uuid(ARMOR_BUFF)))
}

/// Self-only transmutation, the kind Share Transmutation can hand to an ally.
pub fn enlarge_self() -> AbilityBlueprint {
    AbilityBlueprint::new(uuid(0x14), "Enlarge Self")
        .applying(ApplyBuff::minutes(uuid(ENLARGE_BUFF)))
        .targeting(TargetAnchor::Owner)
        .school(SpellSchool::Transmutation)
}

/// Spontaneous caster with one level-1 list.
pub fn oracle(id: &str, name: &str, book: u128, per_day: i32, known: Vec<AbilityBlueprint>) -> Character {
    Character::new(id, name)
        .with_spellbook(Spellbook::spontaneous(uuid(book), "Oracle").with_level(1, per_day, known))
}

pub fn fighter(id: &str, name: &str) -> Character {
    Character::new(id, name)
}

pub fn innate(id: &str, name: &str, ability: AbilityBlueprint) -> Character {
    Character::new(id, name).with_ability(InnateAbility::new(ability))
}
