//! The per-effect aggregate: who can provide it, who wants it, and who got it this pass.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::roster::CasterCapabilities;
use crate::data::saved_state::SavedBuffState;
use crate::engine::credit::{CreditPool, CreditPools, PoolId};
use crate::engine::keys::{CasterKey, CharacterId, EffectKey};
use crate::error::EngineError;

/// Custom cap value meaning "no cap beyond the pool".
pub const NO_CAP: i32 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Spell,
    Ability,
    Item,
    Consumable,
}

/// Casting batch a buff belongs to. Legacy documents call the normal batch "Long".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuffGroup {
    #[default]
    #[serde(alias = "Long")]
    Normal,
    Important,
    Short,
}

impl std::str::FromStr for BuffGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" | "long" => Ok(Self::Normal),
            "important" => Ok(Self::Important),
            "short" => Ok(Self::Short),
            other => Err(format!("unknown buff group '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HideReason {
    Short,
    Blacklisted,
}

/// Per-member request state. `Removed` is an explicit opt-out that also keeps area casts
/// from counting the member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WantState {
    #[default]
    Unset,
    Wants,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub provider: usize,
    pub target: usize,
}

/// One caster-source able to deliver the buff. Every credit the caster can spend on this
/// effect (each memorized slot, each spell level that knows it) is merged into `pools`, so
/// a caster key appears at most once per aggregate.
#[derive(Debug, Clone)]
pub struct Provider {
    pub key: CasterKey,
    pub owner_index: usize,
    pub owner_name: String,
    /// Spellbook or item name; "innate" for bare abilities.
    pub source_name: String,
    pub spell_id: Uuid,
    pub spell_name: String,
    /// Parent ability when this provider is one variant of it.
    pub base_spell: Option<String>,
    pub pools: Vec<PoolId>,
    pub clamp: u32,
    pub self_only: bool,
    pub transmutation: bool,
    pub capabilities: CasterCapabilities,
    pub banned: bool,
    pub custom_cap: i32,
    pub share_transmutation: bool,
    pub powerful_change: bool,
    spent: u32,
}

impl Provider {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        key: CasterKey,
        owner_index: usize,
        owner_name: String,
        source_name: String,
        spell_id: Uuid,
        spell_name: String,
        base_spell: Option<String>,
        pool: PoolId,
        self_only: bool,
        transmutation: bool,
        capabilities: CasterCapabilities,
    ) -> Self {
        Self {
            key,
            owner_index,
            owner_name,
            source_name,
            spell_id,
            spell_name,
            base_spell,
            pools: vec![pool],
            clamp: if self_only { 1 } else { u32::MAX },
            self_only,
            transmutation,
            capabilities,
            banned: false,
            custom_cap: NO_CAP,
            share_transmutation: false,
            powerful_change: false,
            spent: 0,
        }
    }

    pub fn spent(&self) -> u32 {
        self.spent
    }

    /// Adds another credit source. Returns false when the pool was already listed.
    pub(crate) fn add_credit(&mut self, pool: PoolId) -> bool {
        if self.pools.contains(&pool) {
            return false;
        }
        self.pools.push(pool);
        true
    }

    /// First listed pool that still has a credit pays.
    fn draw(&mut self, pools: &mut CreditPools) -> bool {
        let paid = self
            .pools
            .iter()
            .any(|&id| pools.get_mut(id).is_some_and(|pool| pool.reserve(1)));
        if paid {
            self.spent += 1;
        }
        paid
    }

    pub fn capacity(&self, pools: &CreditPools) -> i32 {
        self.pools
            .iter()
            .filter_map(|&id| pools.get(id))
            .fold(0i32, |total, pool| total.saturating_add(pool.capacity()))
    }

    /// A self-only transmutation reaches allies when the caster has and enables the feat.
    pub fn can_share(&self) -> bool {
        self.self_only
            && self.transmutation
            && self.share_transmutation
            && self.capabilities.share_transmutation
    }

    pub fn serves(&self, target: usize) -> bool {
        !self.self_only || target == self.owner_index || self.can_share()
    }

    fn headroom(&self) -> u32 {
        let cap = if self.custom_cap >= 0 {
            self.custom_cap as u32
        } else {
            u32::MAX
        };
        self.clamp.min(cap).saturating_sub(self.spent)
    }

    pub fn available_credits(&self, pools: &CreditPools) -> i32 {
        self.pools
            .iter()
            .filter_map(|&id| pools.get(id))
            .fold(0i32, |total, pool| total.saturating_add(pool.remaining()))
    }

    /// "at will" for effectively unlimited pools, otherwise "spent+available".
    pub fn availability_label(&self, pools: &CreditPools) -> String {
        let at_will = self
            .pools
            .iter()
            .filter_map(|&id| pools.get(id))
            .any(CreditPool::is_at_will);
        if at_will {
            "at will".to_string()
        } else {
            format!("{}+{}", self.spent, self.available_credits(pools))
        }
    }
}

/// Allocation results of one buff, kept so a failed pass can be rolled back.
#[derive(Debug, Clone)]
pub(crate) struct AllocationSnapshot {
    given: Vec<bool>,
    can_target: Vec<bool>,
    fulfilled: usize,
    assignments: Vec<Assignment>,
    spent: Vec<u32>,
    stale: bool,
}

#[derive(Debug, Clone)]
pub struct BubbleBuff {
    pub key: EffectKey,
    pub name: String,
    pub spell_id: Uuid,
    pub category: Category,
    pub group: BuffGroup,
    pub is_mass: bool,
    hidden_short: bool,
    blacklisted: bool,
    providers: Vec<Provider>,
    wants: Vec<WantState>,
    can_target: Vec<bool>,
    given: Vec<bool>,
    fulfilled: usize,
    assignments: Vec<Assignment>,
    stale: bool,
}

impl BubbleBuff {
    pub(crate) fn new(
        key: EffectKey,
        name: String,
        spell_id: Uuid,
        category: Category,
        is_mass: bool,
        is_short: bool,
        roster_len: usize,
    ) -> Self {
        Self {
            key,
            name,
            spell_id,
            category,
            group: if is_short {
                BuffGroup::Short
            } else {
                BuffGroup::Normal
            },
            is_mass,
            hidden_short: is_short,
            blacklisted: false,
            providers: Vec::new(),
            wants: vec![WantState::Unset; roster_len],
            can_target: vec![true; roster_len],
            given: vec![false; roster_len],
            fulfilled: 0,
            assignments: Vec::new(),
            stale: true,
        }
    }

    /// Registers a provider, folding it into an existing one with the same caster key.
    pub(crate) fn add_provider(&mut self, provider: Provider) {
        match self.providers.iter_mut().find(|p| p.key == provider.key) {
            Some(existing) => {
                for pool in provider.pools {
                    existing.add_credit(pool);
                }
            }
            None => self.providers.push(provider),
        }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub(crate) fn provider_mut(&mut self, index: usize) -> Result<&mut Provider, EngineError> {
        let len = self.providers.len();
        self.providers
            .get_mut(index)
            .ok_or(EngineError::ProviderOutOfRange { index, len })
    }

    pub fn roster_len(&self) -> usize {
        self.wants.len()
    }

    /// Returns whether the stored state changed.
    pub fn set_unit_wants(&mut self, index: usize, wants: bool) -> Result<bool, EngineError> {
        let len = self.wants.len();
        let slot = self
            .wants
            .get_mut(index)
            .ok_or(EngineError::TargetOutOfRange { index, len })?;
        let next = if wants {
            WantState::Wants
        } else {
            WantState::Removed
        };
        let changed = *slot != next;
        *slot = next;
        Ok(changed)
    }

    pub fn want_state(&self, index: usize) -> WantState {
        self.wants.get(index).copied().unwrap_or_default()
    }

    pub fn unit_wants(&self, index: usize) -> bool {
        self.want_state(index) == WantState::Wants
    }

    pub fn unit_wants_removed(&self, index: usize) -> bool {
        self.want_state(index) == WantState::Removed
    }

    pub fn requested(&self) -> usize {
        self.wants.iter().filter(|w| **w == WantState::Wants).count()
    }

    pub fn fulfilled(&self) -> usize {
        self.fulfilled
    }

    pub fn unit_given(&self, index: usize) -> bool {
        self.given.get(index).copied().unwrap_or(false)
    }

    pub fn can_target(&self, index: usize) -> bool {
        self.can_target.get(index).copied().unwrap_or(false)
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// True between invalidate and validate; results must not be read while stale.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn hide_because(&self, reason: HideReason) -> bool {
        match reason {
            HideReason::Short => self.hidden_short,
            HideReason::Blacklisted => self.blacklisted,
        }
    }

    pub fn set_hidden(&mut self, reason: HideReason, hidden: bool) {
        match reason {
            HideReason::Short => self.hidden_short = hidden,
            HideReason::Blacklisted => self.blacklisted = hidden,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden_short || self.blacklisted
    }

    /// Moves a provider's cap by `delta`, clamped to [0, total capacity of its pools].
    /// Reaching the capacity clears the cap. Returns the effective cap.
    pub fn adjust_cap(
        &mut self,
        provider: usize,
        delta: i32,
        pools: &CreditPools,
    ) -> Result<i32, EngineError> {
        let provider = self.provider_mut(provider)?;
        let capacity = provider.capacity(pools);
        let current = if provider.custom_cap < 0 {
            capacity
        } else {
            provider.custom_cap.min(capacity)
        };
        let next = current.saturating_add(delta).clamp(0, capacity);
        provider.custom_cap = if next >= capacity { NO_CAP } else { next };
        Ok(next)
    }

    pub(crate) fn refresh_targets(&mut self, can_target: Vec<bool>) {
        self.can_target = can_target;
    }

    /// Clears this pass's results. Pool credits are released separately by the caller.
    pub fn invalidate(&mut self) {
        self.given.iter_mut().for_each(|g| *g = false);
        self.fulfilled = 0;
        self.assignments.clear();
        for provider in &mut self.providers {
            provider.spent = 0;
        }
        self.stale = true;
    }

    /// Assigns providers to wanting targets, drawing from the shared pools.
    pub fn validate(&mut self, pools: &mut CreditPools) {
        self.stale = false;
        let wanting: Vec<usize> = (0..self.wants.len())
            .filter(|&i| self.wants[i] == WantState::Wants && self.can_target[i])
            .collect();
        if wanting.is_empty() {
            return;
        }
        if self.is_mass {
            self.validate_mass(pools, &wanting);
        } else {
            self.validate_single(pools, &wanting);
        }
    }

    fn validate_single(&mut self, pools: &mut CreditPools, wanting: &[usize]) {
        for (index, provider) in self.providers.iter_mut().enumerate() {
            if provider.banned {
                continue;
            }
            for &target in wanting {
                if self.given[target] || !provider.serves(target) {
                    continue;
                }
                if provider.headroom() == 0 || !provider.draw(pools) {
                    break;
                }
                self.given[target] = true;
                self.fulfilled += 1;
                self.assignments.push(Assignment {
                    provider: index,
                    target,
                });
            }
            if self.fulfilled == wanting.len() {
                break;
            }
        }
    }

    fn validate_mass(&mut self, pools: &mut CreditPools, wanting: &[usize]) {
        for (index, provider) in self.providers.iter_mut().enumerate() {
            if provider.banned || provider.headroom() == 0 {
                continue;
            }
            let Some(&target) = wanting.iter().find(|&&t| provider.serves(t)) else {
                continue;
            };
            if !provider.draw(pools) {
                continue;
            }
            self.assignments.push(Assignment {
                provider: index,
                target,
            });
            for (i, given) in self.given.iter_mut().enumerate() {
                *given = self.can_target[i] && self.wants[i] != WantState::Removed;
            }
            self.fulfilled = wanting.len();
            return;
        }
    }

    pub(crate) fn allocation_snapshot(&self) -> AllocationSnapshot {
        AllocationSnapshot {
            given: self.given.clone(),
            can_target: self.can_target.clone(),
            fulfilled: self.fulfilled,
            assignments: self.assignments.clone(),
            spent: self.providers.iter().map(|p| p.spent).collect(),
            stale: self.stale,
        }
    }

    pub(crate) fn restore_allocation(&mut self, snapshot: AllocationSnapshot) {
        self.given = snapshot.given;
        self.can_target = snapshot.can_target;
        self.fulfilled = snapshot.fulfilled;
        self.assignments = snapshot.assignments;
        self.stale = snapshot.stale;
        for (provider, spent) in self.providers.iter_mut().zip(snapshot.spent) {
            provider.spent = spent;
        }
    }

    /// Applies persisted preferences. Wanted ids absent from the roster are ignored here
    /// and stay untouched in the document.
    pub(crate) fn initialise_from_save(&mut self, save: &SavedBuffState, roster: &[CharacterId]) {
        self.blacklisted = save.blacklisted;
        self.group = save.group;
        for (index, id) in roster.iter().enumerate() {
            if save.wanted.contains(id) {
                if let Some(slot) = self.wants.get_mut(index) {
                    *slot = WantState::Wants;
                }
            }
        }
        for provider in &mut self.providers {
            if let Some(state) = save.casters.get(&provider.key) {
                provider.banned = state.banned;
                provider.custom_cap = state.cap;
                provider.share_transmutation = state.share_transmutation;
                provider.powerful_change = state.powerful_change;
            }
        }
    }

    pub(crate) fn write_to_save(&self, save: &mut SavedBuffState, roster: &[CharacterId]) {
        save.blacklisted = self.blacklisted;
        save.group = self.group;
        for (index, id) in roster.iter().enumerate() {
            if self.unit_wants(index) {
                save.wanted.insert(id.clone());
            } else {
                save.wanted.remove(id);
            }
        }
        for provider in &self.providers {
            let state = save.casters.entry(provider.key.clone()).or_default();
            state.banned = provider.banned;
            state.cap = provider.custom_cap;
            state.share_transmutation = provider.share_transmutation;
            state.powerful_change = provider.powerful_change;
        }
    }

    #[cfg(test)]
    pub(crate) fn force_fulfilled(&mut self, fulfilled: usize) {
        self.fulfilled = fulfilled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::keys::CasterSource;

    fn provider(owner: usize, pool: PoolId, self_only: bool) -> Provider {
        Provider::new(
            CasterKey::new(
                CharacterId::new(format!("c{owner}")),
                CasterSource::Spellbook(Uuid::from_u128(owner as u128 + 100)),
            ),
            owner,
            format!("c{owner}"),
            "Wizard".into(),
            Uuid::from_u128(1),
            "Mage Armor".into(),
            None,
            pool,
            self_only,
            false,
            CasterCapabilities::default(),
        )
    }

    fn buff(roster_len: usize, is_mass: bool) -> BubbleBuff {
        BubbleBuff::new(
            EffectKey::from_buffs([Uuid::from_u128(9)]).unwrap(),
            "Mage Armor".into(),
            Uuid::from_u128(1),
            Category::Spell,
            is_mass,
            false,
            roster_len,
        )
    }

    #[test]
    fn opt_out_is_distinct_from_unset() {
        let mut b = buff(2, false);
        assert_eq!(b.want_state(0), WantState::Unset);
        assert!(b.set_unit_wants(0, false).unwrap());
        assert!(b.unit_wants_removed(0));
        assert!(!b.set_unit_wants(0, false).unwrap());
        assert!(matches!(
            b.set_unit_wants(5, true),
            Err(EngineError::TargetOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn adjust_cap_clamps_and_clears_at_capacity() {
        let mut pools = CreditPools::new();
        let pool = pools.add(CreditPool::new("L1", 3));
        let mut b = buff(1, false);
        b.add_provider(provider(0, pool, false));

        assert_eq!(b.adjust_cap(0, -1, &pools).unwrap(), 2);
        assert_eq!(b.providers()[0].custom_cap, 2);
        assert_eq!(b.adjust_cap(0, -10, &pools).unwrap(), 0);
        assert_eq!(b.providers()[0].custom_cap, 0);
        assert_eq!(b.adjust_cap(0, 10, &pools).unwrap(), 3);
        assert_eq!(b.providers()[0].custom_cap, NO_CAP);
        assert!(b.adjust_cap(4, 1, &pools).is_err());
    }

    #[test]
    fn self_only_provider_serves_owner_once() {
        let mut pools = CreditPools::new();
        let pool = pools.add(CreditPool::new("innate", 500));
        let mut b = buff(3, false);
        b.add_provider(provider(1, pool, true));
        for i in 0..3 {
            b.set_unit_wants(i, true).unwrap();
        }
        b.invalidate();
        b.validate(&mut pools);
        assert_eq!(b.fulfilled(), 1);
        assert!(b.unit_given(1));
        assert!(!b.unit_given(0));
        assert_eq!(b.providers()[0].spent(), 1);
    }

    #[test]
    fn custom_cap_limits_spending() {
        let mut pools = CreditPools::new();
        let pool = pools.add(CreditPool::new("L1", 4));
        let mut b = buff(3, false);
        b.add_provider(provider(0, pool, false));
        b.adjust_cap(0, -3, &pools).unwrap();
        for i in 0..3 {
            b.set_unit_wants(i, true).unwrap();
        }
        b.validate(&mut pools);
        assert_eq!(b.fulfilled(), 1);
        assert_eq!(pools.get(pool).unwrap().committed(), 1);
    }

    #[test]
    fn mass_cast_covers_everyone_not_opted_out() {
        let mut pools = CreditPools::new();
        let pool = pools.add(CreditPool::new("L3", 1));
        let mut b = buff(4, true);
        b.add_provider(provider(0, pool, false));
        b.set_unit_wants(0, true).unwrap();
        b.set_unit_wants(3, false).unwrap();
        b.validate(&mut pools);
        assert_eq!(b.fulfilled(), 1);
        assert!(b.unit_given(0));
        assert!(b.unit_given(1));
        assert!(b.unit_given(2));
        assert!(!b.unit_given(3));
        assert_eq!(b.assignments().len(), 1);
        assert_eq!(pools.get(pool).unwrap().remaining(), 0);
    }

    #[test]
    fn repeated_caster_key_merges_into_one_provider() {
        let mut pools = CreditPools::new();
        let first = pools.add(CreditPool::new("slot 1", 1));
        let second = pools.add(CreditPool::new("slot 2", 1));
        let mut b = buff(3, false);
        b.add_provider(provider(0, first, false));
        b.add_provider(provider(0, second, false));
        b.add_provider(provider(0, second, false));
        assert_eq!(b.providers().len(), 1);
        assert_eq!(b.providers()[0].pools, vec![first, second]);
        assert_eq!(b.providers()[0].availability_label(&pools), "0+2");

        for i in 0..3 {
            b.set_unit_wants(i, true).unwrap();
        }
        b.validate(&mut pools);
        assert_eq!(b.fulfilled(), 2);
        assert_eq!(b.providers()[0].spent(), 2);
        assert_eq!(pools.get(first).unwrap().remaining(), 0);
        assert_eq!(pools.get(second).unwrap().remaining(), 0);
    }

    #[test]
    fn availability_label_switches_to_at_will() {
        let mut pools = CreditPools::new();
        let slots = pools.add(CreditPool::new("L1", 3));
        let innate = pools.add(CreditPool::new("innate", 500));
        assert_eq!(provider(0, slots, false).availability_label(&pools), "0+3");
        assert_eq!(provider(0, innate, false).availability_label(&pools), "at will");
    }
}
