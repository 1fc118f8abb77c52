//! The long-lived engine object: owns the catalog, the settings document, and the dirty
//! flags that decide when the catalog must be rebuilt.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::data::roster::Character;
use crate::data::saved_state::{NameIndex, SavedBufferState};
use crate::data::snapshot::RosterSnapshot;
use crate::engine::allocation::{run_pass, PassSummary, Targeting};
use crate::engine::buff::{BubbleBuff, BuffGroup, HideReason};
use crate::engine::catalog::Catalog;
use crate::engine::keys::EffectKey;
use crate::engine::observe::{EngineEvent, Observers, SubscriptionId};
use crate::error::EngineError;
use crate::planner::filter::BuffFilter;
use crate::planner::plan::{build_plan, CastPlan};

/// Host events that invalidate the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    SpellForgotten,
    SpellMemorized,
    LevelUpComplete,
    PartyChanged,
    AreaLoaded,
}

#[derive(Debug)]
pub struct BufferState {
    saved: SavedBufferState,
    path: Option<PathBuf>,
    catalog: Catalog,
    snapshot: RosterSnapshot,
    input_dirty: bool,
    dirty: bool,
    observers: Observers,
    last_summary: Option<PassSummary>,
}

impl BufferState {
    /// In-memory engine; [BufferState::save] only reconciles the document.
    pub fn new(saved: SavedBufferState) -> Self {
        Self {
            saved,
            path: None,
            catalog: Catalog::default(),
            snapshot: RosterSnapshot::default(),
            input_dirty: true,
            dirty: true,
            observers: Observers::default(),
            last_summary: None,
        }
    }

    pub fn with_path(saved: SavedBufferState, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(saved)
        }
    }

    /// Loads the session document (empty if missing or corrupt) and migrates legacy data
    /// using every character the session knows about.
    pub fn load_or_create<'a, I>(path: impl Into<PathBuf>, known: I) -> Self
    where
        I: IntoIterator<Item = &'a Character>,
    {
        let path = path.into();
        let mut saved = SavedBufferState::load(&path);
        if saved.needs_migration() {
            let names = NameIndex::from_characters(known);
            saved.migrate(&names);
        }
        Self::with_path(saved, path)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn buffs(&self) -> &[BubbleBuff] {
        self.catalog.buffs()
    }

    pub fn buff(&self, key: &EffectKey) -> Option<&BubbleBuff> {
        self.catalog.get(key)
    }

    pub fn saved(&self) -> &SavedBufferState {
        &self.saved
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn last_summary(&self) -> Option<PassSummary> {
        self.last_summary
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.input_dirty
    }

    /// The host's ability set changed; the next recalculation rebuilds the catalog.
    pub fn notify_abilities_changed(&mut self) {
        self.input_dirty = true;
    }

    pub fn handle_signal(&mut self, signal: HostSignal) {
        debug!(?signal, "host signal; catalog marked for rebuild");
        self.notify_abilities_changed();
    }

    pub fn subscribe<F>(&mut self, callback: F) -> Result<SubscriptionId, EngineError>
    where
        F: FnMut(&EngineEvent) + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Rebuilds the catalog when inputs or the roster changed, then runs an allocation
    /// pass. With `commit` the settings document is flushed afterwards.
    pub fn recalculate(
        &mut self,
        roster: &[Character],
        targeting: &dyn Targeting,
        commit: bool,
    ) -> Result<PassSummary, EngineError> {
        if self.input_dirty || self.snapshot.is_dirty(roster) {
            self.rebuild(roster);
        }
        let summary = match run_pass(&mut self.catalog, targeting) {
            Ok(summary) => summary,
            Err(err) => {
                error!(error = %err, "allocation pass failed");
                self.observers
                    .notify(&EngineEvent::AllocationFailed { error: err.clone() });
                return Err(err.into());
            }
        };
        self.dirty = false;
        self.last_summary = Some(summary);
        self.observers.notify(&EngineEvent::Recalculated { summary });
        if commit {
            self.save()?;
        }
        Ok(summary)
    }

    fn rebuild(&mut self, roster: &[Character]) {
        if !self.catalog.is_empty() {
            // Keep edits made against the old catalog before it is replaced.
            self.saved
                .reconcile(self.catalog.buffs(), self.catalog.roster());
        }
        let mut catalog = Catalog::build(roster);
        catalog.hydrate(&self.saved);
        let event = EngineEvent::CatalogRebuilt {
            buffs: catalog.len(),
            failures: catalog.failures().len(),
        };
        self.catalog = catalog;
        self.snapshot.capture(roster);
        self.input_dirty = false;
        self.dirty = true;
        self.observers.notify(&event);
    }

    /// Reconciles live state into the document and writes it when a path is set.
    pub fn save(&mut self) -> Result<(), EngineError> {
        self.saved
            .reconcile(self.catalog.buffs(), self.catalog.roster());
        let Some(path) = &self.path else {
            debug!("no settings path; document kept in memory");
            return Ok(());
        };
        self.saved.save(path)?;
        let records = self.saved.buffs.len();
        info!(path = %path.display(), records, "saved buff settings");
        self.observers.notify(&EngineEvent::Saved {
            path: path.clone(),
            records,
        });
        Ok(())
    }

    fn buff_mut(&mut self, key: &EffectKey) -> Result<&mut BubbleBuff, EngineError> {
        self.catalog
            .buff_mut(key)
            .ok_or_else(|| EngineError::UnknownBuff(key.clone()))
    }

    pub fn set_unit_wants(
        &mut self,
        key: &EffectKey,
        index: usize,
        wants: bool,
    ) -> Result<bool, EngineError> {
        let changed = self.buff_mut(key)?.set_unit_wants(index, wants)?;
        self.dirty |= changed;
        Ok(changed)
    }

    /// Applies `wants` to every member the last pass found targetable. Returns how many
    /// members changed.
    pub fn set_all_wants(&mut self, key: &EffectKey, wants: bool) -> Result<usize, EngineError> {
        let buff = self.buff_mut(key)?;
        let mut changed = 0;
        for index in 0..buff.roster_len() {
            if buff.can_target(index) && buff.set_unit_wants(index, wants)? {
                changed += 1;
            }
        }
        self.dirty |= changed > 0;
        Ok(changed)
    }

    pub fn adjust_cap(
        &mut self,
        key: &EffectKey,
        provider: usize,
        delta: i32,
    ) -> Result<i32, EngineError> {
        let (buff, pools) = self
            .catalog
            .buff_and_pools_mut(key)
            .ok_or_else(|| EngineError::UnknownBuff(key.clone()))?;
        let cap = buff.adjust_cap(provider, delta, pools)?;
        self.dirty = true;
        Ok(cap)
    }

    pub fn set_banned(
        &mut self,
        key: &EffectKey,
        provider: usize,
        banned: bool,
    ) -> Result<(), EngineError> {
        self.buff_mut(key)?.provider_mut(provider)?.banned = banned;
        self.dirty = true;
        Ok(())
    }

    pub fn set_share_transmutation(
        &mut self,
        key: &EffectKey,
        provider: usize,
        enabled: bool,
    ) -> Result<(), EngineError> {
        let provider = self.buff_mut(key)?.provider_mut(provider)?;
        if enabled && !provider.capabilities.share_transmutation {
            return Err(EngineError::MissingCapability {
                caster: provider.key.clone(),
                capability: "share transmutation",
            });
        }
        provider.share_transmutation = enabled;
        self.dirty = true;
        Ok(())
    }

    pub fn set_powerful_change(
        &mut self,
        key: &EffectKey,
        provider: usize,
        enabled: bool,
    ) -> Result<(), EngineError> {
        let provider = self.buff_mut(key)?.provider_mut(provider)?;
        if enabled && !provider.capabilities.powerful_change {
            return Err(EngineError::MissingCapability {
                caster: provider.key.clone(),
                capability: "powerful change",
            });
        }
        provider.powerful_change = enabled;
        self.dirty = true;
        Ok(())
    }

    pub fn set_blacklisted(&mut self, key: &EffectKey, blacklisted: bool) -> Result<(), EngineError> {
        self.buff_mut(key)?
            .set_hidden(HideReason::Blacklisted, blacklisted);
        self.dirty = true;
        Ok(())
    }

    pub fn set_group(&mut self, key: &EffectKey, group: BuffGroup) -> Result<(), EngineError> {
        self.buff_mut(key)?.group = group;
        self.dirty = true;
        Ok(())
    }

    pub fn visible_buffs(&self, filter: &BuffFilter) -> Vec<&BubbleBuff> {
        filter.visible(self.catalog.buffs())
    }

    pub fn plan(&self, group: BuffGroup) -> CastPlan {
        build_plan(&self.catalog, group)
    }
}
