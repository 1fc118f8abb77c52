//! Turns allocation results into an ordered list of casts for one buff group.

use std::io;

use serde::Serialize;

use crate::engine::buff::{BuffGroup, HideReason};
use crate::engine::catalog::Catalog;
use crate::engine::keys::{CasterKey, CharacterId, EffectKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffOutcome {
    /// Every request is covered.
    Good,
    Partial,
    /// Requested but nothing could be allocated.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastRequest {
    pub buff: String,
    pub effect: EffectKey,
    pub caster: CasterKey,
    pub caster_name: String,
    pub source: String,
    pub spell: String,
    pub target: CharacterId,
    pub mass: bool,
    pub share_transmutation: bool,
    pub powerful_change: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuffReport {
    pub buff: String,
    pub requested: usize,
    pub fulfilled: usize,
    pub outcome: BuffOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CastPlan {
    pub group: BuffGroup,
    pub casts: Vec<CastRequest>,
    pub reports: Vec<BuffReport>,
}

impl CastPlan {
    pub fn is_empty(&self) -> bool {
        self.casts.is_empty()
    }

    pub fn outcome_of(&self, buff: &str) -> Option<BuffOutcome> {
        self.reports
            .iter()
            .find(|report| report.buff == buff)
            .map(|report| report.outcome)
    }
}

/// Blacklisted and unrequested buffs are left out. Stale buffs contribute no casts.
pub fn build_plan(catalog: &Catalog, group: BuffGroup) -> CastPlan {
    let mut plan = CastPlan {
        group,
        ..CastPlan::default()
    };
    for buff in catalog.buffs() {
        if buff.group != group
            || buff.hide_because(HideReason::Blacklisted)
            || buff.requested() == 0
        {
            continue;
        }
        let fulfilled = if buff.is_stale() { 0 } else { buff.fulfilled() };
        let outcome = match fulfilled {
            0 => BuffOutcome::Skipped,
            n if n >= buff.requested() => BuffOutcome::Good,
            _ => BuffOutcome::Partial,
        };
        plan.reports.push(BuffReport {
            buff: buff.name.clone(),
            requested: buff.requested(),
            fulfilled,
            outcome,
        });
        if buff.is_stale() {
            continue;
        }
        for assignment in buff.assignments() {
            let (Some(provider), Some(target)) = (
                buff.providers().get(assignment.provider),
                catalog.roster().get(assignment.target),
            ) else {
                continue;
            };
            plan.casts.push(CastRequest {
                buff: buff.name.clone(),
                effect: buff.key.clone(),
                caster: provider.key.clone(),
                caster_name: provider.owner_name.clone(),
                source: provider.source_name.clone(),
                spell: provider.spell_name.clone(),
                target: target.clone(),
                mass: buff.is_mass,
                share_transmutation: provider.can_share() && assignment.target != provider.owner_index,
                powerful_change: provider.powerful_change && provider.capabilities.powerful_change,
            });
        }
    }
    plan
}

#[derive(Serialize)]
struct CastRow<'a> {
    buff: &'a str,
    caster: &'a str,
    source: &'a str,
    spell: &'a str,
    target: &'a str,
    mass: bool,
    share_transmutation: bool,
    powerful_change: bool,
}

/// One CSV row per cast, with a header.
pub fn write_csv<W: io::Write>(plan: &CastPlan, writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    for cast in &plan.casts {
        out.serialize(CastRow {
            buff: &cast.buff,
            caster: &cast.caster_name,
            source: &cast.source,
            spell: &cast.spell,
            target: cast.target.as_str(),
            mass: cast.mass,
            share_transmutation: cast.share_transmutation,
            powerful_change: cast.powerful_change,
        })?;
    }
    out.flush()?;
    Ok(())
}
