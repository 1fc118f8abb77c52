//! One allocation pass over the whole catalog: release every credit, then let each buff
//! claim providers in catalog order. Earlier buffs win contention for shared pools.

use tracing::{debug, warn};

use crate::data::roster::Character;
use crate::engine::buff::BubbleBuff;
use crate::engine::catalog::Catalog;
use crate::engine::credit::CreditPools;
use crate::error::AllocationError;

/// Host answer to "can this buff land on roster member `target`?"
pub trait Targeting {
    fn can_target(&self, buff: &BubbleBuff, target: usize) -> bool;
}

/// Every member is a valid target.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Targeting for AllowAll {
    fn can_target(&self, _buff: &BubbleBuff, _target: usize) -> bool {
        true
    }
}

impl<F> Targeting for F
where
    F: Fn(&BubbleBuff, usize) -> bool,
{
    fn can_target(&self, buff: &BubbleBuff, target: usize) -> bool {
        self(buff, target)
    }
}

/// Uses each member's immunity list from the roster facts.
#[derive(Debug, Clone, Copy)]
pub struct ImmunityTargeting<'a> {
    roster: &'a [Character],
}

impl<'a> ImmunityTargeting<'a> {
    pub fn new(roster: &'a [Character]) -> Self {
        Self { roster }
    }
}

impl Targeting for ImmunityTargeting<'_> {
    fn can_target(&self, buff: &BubbleBuff, target: usize) -> bool {
        match self.roster.get(target) {
            Some(member) => !member.immune_to.iter().any(|id| buff.key.contains(id)),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub buffs: usize,
    pub requested: usize,
    pub fulfilled: usize,
    pub credits_committed: i32,
}

/// Runs a full pass. On a broken invariant the previous results are restored and the
/// error returned.
pub fn run_pass(
    catalog: &mut Catalog,
    targeting: &dyn Targeting,
) -> Result<PassSummary, AllocationError> {
    let roster_len = catalog.roster().len();
    let (buffs, pools) = catalog.parts_mut();
    let backup: Vec<_> = buffs.iter().map(BubbleBuff::allocation_snapshot).collect();
    let pool_backup = pools.clone();

    for buff in buffs.iter_mut() {
        let can_target: Vec<bool> = (0..roster_len)
            .map(|target| targeting.can_target(buff, target))
            .collect();
        buff.refresh_targets(can_target);
    }
    invalidate_all(buffs, pools);
    validate_all(buffs, pools);

    if let Err(error) = verify(buffs, pools) {
        warn!(%error, "allocation pass broke an invariant; restoring previous results");
        for (buff, snapshot) in buffs.iter_mut().zip(backup) {
            buff.restore_allocation(snapshot);
        }
        *pools = pool_backup;
        return Err(error);
    }

    let summary = PassSummary {
        buffs: buffs.len(),
        requested: buffs.iter().map(BubbleBuff::requested).sum(),
        fulfilled: buffs.iter().map(BubbleBuff::fulfilled).sum(),
        credits_committed: pools.total_committed(),
    };
    debug!(
        buffs = summary.buffs,
        requested = summary.requested,
        fulfilled = summary.fulfilled,
        credits = summary.credits_committed,
        "allocation pass complete"
    );
    Ok(summary)
}

pub fn invalidate_all(buffs: &mut [BubbleBuff], pools: &mut CreditPools) {
    pools.reset_all();
    for buff in buffs.iter_mut() {
        buff.invalidate();
    }
}

pub fn validate_all(buffs: &mut [BubbleBuff], pools: &mut CreditPools) {
    for buff in buffs.iter_mut() {
        buff.validate(pools);
    }
}

/// Checks credit conservation, per-provider clamps, and fulfilled <= requested.
pub fn verify(buffs: &[BubbleBuff], pools: &CreditPools) -> Result<(), AllocationError> {
    for (_, pool) in pools.iter() {
        if pool.committed() > pool.capacity() || pool.committed() < 0 {
            return Err(AllocationError::PoolOverdrawn {
                pool: pool.label().to_string(),
                committed: pool.committed(),
                capacity: pool.capacity(),
            });
        }
    }
    for buff in buffs {
        for (index, provider) in buff.providers().iter().enumerate() {
            if provider.spent() > provider.clamp {
                return Err(AllocationError::ClampExceeded {
                    buff: buff.name.clone(),
                    provider: index,
                    spent: provider.spent(),
                    clamp: provider.clamp,
                });
            }
        }
        if buff.fulfilled() > buff.requested() {
            return Err(AllocationError::OverFulfilled {
                buff: buff.name.clone(),
                fulfilled: buff.fulfilled(),
                requested: buff.requested(),
            });
        }
    }
    Ok(())
}
