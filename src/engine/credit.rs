//! Credit pools: finite casting resources shared by every provider drawing from them.

/// Capacity given to innate abilities with no resource limit.
pub const UNLIMITED_CREDITS: i32 = 500;

/// Pools at or above this remaining count are displayed as "at will".
pub const AT_WILL_THRESHOLD: i32 = 100;

/// Handle into a [CreditPools] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolId(usize);

impl PoolId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPool {
    label: String,
    capacity: i32,
    committed: i32,
}

impl CreditPool {
    pub fn new(label: impl Into<String>, capacity: i32) -> Self {
        Self {
            label: label.into(),
            capacity: capacity.max(0),
            committed: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    pub fn committed(&self) -> i32 {
        self.committed
    }

    pub fn remaining(&self) -> i32 {
        self.capacity - self.committed
    }

    pub fn is_at_will(&self) -> bool {
        self.remaining() >= AT_WILL_THRESHOLD
    }

    /// Commits `amount` credits if they are all available. Never partially commits.
    pub fn reserve(&mut self, amount: i32) -> bool {
        if amount <= 0 {
            return amount == 0;
        }
        if self.remaining() < amount {
            return false;
        }
        self.committed += amount;
        true
    }

    pub(crate) fn reset(&mut self) {
        self.committed = 0;
    }
}

/// Arena of pools owned by one catalog. Providers refer to pools by [PoolId].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreditPools {
    pools: Vec<CreditPool>,
}

impl CreditPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pool: CreditPool) -> PoolId {
        self.pools.push(pool);
        PoolId(self.pools.len() - 1)
    }

    pub fn get(&self, id: PoolId) -> Option<&CreditPool> {
        self.pools.get(id.0)
    }

    pub fn get_mut(&mut self, id: PoolId) -> Option<&mut CreditPool> {
        self.pools.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &CreditPool)> {
        self.pools.iter().enumerate().map(|(i, pool)| (PoolId(i), pool))
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn total_committed(&self) -> i32 {
        self.pools.iter().map(CreditPool::committed).sum()
    }

    pub(crate) fn reset_all(&mut self) {
        for pool in &mut self.pools {
            pool.reset();
        }
    }
}
