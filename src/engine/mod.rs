//! Catalog, credit pools, and the allocation pass.

pub mod allocation;
pub mod buff;
pub mod catalog;
pub mod credit;
pub mod keys;
pub mod observe;

pub use allocation::{run_pass, AllowAll, ImmunityTargeting, PassSummary, Targeting};
pub use buff::{Assignment, BubbleBuff, BuffGroup, Category, HideReason, Provider, WantState};
pub use catalog::{BuildFailure, Catalog, MAX_VARIANT_DEPTH, SHORT_DURATION_SECONDS};
pub use credit::{CreditPool, CreditPools, PoolId, AT_WILL_THRESHOLD, UNLIMITED_CREDITS};
pub use keys::{CasterKey, CasterSource, CharacterId, EffectKey};
pub use observe::{EngineEvent, Observers, SubscriptionId, MAX_OBSERVERS};
