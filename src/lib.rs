//! Buff availability and caster-credit allocation for a party of spellcasters.
//!
//! Roster facts come from the host ([data::roster]); the [engine] builds a catalog of
//! distinct effects and allocates limited casting credits to the members who asked for
//! them; the [planner] owns session state, persistence, and cast plans.

pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod planner;

pub use engine::{BubbleBuff, Catalog, EffectKey, Targeting};
pub use error::EngineError;
pub use planner::BufferState;
