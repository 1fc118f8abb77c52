//! Error types shared across the engine, persistence store, and roster loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::keys::{CasterKey, EffectKey};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("effect key is empty")]
    EmptyEffect,
    #[error("invalid buff id '{0}' in effect key")]
    BadBuffId(String),
    #[error("caster key '{0}' has no '|' separator")]
    MissingSeparator(String),
    #[error("unknown caster source '{0}'")]
    UnknownSource(String),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to read settings '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write settings '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("no known character is named '{name}'")]
    UnresolvedName { name: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("spellbook '{book}' level {level} has negative daily allotment {per_day}")]
    NegativeAllotment { book: String, level: u8, per_day: i32 },
    #[error("ability '{ability}' has negative resource maximum {max}")]
    NegativeResource { ability: String, max: i32 },
    #[error("ability '{ability}' nests variants deeper than {limit}")]
    VariantDepth { ability: String, limit: usize },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("pool '{pool}' committed {committed} of capacity {capacity}")]
    PoolOverdrawn {
        pool: String,
        committed: i32,
        capacity: i32,
    },
    #[error("provider {provider} of '{buff}' spent {spent} over clamp {clamp}")]
    ClampExceeded {
        buff: String,
        provider: usize,
        spent: u32,
        clamp: u32,
    },
    #[error("'{buff}' fulfilled {fulfilled} of {requested} requests")]
    OverFulfilled {
        buff: String,
        fulfilled: usize,
        requested: usize,
    },
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read roster '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse roster json '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse roster yaml '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no buff with effect key '{0}'")]
    UnknownBuff(EffectKey),
    #[error("provider index {index} out of range ({len} providers)")]
    ProviderOutOfRange { index: usize, len: usize },
    #[error("roster index {index} out of range ({len} members)")]
    TargetOutOfRange { index: usize, len: usize },
    #[error("caster '{caster}' lacks {capability}")]
    MissingCapability {
        caster: CasterKey,
        capability: &'static str,
    },
    #[error("observer limit of {0} reached")]
    ObserverLimit(usize),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}
