//! Host roster facts and the persisted settings document.

pub mod roster;
pub mod saved_state;
pub mod snapshot;

pub use roster::{load_roster, Character, RosterFile};
pub use saved_state::{
    settings_path, MigrationReport, NameIndex, SavedBufferState, SavedBuffState,
    SavedCasterState, CURRENT_VERSION,
};
pub use snapshot::RosterSnapshot;
