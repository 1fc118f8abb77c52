//! Ordered record of the roster the catalog was last built from.

use crate::data::roster::Character;
use crate::engine::keys::CharacterId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    members: Vec<CharacterId>,
    captured: bool,
}

impl RosterSnapshot {
    pub fn capture(&mut self, roster: &[Character]) {
        self.members = roster.iter().map(|c| c.id.clone()).collect();
        self.captured = true;
    }

    /// True before the first capture, or when membership or order differ.
    pub fn is_dirty(&self, roster: &[Character]) -> bool {
        !self.captured
            || self.members.len() != roster.len()
            || self
                .members
                .iter()
                .zip(roster)
                .any(|(id, character)| *id != character.id)
    }

    pub fn members(&self) -> &[CharacterId] {
        &self.members
    }
}
