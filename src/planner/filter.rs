//! View filter over the catalog.

use crate::engine::buff::{BubbleBuff, HideReason};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuffFilter {
    pub only_requested: bool,
    pub show_short: bool,
    pub show_hidden: bool,
    /// Case-insensitive substring of the buff name. Empty matches everything.
    pub name: String,
}

impl BuffFilter {
    pub fn matches(&self, buff: &BubbleBuff) -> bool {
        if !self.show_hidden && buff.hide_because(HideReason::Blacklisted) {
            return false;
        }
        if !self.show_short && buff.hide_because(HideReason::Short) {
            return false;
        }
        if self.only_requested && buff.requested() == 0 {
            return false;
        }
        self.name.is_empty()
            || buff
                .name
                .to_lowercase()
                .contains(&self.name.to_lowercase())
    }

    /// Matching buffs sorted by name.
    pub fn visible<'a>(&self, buffs: &'a [BubbleBuff]) -> Vec<&'a BubbleBuff> {
        let mut out: Vec<&BubbleBuff> = buffs.iter().filter(|b| self.matches(b)).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.key.cmp(&b.key)));
        out
    }
}
