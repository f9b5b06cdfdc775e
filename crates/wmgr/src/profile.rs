//! Saved connection profiles.
//!
//! The store is a tiny fixed table with an at-most-one-active invariant. The
//! bound is deliberately 1 on this class of device; the table shape stays so
//! the bound can grow without touching callers.

use crate::wire::ProfileMsg;

/// Number of profile slots.
pub const PROFILES_MAX: usize = 1;

/// A saved profile slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub msg: ProfileMsg,
    /// Selection weight once the table holds more than one profile.
    pub priority: u8,
    /// Profile survives a manual disconnect and is eligible for reconnect.
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct ProfileStore {
    slots: [Option<Profile>; PROFILES_MAX],
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves a profile, inactive. Takes the first free slot; with every slot
    /// occupied the oldest slot is overwritten, matching the single-profile
    /// replace-on-connect behavior.
    pub fn set(&mut self, msg: ProfileMsg) -> usize {
        self.set_with_priority(msg, 0)
    }

    pub fn set_with_priority(&mut self, msg: ProfileMsg, priority: u8) -> usize {
        let idx = self
            .slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(0);
        self.slots[idx] = Some(Profile {
            msg,
            priority,
            active: false,
        });
        idx
    }

    /// Marks one slot active and every other slot inactive.
    pub fn activate(&mut self, idx: usize) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(profile) = slot {
                profile.active = i == idx;
            }
        }
    }

    pub fn deactivate_all(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.active = false;
        }
    }

    pub fn clear(&mut self, idx: usize) {
        if idx < PROFILES_MAX {
            self.slots[idx] = None;
        }
    }

    pub fn active(&self) -> Option<&Profile> {
        self.slots.iter().flatten().find(|p| p.active)
    }

    pub fn get(&self, idx: usize) -> Option<&Profile> {
        self.slots.get(idx).and_then(Option::as_ref)
    }
}
