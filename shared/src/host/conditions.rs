use log::warn;

use crate::layout::{Layout, RepCondition};

/// Per-connection facts that decide which conditional properties are sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReplicationFlags {
    /// First send of this object to the connection
    pub net_initial: bool,
    /// The connection owns the object
    pub net_owner: bool,
    /// The receiving side only simulates the object
    pub net_simulated: bool,
    pub rep_physics: bool,
    /// The connection records a replay
    pub replay: bool,
}

impl RepCondition {
    pub fn is_active(&self, flags: &ReplicationFlags) -> bool {
        let simulated = flags.net_simulated;
        match self {
            RepCondition::None | RepCondition::Custom => true,
            RepCondition::InitialOnly => flags.net_initial,
            RepCondition::OwnerOnly => flags.net_owner,
            RepCondition::SkipOwner => !flags.net_owner,
            RepCondition::SimulatedOnly => simulated,
            RepCondition::SimulatedOnlyNoReplay => simulated && !flags.replay,
            RepCondition::AutonomousOnly => !simulated,
            RepCondition::SimulatedOrPhysics => simulated || flags.rep_physics,
            RepCondition::SimulatedOrPhysicsNoReplay => {
                (simulated || flags.rep_physics) && !flags.replay
            }
            RepCondition::InitialOrOwner => flags.net_initial || flags.net_owner,
            RepCondition::ReplayOrOwner => flags.replay || flags.net_owner,
            RepCondition::ReplayOnly => flags.replay,
            RepCondition::SkipReplay => !flags.replay,
            RepCondition::Never => false,
        }
    }
}

/// `true` for every parent whose condition is inactive under `flags` or
/// whose `Custom` condition `tracker` has switched off.
pub fn build_inactive_parents(
    layout: &Layout,
    flags: &ReplicationFlags,
    tracker: Option<&ChangedPropertyTracker>,
) -> Vec<bool> {
    layout
        .parents()
        .iter()
        .enumerate()
        .map(|(parent_index, parent)| {
            !parent.condition.is_active(flags)
                || tracker.map_or(false, |tracker| !tracker.is_active(parent_index))
        })
        .collect()
}

/// Per-object activity of `Custom` condition parents, shared by every
/// connection. Inactive parents are skipped by the shared compare.
#[derive(Clone, Debug)]
pub struct ChangedPropertyTracker {
    active: Vec<bool>,
    custom: Vec<bool>,
}

impl ChangedPropertyTracker {
    pub fn new(layout: &Layout) -> Self {
        Self {
            active: vec![true; layout.parents().len()],
            custom: layout
                .parents()
                .iter()
                .map(|parent| parent.condition == RepCondition::Custom)
                .collect(),
        }
    }

    /// Turns a `Custom` condition parent on or off for every connection.
    /// Returns whether the parent's activity changed.
    pub fn set_custom_active(&mut self, parent_index: usize, active: bool) -> bool {
        match self.custom.get(parent_index) {
            Some(true) => {
                let changed = self.active[parent_index] != active;
                self.active[parent_index] = active;
                changed
            }
            Some(false) => {
                warn!(
                    "Parent {} does not have a custom condition, ignoring override",
                    parent_index
                );
                false
            }
            None => {
                warn!("Parent {} is out of range", parent_index);
                false
            }
        }
    }

    pub fn is_active(&self, parent_index: usize) -> bool {
        self.active.get(parent_index).copied().unwrap_or(true)
    }
}
