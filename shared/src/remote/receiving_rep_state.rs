use crate::{
    compat::NetFieldExportGroup,
    layout::{Layout, ObjectData, Value},
    remote::unmapped::{UnmappedReferences, UnmappedUpdate},
    types::ReferenceResolver,
};

/// A change notification owed to application code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepNotify {
    pub parent_index: usize,
    pub name: String,
}

/// Per-object receive state: previous values of notifying properties,
/// pending notifications, unresolved references and the field exports
/// announced by the peer.
#[derive(Debug)]
pub struct ReceivingRepState {
    shadow: ObjectData,
    rep_notifies: Vec<usize>,
    unmapped: UnmappedReferences,
    exports: NetFieldExportGroup,
    skip_role_swap: bool,
}

impl ReceivingRepState {
    pub fn new(layout: &Layout) -> Self {
        Self {
            shadow: layout.default_data(),
            rep_notifies: Vec::new(),
            unmapped: UnmappedReferences::new(),
            exports: NetFieldExportGroup::new(layout.name()),
            skip_role_swap: false,
        }
    }

    /// Value each notifying property held before the last receive.
    pub fn shadow(&self) -> &[Value] {
        &self.shadow
    }

    pub fn unmapped(&self) -> &UnmappedReferences {
        &self.unmapped
    }

    pub fn has_unmapped(&self) -> bool {
        !self.unmapped.is_empty()
    }

    pub fn skip_role_swap(&self) -> bool {
        self.skip_role_swap
    }

    /// Writes received roles into their own slots instead of each other's,
    /// as when reading back a recording made on this side.
    pub fn set_skip_role_swap(&mut self, skip: bool) {
        self.skip_role_swap = skip;
    }

    pub fn exports(&self) -> &NetFieldExportGroup {
        &self.exports
    }

    /// Parent indices with a queued notification, in receive order.
    pub fn pending_rep_notifies(&self) -> &[usize] {
        &self.rep_notifies
    }

    /// Drains the queued notifications.
    pub fn take_rep_notifies(&mut self, layout: &Layout) -> Vec<RepNotify> {
        self.rep_notifies
            .drain(..)
            .filter_map(|parent_index| {
                layout.parents().get(parent_index).map(|parent| RepNotify {
                    parent_index,
                    name: parent.name.clone(),
                })
            })
            .collect()
    }

    /// Retries every unresolved reference, queueing notifications for the
    /// parents that received an object.
    pub fn update_unmapped(
        &mut self,
        data: &mut [Value],
        resolver: &dyn ReferenceResolver,
    ) -> UnmappedUpdate {
        if self.unmapped.is_empty() {
            return UnmappedUpdate::default();
        }
        self.unmapped.update(data, resolver, &mut self.rep_notifies)
    }

    pub(crate) fn queue_rep_notify(&mut self, parent_index: usize) {
        if !self.rep_notifies.contains(&parent_index) {
            self.rep_notifies.push(parent_index);
        }
    }

    pub(crate) fn unmapped_mut(&mut self) -> &mut UnmappedReferences {
        &mut self.unmapped
    }

    pub(crate) fn split_mut(
        &mut self,
    ) -> (
        &mut [Value],
        &mut Vec<usize>,
        &mut UnmappedReferences,
        &mut NetFieldExportGroup,
    ) {
        (
            &mut self.shadow,
            &mut self.rep_notifies,
            &mut self.unmapped,
            &mut self.exports,
        )
    }
}
