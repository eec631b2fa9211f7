use log::{debug, trace};

use crate::{
    layout::{value_at_mut, Value},
    types::{NetGuid, ReferenceResolver, Resolved},
};

/// A received object reference whose object has not arrived yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnmappedRef {
    pub parent_index: usize,
    /// Slot path of the reference inside the object data
    pub path: Vec<usize>,
    pub token: NetGuid,
}

/// Outcome of retrying unmapped references.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnmappedUpdate {
    /// Some references are still waiting on their objects
    pub has_unmapped: bool,
    /// At least one reference was written into the data
    pub mapped_any: bool,
}

#[derive(Clone, Debug, Default)]
pub struct UnmappedReferences {
    refs: Vec<UnmappedRef>,
}

impl UnmappedReferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnmappedRef> {
        self.refs.iter()
    }

    pub fn add(&mut self, unmapped: UnmappedRef) {
        trace!("Tracking unmapped reference {:?} at {:?}", unmapped.token, unmapped.path);
        self.refs.push(unmapped);
    }

    /// Forgets every reference at or below `prefix`. Returns whether any was
    /// removed.
    pub fn remove_prefix(&mut self, prefix: &[usize]) -> bool {
        let before = self.refs.len();
        self.refs.retain(|unmapped| !unmapped.path.starts_with(prefix));
        before != self.refs.len()
    }

    /// Forgets references into elements `from..` of the array at `prefix`.
    pub fn remove_elements_from(&mut self, prefix: &[usize], from: usize) {
        self.refs.retain(|unmapped| {
            !(unmapped.path.len() > prefix.len()
                && unmapped.path.starts_with(prefix)
                && unmapped.path[prefix.len()] >= from)
        });
    }

    /// Resolves whatever can be resolved now, writing the objects into
    /// `data`. Parents that received an object are pushed onto `notifies`.
    pub fn update(
        &mut self,
        data: &mut [Value],
        resolver: &dyn ReferenceResolver,
        notifies: &mut Vec<usize>,
    ) -> UnmappedUpdate {
        let mut update = UnmappedUpdate::default();

        self.refs.retain(|unmapped| {
            let object = match resolver.token_to_object(unmapped.token) {
                Resolved::Pending => return true,
                Resolved::Null => None,
                Resolved::Mapped(object) => Some(object),
            };
            match value_at_mut(data, &unmapped.path) {
                Some(slot @ Value::Object(_)) => {
                    *slot = Value::Object(object);
                    update.mapped_any = true;
                    if !notifies.contains(&unmapped.parent_index) {
                        notifies.push(unmapped.parent_index);
                    }
                }
                _ => debug!(
                    "Dropping unmapped reference {:?}, {:?} no longer holds an object",
                    unmapped.token, unmapped.path
                ),
            }
            false
        });

        update.has_unmapped = !self.refs.is_empty();
        update
    }
}
