//! Ownership registry for every object a runtime allocates.
//!
//! Objects are shared through `Rc`, so a closure stored in the scope it
//! captured, or an object holding itself, forms a cycle that reference
//! counting never frees. The heap keeps a weak handle to each allocation and
//! empties all of them at teardown, which breaks every such cycle.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::value::{Object, ObjectClass, ObjectRef};

/// Dead handles are swept once the registry reaches this many entries, and
/// again whenever it doubles past the survivors.
const MIN_SWEEP_LEN: usize = 64;

#[derive(Debug)]
pub struct Heap {
    objects: Vec<Weak<RefCell<Object>>>,
    sweep_at: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            sweep_at: MIN_SWEEP_LEN,
        }
    }

    /// Creates an empty object of `class` and records it.
    pub fn allocate(&mut self, class: ObjectClass) -> ObjectRef {
        if self.objects.len() >= self.sweep_at {
            self.sweep();
        }
        let object = Object::new(class);
        self.objects.push(Rc::downgrade(&object));
        object
    }

    /// Number of tracked objects that are still alive.
    pub fn live_objects(&self) -> usize {
        self.objects
            .iter()
            .filter(|object| object.strong_count() > 0)
            .count()
    }

    fn sweep(&mut self) {
        self.objects.retain(|object| object.strong_count() > 0);
        self.sweep_at = (self.objects.len() * 2).max(MIN_SWEEP_LEN);
    }

    /// Empties every live object and forgets all handles, returning how many
    /// objects were cleared.
    ///
    /// All survivors are pinned before any property is dropped, so releasing
    /// a long chain of objects never recurses through their destructors.
    pub fn clear(&mut self) -> usize {
        let live: Vec<ObjectRef> = self.objects.drain(..).filter_map(|o| o.upgrade()).collect();
        let properties: Vec<_> = live
            .iter()
            .map(|object| object.borrow_mut().take_properties())
            .collect();
        drop(properties);
        self.sweep_at = MIN_SWEEP_LEN;
        live.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
