//! Weak reference side table
//!
//! Weak slots live outside the objects they point at. The table keeps a
//! reverse index from each target to the slots that reference it, so
//! destroying an object zeroes every weak slot in one pass.

use crate::error::{HeapError, HeapResult};
use crate::handle::HeapHandle;
use crate::heap::Heap;
use crate::ownership::Ownership;
use rustc_hash::FxHashMap;

/// Weak reference to a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeakRef(u32);

impl WeakRef {
    /// Slot number
    pub fn id(self) -> u32 {
        self.0
    }
}

/// A heap reference held by a field, tagged with its ownership kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef {
    /// Counted reference
    Strong(HeapHandle),
    /// Side-table reference
    Weak(WeakRef),
}

impl FieldRef {
    /// Ownership kind of this field
    pub fn ownership(&self) -> Ownership {
        match self {
            FieldRef::Strong(_) => Ownership::Strong,
            FieldRef::Weak(_) => Ownership::Weak,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct WeakTable {
    slots: Vec<Option<Option<HeapHandle>>>,
    free: Vec<u32>,
    by_target: FxHashMap<HeapHandle, Vec<u32>>,
}

impl WeakTable {
    fn insert(&mut self, target: HeapHandle) -> WeakRef {
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id as usize] = Some(Some(target));
                id
            }
            None => {
                self.slots.push(Some(Some(target)));
                (self.slots.len() - 1) as u32
            }
        };
        self.by_target.entry(target).or_default().push(id);
        WeakRef(id)
    }

    fn get(&self, weak: WeakRef) -> HeapResult<Option<HeapHandle>> {
        self.slots
            .get(weak.0 as usize)
            .copied()
            .flatten()
            .ok_or(HeapError::InvalidWeak(weak.0))
    }

    fn remove(&mut self, weak: WeakRef) -> HeapResult<()> {
        let target = self.get(weak)?;
        self.slots[weak.0 as usize] = None;
        self.free.push(weak.0);
        if let Some(target) = target {
            if let Some(ids) = self.by_target.get_mut(&target) {
                ids.retain(|&id| id != weak.0);
                if ids.is_empty() {
                    self.by_target.remove(&target);
                }
            }
        }
        Ok(())
    }

    /// Zero every slot referencing `target`
    pub(crate) fn clear_target(&mut self, target: HeapHandle) {
        if let Some(ids) = self.by_target.remove(&target) {
            for id in ids {
                if let Some(slot) = self.slots.get_mut(id as usize) {
                    if slot.is_some() {
                        *slot = Some(None);
                    }
                }
            }
        }
    }

    fn count(&self, target: HeapHandle) -> usize {
        self.by_target.get(&target).map_or(0, Vec::len)
    }
}

impl Heap {
    /// Create a weak reference to a live object
    pub fn weak_new(&mut self, target: HeapHandle) -> HeapResult<WeakRef> {
        self.header(target)?;
        Ok(self.weak.insert(target))
    }

    /// Upgrade a weak reference
    ///
    /// Returns a freshly retained strong handle, or `None` once the target
    /// has been destroyed. The caller owns the returned handle.
    pub fn weak_load(&mut self, weak: WeakRef) -> HeapResult<Option<HeapHandle>> {
        match self.weak.get(weak)? {
            Some(target) => {
                self.retain(target)?;
                Ok(Some(target))
            }
            None => Ok(None),
        }
    }

    /// Drop a weak reference
    pub fn weak_drop(&mut self, weak: WeakRef) -> HeapResult<()> {
        self.weak.remove(weak)
    }

    /// Number of weak references to `target`
    pub fn weak_count(&self, target: HeapHandle) -> usize {
        self.weak.count(target)
    }

    /// Store `target` into a field of the given ownership kind
    ///
    /// A strong field retains the target; a weak field registers a slot.
    pub fn field_new(&mut self, ownership: Ownership, target: HeapHandle) -> HeapResult<FieldRef> {
        match ownership {
            Ownership::Strong => {
                self.retain(target)?;
                Ok(FieldRef::Strong(target))
            }
            Ownership::Weak => self.weak_new(target).map(FieldRef::Weak),
        }
    }

    /// Read a field as a freshly retained strong handle
    pub fn field_load(&mut self, field: FieldRef) -> HeapResult<Option<HeapHandle>> {
        match field {
            FieldRef::Strong(target) => {
                self.retain(target)?;
                Ok(Some(target))
            }
            FieldRef::Weak(weak) => self.weak_load(weak),
        }
    }

    /// Clear a field, releasing what it owned
    pub fn field_drop(&mut self, field: FieldRef) -> HeapResult<()> {
        match field {
            FieldRef::Strong(target) => self.release(target).map(|_| ()),
            FieldRef::Weak(weak) => self.weak_drop(weak),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::HeapConfig;
    use crate::error::HeapError;
    use crate::heap::Heap;
    use crate::ownership::Ownership;

    #[test]
    fn test_weak_load_retains() {
        let mut heap = Heap::with_config(HeapConfig::debug());
        let s = heap.string_new("target");
        let weak = heap.weak_new(s).unwrap();
        let strong = heap.weak_load(weak).unwrap().unwrap();
        assert_eq!(strong, s);
        assert_eq!(heap.refcount(s).unwrap(), 2);
        heap.release(strong).unwrap();
        heap.release(s).unwrap();
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_destruction_zeroes_weak_slots() {
        let mut heap = Heap::new();
        let s = heap.string_new("gone");
        let a = heap.weak_new(s).unwrap();
        let b = heap.weak_new(s).unwrap();
        assert_eq!(heap.weak_count(s), 2);
        heap.release(s).unwrap();
        assert_eq!(heap.weak_load(a).unwrap(), None);
        assert_eq!(heap.weak_load(b).unwrap(), None);
        assert_eq!(heap.weak_count(s), 0);

        // A new object in the same slot is not reachable through old weak refs.
        let t = heap.string_new("new");
        assert_eq!(t.index, s.index);
        assert_eq!(heap.weak_load(a).unwrap(), None);
    }

    #[test]
    fn test_back_reference_cycle_is_collected() {
        // parent -> child is strong, child -> parent is weak
        let mut heap = Heap::with_config(HeapConfig::debug());
        let parent = heap.string_new("parent");
        let child = heap.string_new("child");
        let down = heap.field_new(Ownership::Strong, child).unwrap();
        let up = heap.field_new(Ownership::Weak, parent).unwrap();
        assert_eq!(down.ownership(), Ownership::Strong);
        assert_eq!(up.ownership(), Ownership::Weak);
        assert_eq!(heap.refcount(parent).unwrap(), 1);
        assert_eq!(heap.refcount(child).unwrap(), 2);

        heap.release(parent).unwrap();
        assert_eq!(heap.field_load(up).unwrap(), None);
        heap.field_drop(down).unwrap();
        heap.field_drop(up).unwrap();
        heap.release(child).unwrap();
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_weak_drop() {
        let mut heap = Heap::new();
        let s = heap.string_new("x");
        let weak = heap.weak_new(s).unwrap();
        heap.weak_drop(weak).unwrap();
        assert_eq!(heap.weak_count(s), 0);
        assert_eq!(heap.weak_load(weak), Err(HeapError::InvalidWeak(weak.id())));
        assert_eq!(heap.weak_drop(weak), Err(HeapError::InvalidWeak(weak.id())));
    }
}
