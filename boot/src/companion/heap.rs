//! Object heap for values passed across the call boundary
//!
//! The guest only ever sees `u32` handles. Slots below [`HEAP_RESERVED`] hold
//! fixed values and are never freed; freed slots form a LIFO free list threaded
//! through the slot vector.

use std::cell::RefCell;
use std::rc::Rc;

/// Handle of the shared `undefined` slot
pub const UNDEFINED: u32 = 32;
/// Handle of the shared `null` slot
pub const NULL: u32 = 33;
/// Handle of the shared `true` slot
pub const TRUE: u32 = 34;
/// Handle of the shared `false` slot
pub const FALSE: u32 = 35;

/// First handle that can be allocated and dropped
pub const HEAP_RESERVED: u32 = 36;

/// Storage behind a byte view
#[derive(Debug, Clone)]
pub enum Backing {
    /// The guest's linear memory
    Memory,
    /// A host-owned buffer
    Owned(Rc<RefCell<Vec<u8>>>),
}

/// A typed byte array: a window onto guest memory or a host buffer
#[derive(Debug, Clone)]
pub struct ByteView {
    pub backing: Backing,
    pub offset: usize,
    pub len: usize,
}

impl ByteView {
    /// A zeroed host-owned buffer of `len` bytes
    pub fn owned(len: usize) -> Self {
        Self {
            backing: Backing::Owned(Rc::new(RefCell::new(vec![0; len]))),
            offset: 0,
            len,
        }
    }

    /// A view over all of guest memory as it is now
    pub fn memory(memory_len: usize) -> Self {
        Self {
            backing: Backing::Memory,
            offset: 0,
            len: memory_len,
        }
    }

    /// Sub-view with `start`/`end` clamped into `[0, len]`
    pub fn subarray(&self, start: usize, end: usize) -> Self {
        let start = start.min(self.len);
        let end = end.clamp(start, self.len);
        Self {
            backing: self.backing.clone(),
            offset: self.offset + start,
            len: end - start,
        }
    }

    /// Copy the viewed bytes out. `None` if the view no longer fits its backing.
    pub fn read(&self, memory: &[u8]) -> Option<Vec<u8>> {
        let range = self.offset..self.offset.checked_add(self.len)?;
        match &self.backing {
            Backing::Memory => memory.get(range).map(<[u8]>::to_vec),
            Backing::Owned(buf) => buf.borrow().get(range).map(<[u8]>::to_vec),
        }
    }

    /// Run `f` over the viewed bytes mutably. `None` if the view no longer fits.
    pub fn with_bytes_mut<R>(&self, memory: &mut [u8], f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let range = self.offset..self.offset.checked_add(self.len)?;
        match &self.backing {
            Backing::Memory => memory.get_mut(range).map(f),
            Backing::Owned(buf) => buf.borrow_mut().get_mut(range).map(f),
        }
    }
}

/// A value held in the heap
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    /// The global object (`self`)
    Global,
    /// The crypto provider reachable from the global object
    Crypto,
    /// `crypto.getRandomValues` taken as a value
    GetRandomValuesFn,
    /// The module object
    Module,
    /// The guest memory object
    Memory,
    /// The guest memory's underlying buffer
    MemoryBuffer,
    /// A growable list with reference semantics
    Array(Rc<RefCell<Vec<HostValue>>>),
    /// A byte array
    Bytes(ByteView),
    /// A guest struct pointer wrapped as a host object
    Wrapped { class: &'static str, ptr: u32 },
}

impl HostValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Occupied(HostValue),
    Free(u32),
}

/// Slab of host values addressed by handle
#[derive(Debug)]
pub struct ObjectHeap {
    slots: Vec<Slot>,
    next_free: u32,
}

impl ObjectHeap {
    pub fn new() -> Self {
        let mut slots = vec![Slot::Occupied(HostValue::Undefined); UNDEFINED as usize];
        slots.push(Slot::Occupied(HostValue::Undefined));
        slots.push(Slot::Occupied(HostValue::Null));
        slots.push(Slot::Occupied(HostValue::Bool(true)));
        slots.push(Slot::Occupied(HostValue::Bool(false)));
        Self {
            next_free: slots.len() as u32,
            slots,
        }
    }

    /// Store a value and return its handle
    pub fn insert(&mut self, value: HostValue) -> u32 {
        if self.next_free as usize == self.slots.len() {
            self.slots.push(Slot::Free(self.next_free + 1));
        }
        let idx = self.next_free;
        self.next_free = match self.slots[idx as usize] {
            Slot::Free(next) => next,
            // The free list only ever points at free slots
            Slot::Occupied(_) => unreachable!("heap free list points at an occupied slot"),
        };
        self.slots[idx as usize] = Slot::Occupied(value);
        idx
    }

    pub fn get(&self, handle: u32) -> Option<&HostValue> {
        match self.slots.get(handle as usize) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    /// Release a handle. Reserved, free and out-of-range handles are ignored.
    pub fn drop_ref(&mut self, handle: u32) -> bool {
        if handle < HEAP_RESERVED {
            return false;
        }
        match self.slots.get_mut(handle as usize) {
            Some(slot @ Slot::Occupied(_)) => {
                *slot = Slot::Free(self.next_free);
                self.next_free = handle;
                true
            }
            _ => false,
        }
    }

    /// Number of allocated (non-reserved) values currently alive
    pub fn live_count(&self) -> usize {
        self.slots[HEAP_RESERVED as usize..]
            .iter()
            .filter(|slot| matches!(slot, Slot::Occupied(_)))
            .count()
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_slots() {
        let heap = ObjectHeap::new();
        assert!(heap.get(UNDEFINED).unwrap().is_undefined());
        assert!(matches!(heap.get(NULL), Some(HostValue::Null)));
        assert!(matches!(heap.get(TRUE), Some(HostValue::Bool(true))));
        assert!(matches!(heap.get(FALSE), Some(HostValue::Bool(false))));
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_first_allocation_follows_reserved() {
        let mut heap = ObjectHeap::new();
        assert_eq!(heap.insert(HostValue::Global), HEAP_RESERVED);
        assert_eq!(heap.insert(HostValue::Crypto), HEAP_RESERVED + 1);
        assert_eq!(heap.live_count(), 2);
    }

    #[test]
    fn test_freed_slots_reused_lifo() {
        let mut heap = ObjectHeap::new();
        let a = heap.insert(HostValue::Global);
        let b = heap.insert(HostValue::Crypto);
        let c = heap.insert(HostValue::Module);

        assert!(heap.drop_ref(a));
        assert!(heap.drop_ref(c));
        assert!(heap.get(a).is_none());

        assert_eq!(heap.insert(HostValue::Null), c);
        assert_eq!(heap.insert(HostValue::Null), a);
        assert_eq!(heap.insert(HostValue::Null), c + 1);
        assert!(matches!(heap.get(b), Some(HostValue::Crypto)));
    }

    #[test]
    fn test_drop_reserved_or_stale_is_noop() {
        let mut heap = ObjectHeap::new();
        assert!(!heap.drop_ref(NULL));
        assert!(!heap.drop_ref(1000));
        let a = heap.insert(HostValue::Global);
        assert!(heap.drop_ref(a));
        assert!(!heap.drop_ref(a));
        assert!(matches!(heap.get(NULL), Some(HostValue::Null)));
    }

    #[test]
    fn test_subarray_clamps() {
        let view = ByteView::owned(10);
        let sub = view.subarray(4, 100);
        assert_eq!((sub.offset, sub.len), (4, 6));
        let empty = view.subarray(8, 2);
        assert_eq!((empty.offset, empty.len), (8, 0));
        let nested = sub.subarray(1, 3);
        assert_eq!((nested.offset, nested.len), (5, 2));
    }

    #[test]
    fn test_owned_views_share_backing() {
        let view = ByteView::owned(4);
        let tail = view.subarray(2, 4);
        let mut memory: [u8; 0] = [];
        tail.with_bytes_mut(&mut memory, |bytes| bytes.copy_from_slice(&[7, 9]))
            .unwrap();
        assert_eq!(view.read(&memory).unwrap(), vec![0, 0, 7, 9]);
    }

    #[test]
    fn test_memory_view_out_of_bounds() {
        let view = ByteView::memory(16).subarray(8, 16);
        assert!(view.read(&[0u8; 12]).is_none());
        assert_eq!(view.read(&[1u8; 16]).unwrap(), vec![1; 8]);
    }
}
