use alloc::vec::Vec;

use super::handle::Handle;

enum Entry<T> {
    Occupied(T),
    /// Links to the next vacant entry, forming the free list.
    Vacant(Option<Handle>),
}

/// Slot allocator owning every node of one tree.
///
/// Nodes refer to each other by [`Handle`], never by reference, so parent links, child lists and the
/// B+tree leaf chain never compete for ownership. Vacated entries are threaded into a free list and
/// recycled, most recently vacated first, before the entry vector grows.
pub(crate) struct Arena<T> {
    entries: Vec<Entry<T>>,
    vacant: Option<Handle>,
    live: usize,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            vacant: None,
            live: 0,
        }
    }

    /// Number of occupied entries.
    pub(crate) const fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn alloc(&mut self, element: T) -> Handle {
        self.live += 1;
        if let Some(handle) = self.vacant {
            let entry = &mut self.entries[handle.slot()];
            let Entry::Vacant(next) = *entry else {
                unreachable!("`Arena::alloc()` - free list points at an occupied entry");
            };
            self.vacant = next;
            *entry = Entry::Occupied(element);
            return handle;
        }

        let handle = Handle::at(self.entries.len());
        self.entries.push(Entry::Occupied(element));
        handle
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        match self.entries.get(handle.slot()) {
            Some(Entry::Occupied(element)) => element,
            _ => panic!("`Arena::get()` - `handle` is invalid!"),
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        match self.entries.get_mut(handle.slot()) {
            Some(Entry::Occupied(element)) => element,
            _ => panic!("`Arena::get_mut()` - `handle` is invalid!"),
        }
    }

    /// Vacates the entry and returns its element; the handle is handed out again by a later `alloc`.
    pub(crate) fn take(&mut self, handle: Handle) -> T {
        let entry = self.entries.get_mut(handle.slot()).expect("`Arena::take()` - `handle` is invalid!");
        match core::mem::replace(entry, Entry::Vacant(self.vacant)) {
            Entry::Occupied(element) => {
                self.vacant = Some(handle);
                self.live -= 1;
                element
            }
            Entry::Vacant(next) => {
                *entry = Entry::Vacant(next);
                panic!("`Arena::take()` - `handle` is invalid!");
            }
        }
    }

    pub(crate) fn free(&mut self, handle: Handle) {
        drop(self.take(handle));
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.vacant = None;
        self.live = 0;
    }
}
