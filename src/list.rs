use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};

/// A node in the doubly linked list.
///
/// Contains a value and pointers to the previous and next entries.
/// This structure is not meant to be used directly by users of the `List`.
pub(crate) struct Entry<T> {
    /// The value stored in this entry. Uses MaybeUninit to allow for sigil nodes.
    val: mem::MaybeUninit<T>,
    /// Pointer to the previous entry in the list.
    prev: *mut Entry<T>,
    /// Pointer to the next entry in the list.
    next: *mut Entry<T>,
}

impl<T> Entry<T> {
    fn new(val: T) -> Self {
        Entry {
            val: mem::MaybeUninit::new(val),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Creates a sigil (sentinel) entry without initializing the value.
    fn new_sigil() -> Self {
        Entry {
            val: mem::MaybeUninit::uninit(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Takes the value out of a detached entry, freeing the entry.
    ///
    /// # Safety
    ///
    /// `self` must not be a sigil node.
    unsafe fn into_value(self: Box<Self>) -> T {
        // SAFETY: the caller guarantees the value is initialized
        unsafe { self.val.assume_init() }
    }
}

/// Unbounded doubly linked list with O(1) push, removal and move-to-front.
///
/// The front is the most recently used end. Nodes are addressed through the
/// raw pointers returned by [`push_front`](List::push_front); callers keep
/// those pointers next to their data to relink or remove it later. Capacity
/// is enforced by the owner, not by the list.
///
/// Dropping or clearing the list drops every stored value.
pub(crate) struct List<T> {
    /// Current number of items in the list.
    len: usize,
    /// Pointer to the head sentinel node.
    head: *mut Entry<T>,
    /// Pointer to the tail sentinel node.
    tail: *mut Entry<T>,
    marker: PhantomData<Box<Entry<T>>>,
}

// SAFETY: the list owns its entries exclusively; sending it moves ownership
// of every `T` with it.
unsafe impl<T: Send> Send for List<T> {}

// SAFETY: shared access only hands out `&T`.
unsafe impl<T: Sync> Sync for List<T> {}

impl<T> List<T> {
    /// Creates an empty list.
    ///
    /// This method sets up the sentinel nodes and links them together.
    pub(crate) fn new() -> List<T> {
        let head = Box::into_raw(Box::new(Entry::new_sigil()));
        let tail = Box::into_raw(Box::new(Entry::new_sigil()));

        let list = List {
            len: 0,
            head,
            tail,
            marker: PhantomData,
        };

        // SAFETY: head and tail are newly allocated and valid pointers
        unsafe {
            (*list.head).next = list.tail;
            (*list.tail).prev = list.head;
        }

        list
    }

    /// Returns the current number of items in the list.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list contains no items.
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if `node` is the first item.
    pub(crate) fn is_front(&self, node: *mut Entry<T>) -> bool {
        // SAFETY: head is valid for the whole lifetime of the list
        !node.is_null() && unsafe { (*self.head).next } == node
    }

    /// Returns the value of the last (least recently used) item.
    pub(crate) fn back(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the list is not empty, so the node before tail is a
        // regular, initialized entry
        unsafe { Some((*(*self.tail).prev).val.assume_init_ref()) }
    }

    /// Adds a value to the front of the list.
    ///
    /// Returns a pointer to the newly created entry. The pointer stays valid
    /// until the entry is removed or the list is cleared or dropped.
    pub(crate) fn push_front(&mut self, v: T) -> *mut Entry<T> {
        let node = NonNull::from(Box::leak(Box::new(Entry::new(v))));
        // SAFETY: node is a newly allocated entry that is not part of any list yet
        unsafe { self.attach(node.as_ptr()) };
        self.len += 1;
        node.as_ptr()
    }

    /// Removes the last (least recently used) item and returns its value.
    pub(crate) fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the list is not empty, so there's at least one regular
        // element between the sentinels
        unsafe {
            let prev = (*self.tail).prev;
            self.detach(prev);
            self.len -= 1;
            Some(Box::from_raw(prev).into_value())
        }
    }

    /// Removes the first (most recently used) item and returns its value.
    pub(crate) fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: as in `pop_back`
        unsafe {
            let next = (*self.head).next;
            self.detach(next);
            self.len -= 1;
            Some(Box::from_raw(next).into_value())
        }
    }

    /// Unlinks `node` and returns its value.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `node` is a valid pointer to a node in this
    /// list (not null, not freed, and actually part of this list).
    pub(crate) unsafe fn remove(&mut self, node: *mut Entry<T>) -> Option<T> {
        if self.is_empty() || node.is_null() || node == self.head || node == self.tail {
            return None;
        }
        // SAFETY: caller guarantees node is valid and part of this list
        unsafe {
            self.detach(node);
            self.len -= 1;
            Some(Box::from_raw(node).into_value())
        }
    }

    /// Moves a node to the front of the list (after the head sentinel).
    ///
    /// # Safety
    ///
    /// The caller must ensure that `node` points to a valid entry in the list.
    pub(crate) unsafe fn move_to_front(&mut self, node: *mut Entry<T>) {
        if node.is_null() || node == self.head || node == self.tail || self.is_front(node) {
            return;
        }
        // SAFETY: caller guarantees node is part of this list
        unsafe {
            self.detach(node);
            self.attach(node);
        }
    }

    /// Iterates values from front (most recent) to back.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            // SAFETY: head is valid for the whole lifetime of the list
            next: unsafe { (*self.head).next },
            tail: self.tail,
            marker: PhantomData,
        }
    }

    /// Clears the list, dropping all values.
    pub(crate) fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    /// Detaches a node from the list without deallocating it.
    ///
    /// # Safety
    ///
    /// `node` must be a regular entry currently linked into this list.
    unsafe fn detach(&mut self, node: *mut Entry<T>) {
        // SAFETY: a linked entry's prev and next pointers are valid entries
        unsafe {
            (*(*node).prev).next = (*node).next;
            (*(*node).next).prev = (*node).prev;
        }
    }

    /// Attaches a node after the head sentinel node.
    ///
    /// # Safety
    ///
    /// `node` must be valid and not currently linked into the list.
    unsafe fn attach(&mut self, node: *mut Entry<T>) {
        // SAFETY: head is valid and the caller guarantees node is detached
        unsafe {
            (*node).next = (*self.head).next;
            (*node).prev = self.head;
            (*self.head).next = node;
            (*(*node).next).prev = node;
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.clear();

        // SAFETY: head and tail are valid pointers initialized in `new` and
        // freed exactly once, here
        unsafe {
            drop(Box::from_raw(self.head));
            drop(Box::from_raw(self.tail));
        }
    }
}

impl<T> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List").field("length", &self.len).finish()
    }
}

/// Front-to-back iterator over list values.
pub(crate) struct Iter<'a, T> {
    next: *mut Entry<T>,
    tail: *mut Entry<T>,
    marker: PhantomData<&'a T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.next == self.tail {
            return None;
        }
        // SAFETY: every entry between the sentinels is initialized, and the
        // shared borrow of the list prevents unlinking while iterating
        unsafe {
            let entry = &*self.next;
            self.next = entry.next;
            Some(entry.val.assume_init_ref())
        }
    }
}
