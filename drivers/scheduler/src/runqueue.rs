//! Singly-linked FIFO run queue, intrusive on `Tcb::next` (§4.6).

use crate::thread::Tcb;

pub struct RunQueue {
    head: *mut Tcb,
    tail: *mut Tcb,
}

// SAFETY: the scheduler singleton that owns a `RunQueue` is only ever
// touched with interrupts disabled on this single core.
unsafe impl Send for RunQueue {}

impl RunQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: core::ptr::null_mut(),
            tail: core::ptr::null_mut(),
        }
    }

    pub fn push(&mut self, t: *mut Tcb) {
        // SAFETY: `t` points at a live TCB the caller owns.
        unsafe {
            (*t).next = core::ptr::null_mut();
        }
        if self.tail.is_null() {
            self.head = t;
        } else {
            // SAFETY: `self.tail` is a live TCB already in the queue.
            unsafe {
                (*self.tail).next = t;
            }
        }
        self.tail = t;
    }

    pub fn pop(&mut self) -> *mut Tcb {
        if self.head.is_null() {
            return core::ptr::null_mut();
        }
        let t = self.head;
        // SAFETY: `t` is the queue head, a live TCB.
        self.head = unsafe { (*t).next };
        if self.head.is_null() {
            self.tail = core::ptr::null_mut();
        }
        // SAFETY: `t` is about to leave the queue.
        unsafe {
            (*t).next = core::ptr::null_mut();
        }
        t
    }

    /// Unlinks `t` from the queue if it's present; a no-op otherwise.
    pub fn remove(&mut self, t: *mut Tcb) {
        let mut prev: *mut Tcb = core::ptr::null_mut();
        let mut cur = self.head;
        while !cur.is_null() {
            if cur == t {
                // SAFETY: `cur`/`prev` are live queue nodes.
                unsafe {
                    let next = (*cur).next;
                    if prev.is_null() {
                        self.head = next;
                    } else {
                        (*prev).next = next;
                    }
                    if cur == self.tail {
                        self.tail = prev;
                    }
                    (*cur).next = core::ptr::null_mut();
                }
                return;
            }
            prev = cur;
            // SAFETY: `cur` is a live queue node.
            cur = unsafe { (*cur).next };
        }
    }
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}
