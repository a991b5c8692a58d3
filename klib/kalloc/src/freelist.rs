//! Demand-grown, single-free-list, first-fit heap.
//!
//! The list is kept in address order. Blocks are only ever adjacent-and-free
//! for the duration of [`FreeListHeap::free`]; every other observer sees a
//! list where no two neighbouring blocks are both free.

use core::alloc::{GlobalAlloc, Layout};

use kcore::sync::SpinMutex;

pub const MIN_ALIGN: usize = 16;
const BLOCK_MAGIC: u32 = 0xB10C_F33D;
const POISON_BYTE: u8 = 0xDE;

bitflags::bitflags! {
    pub struct AllocFlags: u32 {
        const ZERO = 1;
    }
}

/// Every live or free block is prefixed with one of these. `payload_size`
/// never includes the header itself. `prev`/`next` are raw addresses rather
/// than typed pointers so a poisoned/coalesced header can be scribbled over
/// with [`POISON_BYTE`] without leaving a dangling reference anywhere.
#[repr(C)]
struct Header {
    magic: u32,
    free: u32,
    payload_size: u64,
    prev: u64,
    next: u64,
}

const HEADER_SIZE: usize = core::mem::size_of::<Header>();

impl Header {
    unsafe fn payload(this: *mut Header) -> *mut u8 {
        (this as *mut u8).add(HEADER_SIZE)
    }

    unsafe fn from_payload(payload: *mut u8) -> *mut Header {
        payload.sub(HEADER_SIZE) as *mut Header
    }

    unsafe fn prev(this: *mut Header) -> Option<*mut Header> {
        let p = (*this).prev;
        if p == 0 { None } else { Some(p as *mut Header) }
    }

    unsafe fn next(this: *mut Header) -> Option<*mut Header> {
        let n = (*this).next;
        if n == 0 { None } else { Some(n as *mut Header) }
    }

    unsafe fn set_prev(this: *mut Header, prev: Option<*mut Header>) {
        (*this).prev = prev.map_or(0, |p| p as u64);
    }

    unsafe fn set_next(this: *mut Header, next: Option<*mut Header>) {
        (*this).next = next.map_or(0, |n| n as u64);
    }

    unsafe fn end(this: *mut Header) -> *mut u8 {
        Header::payload(this).add((*this).payload_size as usize)
    }

    unsafe fn check_magic(this: *mut Header) {
        assert_eq!(
            (*this).magic,
            BLOCK_MAGIC,
            "heap corruption: block at {:p} has bad magic {:#x}",
            this,
            (*this).magic
        );
    }
}

/// Allows the heap to ask for more backing memory without knowing anything
/// about frame allocators or page tables: implemented by the kernel glue
/// that owns the physical frame allocator and the virtual memory manager.
pub trait HeapGrower {
    /// Maps `frames` additional 4 KiB frames, contiguous and immediately
    /// following the heap's current end, with `Writable | NoExec`
    /// permissions. Returns `false` if the platform is out of physical
    /// memory, page-table space, or the heap's reserved virtual range.
    fn grow(&mut self, frames: usize) -> bool;

    fn frame_size(&self) -> usize {
        4096
    }
}

/// Read-only snapshot of the heap's internal bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct HeapStats {
    pub block_count: usize,
    pub free_count: usize,
    pub used_bytes: usize,
    pub free_bytes: usize,
    pub largest_free: usize,
    pub heap_start: usize,
    pub heap_end: usize,
}

pub struct FreeListHeap<G> {
    grower: G,
    heap_start: usize,
    heap_end: usize,
    heap_max: usize,
    head: Option<*mut Header>,
}

// SAFETY: the heap is only ever touched through a `SpinMutex`, which is the
// sole means of establishing `Send`/`Sync` for the raw pointers it holds.
unsafe impl<G: Send> Send for FreeListHeap<G> {}

impl<G: HeapGrower> FreeListHeap<G> {
    /// `heap_start` must be page-aligned and unmapped; nothing is grown
    /// until the first allocation actually needs it.
    #[must_use]
    pub const fn new(grower: G, heap_start: usize, heap_max: usize) -> Self {
        Self {
            grower,
            heap_start,
            heap_end: heap_start,
            heap_max,
            head: None,
        }
    }

    fn align_up(size: usize, align: usize) -> usize {
        (size + align - 1) & !(align - 1)
    }

    /// Grows the heap by at least `min_bytes`, rounded up to whole frames.
    /// Fails if that would exceed `heap_max` or the grower is exhausted.
    fn heap_grow(&mut self, min_bytes: usize) -> bool {
        let frame_size = self.grower.frame_size();
        let grown = Self::align_up(min_bytes, frame_size);
        let frames = grown / frame_size;

        if self.heap_end + grown > self.heap_max {
            return false;
        }
        if !self.grower.grow(frames) {
            return false;
        }

        // SAFETY: `grow` mapped exactly `frames` writable frames starting at
        // `heap_end`, so extending or appending a free block there is sound.
        unsafe {
            if let Some(last) = self.last_block() {
                if (*last).free != 0 {
                    (*last).payload_size += grown as u64;
                } else {
                    self.append_free_block(self.heap_end, grown);
                }
            } else {
                self.append_free_block(self.heap_end, grown);
            }
        }

        self.heap_end += grown;
        true
    }

    unsafe fn last_block(&self) -> Option<*mut Header> {
        let mut cur = self.head?;
        while let Some(next) = Header::next(cur) {
            cur = next;
        }
        Some(cur)
    }

    /// Installs a brand-new free block at `addr`, linking it after the
    /// current tail of the list.
    unsafe fn append_free_block(&mut self, addr: usize, total_len: usize) {
        let hdr = addr as *mut Header;
        (*hdr).magic = BLOCK_MAGIC;
        (*hdr).free = 1;
        (*hdr).payload_size = (total_len - HEADER_SIZE) as u64;
        (*hdr).prev = 0;
        (*hdr).next = 0;

        if let Some(tail) = self.last_block() {
            Header::set_next(tail, Some(hdr));
            Header::set_prev(hdr, Some(tail));
        } else {
            self.head = Some(hdr);
        }
    }

    /// Splits `block` so a trailing free block is carved off iff the
    /// remainder after `used_payload` can hold a header plus one
    /// minimally-aligned payload.
    unsafe fn maybe_split(&mut self, block: *mut Header, used_payload: usize) {
        let total_payload = (*block).payload_size as usize;
        let remainder = total_payload - used_payload;
        if remainder < HEADER_SIZE + MIN_ALIGN {
            return;
        }

        let new_hdr = Header::payload(block).add(used_payload) as *mut Header;
        (*new_hdr).magic = BLOCK_MAGIC;
        (*new_hdr).free = 1;
        (*new_hdr).payload_size = (remainder - HEADER_SIZE) as u64;

        let old_next = Header::next(block);
        Header::set_next(new_hdr, old_next);
        Header::set_prev(new_hdr, Some(block));
        if let Some(next) = old_next {
            Header::set_prev(next, Some(new_hdr));
        }
        Header::set_next(block, Some(new_hdr));

        (*block).payload_size = used_payload as u64;
    }

    /// First-fit search for a free block whose payload is at least `size`
    /// bytes, retrying after a [`heap_grow`](Self::heap_grow) if nothing
    /// fits.
    unsafe fn find_fit(&mut self, size: usize) -> Option<*mut Header> {
        loop {
            let mut cur = self.head;
            while let Some(block) = cur {
                Header::check_magic(block);
                if (*block).free != 0 && (*block).payload_size as usize >= size {
                    return Some(block);
                }
                cur = Header::next(block);
            }

            if !self.heap_grow(size + HEADER_SIZE) {
                return None;
            }
        }
    }

    /// # Safety
    /// `layout.size()` must be non-zero.
    pub unsafe fn alloc(&mut self, layout: Layout, flags: AllocFlags) -> *mut u8 {
        let align = layout.align().max(MIN_ALIGN);
        let size = Self::align_up(layout.size(), align);
        if size == 0 {
            return core::ptr::null_mut();
        }

        let block = match self.find_fit(size) {
            Some(b) => b,
            None => return core::ptr::null_mut(),
        };

        self.maybe_split(block, size);
        (*block).free = 0;

        let payload = Header::payload(block);
        if flags.contains(AllocFlags::ZERO) {
            payload.write_bytes(0, (*block).payload_size as usize);
        }
        payload
    }

    /// # Safety
    /// `ptr` must have come from [`Self::alloc`]/[`Self::realloc`] on this
    /// heap and not have been freed already (a repeat free is tolerated and
    /// logged, not undefined behaviour, but only once).
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let block = Header::from_payload(ptr);
        Header::check_magic(block);

        if (*block).free != 0 {
            log::warn!("double free of block at {:p}", block);
            return;
        }

        let len = (*block).payload_size as usize;
        core::ptr::write_bytes(ptr, POISON_BYTE, len);
        (*block).free = 1;

        self.coalesce_forward(block);
        if let Some(prev) = Header::prev(block) {
            if (*prev).free != 0 {
                self.coalesce_forward(prev);
            }
        }
    }

    /// Absorbs every immediately-following free block into `block`.
    unsafe fn coalesce_forward(&mut self, block: *mut Header) {
        while let Some(next) = Header::next(block) {
            if (*next).free == 0 {
                break;
            }
            let merged = HEADER_SIZE + (*next).payload_size as usize;
            core::ptr::write_bytes(next as *mut u8, POISON_BYTE, HEADER_SIZE);

            let after = Header::next(next);
            Header::set_next(block, after);
            if let Some(after) = after {
                Header::set_prev(after, Some(block));
            }
            (*block).payload_size += merged as u64;
        }
    }

    /// # Safety
    /// Same preconditions as [`Self::alloc`] for the `None` case, and as
    /// [`Self::free`] for the `ptr` parameter in the general case.
    pub unsafe fn realloc(&mut self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        if ptr.is_null() {
            return self.alloc(
                Layout::from_size_align_unchecked(new_size, MIN_ALIGN),
                AllocFlags::empty(),
            );
        }
        if new_size == 0 {
            self.free(ptr);
            return core::ptr::null_mut();
        }

        let block = Header::from_payload(ptr);
        Header::check_magic(block);
        let new_size = Self::align_up(new_size, MIN_ALIGN);
        let old_size = (*block).payload_size as usize;

        if new_size <= old_size {
            self.maybe_split(block, new_size);
            return ptr;
        }

        if let Some(next) = Header::next(block) {
            if (*next).free != 0 {
                let combined = old_size + HEADER_SIZE + (*next).payload_size as usize;
                if combined >= new_size {
                    self.coalesce_forward(block);
                    self.maybe_split(block, new_size);
                    return ptr;
                }
            }
        }

        let fresh = self.alloc(
            Layout::from_size_align_unchecked(new_size, MIN_ALIGN),
            AllocFlags::empty(),
        );
        if !fresh.is_null() {
            core::ptr::copy_nonoverlapping(ptr, fresh, old_size.min(new_size));
            self.free(ptr);
        }
        fresh
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            block_count: 0,
            free_count: 0,
            used_bytes: 0,
            free_bytes: 0,
            largest_free: 0,
            heap_start: self.heap_start,
            heap_end: self.heap_end,
        };

        let mut cur = self.head;
        while let Some(block) = cur {
            // SAFETY: every block reachable from `head` is a live header
            // we built ourselves.
            unsafe {
                Header::check_magic(block);
                stats.block_count += 1;
                let size = (*block).payload_size as usize;
                if (*block).free != 0 {
                    stats.free_count += 1;
                    stats.free_bytes += size;
                    stats.largest_free = stats.largest_free.max(size);
                } else {
                    stats.used_bytes += size;
                }
                cur = Header::next(block);
            }
        }
        stats
    }
}

/// `SpinMutex`-guarded heap, installable as `#[global_allocator]`. Also
/// exposes `kmalloc`/`kfree`/`krealloc` directly, since callers that want a
/// zeroed allocation (`GFP_ZERO`) have no way to ask for one through
/// `GlobalAlloc`.
pub struct KernelAllocator<G> {
    inner: SpinMutex<FreeListHeap<G>>,
}

impl<G: HeapGrower> KernelAllocator<G> {
    #[must_use]
    pub const fn new(grower: G, heap_start: usize, heap_max: usize) -> Self {
        Self {
            inner: SpinMutex::new(FreeListHeap::new(grower, heap_start, heap_max)),
        }
    }

    /// # Safety
    /// `size` must be non-zero.
    pub unsafe fn kmalloc(&self, size: usize, flags: AllocFlags) -> *mut u8 {
        self.inner
            .lock()
            .alloc(Layout::from_size_align_unchecked(size, MIN_ALIGN), flags)
    }

    /// # Safety
    /// `ptr` must have come from this allocator and not be freed twice in a
    /// row without an intervening allocation at the same address.
    pub unsafe fn kfree(&self, ptr: *mut u8) {
        self.inner.lock().free(ptr);
    }

    /// # Safety
    /// `ptr` must be either null or a pointer previously returned by this
    /// allocator.
    pub unsafe fn krealloc(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        self.inner.lock().realloc(ptr, new_size)
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.inner.lock().stats()
    }
}

unsafe impl<G: HeapGrower> GlobalAlloc for KernelAllocator<G> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.inner.lock().alloc(layout, AllocFlags::empty())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.inner.lock().free(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        self.inner.lock().realloc(ptr, new_size)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.inner.lock().alloc(layout, AllocFlags::ZERO)
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    struct ArenaGrower {
        backing: *mut u8,
        mapped: usize,
        total: usize,
    }

    impl HeapGrower for ArenaGrower {
        fn grow(&mut self, frames: usize) -> bool {
            let bytes = frames * self.frame_size();
            if self.mapped + bytes > self.total {
                return false;
            }
            self.mapped += bytes;
            true
        }

        fn frame_size(&self) -> usize {
            4096
        }
    }

    fn make_heap(frames: usize) -> (FreeListHeap<ArenaGrower>, Vec<u8>) {
        let total = frames * 4096;
        let mut backing: Vec<u8> = std::vec![0u8; total];
        let base = backing.as_mut_ptr();
        let grower = ArenaGrower {
            backing: base,
            mapped: 0,
            total,
        };
        let heap = FreeListHeap::new(grower, base as usize, base as usize + total);
        (heap, backing)
    }

    #[test]
    fn first_alloc_grows_and_splits() {
        let (mut heap, _backing) = make_heap(4);
        unsafe {
            let a = heap.alloc(Layout::from_size_align(64, 16).unwrap(), AllocFlags::empty());
            assert!(!a.is_null());
            let stats = heap.stats();
            assert_eq!(stats.used_bytes, 64);
            assert!(stats.free_bytes > 0);
        }
    }

    #[test]
    fn free_then_alloc_reuses_block() {
        let (mut heap, _backing) = make_heap(4);
        unsafe {
            let a = heap.alloc(Layout::from_size_align(128, 16).unwrap(), AllocFlags::empty());
            heap.free(a);
            let before = heap.stats();
            let b = heap.alloc(Layout::from_size_align(64, 16).unwrap(), AllocFlags::empty());
            assert!(!b.is_null());
            assert_eq!(a, b);
            let after = heap.stats();
            assert_eq!(before.block_count, after.block_count);
        }
    }

    #[test]
    fn adjacent_frees_coalesce() {
        let (mut heap, _backing) = make_heap(4);
        unsafe {
            let a = heap.alloc(Layout::from_size_align(64, 16).unwrap(), AllocFlags::empty());
            let b = heap.alloc(Layout::from_size_align(64, 16).unwrap(), AllocFlags::empty());
            let before = heap.stats().block_count;
            heap.free(a);
            heap.free(b);
            let after = heap.stats();
            assert!(after.block_count < before);
        }
    }

    #[test]
    fn double_free_is_tolerated() {
        let (mut heap, _backing) = make_heap(4);
        unsafe {
            let a = heap.alloc(Layout::from_size_align(32, 16).unwrap(), AllocFlags::empty());
            heap.free(a);
            heap.free(a);
        }
    }

    #[test]
    fn zero_flag_zeroes_payload() {
        let (mut heap, _backing) = make_heap(4);
        unsafe {
            let a = heap.alloc(Layout::from_size_align(64, 16).unwrap(), AllocFlags::ZERO);
            let slice = core::slice::from_raw_parts(a, 64);
            assert!(slice.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn grow_past_max_fails() {
        let (mut heap, _backing) = make_heap(1);
        unsafe {
            let huge = heap.alloc(
                Layout::from_size_align(1024 * 1024, 16).unwrap(),
                AllocFlags::empty(),
            );
            assert!(huge.is_null());
        }
    }
}
