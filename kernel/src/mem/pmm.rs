//! Bitmap-based physical frame allocator (§4.1): one bit per 4 KiB frame,
//! first-fit single-frame and contiguous-run search.

#[cfg(test)]
extern crate std;

use kcore::sync::SpinMutex;
use libx64::address::PhysicalAddr;
use libx64::paging::frame::{FrameAllocator, FrameError, PhysicalFrame};
use libx64::paging::Page4Kb;

use crate::boot::{BootInfo, MemoryKind};

const FRAME_SIZE: u64 = Page4Kb;

pub fn bitmap_set(words: &mut [u64], bit: u64) {
    words[(bit / 64) as usize] |= 1 << (bit % 64);
}

pub fn bitmap_clear(words: &mut [u64], bit: u64) {
    words[(bit / 64) as usize] &= !(1 << (bit % 64));
}

#[must_use]
pub fn bitmap_test(words: &[u64], bit: u64) -> bool {
    (words[(bit / 64) as usize] >> (bit % 64)) & 1 != 0
}

/// Returns the lowest clear bit below `total_frames`, or `None` if the
/// bitmap is full.
#[must_use]
pub fn bitmap_find_first_free(words: &[u64], total_frames: u64) -> Option<u64> {
    for (i, word) in words.iter().enumerate() {
        if *word != u64::MAX {
            for b in 0..64u64 {
                let frame = i as u64 * 64 + b;
                if frame >= total_frames {
                    return None;
                }
                if word >> b & 1 == 0 {
                    return Some(frame);
                }
            }
        }
    }
    None
}

/// Returns the first frame of a run of `count` consecutive clear bits
/// below `total_frames`, or `None` if no such run exists.
#[must_use]
pub fn bitmap_find_contiguous(words: &[u64], total_frames: u64, count: u64) -> Option<u64> {
    if count == 0 {
        return None;
    }
    let mut run_start = 0u64;
    let mut run_len = 0u64;
    for frame in 0..total_frames {
        if !bitmap_test(words, frame) {
            if run_len == 0 {
                run_start = frame;
            }
            run_len += 1;
            if run_len >= count {
                return Some(run_start);
            }
        } else {
            run_len = 0;
        }
    }
    None
}

/// Owns the bitmap backing store (the HHDM alias of the frames it was
/// carved out of) plus the running free/total counters.
pub struct Bitmap {
    words: &'static mut [u64],
    total_frames: u64,
    free_frames: u64,
}

impl Bitmap {
    /// Builds the bitmap from `info`'s memory map: finds the highest usable
    /// address to size the bitmap, carves the bitmap itself out of a usable
    /// region large enough to hold it, marks every frame used, then frees
    /// the usable regions, reserves frame 0, and reserves the bitmap's own
    /// backing frames.
    ///
    /// # Panics
    /// Halts via [`crate::panic::khalt`] if no usable region is large
    /// enough to hold the bitmap — the kernel cannot proceed without one.
    #[must_use]
    pub fn init(info: &BootInfo) -> Self {
        let highest_addr = info
            .memory_map
            .iter()
            .map(|r| r.base + r.length)
            .max()
            .unwrap_or(0);

        let total_frames = highest_addr / FRAME_SIZE;
        let bitmap_words = (total_frames + 63) / 64;
        let bitmap_bytes = bitmap_words * 8;

        let bitmap_phys = info
            .memory_map
            .iter()
            .filter(|r| r.kind == MemoryKind::Usable && r.length >= bitmap_bytes)
            .find_map(|r| {
                let aligned = (r.base + FRAME_SIZE - 1) & !(FRAME_SIZE - 1);
                (aligned + bitmap_bytes <= r.base + r.length).then_some(aligned)
            })
            .unwrap_or_else(|| {
                crate::panic::khalt("pmm: no usable region large enough for the frame bitmap")
            });

        // SAFETY: `bitmap_phys` is within a `Usable` region reported by the
        // bootloader and is reached through the HHDM, which covers all of
        // physical memory; nothing else has touched these bytes yet.
        let words: &'static mut [u64] = unsafe {
            core::slice::from_raw_parts_mut(
                (bitmap_phys + info.hhdm_offset) as *mut u64,
                bitmap_words as usize,
            )
        };

        let mut bitmap = Self {
            words,
            total_frames,
            free_frames: 0,
        };

        for w in bitmap.words.iter_mut() {
            *w = u64::MAX;
        }

        for region in info.memory_map.iter().filter(|r| r.kind == MemoryKind::Usable) {
            let start_page = (region.base + FRAME_SIZE - 1) / FRAME_SIZE;
            let end_page = (region.base + region.length) / FRAME_SIZE;
            for page in start_page..end_page {
                if page < bitmap.total_frames && bitmap_test(bitmap.words, page) {
                    bitmap_clear(bitmap.words, page);
                    bitmap.free_frames += 1;
                }
            }
        }

        if bitmap.total_frames > 0 && !bitmap_test(bitmap.words, 0) {
            bitmap_set(bitmap.words, 0);
            bitmap.free_frames -= 1;
        }

        let bitmap_pages = (bitmap_bytes + FRAME_SIZE - 1) / FRAME_SIZE;
        let bitmap_start_page = bitmap_phys / FRAME_SIZE;
        for p in 0..bitmap_pages {
            let page = bitmap_start_page + p;
            if page < bitmap.total_frames && !bitmap_test(bitmap.words, page) {
                bitmap_set(bitmap.words, page);
                bitmap.free_frames -= 1;
            }
        }

        log::info!(
            "pmm initialized: {} total frames, {} free ({} MiB free)",
            bitmap.total_frames,
            bitmap.free_frames,
            (bitmap.free_frames * FRAME_SIZE) / (1024 * 1024)
        );
        log::info!(
            "pmm bitmap at phys 0x{bitmap_phys:x} ({bitmap_bytes} bytes, {bitmap_pages} pages)"
        );

        bitmap
    }

    #[must_use]
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    #[must_use]
    pub fn free_frames(&self) -> u64 {
        self.free_frames
    }

    #[must_use]
    pub fn alloc_page(&mut self) -> Option<PhysicalAddr> {
        if self.free_frames == 0 {
            return None;
        }
        let frame = bitmap_find_first_free(self.words, self.total_frames)?;
        bitmap_set(self.words, frame);
        self.free_frames -= 1;
        Some(PhysicalAddr::new(frame * FRAME_SIZE))
    }

    /// Frees a single page. A no-op for frame 0, out-of-range addresses,
    /// and already-free frames.
    pub fn free_page(&mut self, addr: PhysicalAddr) {
        let frame = addr.as_u64() / FRAME_SIZE;
        if frame == 0 || frame >= self.total_frames {
            return;
        }
        if bitmap_test(self.words, frame) {
            bitmap_clear(self.words, frame);
            self.free_frames += 1;
        }
    }

    /// Allocates `count` physically contiguous pages.
    #[must_use]
    pub fn alloc_contiguous(&mut self, count: u64) -> Option<PhysicalAddr> {
        if count == 0 || self.free_frames < count {
            return None;
        }
        let start = bitmap_find_contiguous(self.words, self.total_frames, count)?;
        for frame in start..start + count {
            bitmap_set(self.words, frame);
            self.free_frames -= 1;
        }
        Some(PhysicalAddr::new(start * FRAME_SIZE))
    }
}

impl FrameAllocator<Page4Kb> for Bitmap {
    fn alloc(&mut self) -> Result<PhysicalFrame<Page4Kb>, FrameError> {
        self.alloc_page()
            .map(PhysicalFrame::containing)
            .ok_or(FrameError::Alloc)
    }
}

static PFA: SpinMutex<Option<Bitmap>> = SpinMutex::new(None);

/// Builds the global frame allocator from `info`. Must be called once,
/// before any other function in this module.
pub fn init(info: &BootInfo) {
    *PFA.lock() = Some(Bitmap::init(info));
}

/// Runs `f` with exclusive access to the global frame allocator.
///
/// # Panics
/// Panics if called before [`init`].
pub fn with_pfa<R>(f: impl FnOnce(&mut Bitmap) -> R) -> R {
    let mut guard = PFA.lock();
    f(guard.as_mut().expect("pmm not initialized"))
}

#[must_use]
pub fn alloc_page() -> Option<PhysicalAddr> {
    with_pfa(Bitmap::alloc_page)
}

pub fn free_page(addr: PhysicalAddr) {
    with_pfa(|b| b.free_page(addr));
}

#[must_use]
pub fn alloc_contiguous(count: u64) -> Option<PhysicalAddr> {
    with_pfa(|b| b.alloc_contiguous(count))
}

#[must_use]
pub fn total_frames() -> u64 {
    with_pfa(Bitmap::total_frames)
}

#[must_use]
pub fn free_frames() -> u64 {
    with_pfa(Bitmap::free_frames)
}

#[cfg(test)]
mod test {
    use super::*;

    fn words(qwords: usize) -> std::vec::Vec<u64> {
        std::vec![0u64; qwords]
    }

    #[test]
    fn find_first_free_skips_full_words() {
        let mut w = words(2);
        w[0] = u64::MAX;
        assert_eq!(bitmap_find_first_free(&w, 128), Some(64));
    }

    #[test]
    fn find_first_free_respects_total_frames_bound() {
        let w = words(1);
        assert_eq!(bitmap_find_first_free(&w, 0), None);
    }

    #[test]
    fn set_clear_test_roundtrip() {
        let mut w = words(1);
        assert!(!bitmap_test(&w, 5));
        bitmap_set(&mut w, 5);
        assert!(bitmap_test(&w, 5));
        bitmap_clear(&mut w, 5);
        assert!(!bitmap_test(&w, 5));
    }

    #[test]
    fn find_contiguous_run_across_word_boundary() {
        let mut w = words(2);
        bitmap_set(&mut w, 62);
        bitmap_set(&mut w, 63);
        // Frames 0..62 free, 62/63 used, 64.. free: a run of 4 starting at 64.
        assert_eq!(bitmap_find_contiguous(&w, 128, 4), Some(64));
    }

    #[test]
    fn find_contiguous_none_when_too_large() {
        let w = words(1);
        assert_eq!(bitmap_find_contiguous(&w, 10, 11), None);
    }
}
