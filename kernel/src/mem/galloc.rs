//! Kernel heap (§4.3): a demand-grown free-list allocator installed as the
//! `#[global_allocator]`, backed by the VMM/PFA for actual page growth.

use kalloc::freelist::{HeapGrower, KernelAllocator};

use libx64::address::VirtualAddr;
use libx64::paging::entry::Flags;
use libx64::paging::Page4Kb;

/// Virtual base of the kernel heap. Chosen well clear of the HHDM and
/// kernel image ranges the VMM maps at boot.
pub const HEAP_START: usize = 0x_4444_4444_0000;
/// Upper bound the heap is allowed to grow to.
pub const HEAP_MAX: usize = HEAP_START + 256 * 1024 * 1024;

/// Grows the heap by mapping freshly allocated physical frames immediately
/// after the heap's current end, through [`crate::mem::vmm`]/[`crate::mem::pmm`].
/// `mapped` tracks bytes already mapped; it is only ever touched from inside
/// the heap's own lock, so a plain field (not an atomic) is sound.
pub struct KernelHeapGrower {
    mapped: u64,
}

impl HeapGrower for KernelHeapGrower {
    fn grow(&mut self, frames: usize) -> bool {
        for i in 0..frames {
            let Some(phys) = crate::mem::pmm::alloc_page() else {
                return false;
            };
            let virt =
                VirtualAddr::new((HEAP_START as u64) + self.mapped + (i as u64) * Page4Kb);
            if crate::mem::vmm::map_page(virt, phys, Flags::PRESENT | Flags::WRITABLE | Flags::NO_EXEC).is_err()
            {
                crate::mem::pmm::free_page(phys);
                return false;
            }
        }
        self.mapped += (frames as u64) * Page4Kb;
        true
    }
}

#[global_allocator]
pub static GLOBAL_ALLOC: KernelAllocator<KernelHeapGrower> =
    KernelAllocator::new(KernelHeapGrower { mapped: 0 }, HEAP_START, HEAP_MAX);

/// Logs current heap utilization; useful at the end of boot to sanity-check
/// the demand-growth path actually ran.
pub fn log_stats() {
    let stats = GLOBAL_ALLOC.stats();
    log::info!(
        "heap: {} blocks ({} free), {} bytes used, {} bytes free, largest free {}",
        stats.block_count,
        stats.free_count,
        stats.used_bytes,
        stats.free_bytes,
        stats.largest_free
    );
}
