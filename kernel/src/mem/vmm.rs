//! Virtual memory manager (§4.2): builds the kernel's own PML4 on top of
//! [`page_mapper::PageMapper`], maps the HHDM and the kernel image into it,
//! installs it, and exposes the singleton every later mapping request
//! (including the heap's demand-growth) goes through.

use kcore::sync::SpinMutex;

use libx64::address::{PhysicalAddr, VirtualAddr};
use libx64::paging::entry::Flags;
use libx64::paging::frame::{FrameAllocator, FrameError, PhysicalFrame};
use libx64::paging::Page4Kb;

use page_mapper::PageMapper;

use crate::boot::BootInfo;

/// Conservative upper bound on kernel image size mapped 1:1 at boot. The
/// actual image is almost always far smaller; mapping extra unused virtual
/// range costs nothing until something is placed there.
const KERNEL_IMAGE_SIZE: u64 = 64 * 1024 * 1024;

/// Adapts the global physical frame allocator to the `FrameAllocator<Page4Kb>`
/// trait `PageMapper` wants, so the mapper never needs to know about `pmm`
/// directly.
struct PmmAdapter;

impl FrameAllocator<Page4Kb> for PmmAdapter {
    fn alloc(&mut self) -> Result<PhysicalFrame<Page4Kb>, FrameError> {
        crate::mem::pmm::alloc_page()
            .map(PhysicalFrame::containing)
            .ok_or(FrameError::Alloc)
    }
}

static MAPPER: SpinMutex<Option<PageMapper>> = SpinMutex::new(None);

/// Builds the kernel's page tables, maps the HHDM and kernel image into
/// them, and installs the result into `CR3`. Must be called once, after
/// [`crate::mem::pmm::init`] and before anything dereferences a `VirtualAddr`
/// through the HHDM.
pub fn init(info: &BootInfo) {
    let mut alloc = PmmAdapter;
    let mut mapper =
        PageMapper::new(info.hhdm_offset, &mut alloc).unwrap_or_else(|_| {
            crate::panic::khalt("vmm: failed to allocate the root page table")
        });

    let highest_addr = info
        .memory_map
        .iter()
        .map(|r| r.base + r.length)
        .max()
        .unwrap_or(0);

    mapper
        .map_range(
            VirtualAddr::new(info.hhdm_offset),
            PhysicalAddr::new(0),
            highest_addr,
            Flags::PRESENT | Flags::WRITABLE | Flags::NO_EXEC,
            &mut alloc,
        )
        .unwrap_or_else(|_| crate::panic::khalt("vmm: failed to map the HHDM"));

    mapper
        .map_range(
            VirtualAddr::new(info.kernel_virt_base),
            PhysicalAddr::new(info.kernel_phys_base),
            KERNEL_IMAGE_SIZE,
            Flags::PRESENT | Flags::WRITABLE,
            &mut alloc,
        )
        .unwrap_or_else(|_| crate::panic::khalt("vmm: failed to map the kernel image"));

    // SAFETY: every mapping just built is well-formed (HHDM identity map
    // plus the kernel's own image, both backed by frames this mapper owns).
    unsafe { mapper.install() };

    log::info!(
        "vmm initialized: hhdm=0x{:x} kernel_virt=0x{:x} highest_addr=0x{:x}",
        info.hhdm_offset,
        info.kernel_virt_base,
        highest_addr
    );

    *MAPPER.lock() = Some(mapper);
}

/// Runs `f` with exclusive access to the global page mapper.
///
/// # Panics
/// Panics if called before [`init`].
pub fn with_mapper<R>(f: impl FnOnce(&mut PageMapper) -> R) -> R {
    let mut guard = MAPPER.lock();
    f(guard.as_mut().expect("vmm not initialized"))
}

/// Maps a single 4 KiB page, allocating intermediate tables from the global
/// frame allocator.
///
/// # Errors
/// Propagates `PageMapper::map_page`'s failure modes.
pub fn map_page(virt: VirtualAddr, phys: PhysicalAddr, flags: Flags) -> Result<(), FrameError> {
    let mut alloc = PmmAdapter;
    with_mapper(|m| m.map_page(virt, phys, flags, &mut alloc))
}

pub fn unmap_page(virt: VirtualAddr) {
    with_mapper(|m| m.unmap_page(virt));
}

#[must_use]
pub fn get_phys(virt: VirtualAddr) -> Option<PhysicalAddr> {
    with_mapper(|m| m.get_phys(virt))
}

#[must_use]
pub fn hhdm_offset() -> u64 {
    with_mapper(|m| m.hhdm_offset())
}

#[must_use]
pub fn kernel_pml4() -> PhysicalAddr {
    with_mapper(|m| m.kernel_pml4())
}
