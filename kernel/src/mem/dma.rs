//! Adapts the PFA/VMM singletons to the `DmaAllocator` trait the virtio
//! transport wants for descriptor-table and data-buffer backing memory.

use libx64::address::PhysicalAddr;

pub struct KernelDma;

impl virtio::device::DmaAllocator for KernelDma {
    fn alloc_contiguous(&mut self, pages: u32) -> Option<u64> {
        crate::mem::pmm::alloc_contiguous(u64::from(pages)).map(|p| p.as_u64())
    }

    fn free_contiguous(&mut self, phys: u64, pages: u32) {
        for i in 0..u64::from(pages) {
            crate::mem::pmm::free_page(PhysicalAddr::new(phys + i * 0x1000));
        }
    }

    fn hhdm_offset(&self) -> u64 {
        crate::mem::vmm::hhdm_offset()
    }
}
