#![no_std]

#[macro_use]
extern crate log;

use libx64::{
    address::{PhysicalAddr, VirtualAddr},
    control::{set_cr3, CR3},
    paging::{
        entry::Flags,
        frame::{FrameAllocator, FrameError, PhysicalFrame},
        page_offset_1g, page_offset_2m, page_offset_4k,
        table::{page_table_index, Level, PageTable},
        Page2Mb, Page4Kb,
    },
};

/// Owns the physical address of a top-level (PML4) page table and walks it
/// to satisfy map/unmap/translate requests, allocating intermediate table
/// frames from whatever [`FrameAllocator`] is handed in.
///
/// Table contents are always reached through the HHDM: the mapper never
/// assumes its own page table is the one currently installed in `CR3`, so
/// building a fresh table before `install`ing it is safe.
pub struct PageMapper {
    pml4_phys: PhysicalAddr,
    hhdm_offset: u64,
}

impl PageMapper {
    /// Allocates a fresh, zeroed PML4 and wraps it.
    ///
    /// # Errors
    /// Propagates the allocator's failure to hand out the root frame.
    pub fn new<A>(hhdm_offset: u64, alloc: &mut A) -> Result<Self, FrameError>
    where
        A: FrameAllocator<Page4Kb>,
    {
        let frame = alloc.alloc()?;
        let pml4_phys = frame.ptr();
        let mapper = Self {
            pml4_phys,
            hhdm_offset,
        };
        // SAFETY: `frame` was just allocated; nothing else can be observing it.
        unsafe { mapper.table_at(pml4_phys).zero_mut() };
        Ok(mapper)
    }

    #[must_use]
    pub const fn kernel_pml4(&self) -> PhysicalAddr {
        self.pml4_phys
    }

    #[must_use]
    pub const fn hhdm_offset(&self) -> u64 {
        self.hhdm_offset
    }

    /// Loads this table's physical root into `CR3`.
    ///
    /// # Safety
    /// Every present entry reachable from the root must describe a
    /// well-formed mapping; a half-built table faults as soon as it is
    /// installed.
    pub unsafe fn install(&self) {
        set_cr3(CR3::with_frame(PhysicalFrame::<Page4Kb>::containing(
            self.pml4_phys,
        )));
    }

    /// # Safety
    /// `phys` must be the base of a table this mapper owns (root or an
    /// intermediate table it created), so the HHDM translation yields a
    /// valid, exclusively-borrowed `PageTable`.
    unsafe fn table_at(&self, phys: PhysicalAddr) -> &mut PageTable {
        &mut *((self.hhdm_offset + phys.as_u64()) as *mut PageTable)
    }

    /// Returns the physical address of the child table at `index`,
    /// allocating and zeroing it first if absent. Intermediate entries are
    /// always `Present | Writable | User`; leaf permissions alone govern
    /// actual access.
    fn ensure_table<A>(
        &self,
        table: &mut PageTable,
        index: usize,
        alloc: &mut A,
    ) -> Result<PhysicalAddr, FrameError>
    where
        A: FrameAllocator<Page4Kb>,
    {
        let entry = table.entry_mut(index);
        if entry.is_present() {
            if entry.is_huge() {
                return Err(FrameError::HugePage);
            }
            return Ok(entry.frame().ptr());
        }

        let frame = alloc.alloc()?;
        let phys = frame.ptr();
        // SAFETY: `frame` was just allocated, so no other mapping reaches it yet.
        unsafe { self.table_at(phys).zero_mut() };

        entry.set_frame(frame);
        entry.set_flags(Flags::PRESENT | Flags::WRITABLE | Flags::USER);
        Ok(phys)
    }

    /// Walks PML4 -> PDPT -> PD, allocating along the way, and returns the
    /// PD table plus the level-2 index the caller should write its leaf at.
    fn walk_to_pd<A>(
        &self,
        virt: VirtualAddr,
        alloc: &mut A,
    ) -> Result<(&mut PageTable, usize), FrameError>
    where
        A: FrameAllocator<Page4Kb>,
    {
        // SAFETY: the PML4 is this mapper's own root.
        let pml4 = unsafe { self.table_at(self.pml4_phys) };
        let pdpt_phys = self.ensure_table(pml4, page_table_index(virt, Level::Four), alloc)?;
        // SAFETY: `ensure_table` only ever returns a table this mapper created.
        let pdpt = unsafe { self.table_at(pdpt_phys) };
        let pd_phys = self.ensure_table(pdpt, page_table_index(virt, Level::Three), alloc)?;
        // SAFETY: same as above.
        let pd = unsafe { self.table_at(pd_phys) };
        Ok((pd, page_table_index(virt, Level::Two)))
    }

    /// Maps a single 4 KiB page. `virt`/`phys` must be 4 KiB-aligned.
    ///
    /// # Errors
    /// Fails if an intermediate entry is already a huge leaf, or if an
    /// intermediate table allocation fails.
    pub fn map_page<A>(
        &mut self,
        virt: VirtualAddr,
        phys: PhysicalAddr,
        flags: Flags,
        alloc: &mut A,
    ) -> Result<(), FrameError>
    where
        A: FrameAllocator<Page4Kb>,
    {
        let (pd, pd_index) = self.walk_to_pd(virt, alloc)?;
        let pt_phys = self.ensure_table(pd, pd_index, alloc)?;
        // SAFETY: `ensure_table` only ever returns a table this mapper created.
        let pt = unsafe { self.table_at(pt_phys) };
        let entry = pt.entry_mut(page_table_index(virt, Level::One));
        entry.set_frame(PhysicalFrame::<Page4Kb>::containing(phys));
        entry.set_flags(flags | Flags::PRESENT);
        Ok(())
    }

    /// Maps a single 2 MiB huge page directly at the PD level. `virt`/`phys`
    /// must be 2 MiB-aligned.
    ///
    /// # Errors
    /// Fails if an intermediate entry is already a huge leaf, or if an
    /// intermediate table allocation fails.
    pub fn map_page_2mb<A>(
        &mut self,
        virt: VirtualAddr,
        phys: PhysicalAddr,
        flags: Flags,
        alloc: &mut A,
    ) -> Result<(), FrameError>
    where
        A: FrameAllocator<Page4Kb>,
    {
        let (pd, pd_index) = self.walk_to_pd(virt, alloc)?;
        let entry = pd.entry_mut(pd_index);
        entry.set_frame(PhysicalFrame::<Page2Mb>::containing(phys));
        entry.set_flags(flags | Flags::PRESENT | Flags::HUGE);
        Ok(())
    }

    /// Maps `[virt, virt + len)` to `[phys, phys + len)`, choosing 2 MiB
    /// pages whenever both bases and the remaining length are 2 MiB-aligned,
    /// falling back to 4 KiB leaves otherwise (§4.2's HHDM fast path).
    ///
    /// # Errors
    /// Fails on the first mapping failure; partially-mapped ranges are left
    /// in place (the caller is expected to treat this as a fatal boot error).
    pub fn map_range<A>(
        &mut self,
        mut virt: VirtualAddr,
        mut phys: PhysicalAddr,
        len: u64,
        flags: Flags,
        alloc: &mut A,
    ) -> Result<(), FrameError>
    where
        A: FrameAllocator<Page4Kb>,
    {
        let end = virt + len;
        while virt != end {
            let remaining = end.as_u64() - virt.as_u64();
            let huge_aligned = virt.as_u64() % Page2Mb == 0
                && phys.as_u64() % Page2Mb == 0
                && remaining >= Page2Mb;
            if huge_aligned {
                self.map_page_2mb(virt, phys, flags, alloc)?;
                virt = virt + Page2Mb;
                phys = phys + Page2Mb;
            } else {
                self.map_page(virt, phys, flags, alloc)?;
                virt = virt + Page4Kb;
                phys = phys + Page4Kb;
            }
        }
        Ok(())
    }

    /// Unmaps a single 4 KiB page; a no-op if any intermediate table is
    /// absent. Invalidates the TLB entry on success.
    pub fn unmap_page(&mut self, virt: VirtualAddr) {
        // SAFETY: the PML4 is this mapper's own root.
        let pml4 = unsafe { self.table_at(self.pml4_phys) };
        let pdpt_entry = pml4.entry(page_table_index(virt, Level::Four));
        if !pdpt_entry.is_present() || pdpt_entry.is_huge() {
            return;
        }
        // SAFETY: present and not huge, so it is a table this mapper created.
        let pdpt = unsafe { self.table_at(pdpt_entry.frame().ptr()) };

        let pd_entry = pdpt.entry(page_table_index(virt, Level::Three));
        if !pd_entry.is_present() || pd_entry.is_huge() {
            return;
        }
        // SAFETY: same as above.
        let pd = unsafe { self.table_at(pd_entry.frame().ptr()) };

        let pt_entry = pd.entry(page_table_index(virt, Level::Two));
        if !pt_entry.is_present() || pt_entry.is_huge() {
            return;
        }
        // SAFETY: same as above.
        let pt = unsafe { self.table_at(pt_entry.frame().ptr()) };

        let entry = pt.entry_mut(page_table_index(virt, Level::One));
        if !entry.is_present() {
            return;
        }
        entry.clear();

        // SAFETY: `virt` is the address we just unmapped.
        unsafe { libx64::control::invlpg(virt) };
    }

    /// Walks the hierarchy, honouring 1 GiB and 2 MiB huge leaves, and
    /// composes the base physical address with the in-page offset.
    #[must_use]
    pub fn get_phys(&self, virt: VirtualAddr) -> Option<PhysicalAddr> {
        // SAFETY: the PML4 is this mapper's own root.
        let pml4 = unsafe { self.table_at(self.pml4_phys) };
        let pdpt_entry = pml4.entry(page_table_index(virt, Level::Four));
        if !pdpt_entry.is_present() {
            return None;
        }
        if pdpt_entry.is_huge() {
            return Some(pdpt_entry.frame().ptr() + page_offset_1g(virt));
        }
        // SAFETY: present and not huge, so it is a table this mapper created.
        let pdpt = unsafe { self.table_at(pdpt_entry.frame().ptr()) };

        let pd_entry = pdpt.entry(page_table_index(virt, Level::Three));
        if !pd_entry.is_present() {
            return None;
        }
        if pd_entry.is_huge() {
            return Some(pd_entry.frame().ptr() + page_offset_2m(virt));
        }
        // SAFETY: same as above.
        let pd = unsafe { self.table_at(pd_entry.frame().ptr()) };

        let pt_entry = pd.entry(page_table_index(virt, Level::Two));
        if !pt_entry.is_present() {
            return None;
        }
        if pt_entry.is_huge() {
            return Some(pt_entry.frame().ptr() + page_offset_2m(virt));
        }
        // SAFETY: same as above.
        let pt = unsafe { self.table_at(pt_entry.frame().ptr()) };

        let entry = pt.entry(page_table_index(virt, Level::One));
        if !entry.is_present() {
            return None;
        }
        Some(entry.frame().ptr() + page_offset_4k(virt))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn huge_alignment_check_matches_2mb_boundary() {
        let virt = VirtualAddr::new(0x20_0000);
        let phys = PhysicalAddr::new(0x20_0000);
        assert_eq!(virt.as_u64() % Page2Mb, 0);
        assert_eq!(phys.as_u64() % Page2Mb, 0);
    }

    #[test]
    fn unaligned_virt_is_not_huge_eligible() {
        let virt = VirtualAddr::new(0x20_1000);
        assert_ne!(virt.as_u64() % Page2Mb, 0);
    }
}
