use crate::address::PhysicalAddr;
use crate::paging::frame::PhysicalFrame;
use crate::paging::Page4Kb;

bitflags::bitflags! {
    /// Flags common to every level of the 4-level hierarchy (§4.2). Intermediate
    /// entries built by the VMM always carry `PRESENT | WRITABLE | USER`
    /// regardless of what the caller asked for; only the leaf entry's flags are
    /// taken from the caller verbatim, per "leaf permissions are at most as
    /// permissive as the intermediate entries above them".
    #[derive(Clone, Copy)]
    pub struct Flags: u64 {
        const PRESENT  = 1;
        const WRITABLE = 1 << 1;
        const USER     = 1 << 2;
        const HUGE     = 1 << 7;
        const NO_EXEC  = 1 << 63;
    }
}

/// A single raw page-table entry: 12 low flag bits, a 40-bit physical frame
/// number, and the NX bit at 63. Unused/reserved bits are left zero.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct PageEntry(u64);

const ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;

impl PageEntry {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.0 & Flags::PRESENT.bits() != 0
    }

    #[must_use]
    pub const fn is_huge(&self) -> bool {
        self.0 & Flags::HUGE.bits() != 0
    }

    #[must_use]
    pub const fn flags(&self) -> Flags {
        Flags::from_bits_truncate(self.0)
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.0 = (self.0 & ADDR_MASK) | flags.bits();
    }

    #[must_use]
    pub fn frame(&self) -> PhysicalFrame<{ Page4Kb }> {
        PhysicalFrame::containing(PhysicalAddr::new(self.0 & ADDR_MASK))
    }

    pub fn set_frame<const N: u64>(&mut self, frame: PhysicalFrame<N>) {
        self.0 = (self.0 & !ADDR_MASK) | (frame.ptr().as_u64() & ADDR_MASK);
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

impl core::fmt::Debug for PageEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageEntry")
            .field("frame", &self.frame())
            .field("flags", &self.flags())
            .finish()
    }
}
