pub mod entry;
pub mod frame;
pub mod page;
pub mod table;

/// Byte size of a standard 4 KiB leaf page.
pub const Page4Kb: u64 = 0x1000;
/// Byte size of a 2 MiB huge page (a level-2 leaf).
pub const Page2Mb: u64 = Page4Kb * 512;
/// Byte size of a 1 GiB giant page (a level-3 leaf).
pub const Page1Gb: u64 = Page2Mb * 512;

/// Marker carrying a page/frame size at the type level so [`Page`](page::Page)
/// and [`PhysicalFrame`](frame::PhysicalFrame) can be generic over it while
/// still rejecting nonsensical sizes at compile time.
pub struct PageCheck<const N: u64>;

pub trait PageSize {
    const SIZE: u64;
}

impl PageSize for PageCheck<Page4Kb> {
    const SIZE: u64 = Page4Kb;
}
impl PageSize for PageCheck<Page2Mb> {
    const SIZE: u64 = Page2Mb;
}
impl PageSize for PageCheck<Page1Gb> {
    const SIZE: u64 = Page1Gb;
}

bitflags::bitflags! {
    /// Error classification for page-fault decoding (§6 register save layout:
    /// the dispatcher's default exception handler special-cases #PF).
    pub struct PageFaultErrorCode: u64 {
        const PROTECTION_VIOLATION = 1;
        const CAUSED_BY_WRITE = 1 << 1;
        const USER_MODE = 1 << 2;
        const MALFORMED_TABLE = 1 << 3;
        const INSTRUCTION_FETCH = 1 << 4;
    }
}
