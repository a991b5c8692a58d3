//! Bootloader-agnostic boot information and the thin Limine reader that
//! populates it. Parsing the Limine wire protocol is a collaborator, not
//! part of the core's tested surface (SPEC_FULL §2) — this module only
//! exists because something has to produce the `BootInfo` the core consumes.

use limine::{
    BaseRevision, FramebufferRequest, HhdmRequest, KernelAddressRequest, MemmapRequest,
    MemoryMapEntryType, RsdpRequest,
};

/// Tells Limine the protocol revision this kernel speaks. Must live in the
/// `.requests` section the bootloader scans before jumping to `_start`.
#[used]
#[link_section = ".requests"]
static BASE_REVISION: BaseRevision = BaseRevision::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    Usable,
    Reserved,
    AcpiReclaim,
    AcpiNvs,
    Bad,
    BootReclaim,
    KernelAndModules,
    Framebuffer,
}

impl From<MemoryMapEntryType> for MemoryKind {
    fn from(ty: MemoryMapEntryType) -> Self {
        match ty {
            MemoryMapEntryType::Usable => Self::Usable,
            MemoryMapEntryType::Reserved => Self::Reserved,
            MemoryMapEntryType::AcpiReclaimable => Self::AcpiReclaim,
            MemoryMapEntryType::AcpiNvs => Self::AcpiNvs,
            MemoryMapEntryType::BadMemory => Self::Bad,
            MemoryMapEntryType::BootloaderReclaimable => Self::BootReclaim,
            MemoryMapEntryType::KernelAndModules => Self::KernelAndModules,
            MemoryMapEntryType::Framebuffer => Self::Framebuffer,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion {
    pub base: u64,
    pub length: u64,
    pub kind: MemoryKind,
}

#[derive(Debug, Clone, Copy)]
pub struct ColorMasks {
    pub red_size: u8,
    pub red_shift: u8,
    pub green_size: u8,
    pub green_shift: u8,
    pub blue_size: u8,
    pub blue_shift: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct FramebufferInfo {
    pub addr: u64,
    pub width: u64,
    pub height: u64,
    pub pitch: u64,
    pub bpp: u16,
    pub masks: ColorMasks,
}

/// Bootloader-agnostic boot information, handed to C1-C8 init in dependency
/// order. Invariant (checked once, in `collect`): at least one `Usable`
/// region exists and `hhdm_offset` is known.
pub struct BootInfo {
    pub memory_map: &'static [MemoryRegion],
    pub hhdm_offset: u64,
    pub kernel_phys_base: u64,
    pub kernel_virt_base: u64,
    pub rsdp: Option<u64>,
    pub framebuffer: Option<FramebufferInfo>,
}

#[used]
#[link_section = ".requests"]
static MEMMAP_REQUEST: MemmapRequest = MemmapRequest::new(0);
#[used]
#[link_section = ".requests"]
static HHDM_REQUEST: HhdmRequest = HhdmRequest::new(0);
#[used]
#[link_section = ".requests"]
static KERNEL_ADDRESS_REQUEST: KernelAddressRequest = KernelAddressRequest::new(0);
#[used]
#[link_section = ".requests"]
static RSDP_REQUEST: RsdpRequest = RsdpRequest::new(0);
#[used]
#[link_section = ".requests"]
static FRAMEBUFFER_REQUEST: FramebufferRequest = FramebufferRequest::new(0);

/// Reads every Limine response the core needs and assembles a `BootInfo`.
///
/// # Panics
/// Panics (via `kernel::panic::khalt`) if the memory map or HHDM offset is
/// missing — the kernel cannot proceed without either.
#[must_use]
pub fn collect() -> BootInfo {
    let memmap = MEMMAP_REQUEST
        .get_response()
        .get()
        .unwrap_or_else(|| crate::panic::khalt("limine: no memory map response"));
    let entries = memmap.memmap();

    // SAFETY: the memmap response outlives the kernel; there is no unmap path.
    let memory_map: &'static [MemoryRegion] = {
        static mut STORAGE: [MemoryRegion; 256] = [MemoryRegion {
            base: 0,
            length: 0,
            kind: MemoryKind::Reserved,
        }; 256];
        let count = entries.len().min(256);
        let storage = unsafe { &mut *core::ptr::addr_of_mut!(STORAGE) };
        for (i, entry) in entries.iter().take(count).enumerate() {
            storage[i] = MemoryRegion {
                base: entry.base,
                length: entry.len,
                kind: entry.typ.into(),
            };
        }
        unsafe { &core::slice::from_raw_parts(storage.as_ptr(), count)[..count] }
    };

    let hhdm_offset = HHDM_REQUEST
        .get_response()
        .get()
        .unwrap_or_else(|| crate::panic::khalt("limine: no HHDM response"))
        .offset;

    let (kernel_phys_base, kernel_virt_base) = KERNEL_ADDRESS_REQUEST
        .get_response()
        .get()
        .map(|r| (r.physical_base, r.virtual_base))
        .unwrap_or((0, 0));

    let rsdp = RSDP_REQUEST
        .get_response()
        .get()
        .map(|r| r.address.as_ptr().map_or(0, |p| p as u64));

    let framebuffer = FRAMEBUFFER_REQUEST
        .get_response()
        .get()
        .and_then(|r| r.framebuffers().first())
        .map(|fb| FramebufferInfo {
            addr: fb.address.as_ptr().map_or(0, |p| p as u64),
            width: fb.width,
            height: fb.height,
            pitch: fb.pitch,
            bpp: fb.bpp,
            masks: ColorMasks {
                red_size: fb.red_mask_size,
                red_shift: fb.red_mask_shift,
                green_size: fb.green_mask_size,
                green_shift: fb.green_mask_shift,
                blue_size: fb.blue_mask_size,
                blue_shift: fb.blue_mask_shift,
            },
        });

    BootInfo {
        memory_map,
        hhdm_offset,
        kernel_phys_base,
        kernel_virt_base,
        rsdp,
        framebuffer,
    }
}
