mod call_gate;
mod code;
mod data;
pub mod interrupt;
mod system;
mod task;

pub use call_gate::CallGateDescriptor;
pub use code::CodeSegmentDescriptor;
pub use data::DataSegmentDescriptor;
pub use interrupt::{InterruptGateDescriptor, IstIndex};
pub use system::{SystemSegmentDescriptor, SystemSegmentType};
pub use task::TaskGateDescriptor;

/// The null segment selector's descriptor: every GDT starts with one, so
/// that selector 0 reliably faults if ever loaded.
pub struct GdtNull;

/// A GDT slot, classified by how many 64-bit words it occupies and how it is
/// laid out. `User` descriptors (code/data) are one word; `System` and
/// `Gate` descriptors span two.
pub enum GdtEntry {
    Null,
    User(u64),
    Gate(u128),
    System(u128),
}

/// Anything that can be installed into a [`GlobalDescriptorTable`](crate::gdt::GlobalDescriptorTable) slot.
pub trait AsGdtEntry {
    fn to_gdt_entry(&self) -> GdtEntry;
}

impl AsGdtEntry for GdtNull {
    fn to_gdt_entry(&self) -> GdtEntry {
        GdtEntry::Null
    }
}

impl AsGdtEntry for CodeSegmentDescriptor {
    fn to_gdt_entry(&self) -> GdtEntry {
        GdtEntry::User(unsafe { core::mem::transmute::<_, u64>(*self) })
    }
}

impl AsGdtEntry for DataSegmentDescriptor {
    fn to_gdt_entry(&self) -> GdtEntry {
        GdtEntry::User(unsafe { core::mem::transmute::<_, u64>(*self) })
    }
}

impl AsGdtEntry for SystemSegmentDescriptor {
    fn to_gdt_entry(&self) -> GdtEntry {
        GdtEntry::System(unsafe { core::mem::transmute::<_, u128>(*self) })
    }
}
