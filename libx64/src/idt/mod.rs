mod frame;
mod table;

pub use frame::InterruptFrame;
pub use table::InterruptDescriptorTable;

pub use crate::descriptors::IstIndex;

use crate::address::VirtualAddr;

#[repr(C, packed)]
struct IdtPtr {
    limit: u16,
    addr: VirtualAddr,
}

pub fn lidt(idt: &'static InterruptDescriptorTable) {
    let ptr = IdtPtr {
        limit: (core::mem::size_of::<InterruptDescriptorTable>() - 1) as u16,
        addr: VirtualAddr::from_ptr(idt),
    };
    // SAFETY: `ptr` describes a `'static` table, so the CPU will always find
    // a live table at the address it loads.
    unsafe {
        core::arch::asm!("lidt [{}]", in(reg) &ptr, options(readonly, nostack, preserves_flags));
    }
}
