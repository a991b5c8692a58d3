use crate::address::VirtualAddr;
use crate::descriptors::{InterruptGateDescriptor, IstIndex};
use crate::Privilege;

pub const VECTOR_COUNT: usize = 256;

/// The flat, 256-vector interrupt descriptor table. Every vector slot is the
/// same shape; which ones are populated and what they point to is entirely a
/// property of the handler table built on top, not of this type.
#[repr(C, align(16))]
pub struct InterruptDescriptorTable {
    entries: [InterruptGateDescriptor; VECTOR_COUNT],
}

impl InterruptDescriptorTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [InterruptGateDescriptor::new(); VECTOR_COUNT],
        }
    }

    /// Points `vector` at `handler`, running on the kernel code selector at
    /// the given privilege level. `ist` selects an interrupt-stack-table
    /// slot for handlers that must not trust the interrupted stack (double
    /// fault); pass `None` to run on the current stack.
    pub fn set_handler(
        &mut self,
        vector: u8,
        handler: VirtualAddr,
        selector: u16,
        dpl: Privilege,
        ist: Option<IstIndex>,
    ) {
        let entry = &mut self.entries[vector as usize];
        entry.set_target(handler);
        entry.set_selector(selector);
        let flags = entry.flags_mut();
        *flags = flags.set_dpl(u16::from(dpl)).set_present(1);
        if let Some(ist) = ist {
            flags.set_stack_idx(ist);
        }
    }
}

impl core::ops::Index<usize> for InterruptDescriptorTable {
    type Output = InterruptGateDescriptor;
    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}
