use bitfield::bitfield;

#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct TaskGateDescriptor {
    _reserved1: u16,
    pub tss_selector: u16,
    _reserved2: u8,
    pub flags: CgFlags,
    _reserved3: u16,
}

impl core::fmt::Debug for TaskGateDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskGateDescriptor")
            .field("tss_selector", &{ self.tss_selector })
            .field("flags", &self.flags)
            .finish()
    }
}

bitfield! {
    #[derive(Clone, Copy)]
    #[repr(transparent)]
    pub unsafe struct CgFlags: u8 {

        // These  bits  are  encoded  by software as 00101b to indicate a task-gate descriptor type
        ss_type: 0..4,
        system: 4..5,

        /// Descriptor Privilege-Level
        dpl: 5..7,

        /// Presence bit
        presence: 7..8,
    }
}
