//! Boot-time init sequence: GDT/TSS, the flat IDT from [`crate::interrupts`],
//! the legacy PIC, and the legacy PIT. Must run with interrupts disabled;
//! [`kinit`] leaves them disabled on return, the caller enables them.

mod gdt;

use kcore::klazy;

use libx64::gdt::lgdt;
use libx64::idt::{lidt, InterruptDescriptorTable, InterruptFrame};
use libx64::segments::{ltr, set_cs, set_ss, SegmentSelector};

klazy! {
    static IDT: InterruptDescriptorTable = crate::interrupts::build_idt(gdt::GDT.1.code_segment);
}

static PIT: pit::Pit = pit::Pit::new(pit::DEFAULT_FREQ_HZ);

/// PIT timer handler (IRQ0, vector 32): advances the tick counter, emits a
/// heartbeat line every `freq` ticks, and reschedules on every quantum
/// boundary (§4.5).
extern "C" fn timer_handler(_frame: &mut InterruptFrame) {
    let event = PIT.tick();
    if event.heartbeat {
        log::trace!("tick {} (uptime {} ms)", event.ticks, PIT.uptime_ms());
    }
    if event.quantum {
        scheduler::sched_yield();
    }
}

#[inline(never)]
pub fn kinit() {
    let (gdt, segments) = &*gdt::GDT;

    lgdt(&gdt.lgdt_ptr());
    log::trace!("GDT initialized");

    set_cs(segments.code_segment);
    set_ss(SegmentSelector::zero());
    ltr(segments.task_state);
    log::trace!("segments switched");

    lidt(&IDT);
    log::trace!("IDT initialized");

    crate::interrupts::register(crate::interrupts::IRQ_BASE as u8, timer_handler);

    // SAFETY: runs once, before interrupts are enabled, with the GDT/IDT
    // already installed and exclusive access to the PIC/PIT ports.
    unsafe {
        crate::interrupts::init_pic();
        PIT.init();
    }
    log::trace!("PIT initialized");

    crate::interrupts::PICS
        .lock()
        .unmask(0)
        .expect("PIC initialized above");
    log::trace!("IRQ 0 unmasked");

    log::info!("initialization successful");
}
