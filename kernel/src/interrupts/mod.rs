//! Interrupt/exception dispatcher (§4.4): a flat 256-vector handler table
//! fed by a single dispatch entry point, with the low-level per-vector
//! stubs living in `vectors.s`/`stubs.rs`.
//!
//! Vector layout: 0-31 CPU exceptions (vector 8 runs on IST 1), 32-47
//! legacy PIC IRQs, 48-255 software/driver-registered.

mod stubs;

use kcore::klazy;
use kcore::sync::SpinMutex;

use libx64::descriptors::IstIndex;
use libx64::idt::{InterruptDescriptorTable, InterruptFrame};
use libx64::paging::PageFaultErrorCode;
use libx64::segments::SegmentSelector;
use libx64::Privilege;

use pic::chained::Chained;

/// First vector of the legacy PIC IRQ range.
pub const IRQ_BASE: u64 = 32;
/// One past the last legacy PIC IRQ vector (exclusive).
pub const IRQ_END: u64 = 48;
/// Double fault is routed through IST index 1 to survive a broken stack.
const DOUBLE_FAULT_VECTOR: u8 = 8;

pub type Handler = extern "C" fn(&mut InterruptFrame);

klazy! {
    ref static HANDLERS: SpinMutex<[Option<Handler>; 256]> = SpinMutex::new([None; 256]);
}

klazy! {
    pub ref static PICS: SpinMutex<Chained<0x20, 0x28>> = SpinMutex::new(Chained::uninit());
}

/// Registers `handler` at `vector`, overwriting any previous registration.
/// `vector` is a `u8` so it is always in the legal `[0, 256)` range — there
/// is no out-of-range case to silently reject in the Rust signature.
pub fn register(vector: u8, handler: Handler) {
    HANDLERS.lock()[vector as usize] = Some(handler);
}

/// Builds the IDT, pointing every vector at its generated stub. Installing
/// it (via `lidt`) is the caller's job, same as the teacher's GDT/IDT split.
pub fn build_idt(code_selector: SegmentSelector) -> InterruptDescriptorTable {
    let mut idt = InterruptDescriptorTable::new();
    for vector in 0..256usize {
        let ist = (vector == DOUBLE_FAULT_VECTOR as usize).then_some(IstIndex::Idx1);
        idt.set_handler(
            vector as u8,
            libx64::address::VirtualAddr::from_ptr(stubs::STUBS[vector] as *const ()),
            code_selector.as_u16(),
            Privilege::Ring0,
            ist,
        );
    }
    idt
}

/// The common dispatch entry point every stub calls into, with a pointer to
/// the exact register-save frame described in §6. This is the only place
/// that decides exception vs. IRQ vs. software-vector handling.
///
/// # Safety
/// Called only from `interrupt_common` in `vectors.s`, with `frame`
/// pointing at a validly constructed `InterruptFrame` on the current stack.
#[no_mangle]
extern "C" fn dispatch(frame: *mut InterruptFrame) {
    // SAFETY: the low-level stub guarantees `frame` is valid for the
    // duration of this call.
    let frame = unsafe { &mut *frame };
    let vector = frame.vector;

    if (IRQ_BASE..IRQ_END).contains(&vector) {
        dispatch_irq(frame, (vector - IRQ_BASE) as u8);
        return;
    }

    if let Some(handler) = HANDLERS.lock()[vector as usize] {
        handler(frame);
        return;
    }

    if vector < 32 {
        default_exception_handler(frame);
    }
}

/// IRQ path (§4.4): classify spurious IRQ7/IRQ15 first, otherwise send EOI
/// *before* invoking the handler — a handler may context-switch and never
/// return on this stack, so the EOI has to already be on the wire.
fn dispatch_irq(frame: &mut InterruptFrame, irq: u8) {
    let mut pics = PICS.lock();

    let spurious = match pics.is_spurious(irq) {
        Ok(s) => s,
        Err(_) => false,
    };
    if spurious {
        // `is_spurious` itself already sent the master-only EOI for IRQ15;
        // IRQ7 gets none at all.
        return;
    }

    let _ = pics.send_eoi(irq);
    drop(pics);

    if let Some(handler) = HANDLERS.lock()[(IRQ_BASE + u64::from(irq)) as usize] {
        handler(frame);
    }
}

/// Default handler for an unregistered CPU exception: log every GPR
/// (special-casing the page-fault address), then halt — per §7 this is
/// unrecoverable.
fn default_exception_handler(frame: &InterruptFrame) {
    log::error!("unhandled exception vector={} code={:#x}", frame.vector, frame.error_code);
    log::error!("{:#?}", frame);
    if frame.vector == 14 {
        let code = PageFaultErrorCode::from_bits_truncate(frame.error_code);
        log::error!("#PF fault address: {:?} code: {:?}", libx64::control::cr2(), code);
    }
    crate::panic::khalt("unhandled CPU exception");
}

/// Must be called once, after the GDT/TSS and IDT are installed, before
/// interrupts are enabled.
///
/// # Safety
/// Touches the PIC's I/O ports directly; must run with interrupts disabled
/// and before anything else assumes the PIC is in a known state.
pub unsafe fn init_pic() {
    PICS.lock().init().expect("PIC already initialized");
    log::info!("PIC remapped: master -> 32..40, slave -> 40..48");
}
