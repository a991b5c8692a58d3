//! Single unrecoverable-halt path. Every "this cannot be recovered from"
//! event in the kernel — heap corruption, `#[panic_handler]`, a failed boot
//! invariant — funnels through here rather than each call site picking its
//! own way to stop.

/// Logs `msg` then halts with interrupts disabled. Never returns.
pub fn khalt(msg: &str) -> ! {
    error!("halt: {}", msg);
    libx64::cli();
    libx64::diverging_hlt();
}
