//! Entry point and init order. A Limine-loaded kernel jumps to `_start` with
//! an otherwise unspecified machine state; everything from here down is
//! this crate's job to bring up in dependency order: physical memory, the
//! kernel's own page tables, the heap, then interrupts/timer/scheduler.

#![feature(alloc_error_handler)]
#![no_main]
#![no_std]

#[macro_use]
extern crate log;
extern crate alloc;

mod boot;
mod error;
mod init;
mod interrupts;
pub mod mem;
mod panic;

use core::panic::PanicInfo;

use panic::khalt;

/// First spawned thread: probes the virtio-blk device (if one is attached)
/// and reads its first sector as a smoke test, then yields forever.
extern "C" fn worker_main(_arg: usize) {
    let mut dma = mem::dma::KernelDma;
    match virtio::blk::BlkDevice::probe(&mut dma) {
        Ok(mut dev) => {
            info!(
                "virtio-blk: {} sectors ({} MiB)",
                dev.capacity_sectors(),
                dev.capacity_sectors() * 512 / (1024 * 1024)
            );
            let mut buf = [0u8; 512];
            match dev.read_sectors(0, 1, &mut buf, &mut dma) {
                Ok(()) => info!("virtio-blk: sector 0 read ok, first bytes {:02x?}", &buf[..16]),
                Err(e) => warn!("virtio-blk: read failed: {:?}", e),
            }
        }
        Err(e) => info!("virtio-blk: no device ({:?})", e),
    }

    loop {
        scheduler::sched_yield();
    }
}

/// Idle thread: runs only when the run queue is empty. Never enqueued,
/// never dies.
extern "C" fn idle_main(_arg: usize) {
    loop {
        libx64::hlt();
    }
}

/// # Safety
/// Called exactly once, by Limine, with the CPU in the state its protocol
/// guarantees (long mode, paging enabled on the bootloader's own tables,
/// interrupts disabled).
#[no_mangle]
extern "C" fn _start() -> ! {
    qemu_logger::init().expect("logger already initialized");
    info!("kernel loaded");

    let info = boot::collect();

    mem::pmm::init(&info);
    mem::vmm::init(&info);
    mem::galloc::log_stats();

    init::kinit();

    scheduler::init();
    scheduler::set_idle(idle_main, 0);
    scheduler::spawn(worker_main, 0);

    libx64::sti();

    loop {
        libx64::hlt();
    }
}

#[panic_handler]
fn on_panic(info: &PanicInfo) -> ! {
    khalt(&alloc::format!("{}", info))
}
