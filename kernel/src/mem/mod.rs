use alloc::alloc::Layout;

pub mod dma;
pub mod galloc;
pub mod pmm;
pub mod vmm;

#[alloc_error_handler]
fn alloc_error_handler(error: Layout) -> ! {
    crate::panic::khalt(&alloc::format!("allocation error: {:?}", error));
}
