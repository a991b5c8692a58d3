//! VirtIO block device client: capacity discovery and polled sector reads
//! over a single request queue (§4.7).

use crate::device::{DmaAllocator, VirtioDevice, VirtioError};
use crate::pci;
use crate::queue::{DESC_F_NEXT, DESC_F_WRITE, DESC_NONE};

pub const VENDOR_ID: u16 = 0x1AF4;
pub const DEVICE_ID: u16 = 0x1001;

const SECTOR_SIZE: u32 = 512;
const POLL_TIMEOUT: u32 = 10_000_000;

const BLK_T_IN: u32 = 0;
const BLK_S_OK: u8 = 0;

#[repr(C, packed)]
struct ReqHeader {
    req_type: u32,
    reserved: u32,
    sector: u64,
}

#[derive(Debug)]
pub enum BlkError {
    NoDevice,
    Device(VirtioError),
    OutOfRange,
    NoFreeDescriptors,
    OutOfMemory,
    Timeout,
    IoError(u8),
}

impl From<VirtioError> for BlkError {
    fn from(e: VirtioError) -> Self {
        Self::Device(e)
    }
}

/// A bound virtio-blk device: the underlying `VirtioDevice` plus its
/// cached sector capacity.
pub struct BlkDevice {
    dev: VirtioDevice,
    capacity: u64,
}

impl BlkDevice {
    /// Finds the first virtio-blk device on the bus, brings it up through
    /// the legacy status handshake, negotiates no optional features, and
    /// reads its capacity.
    pub fn probe(alloc: &mut impl DmaAllocator) -> Result<Self, BlkError> {
        let pci_dev = pci::find_device(VENDOR_ID, DEVICE_ID).ok_or(BlkError::NoDevice)?;

        let mut dev = VirtioDevice::init(&pci_dev)?;
        dev.negotiate_features(0);
        dev.init_queue(0, alloc)?;

        let cap_lo = u64::from(dev.config_read32(0));
        let cap_hi = u64::from(dev.config_read32(4));
        let capacity = (cap_hi << 32) | cap_lo;

        log::info!(
            "virtio-blk capacity: {} sectors ({} MiB)",
            capacity,
            (capacity * u64::from(SECTOR_SIZE)) / (1024 * 1024)
        );

        dev.set_ready();

        Ok(Self { dev, capacity })
    }

    #[must_use]
    pub fn capacity_sectors(&self) -> u64 {
        self.capacity
    }

    /// Reads `count` sectors starting at `sector` into `buf`, which must be
    /// at least `count * 512` bytes. Builds the standard 3-descriptor
    /// header/data/status chain and busy-polls for completion.
    pub fn read_sectors(
        &mut self,
        sector: u64,
        count: u32,
        buf: &mut [u8],
        alloc: &mut impl DmaAllocator,
    ) -> Result<(), BlkError> {
        if count == 0 {
            return Ok(());
        }
        if sector.saturating_add(u64::from(count)) > self.capacity {
            return Err(BlkError::OutOfRange);
        }
        let data_bytes = count * SECTOR_SIZE;
        assert!(buf.len() >= data_bytes as usize);

        let req_phys = alloc.alloc_contiguous(1).ok_or(BlkError::OutOfMemory)?;
        let data_pages = (data_bytes as u64 + 4095) / 4096;
        let data_phys = match alloc.alloc_contiguous(data_pages as u32) {
            Some(p) => p,
            None => {
                alloc.free_contiguous(req_phys, 1);
                return Err(BlkError::OutOfMemory);
            }
        };

        let hhdm = alloc.hhdm_offset();
        let req_virt = (req_phys + hhdm) as *mut ReqHeader;
        let status_virt = (req_phys + hhdm + core::mem::size_of::<ReqHeader>() as u64) as *mut u8;
        let status_phys = req_phys + core::mem::size_of::<ReqHeader>() as u64;
        let data_virt = (data_phys + hhdm) as *mut u8;

        // SAFETY: `req_virt`/`status_virt` point into the freshly
        // allocated, exclusively owned request page.
        unsafe {
            req_virt.write(ReqHeader {
                req_type: BLK_T_IN,
                reserved: 0,
                sector,
            });
            status_virt.write(0xFF);
        }

        let wait_result = self.submit_and_wait(req_phys, status_phys, data_phys, data_bytes);

        let result = wait_result.and_then(|()| {
            // SAFETY: the device has completed the request; `status_virt`
            // holds the byte it wrote.
            let status = unsafe { status_virt.read() };
            if status == BLK_S_OK {
                // SAFETY: `data_virt` points at `data_bytes` bytes the
                // device has just finished writing, and `buf` has at
                // least that many.
                unsafe {
                    core::ptr::copy_nonoverlapping(data_virt, buf.as_mut_ptr(), data_bytes as usize);
                }
                Ok(())
            } else {
                Err(BlkError::IoError(status))
            }
        });

        alloc.free_contiguous(req_phys, 1);
        alloc.free_contiguous(data_phys, data_pages as u32);

        result
    }

    fn submit_and_wait(
        &mut self,
        req_phys: u64,
        status_phys: u64,
        data_phys: u64,
        data_bytes: u32,
    ) -> Result<(), BlkError> {
        let vq = self.dev.queue_mut(0).expect("request queue initialized in probe");

        let d0 = vq.alloc_desc();
        let d1 = vq.alloc_desc();
        let d2 = vq.alloc_desc();
        let (d0, d1, d2) = match (d0, d1, d2) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            (a, b, c) => {
                for d in [a, b, c].into_iter().flatten() {
                    vq.free_chain(d);
                }
                return Err(BlkError::NoFreeDescriptors);
            }
        };

        vq.set_desc(d0, req_phys, core::mem::size_of::<ReqHeader>() as u32, DESC_F_NEXT, d1);
        vq.set_desc(d1, data_phys, data_bytes, DESC_F_WRITE | DESC_F_NEXT, d2);
        vq.set_desc(d2, status_phys, 1, DESC_F_WRITE, DESC_NONE);

        vq.publish(d0);
        self.dev.notify(0);

        let vq = self.dev.queue_mut(0).expect("request queue initialized in probe");
        let mut timeout = POLL_TIMEOUT;
        while !vq.has_used() && timeout > 0 {
            timeout -= 1;
            // SAFETY: `pause` is a no-operand spin hint.
            unsafe {
                core::arch::asm!("pause", options(nomem, nostack, preserves_flags));
            }
        }
        if timeout == 0 {
            vq.free_chain(d0);
            return Err(BlkError::Timeout);
        }

        let (_head, _len) = vq.pop_used();
        vq.free_chain(d0);

        Ok(())
    }
}
