//! Legacy VirtIO-over-PCI device lifecycle: status register handshake,
//! feature negotiation, and per-queue vring setup (§4.7).

use libx64::port::{RPort, RWPort, WPort};

use crate::pci::{self, PciDevice};
use crate::queue::{self, Virtqueue};

const REG_DEVICE_FEATURES: u16 = 0x00;
const REG_GUEST_FEATURES: u16 = 0x04;
const REG_QUEUE_ADDR: u16 = 0x08;
const REG_QUEUE_SIZE: u16 = 0x0C;
const REG_QUEUE_SELECT: u16 = 0x0E;
const REG_QUEUE_NOTIFY: u16 = 0x10;
const REG_DEVICE_STATUS: u16 = 0x12;

/// Device-specific config space starts here for legacy transport.
pub const REG_CONFIG: u16 = 0x14;

const STATUS_ACK: u8 = 0x01;
const STATUS_DRIVER: u8 = 0x02;
const STATUS_DRIVER_OK: u8 = 0x04;

const MAX_QUEUES: usize = 4;
const FRAME_SIZE: u64 = 4096;

#[derive(Debug)]
pub enum VirtioError {
    NotIoSpace,
    QueueUnavailable,
    OutOfMemory,
}

/// Physical-page source the device needs to build vring memory: the
/// driver doesn't know how pages are tracked, only that it can ask for
/// `n` contiguous physical frames and reach them through the HHDM.
pub trait DmaAllocator {
    fn alloc_contiguous(&mut self, pages: u32) -> Option<u64>;
    fn free_contiguous(&mut self, phys: u64, pages: u32);
    fn hhdm_offset(&self) -> u64;
}

pub struct VirtioDevice {
    io_base: u16,
    pub irq_line: u8,
    queues: [Option<Virtqueue>; MAX_QUEUES],
    num_queues: usize,
}

impl VirtioDevice {
    /// Resets the device and brings it to the ACK|DRIVER status, per the
    /// first two steps of the legacy status handshake.
    pub fn init(pci_dev: &PciDevice) -> Result<Self, VirtioError> {
        let io_base = pci::bar_io_base(pci_dev.bar0).ok_or(VirtioError::NotIoSpace)?;

        let mut status = WPort::<u8>::new(io_base + REG_DEVICE_STATUS);
        // SAFETY: `io_base` comes from a probed, I/O-space BAR0.
        unsafe {
            status.write(0);
            status.write(STATUS_ACK);
            status.write(STATUS_ACK | STATUS_DRIVER);
        }

        pci::enable_bus_master(pci_dev);

        log::info!(
            "virtio device at {:02x}:{:02x}.{} io_base=0x{:x} irq={}",
            pci_dev.addr.bus,
            pci_dev.addr.device,
            pci_dev.addr.function,
            io_base,
            pci_dev.irq_line
        );

        Ok(Self {
            io_base,
            irq_line: pci_dev.irq_line,
            queues: [None, None, None, None],
            num_queues: 0,
        })
    }

    /// Reads the device's offered features, ANDs with `supported`, writes
    /// the result back.
    pub fn negotiate_features(&self, supported: u32) -> u32 {
        let device_features = RPort::<u32>::new(self.io_base + REG_DEVICE_FEATURES);
        let mut guest_features = WPort::<u32>::new(self.io_base + REG_GUEST_FEATURES);
        // SAFETY: `io_base` is this device's I/O window.
        unsafe {
            let device_features = device_features.read();
            let negotiated = device_features & supported;
            guest_features.write(negotiated);
            log::info!("virtio features: device=0x{device_features:x} negotiated=0x{negotiated:x}");
            negotiated
        }
    }

    /// Allocates and installs a vring for `queue_index`, reading the
    /// device's preferred queue size first.
    pub fn init_queue(
        &mut self,
        queue_index: usize,
        alloc: &mut impl DmaAllocator,
    ) -> Result<(), VirtioError> {
        if queue_index >= MAX_QUEUES {
            return Err(VirtioError::QueueUnavailable);
        }

        let mut select = WPort::<u16>::new(self.io_base + REG_QUEUE_SELECT);
        let size_port = RPort::<u16>::new(self.io_base + REG_QUEUE_SIZE);
        // SAFETY: `io_base` is this device's I/O window.
        let qsz = unsafe {
            select.write(queue_index as u16);
            size_port.read()
        };
        if qsz == 0 {
            return Err(VirtioError::QueueUnavailable);
        }

        let total = queue::total_size(qsz, FRAME_SIZE);
        let pages_needed = ((total + FRAME_SIZE - 1) / FRAME_SIZE) as u32;
        let phys = alloc
            .alloc_contiguous(pages_needed)
            .ok_or(VirtioError::OutOfMemory)?;

        let virt = (phys + alloc.hhdm_offset()) as *mut u8;
        // SAFETY: `virt` is the HHDM alias of `pages_needed` freshly
        // allocated, exclusively owned physical frames.
        unsafe {
            core::ptr::write_bytes(virt, 0, (pages_needed as u64 * FRAME_SIZE) as usize);
        }

        // SAFETY: `virt` satisfies `Virtqueue::new`'s memory precondition.
        let vq = unsafe { Virtqueue::new(virt, qsz, phys, pages_needed, FRAME_SIZE) };

        let mut addr_port = WPort::<u32>::new(self.io_base + REG_QUEUE_ADDR);
        // SAFETY: `io_base` is this device's I/O window; `phys` is frame-aligned.
        unsafe {
            addr_port.write((phys / FRAME_SIZE) as u32);
        }

        log::info!("virtio queue {queue_index}: size={qsz} phys=0x{phys:x} pages={pages_needed}");

        self.queues[queue_index] = Some(vq);
        if queue_index >= self.num_queues {
            self.num_queues = queue_index + 1;
        }
        Ok(())
    }

    /// Sets `DRIVER_OK` — the device is now live.
    pub fn set_ready(&self) {
        let mut status = WPort::<u8>::new(self.io_base + REG_DEVICE_STATUS);
        // SAFETY: `io_base` is this device's I/O window.
        unsafe {
            status.write(STATUS_ACK | STATUS_DRIVER | STATUS_DRIVER_OK);
        }
    }

    pub fn queue_mut(&mut self, index: usize) -> Option<&mut Virtqueue> {
        self.queues.get_mut(index)?.as_mut()
    }

    /// Notifies the device that `queue_index` has new work in the avail ring.
    pub fn notify(&self, queue_index: usize) {
        let mut notify = WPort::<u16>::new(self.io_base + REG_QUEUE_NOTIFY);
        // SAFETY: `io_base` is this device's I/O window.
        unsafe {
            notify.write(queue_index as u16);
        }
    }

    /// Reads a 32-bit word from device-specific config space.
    pub fn config_read32(&self, offset: u16) -> u32 {
        let port = RWPort::<u32>::new(self.io_base + REG_CONFIG + offset);
        // SAFETY: `io_base` is this device's I/O window.
        unsafe { port.read() }
    }
}
