//! Minimal Type-1 PCI config-space scanner. §1 scopes full PCI enumeration
//! out of the core; this exists only as the name-resolver the virtqueue
//! engine needs to find a virtio-blk device (SPEC_FULL §2 C7 collaborator).

use libx64::port::{RWPort, WPort};

const CONFIG_ADDR: u16 = 0x0CF8;
const CONFIG_DATA: u16 = 0x0CFC;

const REG_VENDOR_DEVICE: u8 = 0x00;
const REG_COMMAND: u8 = 0x04;
const REG_CLASS: u8 = 0x08;
const REG_BAR0: u8 = 0x10;
const REG_IRQ_LINE: u8 = 0x3C;

const VENDOR_NONE: u16 = 0xFFFF;

bitflags::bitflags! {
    pub struct Command: u32 {
        const IO_SPACE = 1;
        const MEM_SPACE = 1 << 1;
        const BUS_MASTER = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PciAddress {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct PciDevice {
    pub addr: PciAddress,
    pub vendor_id: u16,
    pub device_id: u16,
    pub class_code: u8,
    pub subclass: u8,
    pub irq_line: u8,
    pub bar0: u32,
}

fn config_address(addr: PciAddress, offset: u8) -> u32 {
    0x8000_0000
        | (u32::from(addr.bus) << 16)
        | (u32::from(addr.device) << 11)
        | (u32::from(addr.function) << 8)
        | u32::from(offset & 0xFC)
}

/// Reads a 32-bit value from PCI config space. `offset` must be 4-byte
/// aligned.
#[must_use]
pub fn config_read32(addr: PciAddress, offset: u8) -> u32 {
    let mut addr_port = WPort::<u32>::new(CONFIG_ADDR);
    let data_port = RWPort::<u32>::new(CONFIG_DATA);
    unsafe {
        addr_port.write(config_address(addr, offset));
        data_port.read()
    }
}

/// Writes a 32-bit value to PCI config space. `offset` must be 4-byte
/// aligned.
pub fn config_write32(addr: PciAddress, offset: u8, value: u32) {
    let mut addr_port = WPort::<u32>::new(CONFIG_ADDR);
    let mut data_port = RWPort::<u32>::new(CONFIG_DATA);
    unsafe {
        addr_port.write(config_address(addr, offset));
        data_port.write(value);
    }
}

fn probe(addr: PciAddress) -> Option<PciDevice> {
    let vendor_device = config_read32(addr, REG_VENDOR_DEVICE);
    let vendor_id = (vendor_device & 0xFFFF) as u16;
    if vendor_id == VENDOR_NONE {
        return None;
    }
    let device_id = (vendor_device >> 16) as u16;
    let class = config_read32(addr, REG_CLASS);
    let irq_line = (config_read32(addr, REG_IRQ_LINE) & 0xFF) as u8;
    let bar0 = config_read32(addr, REG_BAR0);

    Some(PciDevice {
        addr,
        vendor_id,
        device_id,
        class_code: (class >> 24) as u8,
        subclass: (class >> 16) as u8,
        irq_line,
        bar0,
    })
}

/// Scans every bus/device/function and calls `visit` for each populated
/// slot. Does not track multi-function headers beyond simply visiting all
/// eight functions unconditionally (cheap, bounded, and harmless on
/// single-function devices since function > 0 just reads as unpopulated).
pub fn scan(mut visit: impl FnMut(PciDevice)) {
    for bus in 0..=255u16 {
        for device in 0..32u8 {
            for function in 0..8u8 {
                let addr = PciAddress {
                    bus: bus as u8,
                    device,
                    function,
                };
                if let Some(dev) = probe(addr) {
                    visit(dev);
                }
                if bus == 255 {
                    break;
                }
            }
        }
    }
}

/// Finds the first device matching `vendor_id`/`device_id`.
#[must_use]
pub fn find_device(vendor_id: u16, device_id: u16) -> Option<PciDevice> {
    let mut found = None;
    scan(|dev| {
        if found.is_none() && dev.vendor_id == vendor_id && dev.device_id == device_id {
            found = Some(dev);
        }
    });
    found
}

/// Enables bus mastering (DMA) on `dev`.
pub fn enable_bus_master(dev: &PciDevice) {
    let command = config_read32(dev.addr, REG_COMMAND) & 0xFFFF;
    let command = command | Command::BUS_MASTER.bits();
    config_write32(dev.addr, REG_COMMAND, command);
}

/// Extracts the I/O port base from a BAR value, or `None` if the BAR
/// describes memory space rather than I/O space.
#[must_use]
pub fn bar_io_base(bar: u32) -> Option<u16> {
    if bar & 1 == 0 {
        return None;
    }
    Some((bar & 0xFFFC) as u16)
}
