//! Paravirtual storage stack: PCI discovery, the legacy vring transport,
//! device lifecycle, and a block-device client built on top (§4.7).

#![no_std]

#[cfg(test)]
extern crate std;

pub mod blk;
pub mod device;
pub mod pci;
pub mod queue;
