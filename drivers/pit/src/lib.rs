//! Legacy Programmable Interval Timer (PIT) channel 0, rate-generator mode.
//!
//! This crate only owns the hardware programming and the pure tick
//! bookkeeping (§4.5): it has no notion of the scheduler or the PIC, so the
//! decision of what to do on a heartbeat/quantum boundary lives with
//! whoever registers the IRQ 0 handler.

#![no_std]

#[cfg(test)]
extern crate std;

use core::sync::atomic::{AtomicU64, Ordering};

use libx64::port::WPort;

/// PIT input clock frequency in Hz.
pub const BASE_FREQUENCY: u32 = 1_193_182;

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

/// Channel 0, access mode lobyte/hibyte, mode 2 (rate generator), binary.
const MODE_COMMAND: u8 = 0x34;

/// Default tick rate used unless the `pit-freq-1000hz` feature is enabled.
pub const DEFAULT_FREQ_HZ: u32 = 100;

/// Ticks between forced reschedules (100 ms at 100 Hz).
pub const SCHED_QUANTUM: u64 = 10;

/// Outcome of a single tick, decided purely from the running counter so it
/// can be unit-tested without touching any hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    pub ticks: u64,
    pub heartbeat: bool,
    pub quantum: bool,
}

/// Owns the running tick count and the configured frequency. Hardware
/// programming (`init`) and the pure `tick` bookkeeping are deliberately
/// split so the latter is host-testable.
pub struct Pit {
    ticks: AtomicU64,
    freq_hz: u32,
}

impl Pit {
    #[must_use]
    pub const fn new(freq_hz: u32) -> Self {
        Self {
            ticks: AtomicU64::new(0),
            freq_hz,
        }
    }

    /// Programs PIT channel 0 to fire at `self`'s configured frequency.
    ///
    /// # Safety
    /// Must be called once, before interrupts are enabled, with exclusive
    /// access to ports 0x40/0x43.
    pub unsafe fn init(&self) {
        let divisor = (BASE_FREQUENCY / self.freq_hz) as u16;

        let mut command = WPort::<u8>::new(PIT_COMMAND);
        let mut channel0 = WPort::<u8>::new(PIT_CHANNEL0);

        command.write(MODE_COMMAND);
        channel0.write((divisor & 0xFF) as u8);
        channel0.write((divisor >> 8) as u8);
    }

    /// Advances the tick counter by one and classifies the result. Called
    /// from the IRQ 0 handler, after EOI has already been sent (§4.4).
    pub fn tick(&self) -> TickEvent {
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        TickEvent {
            ticks,
            heartbeat: ticks % u64::from(self.freq_hz) == 0,
            quantum: ticks % SCHED_QUANTUM == 0,
        }
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn uptime_ms(&self) -> u64 {
        self.ticks() * 1000 / u64::from(self.freq_hz)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn heartbeat_fires_once_per_freq_ticks() {
        let pit = Pit::new(100);
        let mut heartbeats = 0;
        for _ in 0..250 {
            if pit.tick().heartbeat {
                heartbeats += 1;
            }
        }
        assert_eq!(heartbeats, 2);
    }

    #[test]
    fn quantum_fires_every_tenth_tick() {
        let pit = Pit::new(100);
        let mut quanta = 0;
        for _ in 0..30 {
            if pit.tick().quantum {
                quanta += 1;
            }
        }
        assert_eq!(quanta, 3);
    }

    #[test]
    fn uptime_tracks_seconds() {
        let pit = Pit::new(100);
        for _ in 0..300 {
            pit.tick();
        }
        assert_eq!(pit.uptime_ms(), 3000);
    }
}
