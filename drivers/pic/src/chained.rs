use crate::words::{ICW1, ICW3, ICW4};
use crate::{Pic, Raw, RemapInit, RemapUninit};

use libx64::port::WPort;

enum State<const A: u8, const B: u8> {
    Init((Pic<RemapInit, A>, Pic<RemapInit, B>)),
    Uninit(Option<(Pic<RemapUninit, A>, Pic<RemapUninit, B>)>),
    Raw((Pic<Raw, A>, Pic<Raw, B>)),
}

pub struct Chained<const A: u8, const B: u8> {
    state: State<A, B>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    UnhandledInterrupt,
    AlreadyInit,
    UnexpectedUnitialized,
}

impl<const A: u8, const B: u8> Chained<A, B> {
    #[must_use]
    pub fn uninit() -> Self {
        Self {
            state: State::Uninit(Some((Pic::master(), Pic::slave()))),
        }
    }
    /// # Safety
    ///
    /// You must ensure the right usage for your pic
    #[must_use]
    pub unsafe fn raw(master: Pic<Raw, A>, slave: Pic<Raw, B>) -> Self {
        Self {
            state: State::Raw((master, slave)),
        }
    }

    /// # Errors
    ///
    /// Errors if the pic is initialized
    pub fn init(&mut self) -> Result<(), Error> {
        match self.state {
            State::Uninit(Some((ref mut master, ref mut slave))) => {
                self.state = State::Init(remap_init(master.clone(), slave.clone()));
                Ok(())
            }
            State::Init(_) | State::Raw(_) => Err(Error::AlreadyInit),
            State::Uninit(None) => Err(Error::UnexpectedUnitialized),
        }
    }

    /// Sends End-Of-Interrupt for global IRQ line `irq` (0-15): always to
    /// the master, and additionally to the slave when `irq >= 8` (§4.4 —
    /// the cascade line needs acknowledging on both controllers).
    ///
    /// # Errors
    ///
    /// Errors if the chained pic hasn't been initialized.
    pub fn send_eoi(&mut self, irq: u8) -> Result<(), Error> {
        let (master, slave) = self.initialized()?;
        if irq >= 8 {
            slave.eoi();
        }
        master.eoi();
        Ok(())
    }

    fn initialized(&mut self) -> Result<(&mut Pic<RemapInit, A>, &mut Pic<RemapInit, B>), Error> {
        match self.state {
            State::Init((ref mut master, ref mut slave)) => Ok((master, slave)),
            State::Uninit(_) => Err(Error::UnexpectedUnitialized),
            State::Raw(_) => unimplemented!(),
        }
    }

    /// Reads the combined 16-bit In-Service Register (master in the low byte,
    /// slave in the high byte).
    ///
    /// # Errors
    ///
    /// Errors if the chained pic hasn't been initialized.
    pub fn read_isr(&mut self) -> Result<u16, Error> {
        let (master, slave) = self.initialized()?;
        let lo = u16::from(master.read_isr());
        let hi = u16::from(slave.read_isr());
        Ok(lo | (hi << 8))
    }

    /// Classifies a raised IRQ7 (master) or IRQ15 (slave) as spurious by
    /// checking whether the corresponding ISR bit is actually set. Spurious
    /// IRQ7 requires no EOI at all; spurious IRQ15 still needs an EOI sent to
    /// the master only, to acknowledge the cascade line.
    ///
    /// # Errors
    ///
    /// Errors if the chained pic hasn't been initialized.
    pub fn is_spurious(&mut self, irq: u8) -> Result<bool, Error> {
        let isr = self.read_isr()?;
        match irq {
            7 => Ok(isr & (1 << 7) == 0),
            15 => {
                let spurious = isr & (1 << 15) == 0;
                if spurious {
                    let (master, _) = self.initialized()?;
                    master.eoi();
                }
                Ok(spurious)
            }
            _ => Ok(false),
        }
    }

    /// Masks the given global IRQ line (0-15).
    ///
    /// # Errors
    ///
    /// Errors if the chained pic hasn't been initialized.
    pub fn mask(&mut self, irq: u8) -> Result<(), Error> {
        let (master, slave) = self.initialized()?;
        if irq < 8 {
            master.mask_irq(irq);
        } else {
            slave.mask_irq(irq - 8);
        }
        Ok(())
    }

    /// Unmasks the given global IRQ line (0-15).
    ///
    /// # Errors
    ///
    /// Errors if the chained pic hasn't been initialized.
    pub fn unmask(&mut self, irq: u8) -> Result<(), Error> {
        let (master, slave) = self.initialized()?;
        if irq < 8 {
            master.unmask_irq(irq);
        } else {
            slave.unmask_irq(irq - 8);
        }
        Ok(())
    }
}

/// Remaps both controllers and leaves every line masked (§4.4: "Masks
/// default to all-masked after init"). Whatever masks the firmware or
/// bootloader left behind are not preserved — a caller that wants a line
/// live has to `unmask` it explicitly after `init`.
#[must_use]
pub fn remap_init<const A: u8, const B: u8>(
    master: Pic<RemapUninit, A>,
    slave: Pic<RemapUninit, B>,
) -> (Pic<RemapInit, A>, Pic<RemapInit, B>) {
    let mut wait_port = WPort::<u8>::new(0x80);
    let mut wait = || unsafe { wait_port.write(0) };

    let icw1 = ICW1::zero()
        .set_ic4(u8::from(true))
        .set_init(u8::from(true));

    let master = master.write_icw1(icw1);
    wait();
    let slave = slave.write_icw1(icw1);
    wait();

    let master = master.write_icw2();
    wait();
    let slave = slave.write_icw2();
    wait();

    let master = master.write_icw3(ICW3(4));
    wait();
    let slave = slave.write_icw3(ICW3(2));
    wait();

    let icw4 = ICW4::zero().set_x86mode(1);

    let master = master.write_icw4(icw4);
    wait();
    let slave = slave.write_icw4(icw4);
    wait();

    (master.write_mask(0xFF), slave.write_mask(0xFF))
}
