//! Clock tree derivation.
//!
//! The board wires one sysclk frequency in at realize time. Everything else
//! is derived from the live SCKSCR/SCKDIVCR values on each query, so a
//! guest reprogramming the dividers sees the change at the very next
//! peripheral access.

use crate::system::SystemRegs;
use crate::system::register::{Sckdivcr, Sckscr};
use embedded_time::rate::{Extensions, Hertz};

// On-chip oscillator rates selectable through SCKSCR.
const MOCO_HZ: u32 = 8_000_000;
const LOCO_HZ: u32 = 32_768;

/// The SoC clock tree.
#[derive(Debug, Clone, Copy)]
pub struct Clocks {
    sysclk: Hertz,
}

impl Clocks {
    /// `sysclk` is the board-provided oscillator feeding both the HOCO and
    /// the main oscillator inputs of the clock source selector.
    pub fn new(sysclk: Hertz) -> Self {
        Self { sysclk }
    }

    /// The wired board clock.
    pub fn sysclk(&self) -> Hertz {
        self.sysclk
    }

    /// The selected, undivided clock source.
    pub fn source(&self, regs: &SystemRegs) -> Hertz {
        match Sckscr::new_with_raw_value(regs.sckscr()).cksel().value() {
            1 => MOCO_HZ.Hz(),
            2 | 4 => LOCO_HZ.Hz(),
            // HOCO and the main oscillator both run at the board clock.
            _ => self.sysclk,
        }
    }

    /// System (CPU) clock.
    pub fn iclk(&self, regs: &SystemRegs) -> Hertz {
        self.divided(regs, |d| d.ick().value())
    }

    /// Peripheral module clock A, the serial channels' input frequency.
    pub fn pclka(&self, regs: &SystemRegs) -> Hertz {
        self.divided(regs, |d| d.pcka().value())
    }

    /// Peripheral module clock B.
    pub fn pclkb(&self, regs: &SystemRegs) -> Hertz {
        self.divided(regs, |d| d.pckb().value())
    }

    /// Peripheral module clock D.
    pub fn pclkd(&self, regs: &SystemRegs) -> Hertz {
        self.divided(regs, |d| d.pckd().value())
    }

    fn divided(&self, regs: &SystemRegs, field: impl Fn(&Sckdivcr) -> u8) -> Hertz {
        let div = field(&Sckdivcr::new_with_raw_value(regs.sckdivcr()));
        (self.source(regs).0 >> div).Hz()
    }
}
