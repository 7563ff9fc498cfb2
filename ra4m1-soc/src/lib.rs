//! Peripheral register model for the Renesas RA4M1 system-on-chip.
//!
//! This crate is the machine-model half of an RA4M1 emulator. The hosting
//! instruction-set simulator supplies the Cortex-M4 core, the system address
//! space and the bus framework; this crate supplies everything behind the
//! peripheral windows: the system register file with its write-protection
//! interlocks, the GPIO port controller bank, the interrupt steering unit
//! (event-link matrix), the serial channels and the flash register stub,
//! composed into one bus-attachable device by [`soc::Ra4m1`].

pub mod bus;
pub mod clocks;
pub mod flash;
pub mod icu;
pub mod sci;
pub mod soc;
pub mod system;

pub use bus::{BusDevice, IrqSink, SystemMemory};
pub use soc::Ra4m1;
