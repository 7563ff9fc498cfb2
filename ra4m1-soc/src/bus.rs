//! Interfaces to the hosting simulator.
//!
//! The SoC model never talks to the host directly; everything it needs from
//! the outside world comes through the traits here. The host implements them
//! once and hands the implementations to [`crate::soc::Ra4m1`] at
//! construction time.

/// A memory-mapped device surface.
///
/// Addresses are guest-physical. Accesses are 1, 2 or 4 bytes wide and
/// complete synchronously; handlers never fault the guest, no matter how
/// malformed the access is.
pub trait BusDevice {
    /// Handles a guest load. Unclaimed or malformed reads return 0.
    fn read(&mut self, addr: u32, size: u8) -> u32;

    /// Handles a guest store. Unclaimed or malformed writes are dropped.
    fn write(&mut self, addr: u32, size: u8, value: u32);

    /// Restores the device to its power-on state.
    fn reset(&mut self);
}

/// An interrupt request input on the CPU model.
///
/// Lines are level-valued. The model calls this once per level change,
/// after the register update that caused it.
pub trait IrqSink {
    fn set_irq(&mut self, line: usize, level: bool);
}

/// The host's system address space.
///
/// The SoC allocates its fixed memory regions through this at realize time.
/// Failures here are fatal configuration errors; they never occur during
/// guest execution.
pub trait SystemMemory {
    fn map_ram(&mut self, name: &str, base: u32, size: u32) -> Result<(), MemoryError>;

    fn map_rom(&mut self, name: &str, base: u32, size: u32) -> Result<(), MemoryError>;

    /// Installs `data` into a previously mapped ROM region starting at
    /// `base`. Used for the boot image only.
    fn write_rom(&mut self, base: u32, data: &[u8]) -> Result<(), MemoryError>;
}

/// Failure modes of [`SystemMemory`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The requested region collides with an existing mapping.
    Overlap,
    /// The access falls outside every mapped region.
    OutOfBounds,
    /// `write_rom` targeted something that is not a ROM region.
    NotRom,
}

impl core::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Overlap => write!(f, "region overlaps an existing mapping"),
            Self::OutOfBounds => write!(f, "access outside any mapped region"),
            Self::NotRom => write!(f, "target region is not a ROM"),
        }
    }
}

/// Fatal construction-time errors.
///
/// Everything here aborts startup; nothing here can be raised by guest
/// activity after realize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocError {
    /// No system clock was wired up before realize.
    MissingSysclk,
    /// The hosting board supplied a RAM object of the wrong size.
    RamSizeMismatch { expected: u32, found: u32 },
    /// The supplied firmware image does not fit in code flash.
    FirmwareTooLarge { size: usize, capacity: u32 },
    /// Mapping or populating a memory region failed.
    Memory(MemoryError),
}

impl core::fmt::Display for SocError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::MissingSysclk => {
                write!(f, "sysclk clock must be wired up by the board code")
            }
            Self::RamSizeMismatch { expected, found } => {
                write!(f, "board RAM must be {expected} bytes, got {found}")
            }
            Self::FirmwareTooLarge { size, capacity } => {
                write!(f, "firmware image of {size} bytes exceeds {capacity} bytes of flash")
            }
            Self::Memory(e) => write!(f, "memory map setup failed: {e}"),
        }
    }
}

impl From<MemoryError> for SocError {
    fn from(e: MemoryError) -> Self {
        Self::Memory(e)
    }
}
