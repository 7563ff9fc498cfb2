use arbitrary_int::u3;
use bitbybit::bitfield;

/// Protect-control register.
///
/// The high byte is a write key: only stores whose key byte equals
/// [`PRCR_KEY`] reach the register at all. The low byte carries the two
/// interlock gates consulted by the clock and battery register groups.
#[bitfield(u16)]
#[derive(Debug, PartialEq, Eq)]
pub struct Prcr {
    /// Write key, compared against [`PRCR_KEY`] and never stored.
    #[bits(8..=15, rw)]
    pub key: u8,

    /// Writable, not connected to anything in this device.
    #[bit(3, rw)]
    pub prc3: bool,

    /// Gate for the battery-backed register group (VBTCR1, VBTSR).
    #[bit(1, rw)]
    pub battery_unlocked: bool,

    /// Gate for the clock and oscillator register group.
    #[bit(0, rw)]
    pub clock_unlocked: bool,
}

/// System clock division control register.
///
/// Each field is a power-of-two divider applied to the selected clock
/// source. Bits 16..=18 (the bus-clock field on larger parts) read back as
/// their reset value on this device.
#[bitfield(u32)]
#[derive(Debug, PartialEq, Eq)]
pub struct Sckdivcr {
    /// Flash interface clock divider.
    #[bits(28..=30, rw)]
    pub fck: u3,

    /// System (CPU) clock divider.
    #[bits(24..=26, rw)]
    pub ick: u3,

    /// Peripheral module clock A divider.
    #[bits(12..=14, rw)]
    pub pcka: u3,

    /// Peripheral module clock B divider.
    #[bits(8..=10, rw)]
    pub pckb: u3,

    /// Peripheral module clock C divider.
    #[bits(4..=6, rw)]
    pub pckc: u3,

    /// Peripheral module clock D divider.
    #[bits(0..=2, rw)]
    pub pckd: u3,
}

/// System clock source control register.
#[bitfield(u8)]
#[derive(Debug, PartialEq, Eq)]
pub struct Sckscr {
    /// Clock source selection: 0 HOCO, 1 MOCO, 2 LOCO, 3 main oscillator,
    /// 4 sub-clock oscillator.
    #[bits(0..=2, rw)]
    pub cksel: u3,
}

/// Key byte that must sit in PRCR bits 15:8 for the write to take effect.
pub const PRCR_KEY: u8 = 0xA5;

// Per-register writable-bit masks. A write may only change bits that are
// set here; everything else keeps its current value. The retain masks mark
// bits that additionally keep their current value even though the register
// is otherwise wholesale-writable. Fixed properties of the hardware, never
// derived from runtime data.
pub const PRCR_WRITE_MASK: u16 = 0x000B;
pub const FCACHEE_WRITE_MASK: u16 = 0x0001;
pub const SCKDIVCR_RETAIN_MASK: u32 = 0x88FF_8888;
pub const SCKSCR_WRITE_MASK: u8 = 0x07;
pub const MOMCR_WRITE_MASK: u8 = 0x48;
pub const MOSCWTCR_WRITE_MASK: u8 = 0x0F;
pub const SOSCCR_WRITE_MASK: u8 = 0x01;
pub const SOMCR_WRITE_MASK: u8 = 0x03;
pub const OPCCR_WRITE_MASK: u8 = 0x13;
pub const HOCOCR_WRITE_MASK: u8 = 0x01;
pub const OSCSF_WRITE_MASK: u8 = 0x29;
pub const MEMWAIT_WRITE_MASK: u8 = 0x01;
pub const USBFS_SYSCFG_WRITE_MASK: u16 = 0x0579;
pub const VBTSR_RETAIN_MASK: u8 = 0x10;

/// Pin-function-select word: every implemented function bit is writable
/// except the pin input level (bit 1), which only the pad can drive.
pub const PFS_WRITE_MASK: u32 = 0x1F01_FC55;

/// Analog-enable bit inside a PmnPFS word.
pub const PFS_ASEL: u32 = 1 << 15;

/// Applies a guest write through a writability mask and a retain mask.
///
/// Post-state is `(value & writable & !retain) | (current & (!writable | retain))`:
/// a bit takes the written value only when it is writable and not retained.
pub const fn masked_write(current: u32, value: u32, writable: u32, retain: u32) -> u32 {
    (value & writable & !retain) | (current & (!writable | retain))
}

/// Byte-register variant of [`masked_write`] without retained bits.
pub const fn masked_write8(current: u8, value: u32, writable: u8) -> u8 {
    masked_write(current as u32, value, writable as u32, 0) as u8
}
