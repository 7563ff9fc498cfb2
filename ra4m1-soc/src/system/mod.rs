//! System register file and region decoding.
//!
//! One [`SystemRegs`] instance backs every register window the SoC exposes
//! outside the dedicated peripheral devices. Registers are stored at their
//! low-window canonical offsets; windows above the low one declare a shift
//! that is added during decode, so the two (or more) bus windows share one
//! set of state.

mod gpt;
mod port;
pub mod register;

pub use gpt::{GPT_CHANNEL_COUNT, GPT_STRIDE, GptBank};
pub use port::{PORT_COUNT, PORT_STRIDE, PortBank, PortControl};

use log::warn;
use register::*;

/// One bus window onto the register file.
///
/// `shift` is added to the window-relative offset to form the canonical
/// offset used by the dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub base: u32,
    pub size: u32,
    pub shift: u32,
}

/// The register windows, low window first. Configuration, not state.
pub const REGIONS: [Region; 3] = [
    Region { base: 0x4000_0000, size: 0x7_0000, shift: 0 },
    Region { base: 0x4007_8000, size: 0x8000, shift: 0x7_8000 },
    Region { base: 0x4008_0000, size: 0x8_0000, shift: 0x8_0000 },
];

// Canonical register offsets.
const FCACHEE_OFF: u32 = 0x1C100;
const SCKDIVCR_OFF: u32 = 0x1E020;
const SCKSCR_OFF: u32 = 0x1E026;
const MEMWAIT_OFF: u32 = 0x1E031;
const HOCOCR_OFF: u32 = 0x1E036;
const OSCSF_OFF: u32 = 0x1E03C;
const OPCCR_OFF: u32 = 0x1E0A0;
const MOSCWTCR_OFF: u32 = 0x1E0A2;
const PRCR_OFF: u32 = 0x1E3FE;
const MOMCR_OFF: u32 = 0x1E413;
const VBTCR1_OFF: u32 = 0x1E41F;
const SOSCCR_OFF: u32 = 0x1E480;
const SOMCR_OFF: u32 = 0x1E481;
const VBTSR_OFF: u32 = 0x1E4B1;
const USBFS_SYSCFG_OFF: u32 = 0x9_0000;

/// Canonical base of the port controller bank.
pub const PCNTR_BASE: u32 = 0x4_0000;

/// Canonical base of the pin-function-select matrix.
pub const PFS_BASE: u32 = 0x4_0800;
const PFS_PORT_STRIDE: u32 = 0x40;

/// Canonical base of the GPT stub bank (reached through the third window).
pub const GPT_BASE: u32 = 0x7_8000;

/// Pins per port in the pin-function-select matrix.
pub const PFS_PIN_COUNT: usize = 16;

/// The system register file.
///
/// All writes flow through three filters: the PRCR interlock for the clock
/// and battery groups, the per-register writability mask, and the retain
/// mask for status-like bits. Rejected writes leave the register untouched
/// and emit one log record.
#[derive(Debug, Clone)]
pub struct SystemRegs {
    vbtcr1: u8,
    vbtsr: u8,
    prcr: u16,
    fcachee: u16,
    sckdivcr: u32,
    sckscr: u8,
    momcr: u8,
    moscwtcr: u8,
    sosccr: u8,
    somcr: u8,
    opccr: u8,
    hococr: u8,
    oscsf: u8,
    memwait: u8,
    usbfs_syscfg: u16,
    ports: PortBank,
    pmnpfs: [[u32; PFS_PIN_COUNT]; PORT_COUNT],
    gpt: GptBank,
}

impl Default for SystemRegs {
    fn default() -> Self {
        let mut regs = Self {
            vbtcr1: 0,
            vbtsr: 0,
            prcr: 0,
            fcachee: 0,
            sckdivcr: 0,
            sckscr: 0,
            momcr: 0,
            moscwtcr: 0,
            sosccr: 0,
            somcr: 0,
            opccr: 0,
            hococr: 0,
            oscsf: 0,
            memwait: 0,
            usbfs_syscfg: 0,
            ports: PortBank::default(),
            pmnpfs: [[0; PFS_PIN_COUNT]; PORT_COUNT],
            gpt: GptBank::default(),
        };
        regs.reset();
        regs
    }
}

impl SystemRegs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.vbtcr1 = 0x00;
        self.vbtsr = 0x10;
        self.prcr = 0x0000;
        self.fcachee = 0x0000;
        self.sckdivcr = 0x4404_4444;
        self.sckscr = 0x01;
        self.momcr = 0x00;
        self.moscwtcr = 0x05;
        self.sosccr = 0x01;
        self.somcr = 0x00;
        self.opccr = 0x02;
        self.hococr = 0x00;
        self.oscsf = 0x01;
        self.memwait = 0x00;
        self.usbfs_syscfg = 0x0000;
        self.ports.reset();
        self.pmnpfs = [[0; PFS_PIN_COUNT]; PORT_COUNT];
        self.gpt.reset();
    }

    /// Maps a guest-physical address claimed by one of [`REGIONS`] to its
    /// canonical offset.
    pub fn canonical(addr: u32) -> Option<u32> {
        REGIONS
            .iter()
            .find(|r| addr >= r.base && addr - r.base < r.size)
            .map(|r| addr - r.base + r.shift)
    }

    /// Raw SCKDIVCR word, for clock derivation.
    pub fn sckdivcr(&self) -> u32 {
        self.sckdivcr
    }

    /// Raw SCKSCR byte, for clock derivation.
    pub fn sckscr(&self) -> u8 {
        self.sckscr
    }

    /// True when the analog function of the given pin is selected.
    pub fn analog_enabled(&self, port: usize, pin: usize) -> bool {
        self.pmnpfs[port][pin] & PFS_ASEL != 0
    }

    /// True when GPT channel `ch` is started.
    pub fn gpt_running(&self, ch: usize) -> bool {
        self.gpt.is_running(ch)
    }

    /// Handles a read at a canonical offset.
    pub fn read(&mut self, offset: u32, size: u8) -> u32 {
        if offset >= PCNTR_BASE && PortBank::contains(offset - PCNTR_BASE) {
            return self.ports.read(offset - PCNTR_BASE, size);
        }
        if offset >= PFS_BASE && Self::pfs_contains(offset - PFS_BASE) {
            return self.pfs_read(offset, size);
        }
        if offset >= GPT_BASE && GptBank::contains(offset - GPT_BASE) {
            return self.gpt.read(offset - GPT_BASE, size);
        }
        match offset {
            VBTCR1_OFF => self.read_checked(offset, size, 1, self.vbtcr1 as u32),
            VBTSR_OFF => self.read_checked(offset, size, 1, self.vbtsr as u32),
            PRCR_OFF => self.read_checked(offset, size, 2, self.prcr as u32),
            FCACHEE_OFF => self.read_checked(offset, size, 2, self.fcachee as u32),
            SCKDIVCR_OFF => self.read_checked(offset, size, 4, self.sckdivcr),
            SCKSCR_OFF => self.read_checked(offset, size, 1, self.sckscr as u32),
            MOMCR_OFF => self.read_checked(offset, size, 1, self.momcr as u32),
            MOSCWTCR_OFF => self.read_checked(offset, size, 1, self.moscwtcr as u32),
            SOSCCR_OFF => self.read_checked(offset, size, 1, self.sosccr as u32),
            SOMCR_OFF => self.read_checked(offset, size, 1, self.somcr as u32),
            OPCCR_OFF => self.read_checked(offset, size, 1, self.opccr as u32),
            HOCOCR_OFF => self.read_checked(offset, size, 1, self.hococr as u32),
            OSCSF_OFF => self.read_checked(offset, size, 1, self.oscsf as u32),
            MEMWAIT_OFF => self.read_checked(offset, size, 1, self.memwait as u32),
            USBFS_SYSCFG_OFF => self.read_checked(offset, size, 2, self.usbfs_syscfg as u32),
            _ => {
                warn!("bad read offset {offset:#x} for system regs");
                0
            }
        }
    }

    /// Handles a write at a canonical offset.
    pub fn write(&mut self, offset: u32, size: u8, value: u32) {
        if offset >= PCNTR_BASE && PortBank::contains(offset - PCNTR_BASE) {
            return self.ports.write(offset - PCNTR_BASE, size, value);
        }
        if offset >= PFS_BASE && Self::pfs_contains(offset - PFS_BASE) {
            return self.pfs_write(offset, size, value);
        }
        if offset >= GPT_BASE && GptBank::contains(offset - GPT_BASE) {
            return self.gpt.write(offset - GPT_BASE, size, value);
        }
        match offset {
            VBTCR1_OFF => {
                if self.width_ok(offset, size, 1) && self.battery_unlocked("VBTCR1") {
                    self.vbtcr1 = value as u8;
                }
            }
            VBTSR_OFF => {
                if self.width_ok(offset, size, 1) && self.battery_unlocked("VBTSR") {
                    self.vbtsr = masked_write(
                        self.vbtsr as u32,
                        value,
                        0xFF,
                        VBTSR_RETAIN_MASK as u32,
                    ) as u8;
                }
            }
            PRCR_OFF => {
                if self.width_ok(offset, size, 2) {
                    if (value >> 8) as u8 != PRCR_KEY {
                        warn!("PRCR[15:8] must be A5");
                    } else {
                        self.prcr = masked_write(self.prcr as u32, value, PRCR_WRITE_MASK as u32, 0)
                            as u16;
                    }
                }
            }
            FCACHEE_OFF => {
                if self.width_ok(offset, size, 2) {
                    self.fcachee =
                        masked_write(self.fcachee as u32, value, FCACHEE_WRITE_MASK as u32, 0)
                            as u16;
                }
            }
            SCKDIVCR_OFF => {
                if self.width_ok(offset, size, 4) && self.clock_unlocked("SCKDIVCR") {
                    self.sckdivcr =
                        masked_write(self.sckdivcr, value, 0xFFFF_FFFF, SCKDIVCR_RETAIN_MASK);
                }
            }
            SCKSCR_OFF => {
                if self.clock_gate(offset, size, "SCKSCR") {
                    self.sckscr = masked_write8(self.sckscr, value, SCKSCR_WRITE_MASK);
                }
            }
            MOMCR_OFF => {
                if self.clock_gate(offset, size, "MOMCR") {
                    self.momcr = masked_write8(self.momcr, value, MOMCR_WRITE_MASK);
                }
            }
            MOSCWTCR_OFF => {
                if self.clock_gate(offset, size, "MOSCWTCR") {
                    self.moscwtcr = masked_write8(self.moscwtcr, value, MOSCWTCR_WRITE_MASK);
                }
            }
            SOSCCR_OFF => {
                if self.clock_gate(offset, size, "SOSCCR") {
                    self.sosccr = masked_write8(self.sosccr, value, SOSCCR_WRITE_MASK);
                }
            }
            SOMCR_OFF => {
                if self.clock_gate(offset, size, "SOMCR") {
                    self.somcr = masked_write8(self.somcr, value, SOMCR_WRITE_MASK);
                }
            }
            OPCCR_OFF => {
                if self.width_ok(offset, size, 1) {
                    self.opccr = masked_write8(self.opccr, value, OPCCR_WRITE_MASK);
                }
            }
            HOCOCR_OFF => {
                if self.clock_gate(offset, size, "HOCOCR") {
                    self.hococr = masked_write8(self.hococr, value, HOCOCR_WRITE_MASK);
                }
            }
            OSCSF_OFF => {
                if self.clock_gate(offset, size, "OSCSF") {
                    self.oscsf = masked_write8(self.oscsf, value, OSCSF_WRITE_MASK);
                }
            }
            MEMWAIT_OFF => {
                if self.width_ok(offset, size, 1) {
                    self.memwait = masked_write8(self.memwait, value, MEMWAIT_WRITE_MASK);
                }
            }
            USBFS_SYSCFG_OFF => {
                if self.width_ok(offset, size, 2) {
                    self.usbfs_syscfg = masked_write(
                        self.usbfs_syscfg as u32,
                        value,
                        USBFS_SYSCFG_WRITE_MASK as u32,
                        0,
                    ) as u16;
                }
            }
            _ => warn!("bad write offset {offset:#x} for system regs"),
        }
    }

    /// Shared admission check for the byte-wide clock group registers.
    fn clock_gate(&self, offset: u32, size: u8, name: &'static str) -> bool {
        self.width_ok(offset, size, 1) && self.clock_unlocked(name)
    }

    fn clock_unlocked(&self, name: &'static str) -> bool {
        let unlocked = Prcr::new_with_raw_value(self.prcr).clock_unlocked();
        if !unlocked {
            warn!("PRCR[0] = 0, can't modify {name}");
        }
        unlocked
    }

    fn battery_unlocked(&self, name: &'static str) -> bool {
        let unlocked = Prcr::new_with_raw_value(self.prcr).battery_unlocked();
        if !unlocked {
            warn!("PRCR[1] = 0, can't modify {name}");
        }
        unlocked
    }

    fn width_ok(&self, offset: u32, size: u8, want: u8) -> bool {
        if size != want {
            warn!("invalid access size {size} at offset {offset:#x} for system regs");
        }
        size == want
    }

    fn read_checked(&self, offset: u32, size: u8, want: u8, value: u32) -> u32 {
        if self.width_ok(offset, size, want) { value } else { 0 }
    }

    fn pfs_contains(rel: u32) -> bool {
        rel < PORT_COUNT as u32 * PFS_PORT_STRIDE
    }

    fn pfs_read(&self, offset: u32, size: u8) -> u32 {
        let rel = offset - PFS_BASE;
        if rel % 4 != 0 {
            warn!("bad read offset {offset:#x} for PFS");
            return 0;
        }
        if !self.width_ok(offset, size, 4) {
            return 0;
        }
        let (port, pin) = ((rel / PFS_PORT_STRIDE) as usize, (rel % PFS_PORT_STRIDE / 4) as usize);
        self.pmnpfs[port][pin]
    }

    fn pfs_write(&mut self, offset: u32, size: u8, value: u32) {
        let rel = offset - PFS_BASE;
        if rel % 4 != 0 {
            warn!("bad write offset {offset:#x} for PFS");
            return;
        }
        if !self.width_ok(offset, size, 4) {
            return;
        }
        let (port, pin) = ((rel / PFS_PORT_STRIDE) as usize, (rel % PFS_PORT_STRIDE / 4) as usize);
        self.pmnpfs[port][pin] = masked_write(self.pmnpfs[port][pin], value, PFS_WRITE_MASK, 0);
    }
}
