//! SoC composition.
//!
//! [`Ra4m1`] owns every peripheral component, lays out the fixed memory
//! regions, and presents the whole peripheral space as one bus-attachable
//! device. Interrupt plumbing between the serial channels, the steering
//! unit and the CPU also lives here: the components themselves never talk
//! to each other directly.

use crate::bus::{BusDevice, IrqSink, SocError, SystemMemory};
use crate::clocks::Clocks;
use crate::flash::{FLASH_REGS_SIZE, FlashRegs};
use crate::icu::{ICU_SIZE, IELSR_COUNT, Icu};
use crate::sci::{CharBackend, SCI_STRIDE, Sci};
use crate::system::SystemRegs;
use embedded_time::rate::Hertz;
use log::{debug, warn};

/// Code flash.
pub const FLASH_BASE: u32 = 0x0000_0000;
pub const FLASH_SIZE: u32 = 256 << 10;

/// On-chip SRAM.
pub const SRAM_BASE: u32 = 0x2000_0000;
pub const SRAM_SIZE: u32 = 32 << 10;

/// Factory flash: four bytes of read-only calibration space.
pub const ONCHIP_FLASH_BASE: u32 = 0x407F_B19C;
pub const ONCHIP_FLASH_SIZE: u32 = 4;

/// Guest-physical range claimed by the peripheral device.
pub const PERIPHERAL_BASE: u32 = 0x4000_0000;
pub const PERIPHERAL_SIZE: u32 = 0x80_0000;

/// Interrupt controller window.
pub const ICU_BASE: u32 = 0x4000_6000;

/// First serial channel window; channels sit `SCI_STRIDE` apart.
pub const SCI_BASE: u32 = 0x4007_0000;

/// Flash controller register window.
pub const FLASH_REGS_BASE: u32 = 0x407E_0000;

/// Interrupt input lines on the CPU.
pub const NUM_IRQ: usize = 32;

/// Initial stack depth granted by the default boot ROM.
pub const DEFAULT_STACK_SIZE: u32 = 1 << 10;

/// Serial channels this device variant bonds out.
pub const SCI_CHANNELS: [u8; 4] = [0, 1, 2, 9];

/// Host serial backend index feeding each entry of [`SCI_CHANNELS`]. The
/// host's first serial port lands on the channel wired to the pin header.
pub const SCI_BACKEND_MAP: [usize; SCI_CHANNELS.len()] = [2, 0, 1, 3];

/// Thumb idle stub placed directly behind the vector table: load the word
/// the trailing literal points at, then branch to self.
const BOOT_STUB: [u8; 12] = [
    0x48, 0x01, 0x68, 0x01, 0xBF, 0x00, 0xE7, 0xFD, 0xE4, 0x1F, 0x40, 0x01,
];

fn sci_slot(channel: u8) -> Option<usize> {
    SCI_CHANNELS.iter().position(|c| *c == channel)
}

/// Builds the default boot ROM image: `16 + NUM_IRQ` vector words followed
/// by [`BOOT_STUB`].
///
/// Word 0 is the initial stack top, word 1 the reset entry (the stub), and
/// every remaining vector is 1, a Thumb-encoded sentinel that faults
/// recognisably if anything takes an unexpected exception.
pub fn boot_rom_image() -> Vec<u8> {
    let vt_words = 16 + NUM_IRQ as u32;
    let mut image = Vec::with_capacity((vt_words * 4) as usize + BOOT_STUB.len());
    image.extend((SRAM_BASE + DEFAULT_STACK_SIZE).to_le_bytes());
    image.extend((FLASH_BASE + vt_words * 4).to_le_bytes());
    for _ in 2..vt_words {
        image.extend(1u32.to_le_bytes());
    }
    image.extend(BOOT_STUB);
    image
}

/// Construction-time SoC configuration.
///
/// The board wires the system clock and the serial backends in before
/// calling [`Ra4m1::realize`]; a missing clock is fatal there.
pub struct SocConfig {
    sysclk: Option<Hertz>,
    ram_size: u32,
    firmware: Option<Vec<u8>>,
    serial_backends: [Option<Box<dyn CharBackend>>; SCI_CHANNELS.len()],
}

impl SocConfig {
    pub fn new() -> Self {
        Self {
            sysclk: None,
            ram_size: SRAM_SIZE,
            firmware: None,
            serial_backends: [None, None, None, None],
        }
    }

    pub fn set_sysclk(mut self, sysclk: Hertz) -> Self {
        self.sysclk = Some(sysclk);
        self
    }

    /// Size of the RAM object the board supplies. Anything other than the
    /// native 32 KiB fails realize.
    pub fn set_ram_size(mut self, size: u32) -> Self {
        self.ram_size = size;
        self
    }

    /// Flat firmware image to install at flash base. Without one, the
    /// default boot ROM goes in instead.
    pub fn set_firmware(mut self, image: Vec<u8>) -> Self {
        self.firmware = Some(image);
        self
    }

    /// Attaches host serial backend `index`. Which channel it feeds is
    /// fixed by [`SCI_BACKEND_MAP`].
    pub fn set_serial_backend(mut self, index: usize, backend: Box<dyn CharBackend>) -> Self {
        match SCI_BACKEND_MAP.iter().position(|i| *i == index) {
            Some(slot) => self.serial_backends[slot] = Some(backend),
            None => warn!("no serial backend slot {index} on this device"),
        }
        self
    }
}

impl Default for SocConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The RA4M1 system-on-chip model.
pub struct Ra4m1<I: IrqSink> {
    regs: SystemRegs,
    flash_regs: FlashRegs,
    icu: Icu,
    sci: [Sci; SCI_CHANNELS.len()],
    clocks: Clocks,
    intc: I,
}

impl<I: IrqSink> Ra4m1<I> {
    /// Builds the SoC, allocating its memory regions in the host address
    /// space. All fatal configuration checks happen here; after a
    /// successful return, no guest activity can raise an error.
    pub fn realize(
        config: SocConfig,
        intc: I,
        memory: &mut dyn SystemMemory,
    ) -> Result<Self, SocError> {
        let sysclk = config.sysclk.ok_or(SocError::MissingSysclk)?;
        if config.ram_size != SRAM_SIZE {
            return Err(SocError::RamSizeMismatch {
                expected: SRAM_SIZE,
                found: config.ram_size,
            });
        }

        memory.map_ram("ra4m1.sram", SRAM_BASE, SRAM_SIZE)?;
        memory.map_rom("ra4m1.flash", FLASH_BASE, FLASH_SIZE)?;
        memory.map_rom("ra4m1.onchip-flash", ONCHIP_FLASH_BASE, ONCHIP_FLASH_SIZE)?;

        match config.firmware {
            Some(image) => {
                if image.len() > FLASH_SIZE as usize {
                    return Err(SocError::FirmwareTooLarge {
                        size: image.len(),
                        capacity: FLASH_SIZE,
                    });
                }
                debug!("ra4m1: installing {} bytes of firmware", image.len());
                memory.write_rom(FLASH_BASE, &image)?;
            }
            None => {
                debug!("ra4m1: no firmware supplied, installing default boot ROM");
                memory.write_rom(FLASH_BASE, &boot_rom_image())?;
            }
        }

        let mut backends = config.serial_backends;
        let sci =
            core::array::from_fn(|slot| Sci::new(SCI_CHANNELS[slot], backends[slot].take()));

        debug!("ra4m1: realized with sysclk {} Hz", sysclk.0);
        Ok(Self {
            regs: SystemRegs::new(),
            flash_regs: FlashRegs::new(),
            icu: Icu::new(),
            sci,
            clocks: Clocks::new(sysclk),
            intc,
        })
    }

    pub fn clocks(&self) -> &Clocks {
        &self.clocks
    }

    pub fn regs(&self) -> &SystemRegs {
        &self.regs
    }

    /// The frequency the serial channels see, derived from the live
    /// divider registers on every call.
    pub fn sci_input_freq(&self) -> Hertz {
        self.clocks.pclka(&self.regs)
    }

    /// Feeds a byte from the host character device into a serial channel
    /// and propagates any resulting event-pin changes to the CPU.
    pub fn serial_receive(&mut self, channel: u8, byte: u8) {
        match sci_slot(channel) {
            Some(slot) => {
                self.sci[slot].receive(byte);
                self.sync_channel(slot);
            }
            None => warn!("no serial channel {channel} on this device"),
        }
    }

    /// Re-evaluates every CPU line routed from the given channel.
    fn sync_channel(&mut self, slot: usize) {
        let channel = SCI_CHANNELS[slot];
        for line in 0..IELSR_COUNT {
            if let Some(src) = self.icu.route(line) {
                if src.channel == channel {
                    self.intc.set_irq(line, self.sci[slot].irq_level(src.irq));
                }
            }
        }
    }

    /// Resolves an address inside one of the bonded-out serial channel
    /// windows to (channel slot, window-relative offset).
    fn sci_window(addr: u32) -> Option<(usize, u32)> {
        if addr < SCI_BASE {
            return None;
        }
        let rel = addr - SCI_BASE;
        let channel = rel / SCI_STRIDE;
        let slot = sci_slot(u8::try_from(channel).ok()?)?;
        Some((slot, rel % SCI_STRIDE))
    }

    /// Applies a steering change: the line is dropped first so a stale
    /// mapping can never keep driving it, then follows the new source.
    fn rewire_line(&mut self, line: usize) {
        self.intc.set_irq(line, false);
        if let Some(src) = self.icu.route(line) {
            if let Some(slot) = sci_slot(src.channel) {
                if self.sci[slot].irq_level(src.irq) {
                    self.intc.set_irq(line, true);
                }
            }
        }
    }
}

impl<I: IrqSink> BusDevice for Ra4m1<I> {
    fn read(&mut self, addr: u32, size: u8) -> u32 {
        if (ICU_BASE..ICU_BASE + ICU_SIZE).contains(&addr) {
            return self.icu.read(addr - ICU_BASE, size);
        }
        if let Some((slot, rel)) = Self::sci_window(addr) {
            // Reading RDR consumes it, which can drop the RX event pin.
            let value = self.sci[slot].read(rel, size);
            self.sync_channel(slot);
            return value;
        }
        if (FLASH_REGS_BASE..FLASH_REGS_BASE + FLASH_REGS_SIZE).contains(&addr) {
            return self.flash_regs.read(addr - FLASH_REGS_BASE, size);
        }
        if let Some(offset) = SystemRegs::canonical(addr) {
            return self.regs.read(offset, size);
        }
        warn!("bad read address {addr:#x} for RA4M1 peripheral space");
        0
    }

    fn write(&mut self, addr: u32, size: u8, value: u32) {
        if (ICU_BASE..ICU_BASE + ICU_SIZE).contains(&addr) {
            if let Some(line) = self.icu.write(addr - ICU_BASE, size, value) {
                self.rewire_line(line);
            }
            return;
        }
        if let Some((slot, rel)) = Self::sci_window(addr) {
            self.sci[slot].write(rel, size, value);
            self.sync_channel(slot);
            return;
        }
        if (FLASH_REGS_BASE..FLASH_REGS_BASE + FLASH_REGS_SIZE).contains(&addr) {
            return self.flash_regs.write(addr - FLASH_REGS_BASE, size, value);
        }
        if let Some(offset) = SystemRegs::canonical(addr) {
            return self.regs.write(offset, size, value);
        }
        warn!("bad write address {addr:#x} for RA4M1 peripheral space");
    }

    fn reset(&mut self) {
        self.regs.reset();
        self.flash_regs.reset();
        self.icu.reset();
        for line in 0..IELSR_COUNT {
            self.intc.set_irq(line, false);
        }
        for sci in &mut self.sci {
            sci.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryError;
    use crate::icu::IELSR_BASE;
    use crate::sci::SciError;
    use embedded_time::rate::Extensions;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Nvic(Rc<RefCell<[bool; NUM_IRQ]>>);

    impl IrqSink for Nvic {
        fn set_irq(&mut self, line: usize, level: bool) {
            self.0.borrow_mut()[line] = level;
        }
    }

    #[derive(Clone, Default)]
    struct SharedOut(Rc<RefCell<Vec<u8>>>);

    impl CharBackend for SharedOut {
        fn transmit(&mut self, byte: u8) -> Result<(), SciError> {
            self.0.borrow_mut().push(byte);
            Ok(())
        }
    }

    #[derive(Default)]
    struct NullMemory;

    impl SystemMemory for NullMemory {
        fn map_ram(&mut self, _: &str, _: u32, _: u32) -> Result<(), MemoryError> {
            Ok(())
        }
        fn map_rom(&mut self, _: &str, _: u32, _: u32) -> Result<(), MemoryError> {
            Ok(())
        }
        fn write_rom(&mut self, _: u32, _: &[u8]) -> Result<(), MemoryError> {
            Ok(())
        }
    }

    fn soc() -> (Ra4m1<Nvic>, Nvic, SharedOut) {
        let nvic = Nvic::default();
        let out = SharedOut::default();
        // Host serial backend 2 feeds channel 0.
        let config = SocConfig::new()
            .set_sysclk(48_000_000.Hz())
            .set_serial_backend(2, Box::new(out.clone()));
        let soc = Ra4m1::realize(config, nvic.clone(), &mut NullMemory).unwrap();
        (soc, nvic, out)
    }

    const SCI0_SCR: u32 = SCI_BASE + 2;
    const SCI0_TDR: u32 = SCI_BASE + 3;
    const SCI1_SCR: u32 = SCI_BASE + SCI_STRIDE + 2;

    #[test]
    fn realize_requires_sysclk() {
        let err = Ra4m1::realize(SocConfig::new(), Nvic::default(), &mut NullMemory);
        assert_eq!(err.err(), Some(SocError::MissingSysclk));
    }

    #[test]
    fn realize_rejects_wrong_ram_size() {
        let config = SocConfig::new().set_sysclk(48_000_000.Hz()).set_ram_size(64 << 10);
        let err = Ra4m1::realize(config, Nvic::default(), &mut NullMemory);
        assert_eq!(
            err.err(),
            Some(SocError::RamSizeMismatch { expected: SRAM_SIZE, found: 64 << 10 })
        );
    }

    #[test]
    fn serial_write_reaches_backend() {
        let (mut soc, _, out) = soc();
        soc.write(SCI0_SCR, 1, 0x20);
        soc.write(SCI0_TDR, 1, b'!' as u32);
        assert_eq!(*out.0.borrow(), b"!");
    }

    #[test]
    fn rx_event_drives_routed_line() {
        let (mut soc, nvic, _) = soc();
        // Route channel-0 RX to CPU line 5, then enable the receiver.
        soc.write(ICU_BASE + IELSR_BASE + 5 * 4, 4, 0x98);
        soc.write(SCI0_SCR, 1, 0x50);
        assert!(!nvic.0.borrow()[5]);
        soc.serial_receive(0, b'a');
        assert!(nvic.0.borrow()[5]);
        // Reading RDR drops RDRF and the line follows.
        assert_eq!(soc.read(SCI_BASE + 5, 1), b'a' as u32);
        assert!(!nvic.0.borrow()[5]);
    }

    #[test]
    fn route_connects_to_live_source_level() {
        let (mut soc, nvic, _) = soc();
        // RDRF is already high before the guest programs the route.
        soc.write(SCI0_SCR, 1, 0x50);
        soc.serial_receive(0, 1);
        soc.write(ICU_BASE + IELSR_BASE, 4, 0x98);
        assert!(nvic.0.borrow()[0]);
    }

    #[test]
    fn remap_disconnects_previous_source() {
        let (mut soc, nvic, _) = soc();
        soc.write(SCI0_SCR, 1, 0x50);
        soc.serial_receive(0, 1);
        soc.write(ICU_BASE + IELSR_BASE + 3 * 4, 4, 0x98);
        assert!(nvic.0.borrow()[3]);
        // Remap line 3 to idle channel 1: the stale level must not leak.
        soc.write(ICU_BASE + IELSR_BASE + 3 * 4, 4, 0x9E);
        assert!(!nvic.0.borrow()[3]);
        // And a zero selector disconnects outright.
        soc.write(ICU_BASE + IELSR_BASE + 3 * 4, 4, 0x98);
        assert!(nvic.0.borrow()[3]);
        soc.write(ICU_BASE + IELSR_BASE + 3 * 4, 4, 0x00);
        assert!(!nvic.0.borrow()[3]);
    }

    #[test]
    fn channel1_rx_routes_by_its_own_code() {
        let (mut soc, nvic, _) = soc();
        soc.write(ICU_BASE + IELSR_BASE + 3 * 4, 4, 0x9E);
        soc.write(SCI1_SCR, 1, 0x50);
        soc.serial_receive(1, 0x55);
        assert!(nvic.0.borrow()[3]);
        assert!(!nvic.0.borrow().iter().enumerate().any(|(i, l)| *l && i != 3));
    }

    #[test]
    fn unknown_addresses_read_zero_and_stay_inert() {
        let (mut soc, _, _) = soc();
        let before = soc.read(SCI_BASE + 4, 1);
        soc.write(0x4006_0000, 4, 0xFFFF_FFFF);
        assert_eq!(soc.read(0x4006_0000, 4), 0);
        // Serial channel 3 is not bonded out.
        soc.write(SCI_BASE + 3 * SCI_STRIDE, 1, 0xFF);
        assert_eq!(soc.read(SCI_BASE + 3 * SCI_STRIDE, 1), 0);
        assert_eq!(soc.read(SCI_BASE + 4, 1), before);
    }

    #[test]
    fn regs_reachable_through_both_windows() {
        let (mut soc, _, _) = soc();
        assert_eq!(soc.read(0x4001_E020, 4), 0x4404_4444);
        assert_eq!(soc.read(0x4009_0000, 2), 0x0000);
    }

    #[test]
    fn sci_input_freq_tracks_dividers() {
        let (mut soc, _, _) = soc();
        // MOCO source divided by 16 at reset.
        assert_eq!(soc.sci_input_freq().0, 500_000);
        soc.write(0x4001_E3FE, 2, 0xA501);
        soc.write(0x4001_E026, 1, 0x00);
        assert_eq!(soc.sci_input_freq().0, 3_000_000);
    }

    #[test]
    fn reset_restores_defaults_and_drops_lines() {
        let (mut soc, nvic, _) = soc();
        soc.write(SCI0_SCR, 1, 0x50);
        soc.serial_receive(0, 1);
        soc.write(ICU_BASE + IELSR_BASE, 4, 0x98);
        assert!(nvic.0.borrow()[0]);
        soc.reset();
        assert!(!nvic.0.borrow()[0]);
        assert_eq!(soc.read(ICU_BASE + IELSR_BASE, 4), 0);
        assert_eq!(soc.read(0x4001_E020, 4), 0x4404_4444);
        assert_eq!(soc.read(SCI0_SCR, 1), 0x00);
    }
}
