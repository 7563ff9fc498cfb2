//! Arduino Uno Rev4 machine.
//!
//! A thin board around the RA4M1 SoC model: it fixes the machine identity,
//! wires the 48 MHz board oscillator, passes the host's RAM object and
//! serial backends through to the SoC and exposes the composed peripheral
//! device to the host bus. Everything device-shaped lives in
//! [`ra4m1_soc`]; this crate is configuration.

use embedded_time::rate::{Extensions, Hertz};
use ra4m1_soc::bus::{BusDevice, IrqSink, SocError, SystemMemory};
use ra4m1_soc::sci::CharBackend;
use ra4m1_soc::soc::{Ra4m1, SocConfig};

pub use ra4m1_soc::soc::{DEFAULT_STACK_SIZE, boot_rom_image};

/// Machine name, as the host's machine registry knows it.
pub const MACHINE_NAME: &str = "arduino-uno-rev4";

/// Human-readable machine description.
pub const MACHINE_DESC: &str = "Arduino Uno Rev4";

/// CPU model the machine instantiates. Exactly one core.
pub const CPU_TYPE: &str = "cortex-m4";
pub const CPU_COUNT: usize = 1;

/// Board oscillator feeding the SoC.
pub const SYSCLK_HZ: u32 = 48_000_000;

/// Host serial backends the board consumes.
pub const SERIAL_PORT_COUNT: usize = 4;

/// Board configuration.
///
/// Defaults describe the stock board; anything else is for the host's
/// command line to override, and RAM overrides fail realize.
pub struct MachineConfig {
    ram_size: Option<u32>,
    sysclk: Hertz,
    firmware: Option<Vec<u8>>,
    serial: [Option<Box<dyn CharBackend>>; SERIAL_PORT_COUNT],
}

impl MachineConfig {
    pub fn new() -> Self {
        Self {
            ram_size: None,
            sysclk: SYSCLK_HZ.Hz(),
            firmware: None,
            serial: [None, None, None, None],
        }
    }

    /// Size of the RAM object the host allocated for this board.
    pub fn set_ram_size(mut self, size: u32) -> Self {
        self.ram_size = Some(size);
        self
    }

    pub fn set_sysclk(mut self, sysclk: Hertz) -> Self {
        self.sysclk = sysclk;
        self
    }

    /// Flat firmware image to install at flash base instead of the default
    /// boot ROM. Host-side loaders produce this; the board does not
    /// interpret image formats.
    pub fn set_firmware(mut self, image: Vec<u8>) -> Self {
        self.firmware = Some(image);
        self
    }

    /// Attaches host serial backend `index`; the SoC's fixed map decides
    /// which SCI channel it feeds.
    pub fn set_serial(mut self, index: usize, backend: Box<dyn CharBackend>) -> Self {
        self.serial[index] = Some(backend);
        self
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The realized machine.
pub struct Machine<I: IrqSink> {
    soc: Ra4m1<I>,
}

impl<I: IrqSink> Machine<I> {
    /// Builds the board against the host memory map. Every failure here is
    /// fatal to startup.
    pub fn realize(
        config: MachineConfig,
        cpu: I,
        memory: &mut dyn SystemMemory,
    ) -> Result<Self, SocError> {
        let mut soc_config = SocConfig::new().set_sysclk(config.sysclk);
        if let Some(size) = config.ram_size {
            soc_config = soc_config.set_ram_size(size);
        }
        if let Some(image) = config.firmware {
            soc_config = soc_config.set_firmware(image);
        }
        for (index, backend) in config.serial.into_iter().enumerate() {
            if let Some(backend) = backend {
                soc_config = soc_config.set_serial_backend(index, backend);
            }
        }
        Ok(Self { soc: Ra4m1::realize(soc_config, cpu, memory)? })
    }

    pub fn soc(&self) -> &Ra4m1<I> {
        &self.soc
    }

    pub fn soc_mut(&mut self) -> &mut Ra4m1<I> {
        &mut self.soc
    }

    /// Host-side injection of a received serial byte.
    pub fn serial_receive(&mut self, channel: u8, byte: u8) {
        self.soc.serial_receive(channel, byte);
    }
}

impl<I: IrqSink> BusDevice for Machine<I> {
    fn read(&mut self, addr: u32, size: u8) -> u32 {
        self.soc.read(addr, size)
    }

    fn write(&mut self, addr: u32, size: u8, value: u32) {
        self.soc.write(addr, size, value)
    }

    fn reset(&mut self) {
        self.soc.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ra4m1_soc::soc::{NUM_IRQ, SRAM_BASE};

    #[test]
    fn boot_rom_layout() {
        let image = boot_rom_image();
        assert_eq!(image.len(), (16 + NUM_IRQ) * 4 + 12);
        assert_eq!(image[..4], (SRAM_BASE + DEFAULT_STACK_SIZE).to_le_bytes());
        assert_eq!(image[4..8], 0xC0u32.to_le_bytes());
        for word in 2..16 + NUM_IRQ {
            assert_eq!(image[word * 4..word * 4 + 4], 1u32.to_le_bytes());
        }
        assert_eq!(
            image[0xC0..0xCC],
            [0x48, 0x01, 0x68, 0x01, 0xBF, 0x00, 0xE7, 0xFD, 0xE4, 0x1F, 0x40, 0x01]
        );
    }
}
