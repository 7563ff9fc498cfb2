//! Serial communication interface channels.
//!
//! Each channel is an eight-register byte file bound to a host character
//! backend. Transmission is synchronous and lossless on the host side; the
//! model keeps no shift-register latency, so `TDRE`/`TEND` never drop on a
//! transmit. Event pins are level-valued and are sampled by the SoC whenever
//! channel state may have changed.

mod register;

pub use register::{Scr, Smr, Ssr};

use embedded_time::rate::{Extensions, Hertz};
use log::warn;
use register::*;

/// Byte stride between channel windows in the peripheral map.
pub const SCI_STRIDE: u32 = 0x20;

/// Errors raised on the serial path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SciError {
    /// The host character backend rejected a byte.
    Backend,
}

impl core::fmt::Display for SciError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Backend => write!(f, "character backend write failed"),
        }
    }
}

/// A host character device consuming transmitted bytes.
///
/// Any [`embedded_io::Write`] works as a backend through the blanket
/// implementation; a channel without a backend discards its output.
pub trait CharBackend {
    fn transmit(&mut self, byte: u8) -> Result<(), SciError>;
}

impl<W: embedded_io::Write> CharBackend for W {
    fn transmit(&mut self, byte: u8) -> Result<(), SciError> {
        self.write_all(&[byte]).map_err(|_| SciError::Backend)?;
        self.flush().map_err(|_| SciError::Backend)
    }
}

/// The outbound event pins of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SciIrq {
    /// Receive data full.
    Rxi,
    /// Transmit data empty.
    Txi,
    /// Transmit end.
    Tei,
    /// Receive error.
    Eri,
}

/// One serial communication channel.
pub struct Sci {
    channel: u8,
    smr: Smr,
    brr: u8,
    scr: Scr,
    tdr: u8,
    ssr: Ssr,
    rdr: u8,
    scmr: u8,
    semr: u8,
    backend: Option<Box<dyn CharBackend>>,
}

impl Sci {
    pub fn new(channel: u8, backend: Option<Box<dyn CharBackend>>) -> Self {
        let mut sci = Self {
            channel,
            smr: Smr::new_with_raw_value(0),
            brr: 0,
            scr: Scr::new_with_raw_value(0),
            tdr: 0,
            ssr: Ssr::new_with_raw_value(0),
            rdr: 0,
            scmr: 0,
            semr: 0,
            backend,
        };
        sci.reset();
        sci
    }

    /// Channel number in the SoC's serial map.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn reset(&mut self) {
        self.smr = Smr::new_with_raw_value(0x00);
        self.brr = 0xFF;
        self.scr = Scr::new_with_raw_value(0x00);
        self.tdr = 0xFF;
        self.ssr = Ssr::new_with_raw_value(0x84);
        self.rdr = 0x00;
        self.scmr = 0xF2;
        self.semr = 0x00;
    }

    /// Current level of one of the event pins.
    pub fn irq_level(&self, irq: SciIrq) -> bool {
        match irq {
            SciIrq::Rxi => self.scr.re() && self.scr.rie() && self.ssr.rdrf(),
            SciIrq::Txi => self.scr.te() && self.scr.tie() && self.ssr.tdre(),
            SciIrq::Tei => self.scr.te() && self.scr.teie() && self.ssr.tend(),
            SciIrq::Eri => {
                self.scr.re()
                    && self.scr.rie()
                    && (self.ssr.orer() || self.ssr.fer() || self.ssr.per())
            }
        }
    }

    /// Pushes a byte received from the host backend into the channel.
    ///
    /// Dropped while the receiver is disabled. A byte arriving before the
    /// guest consumed the previous one is lost to an overrun.
    pub fn receive(&mut self, byte: u8) {
        if !self.scr.re() {
            return;
        }
        if self.ssr.rdrf() {
            self.ssr = self.ssr.with_orer(true);
        } else {
            self.rdr = byte;
            self.ssr = self.ssr.with_rdrf(true);
        }
    }

    /// Asynchronous baud rate for the current divider settings and
    /// peripheral clock. Queried, never cached, so divider reprogramming is
    /// visible immediately.
    pub fn baud_rate(&self, pclk: Hertz) -> Hertz {
        let n = self.smr.cks().value() as u32;
        let divisor = 64u32 * (1 << (2 * n)) / 2 * (self.brr as u32 + 1);
        (pclk.0 / divisor.max(1)).Hz()
    }

    pub fn read(&mut self, offset: u32, size: u8) -> u32 {
        if !self.width_ok(offset, size, "read") {
            return 0;
        }
        let value = match offset {
            SMR_OFF => self.smr.raw_value(),
            BRR_OFF => self.brr,
            SCR_OFF => self.scr.raw_value(),
            TDR_OFF => self.tdr,
            SSR_OFF => self.ssr.raw_value(),
            RDR_OFF => {
                // Reading the data register consumes it.
                self.ssr = self.ssr.with_rdrf(false);
                self.rdr
            }
            SCMR_OFF => self.scmr,
            SEMR_OFF => self.semr,
            _ => {
                warn!("bad read offset {offset:#x} for SCI{}", self.channel);
                0
            }
        };
        value as u32
    }

    pub fn write(&mut self, offset: u32, size: u8, value: u32) {
        if !self.width_ok(offset, size, "write") {
            return;
        }
        let value = value as u8;
        match offset {
            SMR_OFF => self.smr = Smr::new_with_raw_value(value),
            BRR_OFF => self.brr = value,
            SCR_OFF => self.scr = Scr::new_with_raw_value(value),
            TDR_OFF => {
                self.tdr = value;
                if self.scr.te() {
                    self.send(value);
                }
            }
            SSR_OFF => {
                // Status flags are write-zero-to-clear; the rest of the
                // register ignores guest stores.
                let raw = self.ssr.raw_value();
                self.ssr =
                    Ssr::new_with_raw_value(raw & (value | !SSR_CLEAR_MASK));
            }
            RDR_OFF => warn!("RDR is read-only on SCI{}", self.channel),
            SCMR_OFF => self.scmr = value,
            SEMR_OFF => self.semr = value,
            _ => warn!("bad write offset {offset:#x} for SCI{}", self.channel),
        }
    }

    fn send(&mut self, byte: u8) {
        if let Some(backend) = self.backend.as_mut() {
            if backend.transmit(byte).is_err() {
                warn!("SCI{}: character backend write failed", self.channel);
            }
        }
    }

    fn width_ok(&self, offset: u32, size: u8, what: &'static str) -> bool {
        if size != 1 {
            warn!(
                "invalid {what} size {size} at offset {offset:#x} for SCI{}",
                self.channel
            );
        }
        size == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Captures transmitted bytes while the channel owns the backend box.
    #[derive(Clone, Default)]
    struct SharedOut(Rc<RefCell<Vec<u8>>>);

    impl CharBackend for SharedOut {
        fn transmit(&mut self, byte: u8) -> Result<(), SciError> {
            self.0.borrow_mut().push(byte);
            Ok(())
        }
    }

    fn channel_with_backend() -> (Sci, SharedOut) {
        let out = SharedOut::default();
        (Sci::new(0, Some(Box::new(out.clone()))), out)
    }

    #[test]
    fn reset_values() {
        let (mut sci, _) = channel_with_backend();
        assert_eq!(sci.read(BRR_OFF, 1), 0xFF);
        assert_eq!(sci.read(TDR_OFF, 1), 0xFF);
        assert_eq!(sci.read(SSR_OFF, 1), 0x84);
        assert_eq!(sci.read(SCMR_OFF, 1), 0xF2);
        assert_eq!(sci.read(SCR_OFF, 1), 0x00);
    }

    #[test]
    fn transmit_requires_te() {
        let (mut sci, out) = channel_with_backend();
        sci.write(TDR_OFF, 1, b'x' as u32);
        assert!(out.0.borrow().is_empty());

        sci.write(SCR_OFF, 1, 0x20);
        sci.write(TDR_OFF, 1, b'h' as u32);
        sci.write(TDR_OFF, 1, b'i' as u32);
        assert_eq!(*out.0.borrow(), b"hi");
        // The model transmits immediately, so TDRE/TEND stay set.
        assert_eq!(sci.read(SSR_OFF, 1) & 0x84, 0x84);
    }

    #[test]
    fn receive_sets_rdrf_and_read_consumes() {
        let (mut sci, _) = channel_with_backend();
        sci.receive(b'a');
        // Receiver disabled: the byte is dropped.
        assert_eq!(sci.read(SSR_OFF, 1) & 0x40, 0);

        sci.write(SCR_OFF, 1, 0x10);
        sci.receive(b'b');
        assert_ne!(sci.read(SSR_OFF, 1) & 0x40, 0);
        assert_eq!(sci.read(RDR_OFF, 1), b'b' as u32);
        assert_eq!(sci.read(SSR_OFF, 1) & 0x40, 0);
    }

    #[test]
    fn second_byte_without_read_overruns() {
        let (mut sci, _) = channel_with_backend();
        sci.write(SCR_OFF, 1, 0x10);
        sci.receive(1);
        sci.receive(2);
        let ssr = sci.read(SSR_OFF, 1);
        assert_ne!(ssr & 0x20, 0, "ORER set");
        assert_eq!(sci.read(RDR_OFF, 1), 1, "first byte preserved");
    }

    #[test]
    fn ssr_flags_clear_on_zero_write() {
        let (mut sci, _) = channel_with_backend();
        sci.write(SCR_OFF, 1, 0x10);
        sci.receive(1);
        sci.receive(2);
        sci.write(SSR_OFF, 1, 0x84);
        let ssr = sci.read(SSR_OFF, 1);
        assert_eq!(ssr & 0x60, 0, "RDRF and ORER cleared");
        assert_eq!(ssr & 0x84, 0x84, "TDRE and TEND untouched");
        // Writing ones cannot set flags.
        sci.write(SSR_OFF, 1, 0xFF);
        assert_eq!(sci.read(SSR_OFF, 1) & 0x60, 0);
    }

    #[test]
    fn irq_levels_follow_enables() {
        let (mut sci, _) = channel_with_backend();
        assert!(!sci.irq_level(SciIrq::Txi));
        sci.write(SCR_OFF, 1, 0xF0);
        assert!(sci.irq_level(SciIrq::Txi), "TDRE set and TIE|TE enabled");
        assert!(!sci.irq_level(SciIrq::Rxi));
        sci.receive(7);
        assert!(sci.irq_level(SciIrq::Rxi));
        assert!(!sci.irq_level(SciIrq::Eri));
        sci.receive(8);
        assert!(sci.irq_level(SciIrq::Eri), "overrun drives the error pin");
    }

    #[test]
    fn baud_rate_tracks_brr_and_clock() {
        let (mut sci, _) = channel_with_backend();
        // 48 MHz PCLK, n=0: baud = pclk / (32 * (BRR + 1)).
        sci.write(BRR_OFF, 1, 12);
        assert_eq!(sci.baud_rate(48_000_000.Hz()).0, 115_384);
        sci.write(BRR_OFF, 1, 0xFF);
        assert_eq!(sci.baud_rate(48_000_000.Hz()).0, 5_859);
    }

    #[test]
    fn tei_follows_teie() {
        let (mut sci, _) = channel_with_backend();
        sci.write(SCR_OFF, 1, 0x24);
        assert!(sci.irq_level(SciIrq::Tei));
        sci.write(SCR_OFF, 1, 0x20);
        assert!(!sci.irq_level(SciIrq::Tei));
    }
}
