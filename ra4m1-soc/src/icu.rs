//! Interrupt steering unit: the event-link matrix.
//!
//! Thirty-two event-link selector registers, each bound 1:1 to a CPU
//! interrupt input line. The guest writes an event code into a selector and
//! the matching peripheral event source starts driving that line. Routing
//! state is transient: it is rebuilt by guest writes and never persisted.

use crate::sci::SciIrq;
use log::warn;

/// Size of the ICU register window.
pub const ICU_SIZE: u32 = 0x1000;

/// Number of event-link selector registers, equal to the number of CPU
/// interrupt input lines.
pub const IELSR_COUNT: usize = 32;

/// Window-relative offset of `IELSR0`.
pub const IELSR_BASE: u32 = 0x300;

/// A peripheral event source selected by an event code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSource {
    /// SCI channel number (0, 1, 2 or 9).
    pub channel: u8,
    /// Which of the channel's event pins drives the line.
    pub irq: SciIrq,
}

/// Event-code table for the serial channels.
///
/// Codes follow the Renesas event-number table for this part. Channel 2 is
/// `0xA3..=0xA6` in pin order; every code appears exactly once.
const EVENT_TABLE: [(u8, EventSource); 16] = [
    (0x98, EventSource { channel: 0, irq: SciIrq::Rxi }),
    (0x99, EventSource { channel: 0, irq: SciIrq::Txi }),
    (0x9A, EventSource { channel: 0, irq: SciIrq::Tei }),
    (0x9B, EventSource { channel: 0, irq: SciIrq::Eri }),
    (0x9E, EventSource { channel: 1, irq: SciIrq::Rxi }),
    (0x9F, EventSource { channel: 1, irq: SciIrq::Txi }),
    (0xA0, EventSource { channel: 1, irq: SciIrq::Tei }),
    (0xA1, EventSource { channel: 1, irq: SciIrq::Eri }),
    (0xA3, EventSource { channel: 2, irq: SciIrq::Rxi }),
    (0xA4, EventSource { channel: 2, irq: SciIrq::Txi }),
    (0xA5, EventSource { channel: 2, irq: SciIrq::Tei }),
    (0xA6, EventSource { channel: 2, irq: SciIrq::Eri }),
    (0xA8, EventSource { channel: 9, irq: SciIrq::Rxi }),
    (0xA9, EventSource { channel: 9, irq: SciIrq::Txi }),
    (0xAA, EventSource { channel: 9, irq: SciIrq::Tei }),
    (0xAB, EventSource { channel: 9, irq: SciIrq::Eri }),
];

fn lookup(event: u8) -> Option<EventSource> {
    EVENT_TABLE.iter().find(|(code, _)| *code == event).map(|(_, src)| *src)
}

/// The interrupt steering unit.
#[derive(Debug, Clone)]
pub struct Icu {
    ielsr: [u32; IELSR_COUNT],
    routes: [Option<EventSource>; IELSR_COUNT],
}

impl Default for Icu {
    fn default() -> Self {
        Self { ielsr: [0; IELSR_COUNT], routes: [None; IELSR_COUNT] }
    }
}

impl Icu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears selector storage and every route. The caller is responsible
    /// for dropping the CPU lines the routes were driving.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The event source currently driving CPU line `line`, if any.
    pub fn route(&self, line: usize) -> Option<EventSource> {
        self.routes[line]
    }

    pub fn read(&mut self, offset: u32, size: u8) -> u32 {
        match self.selector(offset, size, "read") {
            Some(line) => self.ielsr[line],
            None => 0,
        }
    }

    /// Stores a selector write and updates the route map.
    ///
    /// Returns the affected CPU line when a selector register was hit, so
    /// the SoC can rewire the line before the write returns. The previous
    /// route is gone by the time this returns; an unmatched or zero event
    /// code leaves the line unconnected.
    #[must_use]
    pub fn write(&mut self, offset: u32, size: u8, value: u32) -> Option<usize> {
        let line = self.selector(offset, size, "write")?;
        self.ielsr[line] = value;
        self.routes[line] = lookup((value & 0xFF) as u8);
        Some(line)
    }

    fn selector(&self, offset: u32, size: u8, what: &'static str) -> Option<usize> {
        if !(IELSR_BASE..IELSR_BASE + 4 * IELSR_COUNT as u32).contains(&offset) {
            warn!("bad {what} offset {offset:#x} for ICU");
            return None;
        }
        if size != 4 {
            warn!("invalid {what} size {size} at offset {offset:#x} for ICU");
            return None;
        }
        Some(((offset - IELSR_BASE) / 4) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_codes_are_unique() {
        for (i, (code, _)) in EVENT_TABLE.iter().enumerate() {
            assert!(
                EVENT_TABLE.iter().skip(i + 1).all(|(other, _)| other != code),
                "event code {code:#x} appears twice"
            );
        }
    }

    #[test]
    fn selector_write_stores_all_bits_and_routes_low_byte() {
        let mut icu = Icu::new();
        let line = icu.write(IELSR_BASE, 4, 0xFFFF_FF98).unwrap();
        assert_eq!(line, 0);
        assert_eq!(icu.read(IELSR_BASE, 4), 0xFFFF_FF98);
        assert_eq!(icu.route(0), Some(EventSource { channel: 0, irq: SciIrq::Rxi }));
    }

    #[test]
    fn zero_event_leaves_line_unconnected() {
        let mut icu = Icu::new();
        assert_eq!(icu.write(IELSR_BASE + 12, 4, 0x9E), Some(3));
        assert!(icu.route(3).is_some());
        assert_eq!(icu.write(IELSR_BASE + 12, 4, 0x00), Some(3));
        assert_eq!(icu.route(3), None);
    }

    #[test]
    fn unmatched_event_is_stored_without_routing() {
        let mut icu = Icu::new();
        assert_eq!(icu.write(IELSR_BASE + 4, 4, 0x42), Some(1));
        assert_eq!(icu.read(IELSR_BASE + 4, 4), 0x42);
        assert_eq!(icu.route(1), None);
    }

    #[test]
    fn remap_replaces_previous_route() {
        let mut icu = Icu::new();
        icu.write(IELSR_BASE + 8, 4, 0x98).unwrap();
        icu.write(IELSR_BASE + 8, 4, 0xA8).unwrap();
        assert_eq!(icu.route(2), Some(EventSource { channel: 9, irq: SciIrq::Rxi }));
    }

    #[test]
    fn out_of_window_access_is_inert() {
        let mut icu = Icu::new();
        assert_eq!(icu.write(0x000, 4, 0x98), None);
        assert_eq!(icu.write(IELSR_BASE + 4 * IELSR_COUNT as u32, 4, 0x98), None);
        assert_eq!(icu.read(0x000, 4), 0);
        assert!(icu.routes.iter().all(Option::is_none));
    }

    #[test]
    fn narrow_access_is_rejected() {
        let mut icu = Icu::new();
        assert_eq!(icu.write(IELSR_BASE, 2, 0x98), None);
        assert_eq!(icu.read(IELSR_BASE, 2), 0);
        assert_eq!(icu.read(IELSR_BASE, 4), 0);
    }
}
