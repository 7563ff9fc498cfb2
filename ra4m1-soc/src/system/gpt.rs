use crate::system::register::PRCR_KEY;
use log::warn;

/// Number of general-purpose timer channels.
pub const GPT_CHANNEL_COUNT: usize = 8;

/// Byte stride between channel register blocks.
pub const GPT_STRIDE: u32 = 0x100;

/// 32-bit registers per channel block, GTWP through GTDVU.
const GPT_REG_COUNT: usize = 28;

// Word indices of the registers the stub actually interprets.
const GTWP: usize = 0;
const GTSTR: usize = 1;
const GTSTP: usize = 2;
const GTCLR: usize = 3;
const GTCNT: usize = 17;

/// Stub register bank for the general-purpose timers.
///
/// Registers are storage with three live behaviours: the start/stop/clear
/// broadcast registers maintain per-channel running flags and counters, and
/// GTWP applies the same keyed write-protect pattern as PRCR (key 0xA5 in
/// bits 15:8, protect bit 0). No counting is modelled.
#[derive(Debug, Clone)]
pub struct GptBank {
    channels: [[u32; GPT_REG_COUNT]; GPT_CHANNEL_COUNT],
    running: [bool; GPT_CHANNEL_COUNT],
}

impl Default for GptBank {
    fn default() -> Self {
        Self {
            channels: [[0; GPT_REG_COUNT]; GPT_CHANNEL_COUNT],
            running: [false; GPT_CHANNEL_COUNT],
        }
    }
}

impl GptBank {
    pub fn contains(offset: u32) -> bool {
        offset < GPT_CHANNEL_COUNT as u32 * GPT_STRIDE
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True when timer channel `ch` has been started and not yet stopped.
    pub fn is_running(&self, ch: usize) -> bool {
        self.running[ch]
    }

    pub fn read(&self, offset: u32, size: u8) -> u32 {
        let Some((ch, idx)) = self.decode(offset, size, "read") else {
            return 0;
        };
        match idx {
            // The broadcast registers read as the channel running mask.
            GTSTR => self.running_mask(),
            GTSTP | GTCLR => 0,
            _ => self.channels[ch][idx],
        }
    }

    pub fn write(&mut self, offset: u32, size: u8, value: u32) {
        let Some((ch, idx)) = self.decode(offset, size, "write") else {
            return;
        };
        match idx {
            GTWP => {
                if (value >> 8) as u8 != PRCR_KEY {
                    warn!("GTWP[15:8] must be A5");
                } else {
                    self.channels[ch][GTWP] = value & 0x1;
                }
            }
            GTSTR => {
                for ch in 0..GPT_CHANNEL_COUNT {
                    if value & (1 << ch) != 0 {
                        self.running[ch] = true;
                    }
                }
            }
            GTSTP => {
                for ch in 0..GPT_CHANNEL_COUNT {
                    if value & (1 << ch) != 0 {
                        self.running[ch] = false;
                    }
                }
            }
            GTCLR => {
                for ch in 0..GPT_CHANNEL_COUNT {
                    if value & (1 << ch) != 0 {
                        self.channels[ch][GTCNT] = 0;
                    }
                }
            }
            _ => {
                if self.channels[ch][GTWP] & 0x1 != 0 {
                    warn!("GTWP[0] = 1, can't modify GPT register at {offset:#x}");
                } else {
                    self.channels[ch][idx] = value;
                }
            }
        }
    }

    fn running_mask(&self) -> u32 {
        self.running
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .fold(0, |mask, (ch, _)| mask | 1 << ch)
    }

    fn decode(&self, offset: u32, size: u8, what: &'static str) -> Option<(usize, usize)> {
        if size != 4 {
            warn!("invalid {what} size {size} at offset {offset:#x} for GPT");
            return None;
        }
        let intra = offset % GPT_STRIDE;
        if intra % 4 != 0 || intra / 4 >= GPT_REG_COUNT as u32 {
            warn!("bad {what} offset {offset:#x} for GPT");
            return None;
        }
        Some(((offset / GPT_STRIDE) as usize, (intra / 4) as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GTCR_OFF: u32 = 11 * 4;

    #[test]
    fn start_stop_clear() {
        let mut gpt = GptBank::default();
        gpt.write(GTSTR as u32 * 4, 4, 0b0000_0101);
        assert!(gpt.is_running(0));
        assert!(!gpt.is_running(1));
        assert!(gpt.is_running(2));
        assert_eq!(gpt.read(GTSTR as u32 * 4, 4), 0b0000_0101);

        gpt.write(GTSTP as u32 * 4, 4, 0b0000_0001);
        assert!(!gpt.is_running(0));
        assert!(gpt.is_running(2));
    }

    #[test]
    fn counter_clear_targets_selected_channels() {
        let mut gpt = GptBank::default();
        gpt.write(GTCNT as u32 * 4, 4, 77);
        gpt.write(GPT_STRIDE + GTCNT as u32 * 4, 4, 88);
        gpt.write(GTCLR as u32 * 4, 4, 0b10);
        assert_eq!(gpt.read(GTCNT as u32 * 4, 4), 77);
        assert_eq!(gpt.read(GPT_STRIDE + GTCNT as u32 * 4, 4), 0);
    }

    #[test]
    fn write_protect_requires_key_and_blocks_writes() {
        let mut gpt = GptBank::default();
        // Bad key: protect bit does not latch.
        gpt.write(0, 4, 0x0001);
        assert_eq!(gpt.read(0, 4), 0);
        // Good key: protect engages and further writes are dropped.
        gpt.write(0, 4, 0xA501);
        assert_eq!(gpt.read(0, 4), 1);
        gpt.write(GTCR_OFF, 4, 0x1234_5678);
        assert_eq!(gpt.read(GTCR_OFF, 4), 0);
        // Unprotect, then the write lands.
        gpt.write(0, 4, 0xA500);
        gpt.write(GTCR_OFF, 4, 0x1234_5678);
        assert_eq!(gpt.read(GTCR_OFF, 4), 0x1234_5678);
    }

    #[test]
    fn narrow_access_is_rejected() {
        let mut gpt = GptBank::default();
        gpt.write(GTCR_OFF, 2, 0xFFFF);
        assert_eq!(gpt.read(GTCR_OFF, 4), 0);
        assert_eq!(gpt.read(GTCR_OFF, 2), 0);
    }
}
