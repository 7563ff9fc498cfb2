//! Default boot ROM dumping.

use crate::error::XtaskResult;
use arduino_uno_rev4::boot_rom_image;
use std::fs;
use std::path::Path;

/// Writes the machine's default boot ROM image to `output`, byte-for-byte
/// what the board installs into flash when no firmware is supplied.
pub fn write_boot_rom(output: impl AsRef<Path>) -> XtaskResult<()> {
    fs::write(output, boot_rom_image())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arduino_uno_rev4::DEFAULT_STACK_SIZE;
    use ra4m1_soc::soc::{NUM_IRQ, SRAM_BASE};
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn dumped_rom_matches_machine_default() {
        let file = NamedTempFile::new().unwrap();
        write_boot_rom(file.path()).unwrap();
        let bytes = fs::read(file.path()).unwrap();
        assert_eq!(bytes, boot_rom_image());
        assert_eq!(bytes.len(), (16 + NUM_IRQ) * 4 + 12);
        assert_eq!(bytes[..4], (SRAM_BASE + DEFAULT_STACK_SIZE).to_le_bytes());
    }
}
