use crate::error::{XtaskError, XtaskResult};
use object::{Object, ObjectSection, SectionFlags, SectionKind};
use ra4m1_soc::soc::{FLASH_BASE, FLASH_SIZE};
use std::fs;
use std::path::Path;

/// Lays a linked guest ELF out as a flat flash image.
///
/// Every allocatable section with file-backed contents is copied to its
/// link address relative to flash base. NOBITS sections (.bss) carry no
/// bytes and are skipped, matching what objcopy -O binary would emit. The
/// image is trimmed to the last occupied byte.
pub fn elf_to_flash_image_bytes(elf_data: &[u8]) -> XtaskResult<Vec<u8>> {
    let elf_file =
        object::File::parse(elf_data).map_err(|e| XtaskError::ElfParse(e.to_string()))?;

    let mut image = vec![0u8; FLASH_SIZE as usize];
    let mut used = 0usize;

    for section in loadable_sections(&elf_file) {
        let data = section
            .data()
            .map_err(|e| XtaskError::ElfParse(e.to_string()))?;
        if data.is_empty() {
            continue;
        }
        let address = section.address();
        let start = address
            .checked_sub(FLASH_BASE as u64)
            .filter(|s| s + data.len() as u64 <= FLASH_SIZE as u64)
            .ok_or(XtaskError::SectionOutOfFlash {
                address,
                size: data.len() as u64,
            })? as usize;
        image[start..start + data.len()].copy_from_slice(data);
        used = used.max(start + data.len());
    }

    if used == 0 {
        return Err(XtaskError::EmptyImage);
    }
    image.truncate(used);
    Ok(image)
}

/// Converts an ELF file into a flash image on disk.
pub fn elf_to_flash_image(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> XtaskResult<()> {
    let elf_data = fs::read(&input)?;
    let image = elf_to_flash_image_bytes(&elf_data)?;
    fs::write(output, image)?;
    Ok(())
}

/// Allocatable sections with file-backed contents, in address order.
fn loadable_sections<'a>(elf_file: &'a object::File) -> Vec<object::Section<'a, 'a>> {
    let mut sections: Vec<_> = elf_file
        .sections()
        .filter(|s| {
            let alloc = match s.flags() {
                SectionFlags::Elf { sh_flags } => {
                    (sh_flags & object::elf::SHF_ALLOC as u64) != 0
                }
                _ => false,
            };
            alloc && s.kind() != SectionKind::UninitializedData
        })
        .collect();
    sections.sort_by_key(|s| s.address());
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use object::write::{Object as WriteObject, StandardSegment};
    use object::{Architecture, BinaryFormat, Endianness};

    fn build_test_elf(text: &[u8]) -> Vec<u8> {
        let mut obj =
            WriteObject::new(BinaryFormat::Elf, Architecture::Arm, Endianness::Little);
        let segment = obj.segment_name(StandardSegment::Text).to_vec();
        let text_section = obj.add_section(segment, b".text".to_vec(), SectionKind::Text);
        obj.append_section_data(text_section, text, 4);
        obj.add_file_symbol(b"test".into());
        obj.write().expect("failed to build test ELF")
    }

    #[test]
    fn text_lands_at_flash_base() {
        // The write builder links everything at address 0, which is exactly
        // the flash base of this device.
        let elf = build_test_elf(b"\x00\xB5\x00\xBD");
        let image = elf_to_flash_image_bytes(&elf).expect("elf to image");
        assert_eq!(image, b"\x00\xB5\x00\xBD");
    }

    #[test]
    fn garbage_input_is_a_parse_error() {
        let err = elf_to_flash_image_bytes(b"not an elf").unwrap_err();
        assert!(matches!(err, XtaskError::ElfParse(_)));
    }

    #[test]
    fn elf_without_content_is_rejected() {
        let elf = build_test_elf(b"");
        let err = elf_to_flash_image_bytes(&elf).unwrap_err();
        assert!(matches!(err, XtaskError::EmptyImage));
    }
}
