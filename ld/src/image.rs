use std::path::Path;

use crate::error::LinkError;

/// Composes the flat ROM image `[text][rodata]`, padded to `rom_size`
/// with `fill` when `rom_size` is non-zero.
pub fn make_flat_rom(
    text: &[u8],
    rodata: &[u8],
    rom_size: u32,
    fill: u8,
) -> Result<Vec<u8>, LinkError> {
    let mut rom = Vec::with_capacity(text.len() + rodata.len());
    rom.extend_from_slice(text);
    rom.extend_from_slice(rodata);

    if rom_size != 0 {
        if rom.len() > rom_size as usize {
            return Err(LinkError::RomTooLarge {
                size: rom.len(),
                limit: rom_size,
            });
        }
        rom.resize(rom_size as usize, fill);
    }

    Ok(rom)
}

pub fn write_bin(path: impl AsRef<Path>, rom: &[u8]) -> Result<(), LinkError> {
    let path = path.as_ref();
    std::fs::write(path, rom).map_err(|source| LinkError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_with_fill_byte() {
        let rom = make_flat_rom(&[1, 2], &[3], 6, 0xFF).unwrap();
        assert_eq!(rom, vec![1, 2, 3, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn zero_size_means_no_padding() {
        let rom = make_flat_rom(&[1, 2], &[3], 0, 0xFF).unwrap();
        assert_eq!(rom, vec![1, 2, 3]);
    }

    #[test]
    fn oversized_image_is_fatal() {
        let err = make_flat_rom(&[0; 10], &[0; 10], 16, 0xFF).unwrap_err();
        assert!(matches!(err, LinkError::RomTooLarge { size: 20, limit: 16 }));
    }
}
