//! The protective MBR that precedes a GPT so that legacy tools see the disk as used.

use crate::{Error, Result};
use bincode::serialize_into;
use std::convert::TryFrom;

const PARTITION_TABLE_OFFSET: usize = 446;
const MBR_SIZE: usize = 512;

/// Write a protective MBR in the first block of a disk image, starting at byte 446 and ending
/// at byte 511. The bootstrap code area before byte 446 is left untouched.
///
/// The single partition covers the whole disk after the MBR (capped to `u32::MAX` blocks).
pub fn write_protective_mbr_into(image: &mut [u8], block_size: u64) -> Result<()> {
    if image.len() < MBR_SIZE {
        return Err(Error::TruncatedBuffer {
            offset: 0,
            needed: MBR_SIZE,
            available: image.len(),
        });
    }
    let blocks = (image.len() as u64 / block_size).saturating_sub(1);

    let record = &mut image[PARTITION_TABLE_OFFSET..MBR_SIZE];
    // partition 1
    record[..12].copy_from_slice(&[
        0x00, // status
        0x00, 0x02, 0x00, // CHS address of first absolute sector
        0xee, // partition type
        0xff, 0xff, 0xff, // CHS address of last absolute sector
        0x01, 0x00, 0x00, 0x00, // LBA of first absolute sector
    ]);
    // number of sectors in partition 1
    serialize_into(
        &mut record[12..16],
        &u32::try_from(blocks).unwrap_or(u32::MAX),
    )?;
    record[16..64].copy_from_slice(&[0; 48]); // partitions 2 to 4
    record[64..].copy_from_slice(&[0x55, 0xaa]); // signature

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use bincode::deserialize;

    #[test]
    fn writing_protective_mbr() {
        fn test(ss: u64) {
            let mut data = vec![2; ss as usize * 100];
            write_protective_mbr_into(&mut data, ss).unwrap();

            assert_eq!(data[510], 0x55);
            assert_eq!(data[511], 0xaa);
            assert_eq!(data[446 + 4], 0xee);
            assert!(data[462..510].iter().all(|&x| x == 0));
            for (i, x) in data.iter().enumerate() {
                if i < 446 || i >= 512 {
                    assert_eq!(*x, 2);
                }
            }

            let first_lba: u32 = deserialize(&data[446 + 8..446 + 12]).unwrap();
            let sectors: u32 = deserialize(&data[446 + 12..446 + 16]).unwrap();
            assert_eq!(first_lba, 1);
            assert_eq!(sectors, 99);
        }

        test(512);
        test(4096);
    }

    #[test]
    fn image_too_small() {
        assert!(matches!(
            write_protective_mbr_into(&mut [0; 511], 512),
            Err(Error::TruncatedBuffer { needed: 512, .. })
        ));
    }
}
