//! CRC32 checksums of the header and partition table regions.

use crate::config::HEADER_CHECKSUM_OFFSET;
use crate::{Error, Result};
use crc::{Crc, CRC_32_ISO_HDLC};
use std::convert::TryFrom;

pub(crate) const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC32 (ISO-HDLC, the one used by UEFI) of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    CRC32.checksum(bytes)
}

/// CRC32 of the `header_size` bytes starting at `offset`, computed as if the header checksum
/// field was zero. The buffer is left untouched.
pub fn header_checksum(bytes: &[u8], offset: usize, header_size: u32) -> Result<u32> {
    let size = usize::try_from(header_size)
        .map_err(|_| Error::AddressOverflow(u64::from(header_size)))?;
    let region = offset
        .checked_add(size)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(Error::TruncatedBuffer {
            offset,
            needed: size,
            available: bytes.len().saturating_sub(offset),
        })?;
    if region.len() < HEADER_CHECKSUM_OFFSET + 4 {
        return Err(Error::InvalidHeaderSize(header_size));
    }

    let mut digest = CRC32.digest();
    digest.update(&region[..HEADER_CHECKSUM_OFFSET]);
    digest.update(&[0; 4]);
    digest.update(&region[HEADER_CHECKSUM_OFFSET + 4..]);

    Ok(digest.finalize())
}

/// CRC32 of the `table_size` bytes of the partition table region starting at `offset`.
///
/// # Errors
///
/// Returns [`Error::UndersizedBuffer`] if fewer than `table_size` bytes are available.
pub fn table_checksum(bytes: &[u8], offset: usize, table_size: u64) -> Result<u32> {
    let size = usize::try_from(table_size).map_err(|_| Error::AddressOverflow(table_size))?;
    let region = offset
        .checked_add(size)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(Error::UndersizedBuffer {
            needed: size,
            available: bytes.len().saturating_sub(offset),
        })?;

    Ok(crc32(region))
}
