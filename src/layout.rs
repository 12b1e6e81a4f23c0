//! Boundary alignment and partition table sizing.

use crate::config::MIN_TABLE_SIZE;
use crate::{Error, Result};
use std::convert::TryFrom;

/// Round `value` up to the next multiple of `boundary`. A value that is already aligned is
/// returned unchanged.
///
/// # Panics
///
/// `boundary` must be greater than 0 (checked in debug builds only).
///
/// # Examples
///
/// ```
/// assert_eq!(gptkit::layout::align(768, 512), 1024);
/// assert_eq!(gptkit::layout::align(512, 512), 512);
/// ```
pub fn align(value: u64, boundary: u64) -> u64 {
    debug_assert!(boundary > 0, "alignment boundary must be greater than 0");

    match value % boundary {
        0 => value,
        r => value + (boundary - r),
    }
}

/// Size (in bytes) of the partition table region: the slots rounded up to a whole number of
/// blocks, and never less than [`MIN_TABLE_SIZE`].
pub fn table_size(entry_size: u32, entries: u32, block_size: u64) -> u64 {
    align(u64::from(entry_size) * u64::from(entries), block_size).max(MIN_TABLE_SIZE)
}

/// Number of blocks covered by the partition table region.
pub fn table_blocks(entry_size: u32, entries: u32, block_size: u64) -> u64 {
    let size = table_size(entry_size, entries, block_size);

    (size + block_size - 1) / block_size
}

pub(crate) fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::AddressOverflow(value))
}

/// Byte offset of block `lba`.
pub(crate) fn byte_offset(lba: u64, block_size: u64) -> Result<usize> {
    to_usize(lba.checked_mul(block_size).ok_or(Error::AddressOverflow(lba))?)
}
