//! Constants of the GPT format and the builder used to make new partition tables.

use crate::entry::PartitionEntry;
use crate::gpt::Gpt;
use crate::guid::Guid;
use crate::header::GptHeader;

/// Signature found at the start of every GPT header.
pub const SIGNATURE: [u8; 8] = *b"EFI PART";

/// GPT revision 1.0 (`00 00 01 00` on disk).
pub const REVISION: u32 = 0x0001_0000;

/// Size (in bytes) of the fields of a GPT header. This is also the minimum header size.
pub const HEADER_SIZE: u32 = 92;

/// Offset of the header CRC32 field, relative to the start of the header.
pub const HEADER_CHECKSUM_OFFSET: usize = 16;

/// Logical block size used when none is given.
pub const DEFAULT_BLOCK_SIZE: u64 = 512;

/// Number of partition entries in a new table.
pub const DEFAULT_ENTRIES: u32 = 128;

/// Size (in bytes) of a partition entry in a new table.
pub const DEFAULT_ENTRY_SIZE: u32 = 128;

/// The partition table region is never smaller than this (in bytes).
pub const MIN_TABLE_SIZE: u64 = 16384;

/// Largest partition table (slots times slot size, in bytes) accepted when parsing a header.
pub const MAX_TABLE_SIZE: u64 = 16 * 1024 * 1024;

/// Location (in blocks) of the primary header.
pub const PRIMARY_LBA: u64 = 1;

/// Location (in blocks) of the primary partition table.
pub const DEFAULT_TABLE_LBA: u64 = 2;

/// First usable block of a new table with the default geometry on 512 bytes blocks.
pub const DEFAULT_FIRST_LBA: u64 = 34;

/// Options used to make a new, empty [`Gpt`].
///
/// # Examples
///
/// ```
/// let gpt: gptkit::Gpt = gptkit::GptConfig::new()
///     .block_size(4096)
///     .entries(64)
///     .build();
///
/// assert_eq!(gpt.block_size, 4096);
/// assert_eq!(gpt.header.entries, 64);
/// assert_eq!(gpt.table_size(), 16384);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GptConfig {
    block_size: u64,
    disk_guid: Guid,
    revision: u32,
    header_size: u32,
    entries: u32,
    entry_size: u32,
}

impl Default for GptConfig {
    fn default() -> Self {
        GptConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            disk_guid: Guid::NIL,
            revision: REVISION,
            header_size: HEADER_SIZE,
            entries: DEFAULT_ENTRIES,
            entry_size: DEFAULT_ENTRY_SIZE,
        }
    }
}

impl GptConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        GptConfig::default()
    }

    /// Logical block size (in bytes) of the device.
    ///
    /// # Panics
    ///
    /// The value must be greater than 0.
    pub fn block_size(self, block_size: u64) -> Self {
        assert!(block_size > 0, "block size must be greater than 0");
        GptConfig { block_size, ..self }
    }

    /// Disk GUID stored in the header.
    pub fn disk_guid(self, disk_guid: Guid) -> Self {
        GptConfig { disk_guid, ..self }
    }

    /// Format revision stored in the header.
    pub fn revision(self, revision: u32) -> Self {
        GptConfig { revision, ..self }
    }

    /// Number of bytes covered by the header checksum. Values below [`HEADER_SIZE`] are
    /// raised to it.
    pub fn header_size(self, header_size: u32) -> Self {
        GptConfig {
            header_size: header_size.max(HEADER_SIZE),
            ..self
        }
    }

    /// Declared capacity of the partition table.
    pub fn entries(self, entries: u32) -> Self {
        GptConfig { entries, ..self }
    }

    /// Size (in bytes) of one slot of the partition table.
    pub fn entry_size(self, entry_size: u32) -> Self {
        GptConfig { entry_size, ..self }
    }

    /// The header a new table made from this configuration starts with.
    pub fn header(&self) -> GptHeader {
        let mut header = GptHeader::default();
        header.revision = self.revision;
        header.header_size = self.header_size;
        header.guid = self.disk_guid;
        header.entries = self.entries;
        header.entry_size = self.entry_size;

        header
    }

    /// Make an empty partition table. Use [`Gpt::fit_to_disk`] to place it on a disk.
    pub fn build<E: PartitionEntry>(&self) -> Gpt<E> {
        Gpt {
            block_size: self.block_size,
            header: self.header(),
            partitions: Vec::new(),
        }
    }
}
