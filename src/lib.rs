//! A library that decodes, verifies and re-encodes GUID partition tables held in memory.
//!
//! # Examples
//!
//! Making a new disk image with a partition that fills the entire disk:
//!
//! ```
//! let ss = 512;
//! let mut image = vec![0; 100 * ss as usize];
//! let mut gpt = gptkit::Gpt::new(ss);
//! gpt.fit_to_disk(image.len() as u64)
//!     .expect("disk too small");
//!
//! gpt.partitions.push(gptkit::GptPartitionEntry {
//!     partition_type_guid: "0FC63DAF-8483-4772-8E79-3D69D8477DE4".parse().unwrap(),
//!     unique_partition_guid: [0xff; 16].into(),
//!     starting_lba: gpt.header.first_lba,
//!     ending_lba: gpt.header.last_lba,
//!     attribute_bits: 0,
//!     partition_name: "A Robot Named Fight!".into(),
//! });
//!
//! gptkit::protective_mbr::write_protective_mbr_into(&mut image, ss)
//!     .expect("could not write the protective MBR");
//! gpt.write_image(&mut image)
//!     .expect("could not write the partition table");
//! ```
//!
//! Reading all the partitions of a disk image:
//!
//! ```
//! # let mut image = vec![0; 100 * 512];
//! # let mut gpt: gptkit::Gpt = gptkit::Gpt::new(512);
//! # gpt.fit_to_disk(image.len() as u64).unwrap();
//! # gpt.write_image(&mut image).unwrap();
//! let gpt: gptkit::Gpt = gptkit::Gpt::find_image(&image)
//!     .expect("could not find GPT");
//!
//! println!("Disk GUID: {}", gpt.header.guid);
//!
//! for (i, p) in gpt.partitions.iter().enumerate() {
//!     println!("Partition #{}: type = {}, size = {} bytes, starting lba = {}",
//!         i + 1,
//!         p.partition_type_guid,
//!         p.size().unwrap() * gpt.block_size,
//!         p.starting_lba);
//! }
//! ```
//!
//! Writing the backup copy of a primary table without touching it:
//!
//! ```
//! let mut gpt: gptkit::Gpt = gptkit::Gpt::new(512);
//! gpt.fit_to_disk(100 * 512).unwrap();
//! let primary = gpt.clone();
//!
//! let backup = gpt.write_backup_from_primary().unwrap();
//! let parsed: gptkit::Gpt = gptkit::Gpt::from_backup_bytes(&backup, 0, 512).unwrap();
//!
//! assert_eq!(gpt, primary);
//! assert!(parsed.verify());
//! assert_eq!(parsed.header.current_lba, gpt.header.backup_lba);
//! ```

#![deny(missing_docs)]

use std::result;
use thiserror::Error;

pub mod checksum;
pub mod config;
pub mod entry;
pub mod gpt;
pub mod guid;
pub mod header;
pub mod layout;
pub mod protective_mbr;
pub mod table;

pub use self::config::GptConfig;
pub use self::entry::{GptPartitionEntry, PartitionEntry, PartitionName};
pub use self::gpt::Gpt;
pub use self::guid::Guid;
pub use self::header::GptHeader;

/// An error that can be produced while reading or writing a GPT.
#[derive(Debug, Error)]
pub enum Error {
    /// Deserialization errors.
    #[error("deserialization failed")]
    Deserialize(#[from] bincode::Error),
    /// An error that occurs when a structure doesn't fit in the buffer.
    #[error("buffer too short: {needed} bytes needed at offset {offset}, {available} available")]
    TruncatedBuffer {
        /// Where the structure starts.
        offset: usize,
        /// Size of the structure.
        needed: usize,
        /// Bytes left in the buffer from `offset`.
        available: usize,
    },
    /// An error that occurs when the signature of the GPT isn't what would be expected ("EFI
    /// PART").
    #[error("invalid signature")]
    InvalidSignature,
    /// An error that occurs when the header's size is smaller than 92 bytes or larger than a
    /// block.
    #[error("invalid header size: {0}")]
    InvalidHeaderSize(u32),
    /// An error that occurs when a buffer given to compute the checksum of the partition table
    /// is smaller than the partition table.
    #[error("buffer smaller than the partition table ({available} < {needed})")]
    UndersizedBuffer {
        /// Size of the partition table region.
        needed: usize,
        /// Bytes available in the buffer.
        available: usize,
    },
    /// An error that occurs when the partition table would start before the beginning of the
    /// buffer.
    #[error("partition table at LBA {table_offset} is out of reach of the header at LBA {current_lba}")]
    InvalidTableOffset {
        /// Location (in blocks) of the partition table.
        table_offset: u64,
        /// Location (in blocks) of the header.
        current_lba: u64,
    },
    /// An error that occurs when the partition entries don't fit in the slots of the table.
    #[error("invalid partition entry size: {0}")]
    InvalidEntrySize(u32),
    /// An error that occurs when the slots of the partition table add up to more than
    /// [`MAX_TABLE_SIZE`](config::MAX_TABLE_SIZE) bytes.
    #[error("partition table too large: {0} bytes")]
    InvalidTableSize(u64),
    /// An error that occurs when there are more partitions than slots in the table.
    #[error("too many partitions ({0} > {1})")]
    TooManyPartitions(usize, u32),
    /// An error that occurs when the CRC32 checksum of the header doesn't match the expected
    /// checksum for the actual header.
    #[error("corrupted CRC32 checksum ({0} != {1})")]
    InvalidChecksum(u32, u32),
    /// An error that occurs when the CRC32 checksum of the partition table doesn't match the
    /// expected checksum for the actual partition table.
    #[error("corrupted partition table CRC32 checksum ({0} != {1})")]
    InvalidTableChecksum(u32, u32),
    /// An error that occurs when reading a GPT from a disk image did not succeeded.
    ///
    /// The first argument is the error that occurred when trying to read the primary copy.
    /// The second argument is the error that occurred when trying to read the backup copy.
    #[error("could not read primary header ({0}) nor backup header ({1})")]
    ReadError(Box<Error>, Box<Error>),
    /// An error that occurs when the disk is too small for the partition table.
    #[error("no space left")]
    NoSpaceLeft,
    /// An error that occurs when a partition ends before it starts.
    #[error("invalid partition boundaries: the end sector must not be before the start sector")]
    InvalidPartitionBoundaries,
    /// An error that occurs when a GUID could not be parsed from its textual form.
    #[error("invalid GUID: {0:?}")]
    InvalidGuid(String),
    /// An error that occurs when a location doesn't fit in the address space.
    #[error("address overflow: {0}")]
    AddressOverflow(u64),
}

/// The result of reading or writing a GPT.
pub type Result<T> = result::Result<T, Error>;
