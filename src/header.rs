//! The GPT header and its binary codec.

use crate::checksum::header_checksum;
use crate::config::{
    DEFAULT_ENTRIES, DEFAULT_ENTRY_SIZE, DEFAULT_FIRST_LBA, DEFAULT_TABLE_LBA,
    HEADER_CHECKSUM_OFFSET, HEADER_SIZE, MAX_TABLE_SIZE, PRIMARY_LBA, REVISION, SIGNATURE,
};
use crate::guid::Guid;
use crate::{Error, Result};
use bincode::{deserialize, serialize_into};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// The header as it is laid out on disk (92 bytes, little-endian).
#[derive(Deserialize, Serialize)]
struct RawHeader {
    signature: [u8; 8],
    revision: u32,
    header_size: u32,
    header_checksum: u32,
    reserved: u32,
    current_lba: u64,
    backup_lba: u64,
    first_lba: u64,
    last_lba: u64,
    guid: Guid,
    table_offset: u64,
    entries: u32,
    entry_size: u32,
    table_checksum: u32,
}

/// A GUID Partition Table header.
///
/// The signature is checked when parsing and always written as `"EFI PART"`; it is not
/// stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GptHeader {
    /// GPT revision (usually `0x00010000`).
    pub revision: u32,
    /// Number of bytes covered by the header checksum (at least 92).
    pub header_size: u32,
    /// CRC32 checksum of the header.
    pub header_checksum: u32,
    /// Location (in blocks) of this header.
    pub current_lba: u64,
    /// Location (in blocks) of the other copy of the header.
    pub backup_lba: u64,
    /// First block usable by partitions.
    pub first_lba: u64,
    /// Last block usable by partitions (inclusive).
    pub last_lba: u64,
    /// Disk GUID.
    pub guid: Guid,
    /// Location (in blocks) of the partition table.
    pub table_offset: u64,
    /// Number of slots in the partition table.
    pub entries: u32,
    /// Size (in bytes) of one slot of the partition table.
    pub entry_size: u32,
    /// CRC32 checksum of the partition table region.
    pub table_checksum: u32,
    // kept so that a parsed header re-encodes to the same bytes
    reserved: u32,
}

impl Default for GptHeader {
    fn default() -> GptHeader {
        GptHeader {
            revision: REVISION,
            header_size: HEADER_SIZE,
            header_checksum: 0,
            current_lba: PRIMARY_LBA,
            backup_lba: 0,
            first_lba: DEFAULT_FIRST_LBA,
            last_lba: 0,
            guid: Guid::NIL,
            table_offset: DEFAULT_TABLE_LBA,
            entries: DEFAULT_ENTRIES,
            entry_size: DEFAULT_ENTRY_SIZE,
            table_checksum: 0,
            reserved: 0,
        }
    }
}

impl From<RawHeader> for GptHeader {
    fn from(raw: RawHeader) -> GptHeader {
        GptHeader {
            revision: raw.revision,
            header_size: raw.header_size,
            header_checksum: raw.header_checksum,
            current_lba: raw.current_lba,
            backup_lba: raw.backup_lba,
            first_lba: raw.first_lba,
            last_lba: raw.last_lba,
            guid: raw.guid,
            table_offset: raw.table_offset,
            entries: raw.entries,
            entry_size: raw.entry_size,
            table_checksum: raw.table_checksum,
            reserved: raw.reserved,
        }
    }
}

impl From<&GptHeader> for RawHeader {
    fn from(header: &GptHeader) -> RawHeader {
        RawHeader {
            signature: SIGNATURE,
            revision: header.revision,
            header_size: header.header_size,
            header_checksum: header.header_checksum,
            reserved: header.reserved,
            current_lba: header.current_lba,
            backup_lba: header.backup_lba,
            first_lba: header.first_lba,
            last_lba: header.last_lba,
            guid: header.guid,
            table_offset: header.table_offset,
            entries: header.entries,
            entry_size: header.entry_size,
            table_checksum: header.table_checksum,
        }
    }
}

fn check_table_geometry(entry_size: u32, entries: u32) -> Result<()> {
    if entry_size < DEFAULT_ENTRY_SIZE
        || entry_size % DEFAULT_ENTRY_SIZE != 0
        || !(entry_size / DEFAULT_ENTRY_SIZE).is_power_of_two()
        || u64::from(entry_size) > MAX_TABLE_SIZE
    {
        return Err(Error::InvalidEntrySize(entry_size));
    }

    let size = u64::from(entry_size) * u64::from(entries);
    if size > MAX_TABLE_SIZE {
        return Err(Error::InvalidTableSize(size));
    }

    Ok(())
}

impl GptHeader {
    /// Attempt to read a GPT header at `offset`.
    ///
    /// The checksums are not verified here, see [`Gpt::verify`](crate::Gpt::verify).
    ///
    /// # Errors
    ///
    /// - [`Error::TruncatedBuffer`] if fewer than 92 bytes are available at `offset`;
    /// - [`Error::InvalidSignature`] if the header doesn't start with `"EFI PART"`;
    /// - [`Error::InvalidHeaderSize`] if the header declares a size smaller than 92 bytes;
    /// - [`Error::InvalidEntrySize`] if the slot size is not 128 multiplied by a power of 2;
    /// - [`Error::InvalidTableSize`] if the slots add up to more than
    ///   [`MAX_TABLE_SIZE`] bytes.
    pub fn parse(bytes: &[u8], offset: usize) -> Result<GptHeader> {
        let size = HEADER_SIZE as usize;
        let data = offset
            .checked_add(size)
            .and_then(|end| bytes.get(offset..end))
            .ok_or(Error::TruncatedBuffer {
                offset,
                needed: size,
                available: bytes.len().saturating_sub(offset),
            })?;

        if data[..SIGNATURE.len()] != SIGNATURE {
            return Err(Error::InvalidSignature);
        }

        let raw: RawHeader = deserialize(data)?;
        if raw.header_size < HEADER_SIZE {
            return Err(Error::InvalidHeaderSize(raw.header_size));
        }
        check_table_geometry(raw.entry_size, raw.entries)?;

        Ok(raw.into())
    }

    /// Encode every field as it is, checksum included, at `offset`. The bytes between the
    /// end of the fields and `header_size` are zeroed.
    pub fn encode_into(&self, bytes: &mut [u8], offset: usize) -> Result<()> {
        if self.header_size < HEADER_SIZE {
            return Err(Error::InvalidHeaderSize(self.header_size));
        }
        let size = usize::try_from(self.header_size)
            .map_err(|_| Error::AddressOverflow(u64::from(self.header_size)))?;
        let available = bytes.len().saturating_sub(offset);
        let region = offset
            .checked_add(size)
            .and_then(|end| bytes.get_mut(offset..end))
            .ok_or(Error::TruncatedBuffer {
                offset,
                needed: size,
                available,
            })?;

        let (mut fields, padding) = region.split_at_mut(HEADER_SIZE as usize);
        serialize_into(&mut fields, &RawHeader::from(self))?;
        for x in padding.iter_mut() {
            *x = 0;
        }

        Ok(())
    }

    /// Encode the header at `offset`, then compute its checksum and store it both in the
    /// buffer and in `header_checksum`.
    pub fn write_into(&mut self, bytes: &mut [u8], offset: usize) -> Result<()> {
        self.encode_into(bytes, offset)?;
        self.header_checksum = header_checksum(bytes, offset, self.header_size)?;

        let at = offset + HEADER_CHECKSUM_OFFSET;
        bytes[at..at + 4].copy_from_slice(&self.header_checksum.to_le_bytes());

        Ok(())
    }

    /// Encode the header as it is into a new buffer of `header_size` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = vec![0; self.header_size.max(HEADER_SIZE) as usize];
        self.encode_into(&mut data, 0)?;

        Ok(data)
    }

    /// Encode the header into a new buffer of `header_size` bytes and update its checksum.
    pub fn write(&mut self) -> Result<Vec<u8>> {
        let mut data = vec![0; self.header_size.max(HEADER_SIZE) as usize];
        self.write_into(&mut data, 0)?;

        Ok(data)
    }

    /// Generate the CRC32 checksum of the header as it would be encoded.
    pub fn generate_checksum(&self) -> Result<u32> {
        header_checksum(&self.to_bytes()?, 0, self.header_size)
    }

    /// Update the CRC32 checksum of this header.
    pub fn update_checksum(&mut self) -> Result<()> {
        self.header_checksum = self.generate_checksum()?;

        Ok(())
    }

    /// Returns `true` if this is the primary copy (the header is located at the beginning of
    /// the disk).
    pub fn is_primary(&self) -> bool {
        self.current_lba == PRIMARY_LBA
    }

    /// Returns `true` if this is the backup copy (the header is located at the end of the
    /// disk).
    ///
    /// Note that when the header is a backup copy, `current_lba` is the LBA of the backup copy
    /// and `backup_lba` is the LBA of the primary copy.
    pub fn is_backup(&self) -> bool {
        !self.is_primary()
    }

    /// The header of the backup copy matching this (primary) header: `current_lba` and
    /// `backup_lba` are swapped and the partition table is placed right before the header.
    ///
    /// `table_blocks` is the number of blocks of the partition table region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTableOffset`] if the partition table would start before the
    /// first block of the disk (for example when `backup_lba` was never set).
    pub fn backup_view(&self, table_blocks: u64) -> Result<GptHeader> {
        let table_offset =
            self.backup_lba
                .checked_sub(table_blocks)
                .ok_or(Error::InvalidTableOffset {
                    table_offset: 0,
                    current_lba: self.backup_lba,
                })?;

        Ok(GptHeader {
            current_lba: self.backup_lba,
            backup_lba: self.current_lba,
            table_offset,
            ..self.clone()
        })
    }

    /// The header of the primary copy matching this (backup) header: `current_lba` and
    /// `backup_lba` are swapped and the partition table is placed right after the header.
    pub fn primary_view(&self) -> Result<GptHeader> {
        let table_offset = self
            .backup_lba
            .checked_add(1)
            .ok_or(Error::AddressOverflow(self.backup_lba))?;

        Ok(GptHeader {
            current_lba: self.backup_lba,
            backup_lba: self.current_lba,
            table_offset,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::checksum::crc32;

    fn header() -> GptHeader {
        GptHeader {
            current_lba: 1,
            backup_lba: 2047,
            first_lba: 34,
            last_lba: 2014,
            guid: [0x42; 16].into(),
            table_checksum: 0xdead_beef,
            ..GptHeader::default()
        }
    }

    #[test]
    fn layout() {
        let mut h = header();
        let data = h.write().unwrap();

        assert_eq!(data.len(), 92);
        assert_eq!(&data[0..8], b"EFI PART");
        assert_eq!(&data[8..12], &[0x00, 0x00, 0x01, 0x00]);
        assert_eq!(&data[12..16], &92_u32.to_le_bytes());
        assert_eq!(&data[16..20], &h.header_checksum.to_le_bytes());
        assert_eq!(&data[20..24], &[0; 4]);
        assert_eq!(&data[24..32], &1_u64.to_le_bytes());
        assert_eq!(&data[32..40], &2047_u64.to_le_bytes());
        assert_eq!(&data[40..48], &34_u64.to_le_bytes());
        assert_eq!(&data[48..56], &2014_u64.to_le_bytes());
        assert_eq!(&data[56..72], &[0x42; 16]);
        assert_eq!(&data[72..80], &2_u64.to_le_bytes());
        assert_eq!(&data[80..84], &128_u32.to_le_bytes());
        assert_eq!(&data[84..88], &128_u32.to_le_bytes());
        assert_eq!(&data[88..92], &0xdead_beef_u32.to_le_bytes());

        let mut zeroed = data.clone();
        zeroed[16..20].copy_from_slice(&[0; 4]);
        assert_eq!(h.header_checksum, crc32(&zeroed));
    }

    #[test]
    fn parse_what_was_written() {
        let mut h = header();
        let mut data = vec![0xff; 700];
        h.write_into(&mut data, 512).unwrap();

        let parsed = GptHeader::parse(&data, 512).unwrap();
        assert_eq!(parsed, h);
        assert_eq!(parsed.generate_checksum().unwrap(), h.header_checksum);
    }

    #[test]
    fn encode_keeps_checksum() {
        let mut h = header();
        h.header_checksum = 7;
        let data = h.to_bytes().unwrap();

        assert_eq!(&data[16..20], &7_u32.to_le_bytes());
        assert_eq!(h.header_checksum, 7);
        assert_ne!(h.generate_checksum().unwrap(), 7);

        h.update_checksum().unwrap();
        assert_eq!(h.header_checksum, h.generate_checksum().unwrap());
    }

    #[test]
    fn larger_header_size() {
        let mut h = header();
        h.header_size = 512;
        let mut data = vec![0xff; 512];
        h.write_into(&mut data, 0).unwrap();

        assert!(data[92..].iter().all(|&x| x == 0));
        assert_eq!(h.header_checksum, header_checksum(&data, 0, 512).unwrap());
        assert_eq!(GptHeader::parse(&data, 0).unwrap(), h);
        assert_eq!(h.generate_checksum().unwrap(), h.header_checksum);
    }

    #[test]
    fn truncated() {
        let mut h = header();
        let data = h.write().unwrap();

        assert!(matches!(
            GptHeader::parse(&data[..91], 0),
            Err(Error::TruncatedBuffer {
                offset: 0,
                needed: 92,
                available: 91
            })
        ));
        assert!(matches!(
            GptHeader::parse(&data, 1),
            Err(Error::TruncatedBuffer { .. })
        ));
        assert!(matches!(
            h.write_into(&mut vec![0; 100], 10),
            Err(Error::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn invalid_signature() {
        let mut data = header().write().unwrap();
        data[3] = b'X';

        assert!(matches!(
            GptHeader::parse(&data, 0),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn invalid_header_size() {
        let mut data = header().write().unwrap();
        data[12..16].copy_from_slice(&91_u32.to_le_bytes());

        assert!(matches!(
            GptHeader::parse(&data, 0),
            Err(Error::InvalidHeaderSize(91))
        ));

        let mut h = header();
        h.header_size = 20;
        assert!(matches!(h.write(), Err(Error::InvalidHeaderSize(20))));
    }

    #[test]
    fn reserved_bytes_round_trip() {
        let mut data = header().write().unwrap();
        data[21] = 1;

        let parsed = GptHeader::parse(&data, 0).unwrap();
        assert_eq!(parsed.to_bytes().unwrap(), data);
        assert_ne!(parsed.generate_checksum().unwrap(), parsed.header_checksum);
    }

    #[test]
    fn views() {
        let primary = header();
        assert!(primary.is_primary());

        let backup = primary.backup_view(32).unwrap();
        assert!(backup.is_backup());
        assert_eq!(backup.current_lba, 2047);
        assert_eq!(backup.backup_lba, 1);
        assert_eq!(backup.table_offset, 2015);
        assert_eq!(backup.first_lba, primary.first_lba);
        assert_eq!(backup.last_lba, primary.last_lba);
        assert_eq!(backup.guid, primary.guid);

        assert_eq!(backup.primary_view().unwrap(), primary);
    }

    #[test]
    fn impossible_views() {
        let unfitted = GptHeader::default();
        assert!(matches!(
            unfitted.backup_view(32),
            Err(Error::InvalidTableOffset {
                table_offset: 0,
                current_lba: 0
            })
        ));

        let mut backup = header().backup_view(32).unwrap();
        backup.backup_lba = u64::MAX;
        assert!(matches!(
            backup.primary_view(),
            Err(Error::AddressOverflow(u64::MAX))
        ));
    }

    #[test]
    fn invalid_table_geometry() {
        fn parse_with(entry_size: u32, entries: u32) -> Result<GptHeader> {
            let mut h = header();
            h.entry_size = entry_size;
            h.entries = entries;
            GptHeader::parse(&h.write().unwrap(), 0)
        }

        assert!(parse_with(256, 64).is_ok());
        assert!(parse_with(128, 0).is_ok());
        assert!(matches!(parse_with(100, 128), Err(Error::InvalidEntrySize(100))));
        assert!(matches!(parse_with(0, 128), Err(Error::InvalidEntrySize(0))));
        assert!(matches!(parse_with(384, 128), Err(Error::InvalidEntrySize(384))));
        assert!(matches!(
            parse_with(1 << 31, 1),
            Err(Error::InvalidEntrySize(0x8000_0000))
        ));
        assert!(matches!(
            parse_with(128, u32::MAX),
            Err(Error::InvalidTableSize(549_755_813_760))
        ));
    }
}
