//! The partition table as a whole: header, geometry and partitions, in their primary and
//! backup layouts.

use crate::checksum;
use crate::config::{GptConfig, DEFAULT_TABLE_LBA, HEADER_SIZE, PRIMARY_LBA};
use crate::entry::{GptPartitionEntry, PartitionEntry};
use crate::header::GptHeader;
use crate::layout::{self, byte_offset, to_usize};
use crate::table::{parse_table, slot_size, write_table};
use crate::{Error, Result};
use log::debug;
use std::convert::TryFrom;

/// A type representing a GUID partition table including its partitions and the block size of
/// the device.
///
/// Two layouts exist for the same table. The primary copy has the header first and the table
/// at `(table_offset - current_lba) * block_size` bytes after it; the backup copy has the
/// table first and the header right after it.
///
/// # Examples
///
/// Write a new table and read it back:
/// ```
/// let mut gpt = gptkit::Gpt::new(512);
/// gpt.fit_to_disk(1024 * 1024).unwrap();
/// gpt.partitions.push(gptkit::GptPartitionEntry {
///     partition_type_guid: [0xff; 16].into(),
///     unique_partition_guid: [0xfe; 16].into(),
///     starting_lba: gpt.header.first_lba,
///     ending_lba: gpt.header.last_lba,
///     attribute_bits: 0,
///     partition_name: "A Robot Named Fight!".into(),
/// });
///
/// let data = gpt.write().unwrap();
/// let parsed: gptkit::Gpt = gptkit::Gpt::from_bytes(&data, 0, 512).unwrap();
///
/// assert!(parsed.verify());
/// assert_eq!(parsed, gpt);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gpt<E = GptPartitionEntry> {
    /// Block size (in bytes) of the device.
    pub block_size: u64,
    /// GPT header (disk GUID, first/last usable LBA, etc...)
    pub header: GptHeader,
    /// The used partition entries, in table order.
    pub partitions: Vec<E>,
}

impl<E: PartitionEntry> Default for Gpt<E> {
    fn default() -> Self {
        GptConfig::new().build()
    }
}

/// Byte position of the table of `header` when the header is at byte `offset`.
fn table_position(header: &GptHeader, block_size: u64, offset: usize) -> Result<usize> {
    let invalid = || Error::InvalidTableOffset {
        table_offset: header.table_offset,
        current_lba: header.current_lba,
    };
    let distance = (i128::from(header.table_offset) - i128::from(header.current_lba))
        .checked_mul(i128::from(block_size))
        .ok_or_else(invalid)?;
    let position = (offset as i128).checked_add(distance).ok_or_else(invalid)?;
    if position < 0 {
        return Err(invalid());
    }

    usize::try_from(position).map_err(|_| Error::AddressOverflow(header.table_offset))
}

fn table_len(header: &GptHeader, block_size: u64) -> Result<usize> {
    to_usize(layout::table_size(
        header.entry_size,
        header.entries,
        block_size,
    ))
}

/// Write one copy of the table: the table region is zeroed and filled, its checksum is stored
/// in the header, then the header is written with its own checksum. The buffer is left
/// untouched when the header or the partitions cannot be written.
fn write_copy<E: PartitionEntry>(
    header: &mut GptHeader,
    partitions: &[E],
    block_size: u64,
    bytes: &mut [u8],
    header_offset: usize,
    table_offset: usize,
) -> Result<()> {
    slot_size::<E>(header)?;
    if partitions.len() > header.entries as usize {
        return Err(Error::TooManyPartitions(partitions.len(), header.entries));
    }
    if header.header_size < HEADER_SIZE {
        return Err(Error::InvalidHeaderSize(header.header_size));
    }
    let header_size = header.header_size as usize;
    if header_offset.saturating_add(header_size) > bytes.len() {
        return Err(Error::TruncatedBuffer {
            offset: header_offset,
            needed: header_size,
            available: bytes.len().saturating_sub(header_offset),
        });
    }

    let size = table_len(header, block_size)?;
    let available = bytes.len().saturating_sub(table_offset);
    let region = table_offset
        .checked_add(size)
        .and_then(|end| bytes.get_mut(table_offset..end))
        .ok_or(Error::TruncatedBuffer {
            offset: table_offset,
            needed: size,
            available,
        })?;
    for x in region.iter_mut() {
        *x = 0;
    }

    write_table(header, partitions, bytes, table_offset)?;
    header.table_checksum = checksum::table_checksum(bytes, table_offset, size as u64)?;
    header.write_into(bytes, header_offset)?;
    debug!(
        "wrote GPT header at byte {} (LBA {}) and {} partitions at byte {}",
        header_offset,
        header.current_lba,
        partitions.len(),
        table_offset
    );

    Ok(())
}

impl<E: PartitionEntry> Gpt<E> {
    /// Make a new empty partition table with the default geometry. (This operation does not
    /// write anything!)
    ///
    /// # Panics
    ///
    /// The block size must be greater than 0.
    pub fn new(block_size: u64) -> Self {
        GptConfig::new().block_size(block_size).build()
    }

    /// Size (in bytes) of the partition table region.
    pub fn table_size(&self) -> u64 {
        layout::table_size(
            self.header.entry_size,
            self.header.entries,
            self.block_size,
        )
    }

    /// Number of blocks of the partition table region.
    pub fn table_blocks(&self) -> u64 {
        layout::table_blocks(
            self.header.entry_size,
            self.header.entries,
            self.block_size,
        )
    }

    /// Read a primary copy: the header at `offset` and the partition table at the position
    /// given by the header.
    ///
    /// The table is left unchanged if the header or the partition table could not be read.
    ///
    /// # Errors
    ///
    /// On top of the errors of [`GptHeader::parse`], this function will return an error if
    /// the header is larger than a block, or if the partition table would start before the
    /// beginning of the buffer.
    pub fn parse(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        let header = self.parse_header(bytes, offset)?;
        let start = table_position(&header, self.block_size, offset)?;
        let end = start.saturating_add(table_len(&header, self.block_size)?);
        let partitions = parse_table(&header, bytes, start, end)?;
        debug!(
            "parsed GPT header at byte {}: LBA {}, {} partitions",
            offset,
            header.current_lba,
            partitions.len()
        );

        self.header = header;
        self.partitions = partitions;

        Ok(())
    }

    /// Read a backup copy starting at `offset`: the partition table first, then the header.
    ///
    /// The position of the header is given by the current geometry of the table (see
    /// [`table_size`](Self::table_size)), which is the default geometry for a new table.
    pub fn parse_backup(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        let header_offset = offset
            .checked_add(to_usize(self.table_size())?)
            .ok_or(Error::AddressOverflow(self.table_size()))?;
        let header = self.parse_header(bytes, header_offset)?;
        let end = offset.saturating_add(table_len(&header, self.block_size)?);
        let partitions = parse_table(&header, bytes, offset, end)?;
        debug!(
            "parsed backup GPT header at byte {}: LBA {}, {} partitions",
            header_offset,
            header.current_lba,
            partitions.len()
        );

        self.header = header;
        self.partitions = partitions;

        Ok(())
    }

    fn parse_header(&self, bytes: &[u8], offset: usize) -> Result<GptHeader> {
        let header = GptHeader::parse(bytes, offset)?;
        if u64::from(header.header_size) > self.block_size {
            return Err(Error::InvalidHeaderSize(header.header_size));
        }

        Ok(header)
    }

    /// Read a primary copy at `offset` with the given block size.
    ///
    /// # Panics
    ///
    /// The block size must be greater than 0.
    pub fn from_bytes(bytes: &[u8], offset: usize, block_size: u64) -> Result<Self> {
        let mut gpt = Self::new(block_size);
        gpt.parse(bytes, offset)?;

        Ok(gpt)
    }

    /// Read a backup copy at `offset` with the given block size and the default geometry.
    ///
    /// # Panics
    ///
    /// The block size must be greater than 0.
    pub fn from_backup_bytes(bytes: &[u8], offset: usize, block_size: u64) -> Result<Self> {
        let mut gpt = Self::new(block_size);
        gpt.parse_backup(bytes, offset)?;

        Ok(gpt)
    }

    /// Write the primary copy into a new buffer, the header being at the start of the buffer.
    /// The checksums of the header are updated.
    pub fn write(&mut self) -> Result<Vec<u8>> {
        let size = table_len(&self.header, self.block_size)?;
        let start = table_position(&self.header, self.block_size, 0)?;
        let len = (to_usize(self.block_size)?.saturating_add(size))
            .max(start.saturating_add(size))
            .max(self.header.header_size as usize);

        let mut data = vec![0; len];
        self.write_into(&mut data, 0)?;

        Ok(data)
    }

    /// Write the primary copy with the header at `offset`. The checksums of the header are
    /// updated.
    pub fn write_into(&mut self, bytes: &mut [u8], offset: usize) -> Result<()> {
        let start = table_position(&self.header, self.block_size, offset)?;

        write_copy(
            &mut self.header,
            &self.partitions,
            self.block_size,
            bytes,
            offset,
            start,
        )
    }

    /// Write the backup copy into a new buffer, the partition table being at the start of the
    /// buffer. The checksums of the header are updated.
    pub fn write_backup(&mut self) -> Result<Vec<u8>> {
        let mut data = vec![0; self.backup_len()?];
        self.write_backup_into(&mut data, 0)?;

        Ok(data)
    }

    /// Write the backup copy with the partition table at `offset`. The checksums of the
    /// header are updated.
    pub fn write_backup_into(&mut self, bytes: &mut [u8], offset: usize) -> Result<()> {
        let header_offset = offset.saturating_add(table_len(&self.header, self.block_size)?);

        write_copy(
            &mut self.header,
            &self.partitions,
            self.block_size,
            bytes,
            header_offset,
            offset,
        )
    }

    fn backup_len(&self) -> Result<usize> {
        let size = table_len(&self.header, self.block_size)?;
        let block = to_usize(self.block_size)?.max(self.header.header_size as usize);

        Ok(size.saturating_add(block))
    }

    /// The header of the backup copy of this (primary) table: `current_lba` and `backup_lba`
    /// are swapped and the partition table ends right before the backup header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTableOffset`] if `backup_lba` leaves no room for the partition
    /// table, which is the case of a table that was never fitted to a disk.
    pub fn backup_header(&self) -> Result<GptHeader> {
        self.header.backup_view(self.table_blocks())
    }

    /// Write the backup copy of this (primary) table into a new buffer, the partition table
    /// being at the start of the buffer. `self` is not modified.
    pub fn write_backup_from_primary(&self) -> Result<Vec<u8>> {
        let mut data = vec![0; self.backup_len()?];
        self.write_backup_from_primary_into(&mut data, 0)?;

        Ok(data)
    }

    /// Write the backup copy of this (primary) table with the partition table at `offset`.
    /// `self` is not modified; the backup header that was written is returned.
    pub fn write_backup_from_primary_into(
        &self,
        bytes: &mut [u8],
        offset: usize,
    ) -> Result<GptHeader> {
        let mut header = self.backup_header()?;
        let header_offset = offset.saturating_add(table_len(&header, self.block_size)?);
        write_copy(
            &mut header,
            &self.partitions,
            self.block_size,
            bytes,
            header_offset,
            offset,
        )?;

        Ok(header)
    }

    /// Generate the CRC32 checksum of the header as it is.
    pub fn checksum_header(&self) -> Result<u32> {
        self.header.generate_checksum()
    }

    /// Generate the CRC32 checksum of the header found at `offset`, over `header_size` bytes.
    pub fn checksum_header_in(&self, bytes: &[u8], offset: usize) -> Result<u32> {
        checksum::header_checksum(bytes, offset, self.header.header_size)
    }

    /// Generate the CRC32 checksum of the partition table region as it would be written,
    /// unused slots included.
    pub fn checksum_table(&self) -> Result<u32> {
        if self.partitions.len() > self.header.entries as usize {
            return Err(Error::TooManyPartitions(
                self.partitions.len(),
                self.header.entries,
            ));
        }
        let size = self.table_size();
        let slot = self.header.entry_size as usize;
        let used = (self.partitions.len() * slot) as u64;

        let mut digest = checksum::CRC32.digest();
        let mut data = vec![0; slot];
        for entry in self.partitions.iter() {
            write_table(&self.header, std::slice::from_ref(entry), &mut data, 0)?;
            digest.update(&data);
        }

        let zeroes = [0; 4096];
        let mut left = size - used;
        while left > 0 {
            let n = left.min(zeroes.len() as u64) as usize;
            digest.update(&zeroes[..n]);
            left -= n as u64;
        }

        Ok(digest.finalize())
    }

    /// Generate the CRC32 checksum of the partition table region found at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndersizedBuffer`] if fewer than [`table_size`](Self::table_size)
    /// bytes are available.
    pub fn checksum_table_in(&self, bytes: &[u8], offset: usize) -> Result<u32> {
        checksum::table_checksum(bytes, offset, self.table_size())
    }

    /// Update the CRC32 checksum of the header.
    pub fn update_header_checksum(&mut self) -> Result<()> {
        self.header.update_checksum()
    }

    /// Update the CRC32 checksum of the partition table region.
    pub fn update_table_checksum(&mut self) -> Result<()> {
        self.header.table_checksum = self.checksum_table()?;

        Ok(())
    }

    /// Update both checksums, the partition table one first since the header checksum covers
    /// it.
    pub fn update_checksums(&mut self) -> Result<()> {
        self.update_table_checksum()?;
        self.update_header_checksum()
    }

    /// Returns `true` if the checksum of the header matches the header.
    pub fn verify_header(&self) -> bool {
        matches!(self.checksum_header(), Ok(sum) if sum == self.header.header_checksum)
    }

    /// Returns `true` if the checksum of the partition table region stored in the header
    /// matches the partitions.
    pub fn verify_table(&self) -> bool {
        matches!(self.checksum_table(), Ok(sum) if sum == self.header.table_checksum)
    }

    /// Returns `true` if both checksums match.
    pub fn verify(&self) -> bool {
        self.verify_header() && self.verify_table()
    }

    /// Returns `true` if the header is a primary copy (located at the beginning of the disk).
    pub fn is_primary(&self) -> bool {
        self.header.is_primary()
    }

    /// Returns `true` if the header is a backup copy (located at the end of the disk).
    pub fn is_backup(&self) -> bool {
        self.header.is_backup()
    }

    /// Read one copy of the table in a disk image, the header being at block `lba`. The
    /// checksums are verified against the bytes of the image.
    fn read_copy(image: &[u8], block_size: u64, lba: u64) -> Result<Self> {
        let offset = byte_offset(lba, block_size)?;
        let gpt = Self::from_bytes(image, offset, block_size)?;

        let sum = gpt.checksum_header_in(image, offset)?;
        if gpt.header.header_checksum != sum {
            return Err(Error::InvalidChecksum(gpt.header.header_checksum, sum));
        }

        let start = table_position(&gpt.header, block_size, offset)?;
        let sum = gpt.checksum_table_in(image, start)?;
        if gpt.header.table_checksum != sum {
            return Err(Error::InvalidTableChecksum(gpt.header.table_checksum, sum));
        }

        Ok(gpt)
    }

    /// Read the GPT of a disk image. This function will try to read the backup copy (in the
    /// last block of the image) if the primary copy could not be read or is corrupted.
    ///
    /// # Panics
    ///
    /// The block size must be greater than 0.
    pub fn read_image(image: &[u8], block_size: u64) -> Result<Self> {
        use self::Error::*;

        Self::read_copy(image, block_size, PRIMARY_LBA).or_else(|primary_err| {
            debug!(
                "could not read primary GPT ({}), trying the backup",
                primary_err
            );
            let backup = match (image.len() as u64 / block_size).checked_sub(1) {
                Some(lba) if lba > PRIMARY_LBA => Self::read_copy(image, block_size, lba),
                _ => Err(TruncatedBuffer {
                    offset: 0,
                    needed: to_usize(block_size)?,
                    available: image.len(),
                }),
            };

            backup.map_err(|backup_err| match (primary_err, backup_err) {
                (InvalidSignature, InvalidSignature) => InvalidSignature,
                (x, y) => ReadError(Box::new(x), Box::new(y)),
            })
        })
    }

    /// Find the GPT of a disk image. This function will try to read the GPT using a block size
    /// of 512 but if it fails it will automatically try to read the GPT using a block size of
    /// 4096.
    pub fn find_image(image: &[u8]) -> Result<Self> {
        Self::read_image(image, 512).or_else(|err_at_512| match err_at_512 {
            Error::InvalidSignature => Self::read_image(image, 4096),
            err => Err(err),
        })
    }

    /// Updates the header to fit a disk of `disk_size` bytes. `first_lba`, `last_lba`,
    /// `current_lba`, `backup_lba` and `table_offset` are updated; the header stays a primary
    /// or a backup copy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSpaceLeft`] if the disk cannot hold both copies of the table and at
    /// least one usable block.
    pub fn fit_to_disk(&mut self, disk_size: u64) -> Result<()> {
        let blocks = disk_size / self.block_size;
        let table_blocks = self.table_blocks();
        // protective MBR, then header and table for each copy
        let reserved = 1 + 2 * (1 + table_blocks);
        if blocks <= reserved {
            return Err(Error::NoSpaceLeft);
        }

        let last = blocks - 1;
        self.header.first_lba = DEFAULT_TABLE_LBA + table_blocks;
        self.header.last_lba = last - table_blocks - 1;
        if self.header.is_primary() {
            self.header.backup_lba = last;
            self.header.table_offset = DEFAULT_TABLE_LBA;
        } else {
            self.header.current_lba = last;
            self.header.backup_lba = PRIMARY_LBA;
            self.header.table_offset = self.header.last_lba + 1;
        }

        Ok(())
    }

    /// Write both copies of the table into a whole disk image: the primary copy at the
    /// beginning and the backup copy at the end. The checksums of the header are updated.
    ///
    /// Nothing is written if the geometry of the copies cannot be placed on the image.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTableOffset`] if the backup partition table would start before
    ///   `first_lba`;
    /// - [`Error::AddressOverflow`] if the other copy cannot be located;
    /// - [`Error::TruncatedBuffer`] if the image is too small for the backup header.
    pub fn write_image(&mut self, image: &mut [u8]) -> Result<()> {
        let block_size = self.block_size;
        let is_primary = self.header.is_primary();
        let (mut primary, mut backup) = if is_primary {
            (self.header.clone(), self.backup_header()?)
        } else {
            (self.header.primary_view()?, self.header.clone())
        };

        if backup.table_offset < backup.first_lba {
            return Err(Error::InvalidTableOffset {
                table_offset: backup.table_offset,
                current_lba: backup.current_lba,
            });
        }
        let header_offset = byte_offset(backup.current_lba, block_size)?;
        let header_size = backup.header_size as usize;
        if header_offset.saturating_add(header_size) > image.len() {
            return Err(Error::TruncatedBuffer {
                offset: header_offset,
                needed: header_size,
                available: image.len().saturating_sub(header_offset),
            });
        }

        for header in [&mut primary, &mut backup].iter_mut() {
            let header_offset = byte_offset(header.current_lba, block_size)?;
            let table_offset = byte_offset(header.table_offset, block_size)?;
            write_copy(
                header,
                &self.partitions,
                block_size,
                image,
                header_offset,
                table_offset,
            )?;
        }

        self.header = if is_primary { primary } else { backup };

        Ok(())
    }
}
