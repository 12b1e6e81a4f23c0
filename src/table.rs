//! The partition table: a sequence of fixed-size slots, each holding one partition entry.
//!
//! Only used slots are materialized. Writing packs the given entries from the first slot, so
//! a table that had unused slots between partitions is renumbered when it is written back.

use crate::entry::PartitionEntry;
use crate::header::GptHeader;
use crate::{Error, Result};
use log::trace;
use std::convert::TryFrom;

pub(crate) fn slot_size<E: PartitionEntry>(header: &GptHeader) -> Result<usize> {
    let size = usize::try_from(header.entry_size)
        .map_err(|_| Error::AddressOverflow(u64::from(header.entry_size)))?;
    if size == 0 || size < E::SIZE {
        return Err(Error::InvalidEntrySize(header.entry_size));
    }

    Ok(size)
}

/// Read the used partition entries of the table starting at `offset`.
///
/// At most `header.entries` slots are read, and only the slots that end before `end`
/// (clamped to the length of the buffer). Unused slots are skipped; the order of the other
/// ones is preserved.
pub fn parse_table<E: PartitionEntry>(
    header: &GptHeader,
    bytes: &[u8],
    offset: usize,
    end: usize,
) -> Result<Vec<E>> {
    let size = slot_size::<E>(header)?;
    let end = end.min(bytes.len());
    let mut partitions = Vec::new();

    for i in 0..header.entries as usize {
        let start = match i.checked_mul(size).and_then(|x| x.checked_add(offset)) {
            Some(start) if start.saturating_add(size) <= end => start,
            _ => break,
        };

        let entry = E::parse(bytes, start)?;
        if entry.is_empty() {
            continue;
        }
        trace!("partition entry in slot {} at byte {}", i, start);
        partitions.push(entry);
    }

    Ok(partitions)
}

/// Write `partitions` in consecutive slots of the table starting at `offset`. Each slot is
/// zeroed before the entry is written into it.
///
/// # Errors
///
/// - [`Error::TooManyPartitions`] if there are more partitions than slots in the table;
/// - [`Error::TruncatedBuffer`] if the buffer cannot hold the slots.
pub fn write_table<E: PartitionEntry>(
    header: &GptHeader,
    partitions: &[E],
    bytes: &mut [u8],
    offset: usize,
) -> Result<()> {
    let size = slot_size::<E>(header)?;
    if partitions.len() > header.entries as usize {
        return Err(Error::TooManyPartitions(partitions.len(), header.entries));
    }

    let needed = partitions.len() * size;
    if offset.saturating_add(needed) > bytes.len() {
        return Err(Error::TruncatedBuffer {
            offset,
            needed,
            available: bytes.len().saturating_sub(offset),
        });
    }

    for (i, entry) in partitions.iter().enumerate() {
        let start = offset + i * size;
        for x in bytes[start..start + size].iter_mut() {
            *x = 0;
        }
        entry.write(bytes, start)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entry::GptPartitionEntry;

    fn entry(i: u8) -> GptPartitionEntry {
        GptPartitionEntry {
            partition_type_guid: [1; 16].into(),
            unique_partition_guid: [i; 16].into(),
            starting_lba: 34 + u64::from(i) * 10,
            ending_lba: 43 + u64::from(i) * 10,
            attribute_bits: 0,
            partition_name: format!("part{}", i).as_str().into(),
        }
    }

    #[test]
    fn skip_empty_slots() {
        let header = GptHeader::default();
        let mut data = vec![0; 16384];
        let all = (0..128).map(|i| entry(i as u8)).collect::<Vec<_>>();
        write_table(&header, &all, &mut data, 0).unwrap();
        for x in data[3 * 128..4 * 128].iter_mut() {
            *x = 0;
        }

        let partitions: Vec<GptPartitionEntry> =
            parse_table(&header, &data, 0, data.len()).unwrap();
        assert_eq!(partitions.len(), 127);
        assert_eq!(partitions[2], all[2]);
        assert_eq!(partitions[3], all[4]);
        assert_eq!(partitions[126], all[127]);
    }

    #[test]
    fn stop_at_declared_entries() {
        let mut header = GptHeader::default();
        let mut data = vec![0; 16384];
        let all = (0..8).map(entry).collect::<Vec<_>>();
        write_table(&header, &all, &mut data, 0).unwrap();

        header.entries = 5;
        let partitions: Vec<GptPartitionEntry> =
            parse_table(&header, &data, 0, data.len()).unwrap();
        assert_eq!(partitions, all[..5].to_vec());
    }

    #[test]
    fn stop_at_end() {
        let header = GptHeader::default();
        let mut data = vec![0; 16384];
        let all = (0..8).map(entry).collect::<Vec<_>>();
        write_table(&header, &all, &mut data, 0).unwrap();

        let partitions: Vec<GptPartitionEntry> =
            parse_table(&header, &data, 0, 3 * 128 + 127).unwrap();
        assert_eq!(partitions, all[..3].to_vec());

        let partitions: Vec<GptPartitionEntry> =
            parse_table(&header, &data[..640], 0, 100_000).unwrap();
        assert_eq!(partitions, all[..5].to_vec());
    }

    #[test]
    fn larger_slots() {
        let mut header = GptHeader::default();
        header.entry_size = 256;
        let mut data = vec![0xff; 1024];
        let all = (0..4).map(entry).collect::<Vec<_>>();
        write_table(&header, &all, &mut data, 0).unwrap();

        assert!(data[128..256].iter().all(|&x| x == 0));
        let partitions: Vec<GptPartitionEntry> =
            parse_table(&header, &data, 0, data.len()).unwrap();
        assert_eq!(partitions, all);
    }

    #[test]
    fn repack_on_write() {
        let header = GptHeader::default();
        let mut data = vec![0; 16384];
        entry(1).write(&mut data, 0).unwrap();
        entry(2).write(&mut data, 5 * 128).unwrap();

        let partitions: Vec<GptPartitionEntry> =
            parse_table(&header, &data, 0, data.len()).unwrap();
        let mut packed = vec![0; 16384];
        write_table(&header, &partitions, &mut packed, 0).unwrap();

        assert_eq!(GptPartitionEntry::parse(&packed, 128).unwrap(), entry(2));
        assert!(GptPartitionEntry::parse(&packed, 5 * 128).unwrap().is_empty());
    }

    #[test]
    fn invalid_entry_size() {
        let mut header = GptHeader::default();
        header.entry_size = 64;
        let data = vec![0; 16384];

        assert!(matches!(
            parse_table::<GptPartitionEntry>(&header, &data, 0, data.len()),
            Err(Error::InvalidEntrySize(64))
        ));
        assert!(matches!(
            write_table::<GptPartitionEntry>(&header, &[], &mut vec![0; 16384], 0),
            Err(Error::InvalidEntrySize(64))
        ));
    }

    #[test]
    fn too_many_partitions() {
        let mut header = GptHeader::default();
        header.entries = 2;
        let all = (0..3).map(entry).collect::<Vec<_>>();

        assert!(matches!(
            write_table(&header, &all, &mut vec![0; 16384], 0),
            Err(Error::TooManyPartitions(3, 2))
        ));
    }

    #[test]
    fn truncated_table() {
        let header = GptHeader::default();
        let all = (0..3).map(entry).collect::<Vec<_>>();

        assert!(matches!(
            write_table(&header, &all, &mut vec![0; 400], 100),
            Err(Error::TruncatedBuffer {
                offset: 100,
                needed: 384,
                available: 300
            })
        ));
    }
}
