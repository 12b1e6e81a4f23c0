//! Partition entries: the record stored in each slot of the partition table.

use crate::guid::Guid;
use crate::{Error, Result};
use bincode::{deserialize, serialize_into};
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Number of UTF-16LE code units in a partition name.
const NAME_UNITS: usize = 36;

/// A record that can be stored in a slot of the partition table.
///
/// The partition table only relies on this interface, so a different entry format can be
/// used by making a [`Gpt`](crate::Gpt) of another type implementing it.
pub trait PartitionEntry: Sized {
    /// Size (in bytes) of the encoded record. A slot of the table must be at least that large.
    const SIZE: usize;

    /// Decode the record stored at `offset`.
    fn parse(bytes: &[u8], offset: usize) -> Result<Self>;

    /// Encode the record at `offset`.
    fn write(&self, bytes: &mut [u8], offset: usize) -> Result<()>;

    /// Returns `true` if the record describes an unused slot.
    fn is_empty(&self) -> bool;
}

/// A wrapper type for the 36 UTF-16LE code units of a partition's name.
///
/// The code units are kept as they were read, so a name always re-encodes to the same bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PartitionName([u16; NAME_UNITS]);

impl PartitionName {
    /// The raw UTF-16LE code units, including the padding.
    pub fn as_units(&self) -> &[u16; NAME_UNITS] {
        &self.0
    }

    /// Returns `true` if the name has no character.
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl Default for PartitionName {
    fn default() -> PartitionName {
        PartitionName([0; NAME_UNITS])
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.0.iter().position(|&x| x == 0).unwrap_or(NAME_UNITS);
        write!(f, "{}", String::from_utf16_lossy(&self.0[..len]))
    }
}

impl fmt::Debug for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

impl From<&str> for PartitionName {
    /// Names longer than 36 code units are truncated.
    fn from(value: &str) -> PartitionName {
        let mut units = [0; NAME_UNITS];
        for (unit, x) in units.iter_mut().zip(value.encode_utf16()) {
            *unit = x;
        }

        PartitionName(units)
    }
}

struct UTF16LEVisitor;

impl<'de> Visitor<'de> for UTF16LEVisitor {
    type Value = PartitionName;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("36 UTF-16LE code units (72 bytes)")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<PartitionName, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut units = [0; NAME_UNITS];
        for (i, unit) in units.iter_mut().enumerate() {
            *unit = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }

        Ok(PartitionName(units))
    }
}

impl<'de> Deserialize<'de> for PartitionName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_tuple(NAME_UNITS, UTF16LEVisitor)
    }
}

impl Serialize for PartitionName {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_tuple(NAME_UNITS)?;
        for x in self.0.iter() {
            seq.serialize_element(x)?;
        }
        seq.end()
    }
}

/// A UEFI partition entry (128 bytes).
///
/// # Examples
///
/// ```
/// use gptkit::PartitionEntry;
///
/// let entry = gptkit::GptPartitionEntry {
///     partition_type_guid: [0xff; 16].into(),
///     unique_partition_guid: [0xfe; 16].into(),
///     starting_lba: 34,
///     ending_lba: 2047,
///     attribute_bits: 0,
///     partition_name: "A Robot Named Fight!".into(),
/// };
///
/// let mut data = vec![0; 128];
/// entry.write(&mut data, 0).unwrap();
///
/// let parsed = gptkit::GptPartitionEntry::parse(&data, 0).unwrap();
/// assert_eq!(parsed.partition_name.to_string(), "A Robot Named Fight!");
/// assert_eq!(parsed.size().unwrap(), 2014);
/// ```
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GptPartitionEntry {
    /// GUID of the partition's type.
    pub partition_type_guid: Guid,
    /// GUID of the partition.
    pub unique_partition_guid: Guid,
    /// The position (in blocks) of the first block of the partition.
    pub starting_lba: u64,
    /// The position (in blocks) of the last block of the partition (inclusive).
    pub ending_lba: u64,
    /// The attribute bits.
    pub attribute_bits: u64,
    /// The partition name.
    pub partition_name: PartitionName,
}

impl GptPartitionEntry {
    /// Creates an empty partition entry.
    pub fn empty() -> GptPartitionEntry {
        GptPartitionEntry::default()
    }

    /// Returns the number of blocks in the partition.
    ///
    /// # Errors
    ///
    /// This function will return an error if the `ending_lba` is lesser than the
    /// `starting_lba`.
    pub fn size(&self) -> Result<u64> {
        if self.ending_lba < self.starting_lba {
            return Err(Error::InvalidPartitionBoundaries);
        }

        Ok(self.ending_lba - self.starting_lba + 1)
    }
}

impl PartitionEntry for GptPartitionEntry {
    const SIZE: usize = 128;

    fn parse(bytes: &[u8], offset: usize) -> Result<Self> {
        let slot = offset
            .checked_add(Self::SIZE)
            .and_then(|end| bytes.get(offset..end))
            .ok_or(Error::TruncatedBuffer {
                offset,
                needed: Self::SIZE,
                available: bytes.len().saturating_sub(offset),
            })?;

        Ok(deserialize(slot)?)
    }

    fn write(&self, bytes: &mut [u8], offset: usize) -> Result<()> {
        let available = bytes.len().saturating_sub(offset);
        let mut slot = offset
            .checked_add(Self::SIZE)
            .and_then(|end| bytes.get_mut(offset..end))
            .ok_or(Error::TruncatedBuffer {
                offset,
                needed: Self::SIZE,
                available,
            })?;
        serialize_into(&mut slot, self)?;

        Ok(())
    }

    /// An entry is empty when every one of its bytes is zero.
    fn is_empty(&self) -> bool {
        *self == GptPartitionEntry::empty()
    }
}
