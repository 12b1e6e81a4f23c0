//! GUID values as they are stored in GPT headers and partition entries.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 16 bytes GUID in its on-disk representation.
///
/// The first three groups are stored little-endian, the last two big-endian. `Display` and
/// `FromStr` use the usual textual form (`C12A7328-F81F-11D2-BA4B-00A0C93EC93B`).
///
/// # Examples
///
/// ```
/// let guid: gptkit::Guid = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B".parse().unwrap();
///
/// assert_eq!(guid.as_bytes()[..4], [0x28, 0x73, 0x2a, 0xc1]);
/// assert_eq!(guid.to_string(), "C12A7328-F81F-11D2-BA4B-00A0C93EC93B");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Guid([u8; 16]);

impl Guid {
    /// The all-zero GUID.
    pub const NIL: Guid = Guid([0; 16]);

    /// Make a GUID from its on-disk bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Guid {
        Guid(bytes)
    }

    /// The on-disk bytes of the GUID.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns `true` if every byte of the GUID is zero.
    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }

    /// Read the textual form of the GUID stored at `offset`.
    pub fn read_string(bytes: &[u8], offset: usize) -> Result<String> {
        let raw = offset
            .checked_add(16)
            .and_then(|end| bytes.get(offset..end))
            .ok_or(Error::TruncatedBuffer {
                offset,
                needed: 16,
                available: bytes.len().saturating_sub(offset),
            })?;
        let mut guid = [0; 16];
        guid.copy_from_slice(raw);

        Ok(Guid(guid).to_string())
    }

    /// Write the on-disk bytes of the GUID at `offset`.
    pub fn write(&self, bytes: &mut [u8], offset: usize) -> Result<()> {
        let available = bytes.len().saturating_sub(offset);
        let raw = offset
            .checked_add(16)
            .and_then(|end| bytes.get_mut(offset..end))
            .ok_or(Error::TruncatedBuffer {
                offset,
                needed: 16,
                available,
            })?;
        raw.copy_from_slice(&self.0);

        Ok(())
    }
}

impl From<[u8; 16]> for Guid {
    fn from(bytes: [u8; 16]) -> Guid {
        Guid(bytes)
    }
}

impl From<Guid> for [u8; 16] {
    fn from(guid: Guid) -> [u8; 16] {
        guid.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9]
        )?;
        for x in &b[10..] {
            write!(f, "{:02X}", x)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Guid> {
        let invalid = || Error::InvalidGuid(s.to_string());
        let groups = s.split('-').collect::<Vec<_>>();
        if groups.iter().map(|x| x.len()).collect::<Vec<_>>() != [8, 4, 4, 4, 12] {
            return Err(invalid());
        }

        let mut digits = Vec::with_capacity(16);
        for group in groups {
            for i in (0..group.len()).step_by(2) {
                let pair = group.get(i..i + 2).ok_or_else(invalid)?;
                digits.push(u8::from_str_radix(pair, 16).map_err(|_| invalid())?);
            }
        }

        let mut reordered = Vec::with_capacity(16);
        reordered.extend(digits.drain(..4).rev());
        reordered.extend(digits.drain(..2).rev());
        reordered.extend(digits.drain(..2).rev());
        reordered.extend(digits.drain(..));

        let mut guid = [0; 16];
        guid.copy_from_slice(&reordered);

        Ok(Guid(guid))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EFI_SYSTEM: &str = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B";

    #[test]
    fn parse_and_display() {
        let guid: Guid = EFI_SYSTEM.parse().unwrap();

        assert_eq!(
            guid.as_bytes(),
            &[
                0x28, 0x73, 0x2a, 0xc1, 0x1f, 0xf8, 0xd2, 0x11, 0xba, 0x4b, 0x00, 0xa0, 0xc9,
                0x3e, 0xc9, 0x3b
            ]
        );
        assert_eq!(guid.to_string(), EFI_SYSTEM);
        assert_eq!(
            "c12a7328-f81f-11d2-ba4b-00a0c93ec93b".parse::<Guid>().unwrap(),
            guid
        );
    }

    #[test]
    fn nil() {
        assert!(Guid::NIL.is_nil());
        assert_eq!(
            Guid::NIL.to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
        assert!(!Guid::from([1; 16]).is_nil());
    }

    #[test]
    fn invalid_text() {
        assert!(matches!(
            "C12A7328F81F11D2BA4B00A0C93EC93B".parse::<Guid>(),
            Err(Error::InvalidGuid(_))
        ));
        assert!(matches!(
            "C12A7328-F81F-11D2-BA4B-00A0C93EC93".parse::<Guid>(),
            Err(Error::InvalidGuid(_))
        ));
        assert!(matches!(
            "G12A7328-F81F-11D2-BA4B-00A0C93EC93B".parse::<Guid>(),
            Err(Error::InvalidGuid(_))
        ));
        assert!(matches!(
            "C12A7328-F81F-11D2-BA4B-00A0C93EC9é".parse::<Guid>(),
            Err(Error::InvalidGuid(_))
        ));
    }

    #[test]
    fn read_and_write_in_buffer() {
        let guid: Guid = EFI_SYSTEM.parse().unwrap();
        let mut data = vec![0; 20];

        guid.write(&mut data, 4).unwrap();
        assert_eq!(&data[4..], guid.as_bytes());
        assert_eq!(Guid::read_string(&data, 4).unwrap(), EFI_SYSTEM);

        assert!(guid.write(&mut data, 5).is_err());
        assert!(Guid::read_string(&data, 5).is_err());

        assert!(matches!(
            guid.write(&mut data, usize::MAX),
            Err(Error::TruncatedBuffer { available: 0, .. })
        ));
        assert!(matches!(
            Guid::read_string(&data, usize::MAX - 15),
            Err(Error::TruncatedBuffer { available: 0, .. })
        ));
    }
}
