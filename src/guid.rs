//! GUID parsing and printing.
//!
//! GPT stores GUIDs in a mixed-endian layout: the first three fields are
//! little-endian, the clock-sequence bytes and the node are stored as-is.
//! [`Guid`] wraps the 16 on-disk bytes and converts to and from the canonical
//! hyphenated text form at the edges.

use core::fmt;
use core::str::FromStr;

use uuid::Uuid;

use crate::error::GptError;

/// A GUID in its on-disk GPT byte order.
///
/// # Examples
///
/// ```
/// use gptresize::Guid;
///
/// let guid: Guid = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B".parse().unwrap();
///
/// assert_eq!(guid, Guid::EFI_SYSTEM);
/// assert_eq!(guid.to_string(), "C12A7328-F81F-11D2-BA4B-00A0C93EC93B");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid([u8; 16]);

impl Guid {
    /// The all-zero GUID, marking an unused partition entry slot.
    pub const EMPTY: Self = Self([0u8; 16]);

    /// EFI System Partition (`C12A7328-F81F-11D2-BA4B-00A0C93EC93B`).
    pub const EFI_SYSTEM: Self = Self([
        0x28, 0x73, 0x2a, 0xc1, 0x1f, 0xf8, 0xd2, 0x11, 0xba, 0x4b, 0x00, 0xa0, 0xc9, 0x3e, 0xc9,
        0x3b,
    ]);

    /// Linux filesystem data (`0FC63DAF-8483-4772-8E79-3D69D8477DE4`).
    pub const LINUX_FILESYSTEM: Self = Self([
        0xaf, 0x3d, 0xc6, 0x0f, 0x83, 0x84, 0x72, 0x47, 0x8e, 0x79, 0x3d, 0x69, 0xd8, 0x47, 0x7d,
        0xe4,
    ]);

    /// Linux swap (`0657FD6D-A4AB-43C4-84E5-0933C84B4F4F`).
    pub const LINUX_SWAP: Self = Self([
        0x6d, 0xfd, 0x57, 0x06, 0xab, 0xa4, 0xc4, 0x43, 0x84, 0xe5, 0x09, 0x33, 0xc8, 0x4b, 0x4f,
        0x4f,
    ]);

    /// Microsoft basic data (`EBD0A0A2-B9E5-4433-87C0-68B6B72699C7`).
    pub const MICROSOFT_BASIC_DATA: Self = Self([
        0xa2, 0xa0, 0xd0, 0xeb, 0xe5, 0xb9, 0x33, 0x44, 0x87, 0xc0, 0x68, 0xb6, 0xb7, 0x26, 0x99,
        0xc7,
    ]);

    /// Wraps raw on-disk bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw on-disk bytes.
    #[inline]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    /// Returns `true` if all 16 bytes are zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl FromStr for Guid {
    type Err = GptError;

    /// Parses the canonical 36-character hyphenated form, case-insensitively.
    ///
    /// Braced, URN and unhyphenated renditions are rejected: on-disk metadata
    /// should only ever be round-tripped through one text form.
    fn from_str(s: &str) -> Result<Self, GptError> {
        let bytes = s.as_bytes();
        if bytes.len() != 36
            || bytes[8] != b'-'
            || bytes[13] != b'-'
            || bytes[18] != b'-'
            || bytes[23] != b'-'
        {
            return Err(GptError::InvalidUuid);
        }

        let uuid = Uuid::try_parse(s).map_err(|_| GptError::InvalidUuid)?;

        Ok(Self(uuid.to_bytes_le()))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uuid = Uuid::from_bytes_le(self.0);
        f.write_str(uuid.hyphenated().encode_upper(&mut Uuid::encode_buffer()))
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::Guid;
    use crate::error::GptError;

    #[test]
    fn parse_canonical_form() {
        let guid: Guid = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B".parse().unwrap();
        assert_eq!(guid, Guid::EFI_SYSTEM);
    }

    #[test]
    fn parse_is_case_insensitive() {
        let guid: Guid = "0fc63daf-8483-4772-8e79-3d69d8477de4".parse().unwrap();
        assert_eq!(guid, Guid::LINUX_FILESYSTEM);
    }

    #[test]
    fn print_is_uppercase_round_trip() {
        let text = "EBD0A0A2-B9E5-4433-87C0-68B6B72699C7";
        let guid: Guid = text.parse().unwrap();
        assert_eq!(guid.to_string(), text);

        let lower = text.to_lowercase();
        let guid: Guid = lower.parse().unwrap();
        assert_eq!(guid.to_string(), text);
    }

    #[test]
    fn mixed_endian_layout_is_honoured() {
        // time_low of the EFI System GUID is 0xC12A7328, stored little-endian.
        assert_eq!(Guid::EFI_SYSTEM.to_bytes()[0], 0x28);
        assert_eq!(Guid::EFI_SYSTEM.to_bytes()[3], 0xc1);
        // clock_seq and node bytes are stored verbatim.
        assert_eq!(Guid::EFI_SYSTEM.to_bytes()[8], 0xba);
        assert_eq!(Guid::EFI_SYSTEM.to_bytes()[15], 0x3b);
    }

    #[test]
    fn malformed_strings_are_rejected() {
        let bad = [
            "",
            "C12A7328",
            "C12A7328-F81F-11D2-BA4B-00A0C93EC93", // one short
            "C12A7328-F81F-11D2-BA4B-00A0C93EC93BB", // one long
            "C12A7328xF81F-11D2-BA4B-00A0C93EC93B", // bad separator
            "C12A7328-F81F-11D2-BA4B-00A0C93EC93G", // bad hex digit
            "{C12A7328-F81F-11D2-BA4B-00A0C93EC93B}", // braced
            "C12A7328F81F11D2BA4B00A0C93EC93B",    // no hyphens
            "urn:uuid:C12A7328-F81F-11D2-BA4B-00A0C93EC93B",
        ];
        for s in bad {
            assert!(
                matches!(s.parse::<Guid>(), Err(GptError::InvalidUuid)),
                "accepted {s:?}"
            );
        }
    }

    #[test]
    fn empty_guid() {
        assert!(Guid::EMPTY.is_empty());
        assert!(!Guid::EFI_SYSTEM.is_empty());
        assert_eq!(
            Guid::EMPTY.to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
    }
}
