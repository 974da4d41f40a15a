//! Error taxonomy for the whole crate.
//!
//! Every failure maps to exactly one kind; nothing is logged away or wrapped
//! twice. Raw I/O failures surface as the dedicated kinds below when the
//! underlying [`io::ErrorKind`] identifies them, and as [`GptError::Io`]
//! otherwise.

use std::io;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GptError>;

/// Anything that can go wrong while reading, validating or rewriting a GPT.
#[derive(Debug, Error)]
pub enum GptError {
    /// The header signature field is not `EFI PART`.
    #[error("invalid GPT signature")]
    InvalidSignature,

    /// A header or entry-array CRC did not match its stored value.
    #[error("CRC32 mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    InvalidCrc32 { stored: u32, computed: u32 },

    /// `header_size` below 92 bytes or above a sector, or a partition entry
    /// size other than 128 bytes.
    #[error("unsupported header geometry: header size {header_size}, entry size {entry_size}")]
    InvalidHeaderSize { header_size: u32, entry_size: u32 },

    /// A header's LBA fields contradict its on-disk location.
    #[error("header LBA fields contradict the device layout")]
    InvalidLbaRange,

    /// A GUID string was not 36 hyphenated hex characters.
    #[error("malformed GUID string")]
    InvalidUuid,

    /// An I/O buffer was not exactly one sector long.
    #[error("I/O buffer is not exactly one sector")]
    InvalidBufferSize,

    /// An operation was attempted before the required load.
    #[error("operation requires a loaded partition table")]
    InvalidState,

    /// The slot is empty or the index is past the end of the entry array.
    #[error("partition {0} not found")]
    PartitionNotFound(usize),

    /// No free slot is available in the entry array.
    #[error("partition table is full")]
    PartitionTableFull,

    /// The resulting size would be zero or below the configured minimum.
    #[error("resulting partition size is too small")]
    InvalidSize,

    /// The resize would shrink the partition and shrinking is not allowed.
    #[error("resize would shrink the partition")]
    WouldShrink,

    /// The new end lies past the next partition or the last usable LBA.
    #[error("not enough space on the device")]
    NotEnoughSpace,

    /// The resized partition would intersect the given slot.
    #[error("resized range would overlap partition {0}")]
    OverlapDetected(usize),

    /// The sector after the new end is not a multiple of the alignment.
    #[error("requested end does not satisfy the alignment constraint")]
    AlignmentError,

    /// The device or image cannot be accessed with the required permissions.
    #[error("permission denied")]
    PermissionDenied,

    /// No device or image exists at the given path.
    #[error("no such device")]
    NoDevice,

    /// The device is held by someone else.
    #[error("device is busy")]
    DeviceBusy,

    /// The underlying device ran out of space.
    #[error("no space left on device")]
    NoSpaceLeft,

    /// The device does not support seeking.
    #[error("device is not seekable")]
    Unseekable,

    /// Any other I/O failure, passed through verbatim.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for GptError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::NotFound => Self::NoDevice,
            io::ErrorKind::ResourceBusy => Self::DeviceBusy,
            io::ErrorKind::StorageFull => Self::NoSpaceLeft,
            io::ErrorKind::NotSeekable => Self::Unseekable,
            _ => Self::Io(err),
        }
    }
}
