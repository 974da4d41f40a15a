//! A Rust library and command-line tool to inspect and resize GPT partition tables.
//!
//! It reads, validates and rewrites the GUID Partition Table of a block device
//! or disk image: the primary header at LBA 1, the backup header at the last
//! LBA, and the partition entry array referenced by both, with the CRC-32
//! discipline the UEFI specification mandates.
//!
//! The central operation is a validated resize of a single partition entry:
//! the new end LBA is checked against alignment, shrink policy, the usable
//! range and every sibling entry before anything reaches the disk, and a
//! commit rewrites the entry array and both headers in an order that leaves a
//! recoverable table if interrupted.
//!
//! ```no_run
//! use gptresize::{GptContext, ResizeOperation};
//!
//! let mut ctx = GptContext::open("/dev/sdz")?;
//! ctx.load()?;
//!
//! for part in ctx.list_partitions()? {
//!     println!("{:3} {:>12} {:>12} {}", part.index, part.start_lba, part.end_lba, part.name);
//! }
//!
//! ctx.resize_partition(1, ResizeOperation::from_mib(256))?;
//! # Ok::<(), gptresize::GptError>(())
//! ```
//!
//! Only 512-byte sectors are supported; devices with a 4096-byte logical
//! sector will not load.

#[macro_use]
extern crate static_assertions;

pub mod context;
pub use context::GptContext;

pub mod device;
pub use device::{BlockDevice, FileDevice};

pub mod error;
pub use error::{GptError, Result};

pub mod gpt;
pub use gpt::{GptHeader, GptPartition};

pub mod guid;
pub use guid::Guid;

pub mod resize;
pub use resize::{PartitionInfo, ResizeConstraints, ResizeOperation};

/// Sector size assumed throughout the crate, in bytes.
pub const SECTOR_SIZE: usize = 512;

/// Generates getter/setter pairs for scalar fields of a packed on-disk
/// record. Fields are kept in little-endian byte order in memory so the
/// record doubles as its wire representation; accessors convert on the way
/// in and out.
macro_rules! le_field_accessors {
    ($field:ident, $setter:ident, $ty:ty) => {
        #[inline]
        pub fn $field(&self) -> $ty {
            <$ty>::from_le(unsafe { core::ptr::addr_of!(self.$field).read_unaligned() })
        }

        #[inline]
        pub fn $setter(&mut self, value: $ty) {
            unsafe { core::ptr::addr_of_mut!(self.$field).write_unaligned(value.to_le()) }
        }
    };
    ($field:ident, $ty:ty) => {
        #[inline]
        pub fn $field(&self) -> $ty {
            <$ty>::from_le(unsafe { core::ptr::addr_of!(self.$field).read_unaligned() })
        }
    };
}

pub(crate) use le_field_accessors;
