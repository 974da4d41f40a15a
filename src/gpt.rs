//! On-disk GPT structures.
//!
//! [`GptHeader`] and [`GptPartition`] are kept in their exact wire layout:
//! packed records whose scalar fields hold little-endian byte order in
//! memory, so reading a record is a plain byte copy and writing one is the
//! reverse. Field access goes through accessors that convert endianness at
//! the boundary; native-endian values never leave this module through the
//! serialized form.

use core::mem::MaybeUninit;
use core::{ptr, slice};

use crate::error::{GptError, Result};
use crate::guid::Guid;
use crate::le_field_accessors;
use crate::SECTOR_SIZE;

/// Signature every GPT header starts with.
pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";

/// Revision written into freshly produced headers.
pub const GPT_REVISION: u32 = 0x0001_0000;

/// Byte size of the meaningful part of a GPT header.
pub const GPT_HEADER_SIZE: usize = 92;

/// Byte size of one partition entry; the only layout this crate understands.
pub const GPT_ENTRY_SIZE: usize = 128;

/// Number of entries a freshly produced header describes.
pub const GPT_ENTRY_COUNT: u32 = 128;

/// UTF-16 code units in a partition name field.
pub const GPT_NAME_LEN: usize = 36;

/// LBA of the primary header.
pub const GPT_PRIMARY_LBA: u64 = 1;

/// A GPT header in its on-disk layout.
///
/// The significant 92 bytes of the 512-byte header sector. Parsing validates
/// the signature, the geometry fields and the header CRC before anything else
/// is trusted; a parsed header is therefore always internally consistent.
#[derive(Clone, Debug)]
#[repr(C, packed(1))]
pub struct GptHeader {
    /// Must contain the bytes `EFI PART`.
    signature: [u8; 8],

    /// Header revision, treated as opaque.
    revision: u32,

    /// Size in bytes of the header; the CRC covers exactly this many bytes.
    header_size: u32,

    /// CRC32 of the first `header_size` bytes, computed with this field zeroed.
    header_crc32: u32,
    reserved: u32,

    /// LBA at which this header lives.
    my_lba: u64,

    /// LBA of the peer header.
    alternate_lba: u64,

    /// First LBA available to partition data.
    first_usable_lba: u64,

    /// Last LBA available to partition data.
    last_usable_lba: u64,

    /// Stable identity of the disk.
    disk_guid: [u8; 16],

    /// LBA where the partition entry array begins.
    partition_entry_lba: u64,

    /// Number of entries in the array.
    num_partition_entries: u32,

    /// Byte size of a single entry.
    sizeof_partition_entry: u32,

    /// CRC32 of the whole entry array.
    partition_entry_array_crc32: u32,
}

assert_eq_size!(GptHeader, [u8; GPT_HEADER_SIZE]);
assert_eq_align!(GptHeader, u8);

impl GptHeader {
    /// Builds a fresh primary header for a disk of `total_sectors` sectors,
    /// with the default 128-entry array at LBA 2 and the checksum sealed.
    ///
    /// The layout mirrors what common partitioning tools produce: usable
    /// space starts after the 32 array sectors and stops short of the backup
    /// array and header at the end of the disk.
    pub fn new(disk_guid: Guid, total_sectors: u64) -> Self {
        let array_sectors =
            (GPT_ENTRY_COUNT as u64 * GPT_ENTRY_SIZE as u64).div_ceil(SECTOR_SIZE as u64);

        let mut header = Self {
            signature: *GPT_SIGNATURE,
            revision: GPT_REVISION.to_le(),
            header_size: (GPT_HEADER_SIZE as u32).to_le(),
            header_crc32: 0,
            reserved: 0,
            my_lba: GPT_PRIMARY_LBA.to_le(),
            alternate_lba: (total_sectors - 1).to_le(),
            first_usable_lba: (2 + array_sectors).to_le(),
            last_usable_lba: (total_sectors - 2 - array_sectors).to_le(),
            disk_guid: disk_guid.to_bytes(),
            partition_entry_lba: 2u64.to_le(),
            num_partition_entries: GPT_ENTRY_COUNT.to_le(),
            sizeof_partition_entry: (GPT_ENTRY_SIZE as u32).to_le(),
            partition_entry_array_crc32: 0,
        };
        header.update_checksum();

        header
    }

    /// Reads a header from a 512-byte sector buffer and validates it.
    ///
    /// Validation order follows trust order: signature, then the geometry
    /// fields, then the CRC over exactly `header_size` bytes of the raw
    /// sector with the CRC field zeroed.
    pub fn parse_from_buf(buf: &[u8]) -> Result<Self> {
        if buf.len() < SECTOR_SIZE {
            return Err(GptError::InvalidBufferSize);
        }

        let header = unsafe {
            let mut uninit = MaybeUninit::<Self>::uninit();
            let raw = slice::from_raw_parts_mut(uninit.as_mut_ptr().cast::<u8>(), GPT_HEADER_SIZE);
            raw.copy_from_slice(&buf[..GPT_HEADER_SIZE]);
            uninit.assume_init()
        };

        header.check_signature()?;
        header.check_geometry()?;

        let mut sector = [0u8; SECTOR_SIZE];
        sector.copy_from_slice(&buf[..SECTOR_SIZE]);
        sector[16..20].fill(0);

        let computed = crc32fast::hash(&sector[..header.header_size() as usize]);
        let stored = header.header_crc32();
        if computed != stored {
            return Err(GptError::InvalidCrc32 { stored, computed });
        }

        Ok(header)
    }

    /// Writes this header into a sector buffer, zero-padding the remainder.
    pub fn write(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < SECTOR_SIZE {
            return Err(GptError::InvalidBufferSize);
        }

        buf[..SECTOR_SIZE].fill(0);
        buf[..GPT_HEADER_SIZE].copy_from_slice(self.as_bytes());

        Ok(())
    }

    /// Computes the header checksum: CRC32 of the first `header_size` bytes
    /// of the header sector with the checksum field zeroed.
    #[must_use]
    pub fn compute_checksum(&self) -> u32 {
        let mut sector = [0u8; SECTOR_SIZE];
        sector[..GPT_HEADER_SIZE].copy_from_slice(self.as_bytes());
        sector[16..20].fill(0);

        let len = (self.header_size() as usize).clamp(GPT_HEADER_SIZE, SECTOR_SIZE);
        crc32fast::hash(&sector[..len])
    }

    /// Recomputes and stores the header checksum.
    pub fn update_checksum(&mut self) {
        self.header_crc32 = self.compute_checksum().to_le();
    }

    /// Checks signature, geometry and checksum of an in-memory header.
    pub fn check_validity(&self) -> Result<()> {
        self.check_signature()?;
        self.check_geometry()?;

        let computed = self.compute_checksum();
        let stored = self.header_crc32();
        if computed != stored {
            return Err(GptError::InvalidCrc32 { stored, computed });
        }

        Ok(())
    }

    fn check_signature(&self) -> Result<()> {
        if &self.signature != GPT_SIGNATURE {
            return Err(GptError::InvalidSignature);
        }
        Ok(())
    }

    fn check_geometry(&self) -> Result<()> {
        let header_size = self.header_size();
        let entry_size = self.sizeof_partition_entry();
        if (header_size as usize) < GPT_HEADER_SIZE
            || (header_size as usize) > SECTOR_SIZE
            || entry_size as usize != GPT_ENTRY_SIZE
        {
            return Err(GptError::InvalidHeaderSize {
                header_size,
                entry_size,
            });
        }
        Ok(())
    }

    /// Byte length of the entry array this header references.
    pub fn entry_array_byte_len(&self) -> u64 {
        u64::from(self.num_partition_entries()) * u64::from(self.sizeof_partition_entry())
    }

    /// Number of sectors the entry array occupies on disk.
    pub fn entry_array_sector_count(&self) -> u64 {
        self.entry_array_byte_len().div_ceil(SECTOR_SIZE as u64)
    }

    /// The raw signature bytes.
    pub fn signature(&self) -> [u8; 8] {
        self.signature
    }

    /// The disk's identity GUID.
    pub fn disk_guid(&self) -> Guid {
        Guid::from_bytes(self.disk_guid)
    }

    pub fn set_disk_guid(&mut self, guid: Guid) {
        self.disk_guid = guid.to_bytes();
    }

    fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), size_of::<Self>()) }
    }

    le_field_accessors!(revision, u32);
    le_field_accessors!(header_size, u32);
    le_field_accessors!(header_crc32, u32);
    le_field_accessors!(my_lba, set_my_lba, u64);
    le_field_accessors!(alternate_lba, set_alternate_lba, u64);
    le_field_accessors!(first_usable_lba, u64);
    le_field_accessors!(last_usable_lba, u64);
    le_field_accessors!(partition_entry_lba, u64);
    le_field_accessors!(num_partition_entries, u32);
    le_field_accessors!(sizeof_partition_entry, u32);
    le_field_accessors!(
        partition_entry_array_crc32,
        set_partition_entry_array_crc32,
        u32
    );
}

/// A single partition entry in its on-disk layout.
#[derive(Clone, Copy, Debug)]
#[repr(C, packed(1))]
pub struct GptPartition {
    /// Purpose of the partition; all-zero marks an unused slot.
    type_guid: [u8; 16],

    /// Identity unique to this partition.
    partition_guid: [u8; 16],

    /// First sector of the partition.
    lba_start: u64,

    /// Last sector of the partition, inclusive.
    lba_end: u64,

    /// Attribute bits.
    attributes: u64,

    /// Human-readable name, UTF-16LE, zero-terminated if shorter.
    name: [u16; GPT_NAME_LEN],
}

assert_eq_size!(GptPartition, [u8; GPT_ENTRY_SIZE]);
assert_eq_align!(GptPartition, u8);

impl GptPartition {
    /// Builds a used entry covering `[start, end]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gptresize::{Guid, GptPartition};
    ///
    /// let part = GptPartition::new(Guid::LINUX_FILESYSTEM, Guid::EFI_SYSTEM, 2048, 18431, "root");
    ///
    /// assert_eq!(part.size_sectors(), 16384);
    /// assert_eq!(part.name(), "root");
    /// ```
    pub fn new(type_guid: Guid, partition_guid: Guid, start: u64, end: u64, name: &str) -> Self {
        let mut part = Self::default();
        part.set_type_guid(type_guid);
        part.set_partition_guid(partition_guid);
        part.set_lba_start(start);
        part.set_lba_end(end);
        part.set_name(name);

        part
    }

    /// Reads an entry from a 128-byte buffer. No validation is involved;
    /// entry-array integrity is covered by the array CRC.
    pub fn parse_from_buf(buf: &[u8]) -> Result<Self> {
        if buf.len() < GPT_ENTRY_SIZE {
            return Err(GptError::InvalidBufferSize);
        }

        let part = unsafe {
            let mut uninit = MaybeUninit::<Self>::uninit();
            let raw = slice::from_raw_parts_mut(uninit.as_mut_ptr().cast::<u8>(), GPT_ENTRY_SIZE);
            raw.copy_from_slice(&buf[..GPT_ENTRY_SIZE]);
            uninit.assume_init()
        };

        Ok(part)
    }

    /// Writes this entry into a 128-byte buffer.
    pub fn write(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < GPT_ENTRY_SIZE {
            return Err(GptError::InvalidBufferSize);
        }

        buf[..GPT_ENTRY_SIZE].copy_from_slice(self.as_bytes());

        Ok(())
    }

    /// Returns `true` if this slot holds a partition.
    pub fn is_used(&self) -> bool {
        !self.type_guid().is_empty()
    }

    /// Size of the partition in sectors, 0 for an inverted range.
    pub fn size_sectors(&self) -> u64 {
        let start = self.lba_start();
        let end = self.lba_end();
        if end >= start {
            end - start + 1
        } else {
            0
        }
    }

    /// Size of the partition in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_sectors() * SECTOR_SIZE as u64
    }

    pub fn type_guid(&self) -> Guid {
        Guid::from_bytes(self.type_guid)
    }

    pub fn set_type_guid(&mut self, guid: Guid) {
        self.type_guid = guid.to_bytes();
    }

    pub fn partition_guid(&self) -> Guid {
        Guid::from_bytes(self.partition_guid)
    }

    pub fn set_partition_guid(&mut self, guid: Guid) {
        self.partition_guid = guid.to_bytes();
    }

    /// Decodes the name field: UTF-16LE up to the first zero code unit,
    /// invalid surrogates replaced.
    pub fn name(&self) -> String {
        let raw = unsafe { ptr::addr_of!(self.name).read_unaligned() };
        let units: Vec<u16> = raw
            .iter()
            .map(|unit| u16::from_le(*unit))
            .take_while(|&unit| unit != 0)
            .collect();

        String::from_utf16_lossy(&units)
    }

    /// Encodes `name` as UTF-16LE, truncating to 36 code units; a
    /// terminating zero is written when room remains.
    ///
    /// # Examples
    ///
    /// ```
    /// use gptresize::GptPartition;
    ///
    /// let mut part = GptPartition::default();
    /// part.set_name("EFI System");
    ///
    /// assert_eq!(part.name(), "EFI System");
    /// ```
    pub fn set_name(&mut self, name: &str) {
        let mut raw = [0u16; GPT_NAME_LEN];
        for (slot, unit) in raw.iter_mut().zip(name.encode_utf16()) {
            *slot = unit.to_le();
        }

        unsafe { ptr::addr_of_mut!(self.name).write_unaligned(raw) };
    }

    fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), size_of::<Self>()) }
    }

    le_field_accessors!(lba_start, set_lba_start, u64);
    le_field_accessors!(lba_end, set_lba_end, u64);
    le_field_accessors!(attributes, set_attributes, u64);
}

impl Default for GptPartition {
    fn default() -> Self {
        Self {
            type_guid: [0u8; 16],
            partition_guid: [0u8; 16],
            lba_start: 0,
            lba_end: 0,
            attributes: 0,
            name: [0u16; GPT_NAME_LEN],
        }
    }
}

/// CRC32 over the raw bytes of a whole entry array, trailing empty slots
/// included.
pub fn entry_array_checksum(entries: &[GptPartition]) -> u32 {
    let bytes = unsafe {
        slice::from_raw_parts(entries.as_ptr().cast::<u8>(), entries.len() * GPT_ENTRY_SIZE)
    };

    crc32fast::hash(bytes)
}

/// Deserializes `count` entries from a contiguous buffer.
pub fn parse_entry_array(buf: &[u8], count: u32) -> Result<Vec<GptPartition>> {
    let byte_len = count as usize * GPT_ENTRY_SIZE;
    if buf.len() < byte_len {
        return Err(GptError::InvalidBufferSize);
    }

    (0..count as usize)
        .map(|i| GptPartition::parse_from_buf(&buf[i * GPT_ENTRY_SIZE..(i + 1) * GPT_ENTRY_SIZE]))
        .collect()
}

/// Serializes an entry array into a contiguous buffer; the buffer may be
/// longer (sector padding) and whatever follows the array stays untouched.
pub fn write_entry_array(entries: &[GptPartition], buf: &mut [u8]) -> Result<()> {
    let byte_len = entries.len() * GPT_ENTRY_SIZE;
    if buf.len() < byte_len {
        return Err(GptError::InvalidBufferSize);
    }

    for (i, entry) in entries.iter().enumerate() {
        entry.write(&mut buf[i * GPT_ENTRY_SIZE..(i + 1) * GPT_ENTRY_SIZE])?;
    }

    Ok(())
}
