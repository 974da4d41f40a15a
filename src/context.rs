//! Loading, validating and rewriting a partition table through a device.
//!
//! A [`GptContext`] exclusively owns its device handle, the two headers and
//! the in-memory entry array. Nothing is trusted before it validates:
//! a loaded primary header implies its signature and CRC checked out, loaded
//! entries imply the array CRC matched the primary header. Contexts are not
//! safe for concurrent use; callers serialize externally.

use std::path::Path;

use log::{debug, warn};

use crate::device::{BlockDevice, FileDevice};
use crate::error::{GptError, Result};
use crate::gpt::{self, GptHeader, GptPartition, GPT_PRIMARY_LBA};
use crate::SECTOR_SIZE;

/// An opened device together with whatever parts of its GPT have been
/// loaded and validated so far.
pub struct GptContext<D> {
    device: D,
    byte_len: u64,
    primary: Option<GptHeader>,
    backup: Option<GptHeader>,
    entries: Option<Vec<GptPartition>>,
}

impl GptContext<FileDevice> {
    /// Opens the device or image at `path` read-write.
    ///
    /// ```no_run
    /// use gptresize::GptContext;
    ///
    /// let mut ctx = GptContext::open("/tmp/disk.img")?;
    /// ctx.load()?;
    /// # Ok::<(), gptresize::GptError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_device(FileDevice::open(path)?)
    }
}

impl<D: BlockDevice> GptContext<D> {
    /// Wraps an already-open device.
    pub fn from_device(mut device: D) -> Result<Self> {
        let byte_len = device.byte_len()?;

        Ok(Self {
            device,
            byte_len,
            primary: None,
            backup: None,
            entries: None,
        })
    }

    /// Length of the device in bytes.
    pub fn device_len(&self) -> u64 {
        self.byte_len
    }

    /// Number of whole sectors on the device.
    pub fn sector_count(&self) -> u64 {
        self.byte_len / SECTOR_SIZE as u64
    }

    /// The validated primary header, if loaded.
    pub fn primary_header(&self) -> Option<&GptHeader> {
        self.primary.as_ref()
    }

    /// The validated backup header, if loaded.
    pub fn backup_header(&self) -> Option<&GptHeader> {
        self.backup.as_ref()
    }

    /// The loaded entry array.
    pub fn entries(&self) -> Option<&[GptPartition]> {
        self.entries.as_deref()
    }

    /// `true` once both the primary header and the entry array are loaded.
    pub fn is_loaded(&self) -> bool {
        self.primary.is_some() && self.entries.is_some()
    }

    /// Reads and validates the primary header at LBA 1.
    pub fn load_primary_header(&mut self) -> Result<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.device.read_sector(GPT_PRIMARY_LBA, &mut sector)?;

        let header = GptHeader::parse_from_buf(&sector).inspect_err(|err| {
            warn!("primary header at LBA {GPT_PRIMARY_LBA} rejected: {err}");
        })?;

        if header.my_lba() != GPT_PRIMARY_LBA {
            return Err(GptError::InvalidLbaRange);
        }

        debug!(
            "primary header loaded: disk {}, usable [{}, {}]",
            header.disk_guid(),
            header.first_usable_lba(),
            header.last_usable_lba()
        );
        self.primary = Some(header);

        Ok(())
    }

    /// Reads and validates the backup header at the primary's alternate LBA.
    pub fn load_backup_header(&mut self) -> Result<()> {
        let primary = self.primary.as_ref().ok_or(GptError::InvalidState)?;
        let backup_lba = primary.alternate_lba();

        let mut sector = [0u8; SECTOR_SIZE];
        self.device.read_sector(backup_lba, &mut sector)?;

        let header = GptHeader::parse_from_buf(&sector).inspect_err(|err| {
            warn!("backup header at LBA {backup_lba} rejected: {err}");
        })?;

        if header.my_lba() != backup_lba || header.alternate_lba() != GPT_PRIMARY_LBA {
            return Err(GptError::InvalidLbaRange);
        }

        debug!("backup header loaded from LBA {backup_lba}");
        self.backup = Some(header);

        Ok(())
    }

    /// Reads the entry array referenced by the primary header and validates
    /// its CRC. A no-op when the array is already loaded.
    pub fn load_entry_array(&mut self) -> Result<()> {
        if self.entries.is_some() {
            return Ok(());
        }
        let primary = self.primary.as_ref().ok_or(GptError::InvalidState)?;

        let buf = read_sectors(
            &mut self.device,
            primary.partition_entry_lba(),
            primary.entry_array_sector_count(),
        )?;

        let byte_len = primary.entry_array_byte_len() as usize;
        let computed = crc32fast::hash(&buf[..byte_len]);
        let stored = primary.partition_entry_array_crc32();
        if computed != stored {
            warn!("entry array CRC mismatch: stored {stored:#010x}, computed {computed:#010x}");
            return Err(GptError::InvalidCrc32 { stored, computed });
        }

        let entries = gpt::parse_entry_array(&buf, primary.num_partition_entries())?;
        debug!(
            "entry array loaded: {} slots, {} used",
            entries.len(),
            entries.iter().filter(|e| e.is_used()).count()
        );
        self.entries = Some(entries);

        Ok(())
    }

    /// Loads the primary header, then the entry array.
    pub fn load(&mut self) -> Result<()> {
        self.load_primary_header()?;
        self.load_entry_array()
    }

    /// Serializes the entry array to its on-disk location and refreshes the
    /// primary header's array CRC in memory.
    pub fn write_entry_array(&mut self) -> Result<()> {
        let primary = self.primary.as_mut().ok_or(GptError::InvalidState)?;
        let entries = self.entries.as_ref().ok_or(GptError::InvalidState)?;

        let sector_count = primary.entry_array_sector_count();
        let mut buf = vec![0u8; (sector_count * SECTOR_SIZE as u64) as usize];
        gpt::write_entry_array(entries, &mut buf)?;

        write_sectors(
            &mut self.device,
            primary.partition_entry_lba(),
            sector_count,
            &buf,
        )?;

        primary.set_partition_entry_array_crc32(gpt::entry_array_checksum(entries));
        debug!("entry array written: {sector_count} sectors");

        Ok(())
    }

    /// Reseals and writes the primary header at LBA 1.
    pub fn write_primary_header(&mut self) -> Result<()> {
        let primary = self.primary.as_mut().ok_or(GptError::InvalidState)?;
        primary.update_checksum();

        let mut sector = [0u8; SECTOR_SIZE];
        primary.write(&mut sector)?;
        self.device.write_sector(GPT_PRIMARY_LBA, &sector)?;
        debug!("primary header written");

        Ok(())
    }

    /// Synthesizes the backup header from the primary (locations swapped,
    /// checksum resealed) and writes it at the alternate LBA.
    ///
    /// Only the header is mirrored; the single entry-array copy at the
    /// primary location stays authoritative for both headers.
    pub fn write_backup_header(&mut self) -> Result<()> {
        let primary = self.primary.as_ref().ok_or(GptError::InvalidState)?;

        let mut backup = primary.clone();
        backup.set_my_lba(primary.alternate_lba());
        backup.set_alternate_lba(GPT_PRIMARY_LBA);
        backup.update_checksum();

        let mut sector = [0u8; SECTOR_SIZE];
        backup.write(&mut sector)?;
        self.device.write_sector(backup.my_lba(), &sector)?;
        debug!("backup header written at LBA {}", backup.my_lba());
        self.backup = Some(backup);

        Ok(())
    }

    /// Commits the table: entry array, primary header, backup header, flush.
    ///
    /// The ordering bounds the damage of an interruption. A crash after the
    /// array write leaves a primary header whose array CRC no longer
    /// matches, which the next load reports as [`GptError::InvalidCrc32`];
    /// a crash between the header writes leaves two individually valid
    /// headers describing different tables.
    pub fn save(&mut self) -> Result<()> {
        self.write_entry_array()?;
        self.write_primary_header()?;
        self.write_backup_header()?;
        self.device.flush()?;
        debug!("table saved");

        Ok(())
    }

    /// Mutable access to the entry in slot `index`, if the slot is used.
    ///
    /// The handle stays valid until the next load; whoever mutates it is
    /// responsible for committing through [`save`](Self::save).
    pub fn get_partition(&mut self, index: usize) -> Option<&mut GptPartition> {
        let entry = self.entries.as_mut()?.get_mut(index)?;
        if entry.is_used() {
            Some(entry)
        } else {
            None
        }
    }

    /// Slot index of the first used entry whose decoded name equals `name`.
    pub fn find_partition_by_name(&self, name: &str) -> Option<usize> {
        self.entries
            .as_ref()?
            .iter()
            .position(|entry| entry.is_used() && entry.name() == name)
    }
}

fn read_sectors<D: BlockDevice>(device: &mut D, first_lba: u64, count: u64) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; (count * SECTOR_SIZE as u64) as usize];
    for (i, chunk) in buf.chunks_exact_mut(SECTOR_SIZE).enumerate() {
        device.read_sector(first_lba + i as u64, chunk)?;
    }

    Ok(buf)
}

fn write_sectors<D: BlockDevice>(
    device: &mut D,
    first_lba: u64,
    count: u64,
    buf: &[u8],
) -> Result<()> {
    if buf.len() as u64 != count * SECTOR_SIZE as u64 {
        return Err(GptError::InvalidBufferSize);
    }
    for (i, chunk) in buf.chunks_exact(SECTOR_SIZE).enumerate() {
        device.write_sector(first_lba + i as u64, chunk)?;
    }

    Ok(())
}
