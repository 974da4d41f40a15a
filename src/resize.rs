//! Validated resizing of a single partition entry.
//!
//! A resize never moves a partition's first sector; only the end moves. The
//! requested end is checked against the constraint set, the header's usable
//! range and every sibling entry before anything is written, so a rejected
//! operation leaves both the context and the disk untouched. A successful
//! operation commits through [`GptContext::save`], resealing the entry array
//! and both headers.

use log::debug;

use crate::context::GptContext;
use crate::device::BlockDevice;
use crate::error::{GptError, Result};
use crate::gpt::GptPartition;
use crate::guid::Guid;
use crate::SECTOR_SIZE;

const SECTORS_PER_MIB: u64 = (1024 * 1024) / SECTOR_SIZE as u64;

/// What to resize a partition to.
///
/// The MiB/GiB helpers are conversions onto [`Sectors`](Self::Sectors) at
/// 512 bytes per sector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeOperation {
    /// Resize to an absolute size in sectors.
    Sectors(u64),
    /// Move the partition's last sector to this LBA, inclusive.
    EndLba(u64),
}

impl ResizeOperation {
    /// A size given in MiB.
    ///
    /// ```
    /// use gptresize::ResizeOperation;
    ///
    /// assert_eq!(ResizeOperation::from_mib(5), ResizeOperation::Sectors(10240));
    /// ```
    pub fn from_mib(mib: u64) -> Self {
        Self::Sectors(mib * SECTORS_PER_MIB)
    }

    /// A size given in GiB.
    pub fn from_gib(gib: u64) -> Self {
        Self::Sectors(gib * 1024 * SECTORS_PER_MIB)
    }
}

/// Policy knobs a resize is validated against.
#[derive(Clone, Debug)]
pub struct ResizeConstraints {
    /// Permit the new size to be smaller than the current one.
    pub allow_shrinking: bool,

    /// Reserved; the engine never moves a partition's first sector.
    pub allow_moving: bool,

    /// Smallest acceptable resulting size, in sectors.
    pub min_size_sectors: u64,

    /// The sector after the new end must be a multiple of this.
    pub alignment_sectors: u64,
}

impl Default for ResizeConstraints {
    fn default() -> Self {
        Self {
            allow_shrinking: false,
            allow_moving: false,
            min_size_sectors: 1,
            alignment_sectors: 1,
        }
    }
}

/// A read-only snapshot of one used entry slot.
#[derive(Clone, Debug)]
pub struct PartitionInfo {
    /// Raw slot index in the entry array.
    pub index: usize,
    /// First sector.
    pub start_lba: u64,
    /// Last sector, inclusive.
    pub end_lba: u64,
    /// Size in sectors.
    pub size_sectors: u64,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Partition type.
    pub type_guid: Guid,
    /// Decoded name.
    pub name: String,
}

impl PartitionInfo {
    fn from_entry(index: usize, entry: &GptPartition) -> Self {
        Self {
            index,
            start_lba: entry.lba_start(),
            end_lba: entry.lba_end(),
            size_sectors: entry.size_sectors(),
            size_bytes: entry.size_bytes(),
            type_guid: entry.type_guid(),
            name: entry.name(),
        }
    }
}

impl<D: BlockDevice> GptContext<D> {
    /// Resizes slot `index` under the default constraints and commits.
    pub fn resize_partition(&mut self, index: usize, op: ResizeOperation) -> Result<()> {
        self.resize_partition_with(index, op, &ResizeConstraints::default())
    }

    /// Resizes slot `index` under `constraints` and commits.
    ///
    /// Validation happens entirely in memory and in this order: the slot
    /// must be used, the resulting size must reach `min_size_sectors`,
    /// shrinking must be permitted if the size goes down, the sector after
    /// the new end must satisfy the alignment, the new end must stay inside
    /// the usable range, and the resulting span must not intersect any other
    /// used entry. Only then is the end LBA updated and the table saved.
    pub fn resize_partition_with(
        &mut self,
        index: usize,
        op: ResizeOperation,
        constraints: &ResizeConstraints,
    ) -> Result<()> {
        let primary = self.primary_header().ok_or(GptError::InvalidState)?;
        let entries = self.entries().ok_or(GptError::InvalidState)?;

        let entry = entries
            .get(index)
            .filter(|entry| entry.is_used())
            .ok_or(GptError::PartitionNotFound(index))?;

        let start = entry.lba_start();
        let cur_size = entry.size_sectors();

        let new_end = match op {
            ResizeOperation::Sectors(0) => return Err(GptError::InvalidSize),
            ResizeOperation::Sectors(sectors) => start
                .checked_add(sectors - 1)
                .ok_or(GptError::NotEnoughSpace)?,
            ResizeOperation::EndLba(end) => end,
        };

        let new_size = if new_end >= start {
            new_end - start + 1
        } else {
            0
        };
        if new_size == 0 || new_size < constraints.min_size_sectors {
            return Err(GptError::InvalidSize);
        }

        if !constraints.allow_shrinking && new_size < cur_size {
            return Err(GptError::WouldShrink);
        }

        if constraints.alignment_sectors > 1 {
            let boundary = new_end.checked_add(1).ok_or(GptError::NotEnoughSpace)?;
            if boundary % constraints.alignment_sectors != 0 {
                return Err(GptError::AlignmentError);
            }
        }

        if new_end > primary.last_usable_lba() {
            return Err(GptError::NotEnoughSpace);
        }

        for (i, other) in entries.iter().enumerate() {
            if i == index || !other.is_used() {
                continue;
            }
            // Closed intervals intersect unless one lies wholly before the other.
            if new_end >= other.lba_start() && start <= other.lba_end() {
                return Err(GptError::OverlapDetected(i));
            }
        }

        debug!("resizing slot {index}: [{start}, {new_end}], {cur_size} -> {new_size} sectors");
        self.get_partition(index)
            .ok_or(GptError::PartitionNotFound(index))?
            .set_lba_end(new_end);

        self.save()
    }

    /// Largest size slot `index` can grow to without moving, in sectors:
    /// up to the next used entry past the current end, or to the end of the
    /// usable range if none follows.
    pub fn max_size(&self, index: usize) -> Result<u64> {
        let primary = self.primary_header().ok_or(GptError::InvalidState)?;
        let entries = self.entries().ok_or(GptError::InvalidState)?;

        let entry = entries
            .get(index)
            .filter(|entry| entry.is_used())
            .ok_or(GptError::PartitionNotFound(index))?;

        let start = entry.lba_start();
        let cur_end = entry.lba_end();

        let next_start = entries
            .iter()
            .enumerate()
            .filter(|(i, other)| *i != index && other.is_used())
            .map(|(_, other)| other.lba_start())
            .filter(|&other_start| other_start > cur_end)
            .min()
            .unwrap_or(primary.last_usable_lba() + 1);

        Ok(next_start.saturating_sub(start))
    }

    /// Grows slot `index` to its maximum contiguous size and commits.
    pub fn resize_to_max(&mut self, index: usize) -> Result<()> {
        let max = self.max_size(index)?;
        if max == 0 {
            return Err(GptError::NotEnoughSpace);
        }

        self.resize_partition(index, ResizeOperation::Sectors(max))
    }

    /// One [`PartitionInfo`] per used slot, in slot order.
    pub fn list_partitions(&self) -> Result<Vec<PartitionInfo>> {
        let entries = self.entries().ok_or(GptError::InvalidState)?;

        Ok(entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_used())
            .map(|(index, entry)| PartitionInfo::from_entry(index, entry))
            .collect())
    }

    /// The snapshot for slot `index`, if the slot is used.
    pub fn get_partition_info(&self, index: usize) -> Option<PartitionInfo> {
        let entry = self.entries()?.get(index)?;
        entry
            .is_used()
            .then(|| PartitionInfo::from_entry(index, entry))
    }

    /// Zeroes slot `index` and commits, resealing the array CRC and both
    /// headers.
    pub fn remove_partition(&mut self, index: usize) -> Result<()> {
        if !self.is_loaded() {
            return Err(GptError::InvalidState);
        }

        match self.get_partition(index) {
            Some(entry) => *entry = GptPartition::default(),
            None => return Err(GptError::PartitionNotFound(index)),
        }

        debug!("removing partition in slot {index}");
        self.save()
    }
}
