//! Sector-granular access to disks and disk images.
//!
//! The device seam is the std I/O traits: anything `Read + Write + Seek`
//! acts as a [`BlockDevice`], which covers regular files, raw block devices
//! and in-memory cursors alike. The adapter never retries; every failure is
//! surfaced to the caller mapped onto the crate's error kinds.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{GptError, Result};
use crate::SECTOR_SIZE;

/// Whole-sector I/O against a disk or disk image.
///
/// All reads and writes move exactly one 512-byte sector; buffers of any
/// other length fail with [`GptError::InvalidBufferSize`].
pub trait BlockDevice {
    /// Total length of the device in bytes.
    fn byte_len(&mut self) -> Result<u64>;

    /// Reads the sector at `lba` into `buf`.
    fn read_sector(&mut self, lba: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf` to the sector at `lba`.
    fn write_sector(&mut self, lba: u64, buf: &[u8]) -> Result<()>;

    /// Forces durability of all prior writes.
    fn flush(&mut self) -> Result<()>;
}

impl<T: Read + Write + Seek> BlockDevice for T {
    fn byte_len(&mut self) -> Result<u64> {
        Ok(self.seek(SeekFrom::End(0))?)
    }

    fn read_sector(&mut self, lba: u64, buf: &mut [u8]) -> Result<()> {
        if buf.len() != SECTOR_SIZE {
            return Err(GptError::InvalidBufferSize);
        }

        self.seek(SeekFrom::Start(sector_offset(lba)?))?;
        self.read_exact(buf)?;

        Ok(())
    }

    fn write_sector(&mut self, lba: u64, buf: &[u8]) -> Result<()> {
        if buf.len() != SECTOR_SIZE {
            return Err(GptError::InvalidBufferSize);
        }

        self.seek(SeekFrom::Start(sector_offset(lba)?))?;
        self.write_all(buf)?;

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Write::flush(self)?;
        Ok(())
    }
}

fn sector_offset(lba: u64) -> Result<u64> {
    lba.checked_mul(SECTOR_SIZE as u64)
        .ok_or(GptError::InvalidLbaRange)
}

/// A disk or image opened by path.
///
/// A thin wrapper over [`File`] whose [`Write::flush`] also syncs the file
/// to its storage, so flushing through [`BlockDevice`] makes a completed
/// [`save`](crate::GptContext::save) durable.
pub struct FileDevice {
    file: File,
}

impl FileDevice {
    /// Opens the device or image at `path` for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    /// Consumes the device, returning the underlying file.
    pub fn into_inner(self) -> File {
        self.file
    }
}

impl Read for FileDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for FileDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.file)?;
        self.file.sync_all()
    }
}

impl Seek for FileDevice {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
