//! Builders for the GPT disk images the integration suite runs against.
//!
//! Images are laid out the way common partitioning tools leave them:
//! protective MBR at LBA 0, primary header at LBA 1, entry array at LBA 2,
//! backup entry array and backup header at the end of the disk. All CRCs are
//! produced by the codec under test.

#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

use gptresize::gpt::{self, GptHeader, GptPartition};
use gptresize::{Guid, SECTOR_SIZE};

pub const MIB: u64 = 1024 * 1024;

pub struct PartSpec {
    pub type_guid: Guid,
    pub start: u64,
    pub end: u64,
    pub name: &'static str,
}

pub fn efi(start: u64, end: u64, name: &'static str) -> PartSpec {
    PartSpec {
        type_guid: Guid::EFI_SYSTEM,
        start,
        end,
        name,
    }
}

pub fn linux(start: u64, end: u64, name: &'static str) -> PartSpec {
    PartSpec {
        type_guid: Guid::LINUX_FILESYSTEM,
        start,
        end,
        name,
    }
}

pub fn swap(start: u64, end: u64, name: &'static str) -> PartSpec {
    PartSpec {
        type_guid: Guid::LINUX_SWAP,
        start,
        end,
        name,
    }
}

/// Builds a complete GPT image of `size_bytes` with the given partitions in
/// the first slots.
pub fn build_image(size_bytes: u64, parts: &[PartSpec]) -> Vec<u8> {
    let total_sectors = size_bytes / SECTOR_SIZE as u64;
    let mut img = vec![0u8; size_bytes as usize];

    write_protective_mbr(&mut img, total_sectors);

    let disk_guid: Guid = "6FA81C0A-43A8-4D5D-9E2B-1C0FDA7B2A55".parse().unwrap();
    let mut header = GptHeader::new(disk_guid, total_sectors);

    let mut entries = vec![GptPartition::default(); 128];
    for (i, spec) in parts.iter().enumerate() {
        let mut guid_bytes = [0u8; 16];
        guid_bytes[0] = i as u8 + 1;
        entries[i] = GptPartition::new(
            spec.type_guid,
            Guid::from_bytes(guid_bytes),
            spec.start,
            spec.end,
            spec.name,
        );
    }

    let array_len = 128 * 128;
    let mut array = vec![0u8; array_len];
    gpt::write_entry_array(&entries, &mut array).unwrap();

    header.set_partition_entry_array_crc32(gpt::entry_array_checksum(&entries));
    header.update_checksum();
    header
        .write(&mut img[SECTOR_SIZE..2 * SECTOR_SIZE])
        .unwrap();

    img[2 * SECTOR_SIZE..2 * SECTOR_SIZE + array_len].copy_from_slice(&array);

    // Backup array right before the backup header, backup header at the
    // last LBA.
    let backup_header_off = ((total_sectors - 1) * SECTOR_SIZE as u64) as usize;
    let backup_array_off = backup_header_off - array_len;
    img[backup_array_off..backup_header_off].copy_from_slice(&array);

    let mut backup = header.clone();
    backup.set_my_lba(total_sectors - 1);
    backup.set_alternate_lba(1);
    backup.update_checksum();
    backup
        .write(&mut img[backup_header_off..backup_header_off + SECTOR_SIZE])
        .unwrap();

    img
}

fn write_protective_mbr(img: &mut [u8], total_sectors: u64) {
    let sectors = u32::try_from(total_sectors - 1).unwrap_or(u32::MAX);

    img[446] = 0x00;
    img[447..450].copy_from_slice(&[0x00, 0x02, 0x00]);
    img[450] = 0xee;
    img[451..454].copy_from_slice(&[0xff, 0xff, 0xff]);
    img[454..458].copy_from_slice(&1u32.to_le_bytes());
    img[458..462].copy_from_slice(&sectors.to_le_bytes());
    img[510] = 0x55;
    img[511] = 0xaa;
}

/// Writes an image to a temporary file, keeping the file alive for the
/// duration of the test.
pub fn write_image(img: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(img).unwrap();
    file.flush().unwrap();
    file
}

/// 10 MiB image with an EFI and a Linux partition.
pub fn two_part_image() -> Vec<u8> {
    build_image(
        10 * MIB,
        &[
            efi(34, 1057, "EFI System"),
            linux(2048, 18431, "Linux filesystem"),
        ],
    )
}

/// 50 MiB image with a gap after `root`: EFI, root, swap, home.
pub fn four_part_image() -> Vec<u8> {
    build_image(
        50 * MIB,
        &[
            efi(34, 1057, "EFI System"),
            linux(2048, 10239, "root"),
            swap(15360, 17407, "swap"),
            linux(20480, 98303, "home"),
        ],
    )
}
