//! Loading and validation against generated disk images.

mod common;

use gptresize::{GptContext, GptError};

use common::{two_part_image, write_image};

#[test]
fn load_lists_both_partitions() {
    let file = write_image(&two_part_image());

    let mut ctx = GptContext::open(file.path()).unwrap();
    ctx.load().unwrap();

    let parts = ctx.list_partitions().unwrap();
    assert_eq!(parts.len(), 2);

    assert_eq!(parts[0].index, 0);
    assert_eq!(parts[0].start_lba, 34);
    assert_eq!(parts[0].end_lba, 1057);
    assert_eq!(parts[0].size_sectors, 1024);
    assert_eq!(parts[0].name, "EFI System");

    assert_eq!(parts[1].index, 1);
    assert_eq!(parts[1].start_lba, 2048);
    assert_eq!(parts[1].end_lba, 18431);
    assert_eq!(parts[1].size_bytes, 16384 * 512);
    assert_eq!(parts[1].name, "Linux filesystem");
}

#[test]
fn backup_header_mirrors_the_primary() {
    let file = write_image(&two_part_image());
    let total_sectors = (10 * common::MIB) / 512;

    let mut ctx = GptContext::open(file.path()).unwrap();
    ctx.load_primary_header().unwrap();
    ctx.load_backup_header().unwrap();

    let primary = ctx.primary_header().unwrap();
    let backup = ctx.backup_header().unwrap();
    assert_eq!(primary.my_lba(), 1);
    assert_eq!(primary.alternate_lba(), total_sectors - 1);
    assert_eq!(backup.my_lba(), total_sectors - 1);
    assert_eq!(backup.alternate_lba(), 1);
    assert_eq!(backup.disk_guid(), primary.disk_guid());
    assert_eq!(
        backup.partition_entry_array_crc32(),
        primary.partition_entry_array_crc32()
    );
}

#[test]
fn corrupted_header_byte_fails_crc() {
    let mut img = two_part_image();
    img[528] ^= 0x01;
    let file = write_image(&img);

    let mut ctx = GptContext::open(file.path()).unwrap();
    assert!(matches!(ctx.load(), Err(GptError::InvalidCrc32 { .. })));
}

#[test]
fn flipped_signature_byte_is_rejected() {
    let mut img = two_part_image();
    img[512] ^= 0x01;
    let file = write_image(&img);

    let mut ctx = GptContext::open(file.path()).unwrap();
    assert!(matches!(ctx.load(), Err(GptError::InvalidSignature)));
}

#[test]
fn corrupted_entry_array_fails_crc() {
    let mut img = two_part_image();
    // First byte of the entry array at LBA 2.
    img[1024] ^= 0x01;
    let file = write_image(&img);

    let mut ctx = GptContext::open(file.path()).unwrap();
    assert!(matches!(ctx.load(), Err(GptError::InvalidCrc32 { .. })));
    assert!(!ctx.is_loaded());
}

#[test]
fn load_is_idempotent() {
    let file = write_image(&two_part_image());

    let mut ctx = GptContext::open(file.path()).unwrap();
    ctx.load().unwrap();
    let first: Vec<_> = ctx
        .list_partitions()
        .unwrap()
        .into_iter()
        .map(|p| (p.index, p.start_lba, p.end_lba, p.name))
        .collect();
    let first_crc = ctx.primary_header().unwrap().header_crc32();

    ctx.load().unwrap();
    let second: Vec<_> = ctx
        .list_partitions()
        .unwrap()
        .into_iter()
        .map(|p| (p.index, p.start_lba, p.end_lba, p.name))
        .collect();

    assert_eq!(first, second);
    assert_eq!(ctx.primary_header().unwrap().header_crc32(), first_crc);
}

#[test]
fn save_then_fresh_load_verifies_all_crcs() {
    let file = write_image(&two_part_image());

    let mut ctx = GptContext::open(file.path()).unwrap();
    ctx.load().unwrap();
    ctx.save().unwrap();
    drop(ctx);

    let mut ctx = GptContext::open(file.path()).unwrap();
    ctx.load().unwrap();
    ctx.load_backup_header().unwrap();

    ctx.primary_header().unwrap().check_validity().unwrap();
    ctx.backup_header().unwrap().check_validity().unwrap();
    assert_eq!(ctx.list_partitions().unwrap().len(), 2);
}

#[test]
fn find_partition_by_name_scans_used_slots() {
    let file = write_image(&two_part_image());

    let mut ctx = GptContext::open(file.path()).unwrap();
    ctx.load().unwrap();

    assert_eq!(ctx.find_partition_by_name("Linux filesystem"), Some(1));
    assert_eq!(ctx.find_partition_by_name("EFI System"), Some(0));
    assert_eq!(ctx.find_partition_by_name("missing"), None);
}

#[test]
fn get_partition_respects_emptiness_and_bounds() {
    let file = write_image(&two_part_image());

    let mut ctx = GptContext::open(file.path()).unwrap();
    ctx.load().unwrap();

    assert!(ctx.get_partition(0).is_some());
    assert!(ctx.get_partition(2).is_none());
    assert!(ctx.get_partition(127).is_none());
    assert!(ctx.get_partition(128).is_none());
}

#[test]
fn opening_a_missing_path_reports_no_device() {
    assert!(matches!(
        GptContext::open("/nonexistent/disk.img"),
        Err(GptError::NoDevice)
    ));
}
