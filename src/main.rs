//! Command-line front-end for inspecting and resizing GPT partition tables.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use gptresize::{GptContext, PartitionInfo, ResizeOperation, Result};

#[derive(Parser, Debug)]
#[command(name = "gptresize", about = "Inspect and resize GPT partition tables", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the partitions of a device or disk image
    List { device: PathBuf },
    /// Show details for one partition slot
    Info { device: PathBuf, slot: usize },
    /// Resize a partition to the given size in MiB
    Resize {
        device: PathBuf,
        slot: usize,
        size_mib: u64,
    },
    /// Grow a partition to the maximum contiguous size
    ResizeMax { device: PathBuf, slot: usize },
    /// Zero a partition slot
    Remove { device: PathBuf, slot: usize },
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::FAILURE,
            };
            let _ = err.print();
            return code;
        }
    };

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::List { device } => list(&device),
        Commands::Info { device, slot } => info(&device, slot),
        Commands::Resize {
            device,
            slot,
            size_mib,
        } => resize(&device, slot, ResizeOperation::from_mib(size_mib)),
        Commands::ResizeMax { device, slot } => resize_max(&device, slot),
        Commands::Remove { device, slot } => remove(&device, slot),
    }
}

fn load(path: &Path) -> Result<GptContext<gptresize::FileDevice>> {
    let mut ctx = GptContext::open(path)?;
    ctx.load()?;
    Ok(ctx)
}

fn list(path: &Path) -> Result<()> {
    let ctx = load(path)?;

    if let Some(header) = ctx.primary_header() {
        println!(
            "disk {}: {} sectors, usable [{}, {}]",
            header.disk_guid(),
            ctx.sector_count(),
            header.first_usable_lba(),
            header.last_usable_lba()
        );
    }

    println!(
        "{:>4}  {:>12}  {:>12}  {:>10}  name",
        "slot", "start", "end", "size"
    );
    for part in ctx.list_partitions()? {
        println!(
            "{:>4}  {:>12}  {:>12}  {:>10}  {}",
            part.index,
            part.start_lba,
            part.end_lba,
            format_size(part.size_bytes),
            part.name
        );
    }

    Ok(())
}

fn info(path: &Path, slot: usize) -> Result<()> {
    let ctx = load(path)?;

    match ctx.get_partition_info(slot) {
        Some(part) => print_info(&part),
        None => println!("partition {slot}: not found"),
    }

    Ok(())
}

fn print_info(part: &PartitionInfo) {
    println!("slot:      {}", part.index);
    println!("type:      {}", part.type_guid);
    println!("start LBA: {}", part.start_lba);
    println!("end LBA:   {}", part.end_lba);
    println!(
        "size:      {} sectors ({})",
        part.size_sectors,
        format_size(part.size_bytes)
    );
    println!("name:      {}", part.name);
}

fn resize(path: &Path, slot: usize, op: ResizeOperation) -> Result<()> {
    let mut ctx = load(path)?;
    ctx.resize_partition(slot, op)?;

    report(&ctx, slot, "resized");
    Ok(())
}

fn resize_max(path: &Path, slot: usize) -> Result<()> {
    let mut ctx = load(path)?;
    ctx.resize_to_max(slot)?;

    report(&ctx, slot, "grown");
    Ok(())
}

fn remove(path: &Path, slot: usize) -> Result<()> {
    let mut ctx = load(path)?;
    ctx.remove_partition(slot)?;

    println!("partition {slot} removed");
    Ok(())
}

fn report(ctx: &GptContext<gptresize::FileDevice>, slot: usize, verb: &str) {
    if let Some(part) = ctx.get_partition_info(slot) {
        println!(
            "partition {slot} {verb} to [{}, {}] ({})",
            part.start_lba,
            part.end_lba,
            format_size(part.size_bytes)
        );
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
