//! `qrb` — archive a file into a set of QR code page images, or reconstruct a file from scans of
//! those pages, tolerating a bounded number of missing or unreadable pages.

use std::env;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{TimeZone, Utc};
use qrb_core::pipeline::{decode_images, encode_file, DecodeOutcome, EncodeConfig};
use tracing_subscriber::EnvFilter;

const NAME: &str = "qrb";
const VERSION: &str = "0.1.0";

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(String::as_str);

    let ok = match (mode, args.len()) {
        (Some("--encode") | Some("-e"), 8) => run_encode(&args, None),
        (Some("--encode") | Some("-e"), 9) => run_encode(&args, Some(&args[8])),
        (Some("--decode") | Some("-d"), 4) => run_decode(&args[2], &args[3], None),
        (Some("--decode") | Some("-d"), 5) => run_decode(&args[2], &args[3], Some(&args[4])),
        _ => None,
    };

    match ok {
        Some(true) => ExitCode::SUCCESS,
        Some(false) => ExitCode::FAILURE,
        None => {
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!("Version: {VERSION}\n");
    println!("Usage:\n");
    println!("{NAME} --encode <input_file> <output_dir> <col> <row> <qr_version> <qr_ecc> [<file_ecc>]");
    println!("{NAME} --decode <input_dir>  <output_dir> [<ecc_dir>]");
}

fn run_encode(args: &[String], file_ecc_arg: Option<&String>) -> Option<bool> {
    let input = Path::new(&args[2]);
    let output = Path::new(&args[3]);

    let num_col: i64 = args[4].parse().ok()?;
    let num_row: i64 = args[5].parse().ok()?;
    let qr_version: i64 = args[6].parse().ok()?;
    let qr_ecc: i64 = args[7].parse().ok()?;
    let file_ecc: i64 = match file_ecc_arg {
        Some(s) => s.parse().ok()?,
        None => 0,
    };

    if num_col < 1 || num_row < 1 || !(1..=40).contains(&qr_version) || !(0..=3).contains(&qr_ecc) || !(0..=6).contains(&file_ecc) {
        return Some(false);
    }

    let cfg = EncodeConfig {
        num_col: num_col as u32,
        num_row: num_row as u32,
        qr_version: qr_version as u8,
        qr_ecc: qr_ecc as u8,
        file_ecc: file_ecc as u8,
    };

    let result = encode_file(input, output, cfg, |done, total| {
        let pct = if total > 0 { done as f64 * 100.0 / total as f64 } else { 100.0 };
        print!("\r{pct:.1}%");
        let _ = io::stdout().flush();
    });

    match result {
        Ok(summary) => {
            println!("\r100.0%\n");
            if summary.parity_blocks > 0 {
                println!("Blocks: {} + {}(ECC)", summary.data_blocks, summary.parity_blocks);
            } else {
                println!("Blocks: {}", summary.data_blocks);
            }
            Some(true)
        }
        Err(err) => {
            tracing::error!(%err, "encode failed");
            Some(false)
        }
    }
}

fn run_decode(input_dir: &str, output_dir: &str, ecc_dir: Option<&String>) -> Option<bool> {
    let file_pages = collect_pages(Path::new(input_dir));
    if file_pages.is_empty() {
        return Some(false);
    }
    let ecc_pages = ecc_dir.map(|d| collect_pages(Path::new(d))).unwrap_or_default();

    let result = decode_images(&file_pages, &ecc_pages, Path::new(output_dir), |scanned, total| {
        let pct = if total > 0 { scanned as f64 * 100.0 / total as f64 } else { 100.0 };
        print!("\r{pct:.1}%");
        let _ = io::stdout().flush();
    });

    match result {
        Ok(DecodeOutcome::Complete { size, timestamp, name }) => {
            println!("\r100.0%\n");
            println!("Size:    {size} Bytes");
            println!("Name:    {name}");
            println!("Time:    {}", format_utc(timestamp));
            Some(true)
        }
        Ok(DecodeOutcome::Incomplete { scanned, last_index, missing }) => {
            match last_index {
                Some(last) => println!("Blocks:  {scanned} / {last}"),
                None => println!("Blocks:  {scanned} / ?"),
            }
            if !missing.is_empty() {
                let list: String = missing.iter().map(|i| format!(" [{i}]")).collect();
                print!("Missing:{list}");
                if last_index.is_none() {
                    print!(" and more");
                }
                println!();
            } else if last_index.is_none() {
                println!("Missing: Unknown");
            }
            Some(false)
        }
        Err(err) => {
            tracing::error!(%err, "decode failed");
            Some(false)
        }
    }
}

/// Every page image is named `<page_no>.<ext>`; sorted numerically so pages are scanned in the
/// order they were produced (unordered input otherwise can't affect correctness, only which
/// duplicate copy of a block wins, but a stable order makes runs reproducible).
fn collect_pages(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut pages: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("png")))
        .collect();
    pages.sort_by_key(|p| p.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<u64>().ok()).unwrap_or(u64::MAX));
    pages
}

fn format_utc(timestamp: u32) -> String {
    match Utc.timestamp_opt(timestamp as i64, 0) {
        chrono::LocalResult::Single(dt) => format!("{} UTC", dt.format("%Y-%m-%d %H:%M:%S")),
        _ => "unknown".to_owned(),
    }
}
