//! Pipeline driver: the encode loop that frames a file into indexed, optionally
//! parity-protected QR pages, and the decode loop that scans a set of page images back into a
//! file, repairing single-block erasures per parity group before declaring victory.

use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::framer::{DecodeFramer, EncodeFramer};
use crate::index::{self, IndexCodec};
use crate::page::{self, PageLayout};
use crate::parity::accumulate;

use qr_image::QrParams;

#[derive(Debug, Clone, Copy)]
pub struct EncodeConfig {
    pub num_col: u32,
    pub num_row: u32,
    pub qr_version: u8,
    pub qr_ecc: u8,
    pub file_ecc: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct EncodeSummary {
    pub data_blocks: u32,
    pub parity_blocks: u32,
}

/// Encodes `input` into a directory of page PNGs under `output_dir/file` (and, when
/// `file_ecc != 0`, parity pages under `output_dir/ecc`). `on_progress(done, total)` is called
/// once per block, in bytes of the framed stream, so a caller can surface a live progress meter.
pub fn encode_file(input: &Path, output_dir: &Path, cfg: EncodeConfig, mut on_progress: impl FnMut(u64, u64)) -> Result<EncodeSummary, ConfigError> {
    if cfg.num_col == 0 || cfg.num_row == 0 {
        return Err(ConfigError::InvalidGrid);
    }
    if cfg.qr_version < 1 || cfg.qr_version > 40 {
        return Err(ConfigError::InvalidQrVersion);
    }
    if cfg.qr_ecc > 3 {
        return Err(ConfigError::InvalidQrEcc);
    }
    if cfg.file_ecc > 6 {
        return Err(ConfigError::InvalidFileEcc);
    }

    let params = QrParams::new(cfg.qr_version, cfg.qr_ecc)?;
    let layout = PageLayout::new(cfg.num_col, cfg.num_row);
    let codec = IndexCodec::new(cfg.file_ecc);
    let page_cap = layout.cap();
    if page_cap as u32 > index::MAX {
        return Err(ConfigError::PageExceedsIndex { page_cap, max: index::MAX });
    }

    let mut framer = EncodeFramer::new(input, params.cap, &codec)?;
    info!(total = framer.total(), "encoding");

    let file_dir = output_dir.join("file");
    let ecc_dir = output_dir.join("ecc");
    fs::create_dir_all(&file_dir)?;
    fs::create_dir_all(&ecc_dir)?;

    let use_ecc = codec.step() != 1;
    let page_bytes = page_cap * params.cap;

    let mut file_page_buf: Vec<u8> = Vec::with_capacity(page_bytes);
    let mut ecc_page_buf: Vec<u8> = Vec::with_capacity(page_bytes);
    let mut ecc_acc = vec![0u8; params.cap];
    let mut ecc_acc_width = params.cap;

    let mut data_index: u32 = 1;
    let mut parity_blocks_written: u32 = 0;
    let mut file_page_no: u32 = 1;
    let mut ecc_page_no: u32 = 1;
    let mut stop = false;

    while !stop {
        let own_idx_len = IndexCodec::index_len(data_index);
        let mut payload_len = params.cap - own_idx_len;

        let flag_len = IndexCodec::index_len(0);
        let mut block = Vec::with_capacity(params.cap);

        let is_terminal = flag_len as u64 + framer.remain() <= payload_len as u64;
        if is_terminal {
            let mut flag = [0u8; index::MAX_LEN as usize];
            let n = codec.encode(0, false, &mut flag);
            block.extend_from_slice(&flag[..n]);
            payload_len -= n;
            stop = true;
        }

        let mut idx_bytes = [0u8; index::MAX_LEN as usize];
        let n = codec.encode(data_index, false, &mut idx_bytes);
        block.extend_from_slice(&idx_bytes[..n]);

        let mut payload = vec![0u8; payload_len];
        let read = framer.read_into(&mut payload)?;
        block.extend_from_slice(&payload[..read]);

        if use_ecc {
            if data_index % codec.step() == 0 || data_index == 1 {
                let group_start = if data_index == 1 { 1 } else { data_index };
                ecc_acc_width = params.cap - IndexCodec::index_len(group_start);
                ecc_acc.iter_mut().for_each(|b| *b = 0);
            }
            let width = ecc_acc_width.min(read);
            accumulate(&mut ecc_acc[..width], &payload[..width]);

            if (data_index + 1) % codec.step() == 0 || stop {
                let group = codec.group_of(data_index);
                let mut pbuf = [0u8; index::MAX_LEN as usize];
                let pn = codec.encode(group, true, &mut pbuf);
                ecc_page_buf.extend_from_slice(&pbuf[..pn]);
                ecc_page_buf.extend_from_slice(&ecc_acc[..ecc_acc_width]);
                parity_blocks_written += 1;

                if ecc_page_buf.len() >= page_bytes || stop {
                    save_page(&layout, &ecc_page_buf, &params, &ecc_dir, ecc_page_no)?;
                    ecc_page_buf.clear();
                    ecc_page_no += 1;
                }
            }
        }

        file_page_buf.extend_from_slice(&block);
        if file_page_buf.len() >= page_bytes || stop {
            save_page(&layout, &file_page_buf, &params, &file_dir, file_page_no)?;
            file_page_buf.clear();
            file_page_no += 1;
        }

        let done = framer.total() - framer.remain();
        debug!(block = data_index, progress = done as f64 / framer.total() as f64, "encode");
        on_progress(done, framer.total());
        data_index += 1;
    }

    Ok(EncodeSummary { data_blocks: data_index - 1, parity_blocks: parity_blocks_written })
}

fn save_page(layout: &PageLayout, buf: &[u8], params: &QrParams, dir: &Path, page_no: u32) -> Result<(), ConfigError> {
    let page = layout.encode(buf, params);
    let path = dir.join(format!("{page_no}.png"));
    page.save(&path)?;
    Ok(())
}

#[derive(Debug)]
pub enum DecodeOutcome {
    Complete { size: u64, timestamp: u32, name: String },
    Incomplete { scanned: usize, last_index: Option<u32>, missing: Vec<u32> },
}

/// Scans `file_pages` (and, if present, `ecc_pages`) and reassembles the original file under
/// `output_dir`. Every page is decoded independently (order doesn't matter beyond determining
/// which blocks get de-duplicated first); parity repair runs once, after every page has been
/// scanned. `on_progress(pages_scanned, total_pages)` is called once per page.
pub fn decode_images(
    file_pages: &[PathBuf],
    ecc_pages: &[PathBuf],
    output_dir: &Path,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<DecodeOutcome, ConfigError> {
    let mut framer = DecodeFramer::new(output_dir)?;
    let mut codec = IndexCodec::new(0);
    let mut known: Option<QrParams> = None;
    let mut last_index: Option<u32> = None;

    let total_pages = file_pages.len() + ecc_pages.len();
    let passes = file_pages.iter().map(|p| (p, false)).chain(ecc_pages.iter().map(|p| (p, true)));
    for (page_no, (path, is_parity)) in passes.enumerate() {
        let image = load_gray(path)?;
        let hits = page::decode_page(&image, &mut known);
        debug!(path = %path.display(), hits = hits.len(), "scanned page");
        on_progress(page_no + 1, total_pages);

        for (payload, _rect) in hits {
            let Some((idx, len)) = codec.decode(&payload, is_parity) else { continue };
            if len == 0 {
                continue;
            }
            if !is_parity {
                if let Some(last) = last_index {
                    if idx > last {
                        continue;
                    }
                }
            }
            if is_parity {
                if framer.parity_known.contains(&idx) {
                    continue;
                }
            } else if framer.data_known.contains(&idx) {
                continue;
            }

            let Some(params) = known else { continue };
            if payload.len() == len || ((is_parity || idx != 0) && payload.len() != params.cap) {
                continue;
            }

            let mut offset = len;
            let mut write_idx = idx;

            if idx == 0 && last_index.is_none() && !is_parity {
                let Some((real_idx, real_len)) = codec.decode(&payload[offset..], false) else { continue };
                if real_len == 0 || framer.data_known.contains(&real_idx) || real_idx == 0 {
                    continue;
                }
                last_index = Some(real_idx);
                offset += real_len;
                write_idx = real_idx;
            }

            framer.write_block(&payload, offset, write_idx, is_parity, &codec, params.cap)?;
        }
    }

    if let Some(params) = known {
        framer.repair(&codec, params.cap, last_index.is_some())?;
    }

    let scanned = framer.data_known.len();
    match last_index {
        Some(last) if scanned as u32 == last => {}
        _ => {
            let missing = match last_index {
                Some(last) => (1..=last).filter(|i| !framer.data_known.contains(i)).collect(),
                None => Vec::new(),
            };
            warn!(scanned, ?last_index, missing = missing.len(), "decode incomplete");
            return Ok(DecodeOutcome::Incomplete { scanned, last_index, missing });
        }
    }

    match framer.finalize()? {
        Some((size, timestamp, name)) => Ok(DecodeOutcome::Complete { size, timestamp, name }),
        None => Ok(DecodeOutcome::Incomplete { scanned, last_index, missing: Vec::new() }),
    }
}

fn load_gray(path: &Path) -> Result<GrayImage, ConfigError> {
    Ok(image::open(path)?.to_luma8())
}

#[cfg(test)]
mod should {
    use super::*;
    use std::fs;

    fn work_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("qrb-pipeline-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sorted_pages(dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(dir) else { return Vec::new() };
        let mut pages: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        pages.sort_by_key(|p| p.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<u64>().ok()).unwrap_or(u64::MAX));
        pages
    }

    #[test]
    fn round_trip_a_small_file_without_parity() {
        let work = work_dir("roundtrip");
        let input = work.join("hello.txt");
        fs::write(&input, b"HelloWorld").unwrap();

        let out = work.join("out");
        let cfg = EncodeConfig { num_col: 1, num_row: 1, qr_version: 5, qr_ecc: 0, file_ecc: 0 };
        let summary = encode_file(&input, &out, cfg, |_, _| {}).unwrap();
        assert!(summary.data_blocks >= 1);
        assert_eq!(summary.parity_blocks, 0);

        let file_pages = sorted_pages(&out.join("file"));
        assert!(!file_pages.is_empty());

        let decode_out = work.join("decoded");
        match decode_images(&file_pages, &[], &decode_out, |_, _| {}).unwrap() {
            DecodeOutcome::Complete { size, name, .. } => {
                assert_eq!(size, 10);
                assert_eq!(name, "hello.txt");
                let content = fs::read(decode_out.join("hello.txt")).unwrap();
                assert_eq!(content, b"HelloWorld");
            }
            other => panic!("expected a complete decode, got {other:?}"),
        }

        fs::remove_dir_all(&work).ok();
    }

    #[test]
    fn recover_a_deleted_page_via_parity() {
        let work = work_dir("parity");
        let input = work.join("payload.bin");
        let body: Vec<u8> = (0u8..=255).cycle().take(300).collect();
        fs::write(&input, &body).unwrap();

        let out = work.join("out");
        let cfg = EncodeConfig { num_col: 1, num_row: 1, qr_version: 1, qr_ecc: 0, file_ecc: 1 };
        let summary = encode_file(&input, &out, cfg, |_, _| {}).unwrap();
        assert!(summary.parity_blocks > 0);

        let mut file_pages = sorted_pages(&out.join("file"));
        assert!(file_pages.len() >= 3, "need enough blocks to exercise parity recovery");
        let victim = file_pages.len() - 2;
        let removed = file_pages.remove(victim);
        fs::remove_file(&removed).unwrap();

        let ecc_pages = sorted_pages(&out.join("ecc"));

        let decode_out = work.join("decoded");
        match decode_images(&file_pages, &ecc_pages, &decode_out, |_, _| {}).unwrap() {
            DecodeOutcome::Complete { size, .. } => {
                let content = fs::read(decode_out.join("payload.bin")).unwrap();
                assert_eq!(content, body);
                assert_eq!(size as usize, body.len());
            }
            other => panic!("expected parity to reconstruct the missing block, got {other:?}"),
        }

        fs::remove_dir_all(&work).ok();
    }

    #[test]
    fn report_incomplete_without_crashing_when_only_parity_pages_are_scanned() {
        let work = work_dir("parity-only");
        let input = work.join("payload.bin");
        let body: Vec<u8> = (0u8..=255).cycle().take(300).collect();
        fs::write(&input, &body).unwrap();

        let out = work.join("out");
        let cfg = EncodeConfig { num_col: 1, num_row: 1, qr_version: 1, qr_ecc: 0, file_ecc: 1 };
        encode_file(&input, &out, cfg, |_, _| {}).unwrap();

        let ecc_pages = sorted_pages(&out.join("ecc"));
        assert!(!ecc_pages.is_empty());

        let decode_out = work.join("decoded");
        match decode_images(&[], &ecc_pages, &decode_out, |_, _| {}).unwrap() {
            DecodeOutcome::Incomplete { scanned, .. } => assert_eq!(scanned, 0),
            other => panic!("expected an incomplete decode, got {other:?}"),
        }

        fs::remove_dir_all(&work).ok();
    }

    #[test]
    fn reject_an_invalid_grid_configuration() {
        let work = work_dir("bad-config");
        let input = work.join("x.bin");
        fs::write(&input, b"x").unwrap();
        let out = work.join("out");

        let cfg = EncodeConfig { num_col: 0, num_row: 1, qr_version: 5, qr_ecc: 0, file_ecc: 0 };
        let err = encode_file(&input, &out, cfg, |_, _| {}).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGrid));

        fs::remove_dir_all(&work).ok();
    }
}
