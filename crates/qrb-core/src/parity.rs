//! Parity engine: XOR-based single-erasure recovery across fixed-size groups of data blocks.
//! Encode side accumulates each group's blocks into one parity block as they're
//! produced; decode side replays the same XOR against whatever data and parity blocks it managed
//! to scan, recovering at most one missing block per group.

use std::collections::HashSet;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::index::IndexCodec;

/// XORs `src` into `acc` byte-by-byte. `acc` must be at least as long as `src`.
pub fn accumulate(acc: &mut [u8], src: &[u8]) {
    for (a, b) in acc.iter_mut().zip(src) {
        *a ^= *b;
    }
}

/// Attempts to recover every group's single missing block, writing recovered blocks directly into
/// `data`. `data` and `parity` are the reassembled scratch streams (one contiguous blob each, laid
/// out by `IndexCodec::seek_offset`); `data_known`/`parity_known` are the block indices actually
/// scanned so far. `data_known` is updated in place as blocks are recovered.
///
/// `has_last` must be true only once the decoder has confirmed the true final block index (the
/// sentinel-terminated tail block was itself scanned) — without it, a group straddling the file's
/// end can't trust the apparent length of its last member and is left unrecovered.
pub fn repair<S: Read + Write + Seek>(
    data: &mut S,
    parity: &mut S,
    codec: &IndexCodec,
    cap: usize,
    data_known: &mut HashSet<u32>,
    parity_known: &HashSet<u32>,
    has_last: bool,
) -> io::Result<()> {
    let step = codec.step();
    if step == 1 || parity_known.is_empty() {
        return Ok(());
    }
    let Some(&m) = data_known.iter().max() else {
        return Ok(());
    };

    let mut i = 0u32;
    while i <= m {
        let group = codec.group_of(i);
        if !parity_known.contains(&group) {
            i += step;
            continue;
        }

        let start = if i == 0 { 1 } else { i };
        let mut j = start;
        while j - i < step && j <= m {
            if data_known.contains(&j) {
                j += 1;
                continue;
            }

            let len = cap - IndexCodec::index_len(i);
            data.seek(SeekFrom::Start(codec.seek_offset(start, false, cap)))?;
            let mut acc = vec![0u8; len];
            parity.seek(SeekFrom::Start(codec.seek_offset(group, true, cap)))?;
            read_upto(parity, &mut acc)?;

            let mut success = true;
            let mut k = start;
            while k - i < step && k <= m {
                let mut buf = vec![0u8; len];
                let n = read_upto(data, &mut buf)?;
                if k != j {
                    if !data_known.contains(&k) || (k == m && !has_last) {
                        success = false;
                        break;
                    }
                    accumulate(&mut acc[..n], &buf[..n]);
                }
                k += 1;
            }

            if success {
                data.seek(SeekFrom::Start(codec.seek_offset(j, false, cap)))?;
                data.write_all(&acc)?;
                data_known.insert(j);
            }
            break;
        }
        i += step;
    }
    Ok(())
}

/// Like `Read::read_exact`, but tolerates running out of bytes before `buf` fills (the last block
/// in a group may be shorter than every other), returning the number actually read.
fn read_upto<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

#[cfg(test)]
mod should {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn recover_a_single_missing_block_in_a_group() {
        let codec = IndexCodec::new(2); // step = 4
        let cap = 8usize;
        let len = cap - IndexCodec::index_len(0);

        let blocks: Vec<Vec<u8>> = (1..=4).map(|n: u8| vec![n; len]).collect();
        let mut parity_block = vec![0u8; len];
        for b in &blocks {
            accumulate(&mut parity_block, b);
        }

        let mut data_bytes = Vec::new();
        for (n, b) in blocks.iter().enumerate() {
            if n == 1 {
                data_bytes.extend(std::iter::repeat(0u8).take(len)); // block 2 missing
            } else {
                data_bytes.extend_from_slice(b);
            }
        }
        let mut data = Cursor::new(data_bytes);
        let mut parity = Cursor::new(parity_block);

        let mut data_known: HashSet<u32> = [1u32, 3, 4].into_iter().collect();
        let parity_known: HashSet<u32> = [0u32].into_iter().collect();

        repair(&mut data, &mut parity, &codec, cap, &mut data_known, &parity_known, true).unwrap();

        assert!(data_known.contains(&2));
        let recovered = &data.into_inner()[len..2 * len];
        assert_eq!(recovered, blocks[1].as_slice());
    }

    #[test]
    fn leave_a_group_with_two_missing_blocks_unrecovered() {
        let codec = IndexCodec::new(2);
        let cap = 8usize;
        let len = cap - IndexCodec::index_len(0);

        let mut data = Cursor::new(vec![0u8; 4 * len]);
        let mut parity = Cursor::new(vec![0u8; len]);
        let mut data_known: HashSet<u32> = [1u32, 4].into_iter().collect();
        let parity_known: HashSet<u32> = [0u32].into_iter().collect();

        repair(&mut data, &mut parity, &codec, cap, &mut data_known, &parity_known, true).unwrap();

        assert!(!data_known.contains(&2));
        assert!(!data_known.contains(&3));
    }
}
