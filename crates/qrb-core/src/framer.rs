//! File framer: turns one on-disk file into the logical `file bytes ++ reversed trailer` stream an
//! encode pipeline pulls fixed-size chunks from, and turns a decode pipeline's scattered block
//! writes back into one reassembled file plus the recovered name/timestamp.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::index::IndexCodec;
use crate::parity;
use crate::trailer::{self, Trailer};

/// Reads one input file as a seamless stream of `file bytes` followed by the wire-order trailer,
/// tracking how many bytes remain so the pipeline knows when to emit the terminal block.
pub struct EncodeFramer {
    reader: File,
    file_len: u64,
    file_pos: u64,
    trailer_wire: Vec<u8>,
    trailer_pos: usize,
    total: u64,
    remain: u64,
}

impl EncodeFramer {
    /// `cap` is the per-block payload capacity (QR capacity minus the data-block index prefix);
    /// `codec` must already carry the file ECC level chosen for this run.
    pub fn new(input_path: &Path, cap: usize, codec: &IndexCodec) -> Result<Self, ConfigError> {
        let name = input_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(ConfigError::NameTooLong)?;
        let trailer = Trailer::now(name).ok_or(ConfigError::NameTooLong)?;

        let file_len = fs::metadata(input_path)?.len();

        let max_file_size = crate::index::MAX as u64 * cap as u64
            - codec.prefix_sum_len(crate::index::MAX, false)
            - IndexCodec::index_len(0) as u64
            - IndexCodec::index_len(crate::index::MAX) as u64
            - trailer.len() as u64;

        if file_len == 0 || file_len > max_file_size {
            return Err(ConfigError::FileSizeOutOfRange);
        }

        let reader = File::open(input_path)?;
        let trailer_wire = trailer.encode_wire();
        let total = file_len + trailer_wire.len() as u64;

        Ok(Self { reader, file_len, file_pos: 0, trailer_wire, trailer_pos: 0, total, remain: total })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn remain(&self) -> u64 {
        self.remain
    }

    /// Fills as much of `out` as there is stream left, file bytes first then trailer bytes.
    /// Returns the number of bytes actually written.
    pub fn read_into(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        let mut written = 0usize;

        let file_left = (self.file_len - self.file_pos) as usize;
        if file_left > 0 && written < out.len() {
            let take = file_left.min(out.len() - written);
            self.reader.read_exact(&mut out[written..written + take])?;
            self.file_pos += take as u64;
            written += take;
        }

        if written < out.len() {
            let trailer_left = self.trailer_wire.len() - self.trailer_pos;
            let take = trailer_left.min(out.len() - written);
            out[written..written + take].copy_from_slice(&self.trailer_wire[self.trailer_pos..self.trailer_pos + take]);
            self.trailer_pos += take;
            written += take;
        }

        self.remain -= written as u64;
        Ok(written)
    }
}

/// Owns the two reassembly scratch files (`file.bin`/`ecc.bin`) a decode run writes scattered
/// blocks into, plus the set of block indices actually seen.
pub struct DecodeFramer {
    data: File,
    parity: File,
    data_path: PathBuf,
    parity_path: PathBuf,
    output_dir: PathBuf,
    pub data_known: HashSet<u32>,
    pub parity_known: HashSet<u32>,
}

impl DecodeFramer {
    pub fn new(output_dir: &Path) -> Result<Self, ConfigError> {
        fs::create_dir_all(output_dir)?;
        let data_path = output_dir.join("file.bin");
        let parity_path = output_dir.join("ecc.bin");

        let open = |path: &Path| -> std::io::Result<File> {
            OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)
        };
        let data = open(&data_path)?;
        let parity = open(&parity_path)?;

        Ok(Self {
            data,
            parity,
            data_path,
            parity_path,
            output_dir: output_dir.to_path_buf(),
            data_known: HashSet::new(),
            parity_known: HashSet::new(),
        })
    }

    /// Writes `bytes[offset..]` at the block's sparse position in the appropriate scratch file.
    pub fn write_block(&mut self, bytes: &[u8], offset: usize, index: u32, is_parity: bool, codec: &IndexCodec, cap: usize) -> std::io::Result<()> {
        let stream = if is_parity { &mut self.parity } else { &mut self.data };
        stream.seek(SeekFrom::Start(codec.seek_offset(index, is_parity, cap)))?;
        stream.write_all(&bytes[offset..])?;
        if is_parity {
            self.parity_known.insert(index);
        } else {
            self.data_known.insert(index);
        }
        Ok(())
    }

    /// Runs single-erasure parity recovery over whatever's been scanned so far.
    pub fn repair(&mut self, codec: &IndexCodec, cap: usize, has_last: bool) -> std::io::Result<()> {
        parity::repair(&mut self.data, &mut self.parity, codec, cap, &mut self.data_known, &self.parity_known, has_last)
    }

    /// Highest data block index seen.
    pub fn max_index(&self) -> Option<u32> {
        self.data_known.iter().copied().max()
    }

    /// True once every block from `1` up to the highest seen index has been scanned or recovered.
    pub fn is_complete(&self, last_index: Option<u32>) -> bool {
        match last_index {
            Some(last) => self.data_known.len() as u32 == last,
            None => false,
        }
    }

    /// Reads the trailer off the tail of the reassembled file, truncates the file to just its own
    /// bytes, and renames the scratch file to the recovered name. Consumes `self` so the scratch
    /// file handles are closed before the rename.
    pub fn finalize(self) -> std::io::Result<Option<(u64, u32, String)>> {
        let DecodeFramer { mut data, parity, data_path, parity_path, output_dir, .. } = self;

        let file_len = data.seek(SeekFrom::End(0))?;
        let tail_len = file_len.min(260) as usize;
        if tail_len < trailer::HEADER_LEN {
            return Ok(None);
        }

        let mut tail = vec![0u8; tail_len];
        data.seek(SeekFrom::Start(file_len - tail_len as u64))?;
        data.read_exact(&mut tail)?;

        let Some(trailer) = Trailer::parse_wire(&tail) else {
            return Ok(None);
        };
        if (tail_len as u64) < trailer.len() as u64 {
            return Ok(None);
        }

        let file_size = file_len - trailer.len() as u64;
        data.set_len(file_size)?;
        drop(data);
        drop(parity);

        let safe_name = Path::new(&trailer.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recovered.bin")
            .to_owned();

        fs::remove_file(&parity_path)?;
        fs::rename(&data_path, output_dir.join(&safe_name))?;

        Ok(Some((file_size, trailer.timestamp, safe_name)))
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn stream_file_bytes_then_trailer_bytes() {
        let dir = std::env::temp_dir().join(format!("qrb-framer-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("sample.bin");
        fs::write(&input, b"abcdef").unwrap();

        let codec = IndexCodec::new(0);
        let mut framer = EncodeFramer::new(&input, 16, &codec).unwrap();
        assert_eq!(framer.total(), 6 + trailer::HEADER_LEN as u64 + "sample.bin".len() as u64);

        let mut out = vec![0u8; framer.total() as usize];
        let n = framer.read_into(&mut out).unwrap();
        assert_eq!(n, out.len());
        assert_eq!(&out[..6], b"abcdef");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn round_trip_a_reassembled_file_through_finalize() {
        let dir = std::env::temp_dir().join(format!("qrb-framer-finalize-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut framer = DecodeFramer::new(&dir).unwrap();
        let trailer = Trailer { name: "note.txt".to_owned(), timestamp: 42 };
        let mut payload = b"hello world".to_vec();
        payload.extend_from_slice(&trailer.encode_wire());

        framer.data.write_all(&payload).unwrap();
        framer.data_known.insert(1);

        let (size, ts, name) = framer.finalize().unwrap().unwrap();
        assert_eq!(size, 11);
        assert_eq!(ts, 42);
        assert_eq!(name, "note.txt");
        assert!(dir.join("note.txt").exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn strip_path_traversal_from_a_recovered_name() {
        let dir = std::env::temp_dir().join(format!("qrb-framer-traversal-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut framer = DecodeFramer::new(&dir).unwrap();
        let trailer = Trailer { name: "../../etc/passwd".to_owned(), timestamp: 7 };
        let mut payload = b"payload".to_vec();
        payload.extend_from_slice(&trailer.encode_wire());

        framer.data.write_all(&payload).unwrap();
        framer.data_known.insert(1);

        let (_, _, name) = framer.finalize().unwrap().unwrap();
        assert_eq!(name, "passwd");
        assert!(dir.join("passwd").exists());
        assert!(!dir.join("../../etc/passwd").exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reject_a_file_too_large_for_the_index_range() {
        let dir = std::env::temp_dir().join(format!("qrb-framer-oversize-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("huge.bin");

        let codec = IndexCodec::new(0);
        let cap = 20usize;
        let max_file_size = crate::index::MAX as u64 * cap as u64
            - codec.prefix_sum_len(crate::index::MAX, false)
            - IndexCodec::index_len(0) as u64
            - IndexCodec::index_len(crate::index::MAX) as u64
            - (trailer::HEADER_LEN as u64 + "huge.bin".len() as u64);

        let file = File::create(&input).unwrap();
        file.set_len(max_file_size + 1).unwrap();
        drop(file);

        let err = EncodeFramer::new(&input, cap, &codec).unwrap_err();
        assert!(matches!(err, ConfigError::FileSizeOutOfRange));

        fs::remove_dir_all(&dir).ok();
    }
}
