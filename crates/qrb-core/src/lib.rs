//! THE CORE: everything a file-to-QR archiver needs above the QR primitive adapter — a varint
//! block index with a self-describing parity tag, an XOR parity engine, page layout and
//! multi-pass scan-side decoding, a file framer, and the pipeline driver that ties them together.

pub mod error;
pub mod framer;
pub mod index;
pub mod page;
pub mod parity;
pub mod pipeline;
pub mod trailer;

pub use error::ConfigError;
pub use index::IndexCodec;
pub use pipeline::{decode_images, encode_file, DecodeOutcome, EncodeConfig, EncodeSummary};
pub use trailer::Trailer;
