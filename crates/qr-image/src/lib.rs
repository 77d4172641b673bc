//! QR primitive adapter.
//!
//! Wraps `qr-codec` (rendering) and `rqrr` (scanning) behind the surface a file-to-QR archiver
//! needs: encode a byte block into a bitmap at a fixed version/ECC, and decode a bitmap region
//! back into zero or more `(payload, bounding box)` pairs. Every QR parameter a caller might need
//! — capacity, cell pitch, quiet-zone geometry, the version/ECC a decode actually hit — is an
//! explicit return value. Nothing here is global or mutable across calls.

mod decode;
mod encode;
mod error;
mod params;

pub use decode::{qr_decode, DecodedQr, Hit};
pub use encode::qr_encode;
pub use error::QrImageError;
pub use params::QrParams;
