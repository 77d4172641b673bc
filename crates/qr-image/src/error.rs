use thiserror::Error;

/// Errors from the QR primitive adapter. Decode failures are intentionally not represented
/// here: a QR cell that doesn't scan is reported as an absence from `qr_decode`'s payload list,
/// never as an `Err` — see `qr_decode`'s doc comment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QrImageError {
    #[error("qr encode error: {0}")]
    Encode(#[from] qr_codec::QrError),

    #[error("no usable payload capacity at version {version} ecc level {ecc}")]
    NoCapacity { version: u8, ecc: u8 },
}
