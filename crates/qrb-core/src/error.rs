use thiserror::Error;

/// Rejected before any work starts: a bad encode configuration, or an input file that can't be
/// addressed by the chosen grid/version/ECC combination.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("grid must be at least 1 column by 1 row")]
    InvalidGrid,
    #[error("QR version must be in 1..=40")]
    InvalidQrVersion,
    #[error("QR ECC level must be in 0..=3")]
    InvalidQrEcc,
    #[error("file ECC level must be in 0..=6")]
    InvalidFileEcc,
    #[error("input file name is longer than 255 bytes")]
    NameTooLong,
    #[error("a page holds more cells ({page_cap}) than the block index can address ({max})")]
    PageExceedsIndex { page_cap: usize, max: u32 },
    #[error("input file is empty or exceeds the size addressable at this configuration")]
    FileSizeOutOfRange,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    QrImage(#[from] qr_image::QrImageError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
