use qr_codec::{CodeEcc, SegmentMode, Version};

use crate::error::QrImageError;

/// Scale and quiet-zone constants for rendering. `scale` is the pixel side of one QR module;
/// `margin` is the quiet-zone border width in modules on every side.
const SCALE: i32 = 4;
const MARGIN: i32 = 2;

/// The parameters a QR primitive adapter call needs, all derived from `(version, ecc_level)` and
/// returned explicitly rather than read from global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrParams {
    pub version: u8,
    pub ecc_level: u8,
    /// Usable payload bytes per QR code at this version/ECC, after the mode indicator and byte
    /// count header are subtracted from capacity.
    pub cap: usize,
    /// Side length in pixels of one rendered (and scanned) QR cell, quiet zone included.
    pub px: i32,
    /// Gutter width in pixels between adjacent cells on a page.
    pub sp: i32,
    /// Expected ratio between cell pitch and inner (quiet-zone-free) QR extent; used as the
    /// grid-pitch prior during decode-side grid inference.
    pub ratio: f32,
}

impl QrParams {
    pub fn new(version: u8, ecc_level: u8) -> Result<Self, QrImageError> {
        let ver = Version::new(version);
        let ecl = code_ecc_from_level(ecc_level);

        let total = qr_codec::QrCode::num_total_codewords(ver);
        let ecc = qr_codec::QrCode::num_ecc_codewords(ver, ecl);
        let char_count_bits = SegmentMode::Byte.num_char_count_bits(ver) as usize;
        let header = char_count_bits.div_ceil(8) + 1; // mode indicator byte + byte-count header

        let cap = total
            .checked_sub(ecc)
            .and_then(|n| n.checked_sub(header))
            .filter(|&n| n > 0)
            .ok_or(QrImageError::NoCapacity { version, ecc: ecc_level })?;

        let side = i32::from(version) * 4 + 17;
        let px = (side + 2 * MARGIN) * SCALE;
        let sp = (side / 8 - MARGIN) * SCALE;
        let ratio = (px + sp) as f32 / (px - 2 * MARGIN * SCALE) as f32;

        Ok(QrParams { version, ecc_level, cap, px, sp, ratio })
    }

    pub(crate) fn version(&self) -> Version {
        Version::new(self.version)
    }

    pub(crate) fn code_ecc(&self) -> CodeEcc {
        code_ecc_from_level(self.ecc_level)
    }
}

pub(crate) fn code_ecc_from_level(level: u8) -> CodeEcc {
    match level {
        0 => CodeEcc::Low,
        1 => CodeEcc::Medium,
        2 => CodeEcc::Quartile,
        _ => CodeEcc::High,
    }
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn compute_capacity_and_pitch_for_version_5_medium() {
        let params = QrParams::new(5, 1).unwrap();
        assert_eq!(params.version, 5);
        assert!(params.cap > 0);
        assert!(params.px > 0);
        assert!(params.ratio > 1.0);
    }

    #[test]
    fn reject_capacity_when_header_exceeds_symbol() {
        // Version 1 Low still has room; this just exercises the checked arithmetic path.
        let params = QrParams::new(1, 0).unwrap();
        assert!(params.cap > 0);
    }
}
