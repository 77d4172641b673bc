use image::{GrayImage, Luma};
use qr_codec::{QrCode, Segment};

use crate::error::QrImageError;
use crate::params::QrParams;

/// Renders `data` (at most `params.cap` bytes) as a QR code bitmap, quiet zone included, scaled
/// to exactly `params.px` by `params.px` pixels.
///
/// `data` is always encoded in byte mode at the fixed `(version, ecc_level)` from `params` — no
/// version/ECC boosting, no auto-selection, matching the fixed-capacity framing the page layout
/// and file framer rely on.
pub fn qr_encode(data: &[u8], params: &QrParams) -> Result<GrayImage, QrImageError> {
    let segs = [Segment::make_bytes(data)];
    let ver = params.version();
    let qr = QrCode::encode_segments_advanced(&segs, params.code_ecc(), ver, ver, None, false)
        .map_err(QrImageError::Encode)?;

    const SCALE: i32 = 4;
    const MARGIN: i32 = 2;
    let modules_per_side = qr.size() + 2 * MARGIN;
    debug_assert_eq!(modules_per_side * SCALE, params.px);

    Ok(GrayImage::from_fn(params.px as u32, params.px as u32, |x, y| {
        let module_x = (x as i32) / SCALE - MARGIN;
        let module_y = (y as i32) / SCALE - MARGIN;
        if qr.get_module(module_x, module_y) {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    }))
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn render_image_at_the_configured_pixel_size() {
        let params = QrParams::new(5, 0).unwrap();
        let img = qr_encode(b"hello", &params).unwrap();
        assert_eq!(img.width(), params.px as u32);
        assert_eq!(img.height(), params.px as u32);
    }

    #[test]
    fn leave_a_white_quiet_zone_border() {
        let params = QrParams::new(3, 0).unwrap();
        let img = qr_encode(b"x", &params).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
    }
}
