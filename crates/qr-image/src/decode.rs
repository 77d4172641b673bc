use image::GrayImage;
use imageproc::rect::Rect;

/// One payload recovered from a decode pass, together with the axis-aligned bounding box of the
/// QR symbol it came from (in the coordinate space of the image that was scanned).
pub type Hit = (Vec<u8>, Rect);

/// Result of a single `qr_decode` call.
#[derive(Debug, Default)]
pub struct DecodedQr {
    pub hits: Vec<Hit>,
    /// `(version, ecc_level)` carried back from the first symbol this call decoded, so a caller
    /// that doesn't yet know the page's QR parameters (e.g. scanning ECC-only pages cold) can
    /// configure itself. `None` when nothing decoded.
    pub detected: Option<(u8, u8)>,
}

/// Decodes a grayscale image region for one or more QR payloads.
///
/// `single` requests one-shot decoding of a region expected to contain at most one symbol (used
/// on grid-inferred cells); when `false`, every symbol found in the image is returned (used for
/// the whole-page global pass). Any failure from the underlying scanner — a symbol that doesn't
/// finish decoding, an unreadable region — is swallowed here and simply produces no hit for that
/// region; this function never returns `Err`, matching the "QR cell fails to decode" case being
/// decode-local and locally recovered.
pub fn qr_decode(image: &GrayImage, single: bool) -> DecodedQr {
    let mut prepared = rqrr::PreparedImage::prepare(image.clone());
    let mut grids = prepared.detect_grids();
    if single && grids.len() > 1 {
        grids.truncate(1);
    }

    let mut out = DecodedQr::default();
    for grid in &grids {
        let Ok((meta, content)) = grid.decode() else {
            continue;
        };
        let rect = bounding_rect(&grid.bounds);
        if out.detected.is_none() {
            let level = ecc_level_from_format_bits(meta.ecc_level.min(3) as u8);
            out.detected = Some((meta.version.0.max(1) as u8, level));
        }
        out.hits.push((content.into_bytes(), rect));
    }
    out
}

/// `rqrr` (a port of `quirc`) carries `MetaData::ecc_level` as the raw 2-bit QR format-info field
/// (`M=0,L=1,H=2,Q=3`), not the `0=Low,1=Medium,2=Quartile,3=High` index `QrParams::new` expects.
fn ecc_level_from_format_bits(bits: u8) -> u8 {
    match bits {
        0 => 1, // M
        1 => 0, // L
        2 => 3, // H
        _ => 2, // Q
    }
}

fn bounding_rect(points: &[rqrr::Point; 4]) -> Rect {
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
    Rect::at(min_x, min_y).of_size((max_x - min_x).max(1) as u32, (max_y - min_y).max(1) as u32)
}

#[cfg(test)]
mod should {
    use super::*;
    use crate::encode::qr_encode;
    use crate::params::QrParams;

    #[test]
    fn round_trip_a_small_payload_through_encode_and_decode() {
        let params = QrParams::new(5, 0).unwrap();
        let img = qr_encode(b"HelloWorld", &params).unwrap();
        let decoded = qr_decode(&img, false);
        assert_eq!(decoded.hits.len(), 1);
        assert_eq!(decoded.hits[0].0, b"HelloWorld");
    }

    #[test]
    fn return_no_hits_for_a_blank_image() {
        let blank = GrayImage::from_pixel(64, 64, image::Luma([255u8]));
        let decoded = qr_decode(&blank, false);
        assert!(decoded.hits.is_empty());
        assert!(decoded.detected.is_none());
    }

    #[test]
    fn detect_the_ecc_level_actually_used_to_encode_at_each_setting() {
        for ecc_level in 0..=3u8 {
            let params = QrParams::new(5, ecc_level).unwrap();
            let img = qr_encode(b"HelloWorld", &params).unwrap();
            let decoded = qr_decode(&img, false);
            assert_eq!(decoded.detected.unwrap().1, ecc_level);
        }
    }

    #[test]
    fn remap_rqrr_format_info_bits_to_the_low_medium_quartile_high_index() {
        assert_eq!(ecc_level_from_format_bits(0), 1); // M
        assert_eq!(ecc_level_from_format_bits(1), 0); // L
        assert_eq!(ecc_level_from_format_bits(2), 3); // H
        assert_eq!(ecc_level_from_format_bits(3), 2); // Q
    }
}
