//! Page layout: compose a grid of QR cells onto one page image for encoding, and recover payloads
//! from a scanned page image for decoding via a multi-pass grid-inference scan.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use qr_image::{qr_decode, qr_encode, DecodedQr, Hit, QrParams};
use tracing::trace;

const TOLERANCE: f32 = 1.0 / 16.0;
const ROI_SCALE: f32 = 1.15;
/// Matches `bilateralFilter(gray, denoise, 5, 30, 30)`; `5` is a pixel diameter, i.e. a radius of 2.
const DENOISE_RADIUS: i32 = 2;
const DENOISE_SIGMA_COLOR: f32 = 30.0;
const DENOISE_SIGMA_SPACE: f32 = 30.0;

/// Fixed grid of QR cells on one page. A page holds at most `num_col * num_row` blocks; the last
/// page of a stream may be partially populated.
#[derive(Debug, Clone, Copy)]
pub struct PageLayout {
    pub num_col: u32,
    pub num_row: u32,
}

impl PageLayout {
    pub fn new(num_col: u32, num_row: u32) -> Self {
        Self { num_col, num_row }
    }

    pub fn cap(&self) -> usize {
        (self.num_col * self.num_row) as usize
    }

    /// Tiles `data` (at most `self.cap() * params.cap` bytes) into a page image, one `params.cap`
    /// byte slice per cell, left-to-right then top-to-bottom, white background.
    pub fn encode(&self, data: &[u8], params: &QrParams) -> GrayImage {
        let pitch = (params.px + params.sp) as u32;
        let page_w = self.num_col * pitch + params.sp as u32;
        let page_h = self.num_row * pitch + params.sp as u32;
        let mut page = GrayImage::from_pixel(page_w, page_h, Luma([255u8]));

        let mut offset = 0usize;
        while offset < data.len() {
            let idx = (offset / params.cap) as u32;
            let col = idx % self.num_col;
            let row = idx / self.num_col;
            let x = (col * pitch + params.sp as u32) as i64;
            let y = (row * pitch + params.sp as u32) as i64;

            let len = params.cap.min(data.len() - offset);
            let cell = qr_encode(&data[offset..offset + len], params)
                .expect("block payload never exceeds the configured QR capacity");
            image::imageops::overlay(&mut page, &cell, x, y);

            offset += len;
        }
        page
    }
}

/// Decodes a scanned page image, in three passes: a global find-all pass, then a
/// grid-inference pass run twice against a growing "already decoded" mask.
///
/// `known` carries the QR version/ECC level forward across pages within one decode session: once
/// any call detects a version/ECC (from a successfully decoded symbol), it is cached here and
/// reused by later calls' grid-pitch estimate, matching the "first successful decode in a session
/// carries back the QR parameters" rule the QR primitive adapter exposes as an explicit return
/// instead of global state.
pub fn decode_page(image: &GrayImage, known: &mut Option<QrParams>) -> Vec<Hit> {
    let (orig_w, orig_h) = image.dimensions();
    let (padded, off_x, off_y) = preprocess(image);
    let (pad_w, pad_h) = padded.dimensions();

    let mut mask = GrayImage::from_pixel(pad_w, pad_h, Luma([255u8]));
    let inner = Rect::at(off_x, off_y).of_size(orig_w, orig_h);
    draw_filled_rect_mut(&mut mask, inner, Luma([0u8]));

    let mut hits: Vec<Hit> = Vec::new();
    let mut boxes: Vec<Rect> = Vec::new();

    let DecodedQr { hits: global_hits, detected } = qr_decode(&padded, false);
    if known.is_none() {
        if let Some((version, ecc_level)) = detected {
            if let Ok(params) = QrParams::new(version, ecc_level) {
                *known = Some(params);
            }
        }
    }
    trace!(count = global_hits.len(), "page global pass");
    for (payload, rect) in global_hits {
        let ratio = known.map_or(ROI_SCALE, |p| p.ratio) * ROI_SCALE;
        draw_filled_rect_mut(&mut mask, expand_rect(rect, ratio), Luma([255u8]));
        boxes.push(rect);
        hits.push((payload, rect));
    }

    for pass in 0..2 {
        if boxes.is_empty() {
            break;
        }
        let Some(params) = *known else { break };
        let candidates = segment(pad_w as i32, pad_h as i32, &boxes, params.ratio, false);
        let mut found_this_pass = 0usize;

        for group in candidates.chunks(16) {
            let strict = match group.first() {
                Some(r) => *r,
                None => continue,
            };
            for rect in group {
                if fully_covered(&mask, *rect) {
                    break;
                }
                let sub = image::imageops::crop_imm(&padded, rect.left() as u32, rect.top() as u32, rect.width(), rect.height())
                    .to_image();
                let DecodedQr { hits: cell_hits, .. } = qr_decode(&sub, true);
                if let Some((payload, local)) = cell_hits.into_iter().next() {
                    let global_rect = Rect::at(rect.left() + local.left(), rect.top() + local.top())
                        .of_size(local.width(), local.height());
                    draw_filled_rect_mut(&mut mask, strict, Luma([255u8]));
                    boxes.push(global_rect);
                    hits.push((payload, global_rect));
                    found_this_pass += 1;
                    break;
                }
            }
        }
        trace!(pass, found = found_this_pass, "page grid-inference pass");
    }

    hits
}

/// Infers a regular grid from a set of already-found QR bounding boxes and emits 16 candidate
/// rectangles per predicted cell center. `scale_only` collapses the grid
/// pitch to the average box size, used for the degenerate single-box "whole page" case.
fn segment(img_w: i32, img_h: i32, boxes: &[Rect], ratio: f32, scale_only: bool) -> Vec<Rect> {
    if boxes.is_empty() {
        return Vec::new();
    }

    let box_w = boxes.iter().map(|b| b.width() as f32).sum::<f32>() / boxes.len() as f32;
    let box_h = boxes.iter().map(|b| b.height() as f32).sum::<f32>() / boxes.len() as f32;

    let mut centers_x: Vec<f32> = boxes.iter().map(|b| b.left() as f32 + b.width() as f32 / 2.0).collect();
    let mut centers_y: Vec<f32> = boxes.iter().map(|b| b.top() as f32 + b.height() as f32 / 2.0).collect();

    let cluster_x = cluster(&mut centers_x, box_w);
    let cluster_y = cluster(&mut centers_y, box_h);

    let grid_w = if scale_only {
        box_w
    } else {
        estimate_pitch(&cluster_x, box_w, ratio)
    };
    let grid_h = if scale_only {
        box_h
    } else {
        estimate_pitch(&cluster_y, box_h, ratio)
    };

    let grid_w_i = grid_w as i32;
    let grid_h_i = grid_h as i32;
    if grid_w_i <= 0 || grid_h_i <= 0 {
        return Vec::new();
    }

    let tl_x = (cluster_x[0] as i32).rem_euclid(grid_w_i);
    let tl_y = (cluster_y[0] as i32).rem_euclid(grid_h_i);

    let roi_w = [grid_w_i, (ROI_SCALE * grid_w_i as f32) as i32];
    let roi_h = [grid_h_i, (ROI_SCALE * grid_h_i as f32) as i32];

    let half_bw = (box_w / 2.0) as i32;
    let half_bh = (box_h / 2.0) as i32;

    let mut result = Vec::new();
    let rows = img_h / grid_h_i + 1;
    let cols = img_w / grid_w_i + 1;
    for j in 0..rows {
        for i in 0..cols {
            let cx = tl_x + i * grid_w_i;
            let cy = tl_y + j * grid_h_i;

            if cx >= img_w || cy >= img_h {
                continue;
            }
            if cx - half_bw < 0 || cy - half_bh < 0 {
                continue;
            }
            if cx + half_bw >= img_w || cy + half_bh >= img_h {
                continue;
            }

            for k in 0..16i32 {
                let w = roi_w[(k & 1) as usize];
                let h = roi_h[((k >> 1) & 1) as usize];
                let w2 = roi_w[((k >> 2) & 1) as usize];
                let h2 = roi_h[((k >> 3) & 1) as usize];

                let x0 = (cx - w / 2).max(0);
                let y0 = (cy - h / 2).max(0);
                let x1 = (cx + w2 / 2).min(img_w - 1);
                let y1 = (cy + h2 / 2).min(img_h - 1);
                if x1 <= x0 || y1 <= y0 {
                    continue;
                }
                result.push(Rect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32));
            }
        }
    }
    result
}

/// Sorts and groups values within `tolerance` of each other relative to `scale`, returning the
/// mean of each group, i.e. clusters box centers along each axis using a relative tolerance.
fn cluster(values: &mut [f32], scale: f32) -> Vec<f32> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut out = Vec::new();
    let mut i = 0;
    while i < values.len() {
        let mut sum = values[i];
        let mut j = i + 1;
        while j < values.len() && (values[j] - values[j - 1]) / scale <= TOLERANCE {
            sum += values[j];
            j += 1;
        }
        out.push(sum / (j - i) as f32);
        i = j;
    }
    out
}

/// Mean of inter-cluster gaps whose ratio to `scale * ratio` lies in `[1-tol, 1+tol]`; falls back
/// to `scale * ratio` when no gap qualifies.
fn estimate_pitch(clusters: &[f32], scale: f32, ratio: f32) -> f32 {
    let mut total = 0.0f32;
    let mut count = 0u32;
    for w in clusters.windows(2) {
        let gap = w[1] - w[0];
        let r = gap / scale / ratio;
        if r < 1.0 - TOLERANCE || r > 1.0 + TOLERANCE {
            continue;
        }
        total += gap;
        count += 1;
    }
    if count != 0 {
        total / count as f32
    } else {
        scale * ratio
    }
}

/// Grows `rect` by `factor` around its own center; used to mark a wider area of the mask covered
/// than the symbol actually occupies, so a later pitch-sized grid candidate centered nearby is
/// still found fully covered.
fn expand_rect(rect: Rect, factor: f32) -> Rect {
    let cx = rect.left() as f32 + rect.width() as f32 / 2.0;
    let cy = rect.top() as f32 + rect.height() as f32 / 2.0;
    let w = (rect.width() as f32 * factor).max(1.0);
    let h = (rect.height() as f32 * factor).max(1.0);
    let x0 = (cx - w / 2.0).floor().max(0.0) as i32;
    let y0 = (cy - h / 2.0).floor().max(0.0) as i32;
    Rect::at(x0, y0).of_size(w.ceil() as u32, h.ceil() as u32)
}

fn fully_covered(mask: &GrayImage, rect: Rect) -> bool {
    let (w, h) = mask.dimensions();
    let x0 = rect.left().max(0) as u32;
    let y0 = rect.top().max(0) as u32;
    let x1 = ((rect.left() + rect.width() as i32).max(0) as u32).min(w);
    let y1 = ((rect.top() + rect.height() as i32).max(0) as u32).min(h);
    if x1 <= x0 || y1 <= y0 {
        return false;
    }
    for y in y0..y1 {
        for x in x0..x1 {
            if mask.get_pixel(x, y)[0] != 255 {
                return false;
            }
        }
    }
    true
}

/// Grayscale input, bilateral-denoised, padded by `ROI_SCALE` on every side with white
/// background. Returns the padded image and the offset of the original image within it.
fn preprocess(image: &GrayImage) -> (GrayImage, i32, i32) {
    let denoised = bilateral_filter(image, DENOISE_RADIUS, DENOISE_SIGMA_COLOR, DENOISE_SIGMA_SPACE);
    let (w, h) = denoised.dimensions();
    let pad_w = (w as f32 * ROI_SCALE) as u32;
    let pad_h = (h as f32 * ROI_SCALE) as u32;
    let off_x = ((pad_w - w) / 2) as i64;
    let off_y = ((pad_h - h) / 2) as i64;

    let mut canvas = GrayImage::from_pixel(pad_w, pad_h, Luma([255u8]));
    image::imageops::overlay(&mut canvas, &denoised, off_x, off_y);
    (canvas, off_x as i32, off_y as i32)
}

/// Edge-preserving denoise. `imageproc` has no bilateral filter; this hand-rolled version matches
/// the neighborhood diameter and sigmas of OpenCV's `bilateralFilter`.
fn bilateral_filter(image: &GrayImage, radius: i32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    let mut out = GrayImage::new(w, h);
    let two_sigma_color_sq = 2.0 * sigma_color * sigma_color;
    let two_sigma_space_sq = 2.0 * sigma_space * sigma_space;

    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let center = image.get_pixel(x as u32, y as u32)[0] as f32;
            let mut sum = 0.0f32;
            let mut weight_sum = 0.0f32;

            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let value = image.get_pixel(nx as u32, ny as u32)[0] as f32;
                    let spatial = -((dx * dx + dy * dy) as f32) / two_sigma_space_sq;
                    let range = -((value - center) * (value - center)) / two_sigma_color_sq;
                    let weight = (spatial + range).exp();
                    sum += weight * value;
                    weight_sum += weight;
                }
            }
            out.put_pixel(x as u32, y as u32, Luma([(sum / weight_sum).round() as u8]));
        }
    }
    out
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn report_capacity_as_rows_times_columns() {
        let layout = PageLayout::new(3, 2);
        assert_eq!(layout.cap(), 6);
    }

    #[test]
    fn encode_a_single_cell_page_at_the_expected_size() {
        let params = QrParams::new(3, 0).unwrap();
        let layout = PageLayout::new(1, 1);
        let page = layout.encode(b"hi", &params);
        assert_eq!(page.width(), params.px as u32 + 2 * params.sp as u32);
        assert_eq!(page.height(), params.px as u32 + 2 * params.sp as u32);
    }

    #[test]
    fn round_trip_a_single_cell_page() {
        let params = QrParams::new(5, 0).unwrap();
        let layout = PageLayout::new(1, 1);
        let page = layout.encode(b"HelloWorld", &params);
        let mut known = Some(params);
        let hits = decode_page(&page, &mut known);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, b"HelloWorld");
    }

    #[test]
    fn decode_a_multi_cell_page_without_duplicate_payloads() {
        let params = QrParams::new(3, 0).unwrap();
        let layout = PageLayout::new(2, 2);
        let blocks = [b"aaaa".as_slice(), b"bbbb".as_slice(), b"cccc".as_slice(), b"dddd".as_slice()];
        let data: Vec<u8> = blocks.concat();
        let page = layout.encode(&data, &params);
        let mut known = Some(params);
        let hits = decode_page(&page, &mut known);

        let mut payloads: Vec<&[u8]> = hits.iter().map(|(p, _)| p.as_slice()).collect();
        payloads.sort();
        payloads.dedup();
        assert_eq!(payloads.len(), 4, "every cell decoded exactly once, no re-probed duplicates");
        for block in blocks {
            assert!(hits.iter().any(|(p, _)| p.as_slice() == block));
        }
    }

    #[test]
    fn cluster_nearby_values_and_keep_distinct_ones_apart() {
        let mut values = vec![10.0, 10.5, 50.0, 50.5];
        let out = cluster(&mut values, 40.0);
        assert_eq!(out.len(), 2);
    }
}
