//! Matcher (C5): normalized cross-correlation template matching with ROI
//! cropping, early/mid-exit heuristics, and EMA-based load adaptation.

use std::time::Instant;

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use parking_lot::Mutex;
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};

use autoclick_capture::Frame;
use autoclick_ipc::{CaptureMode, MatchHit, Roi};

use crate::cache::DecodedTemplate;

const EARLY_EXIT_SCORE: f32 = 0.85;
const MID_EXIT_SCORE: f32 = 0.30;
const EMA_ALPHA: f64 = 0.2;
const HEAVY_OPS_THRESHOLD_MS: f64 = 80.0;
const HEAVY_TEMPLATE_DIM_PX: u32 = 100;

fn now_ms() -> i64 {
    // Frames and templates never carry a system-clock timestamp of their
    // own creation we could reuse here, so this is the one place a
    // wall-clock read is unavoidable.
    chrono::Utc::now().timestamp_millis()
}

fn bgr_to_gray(bgr: &[u8], width: u32, roi: Roi) -> GrayImage {
    let w = roi.width() as u32;
    let h = roi.height() as u32;
    let mut out = GrayImage::new(w, h);
    let stride = width as usize * 3;
    for row in 0..h {
        let src_y = roi.top as usize + row as usize;
        let row_start = src_y * stride;
        for col in 0..w {
            let src_x = roi.left as usize + col as usize;
            let idx = row_start + src_x * 3;
            let b = bgr[idx] as f32;
            let g = bgr[idx + 1] as f32;
            let r = bgr[idx + 2] as f32;
            let luma = 0.299 * r + 0.587 * g + 0.114 * b;
            out.put_pixel(col, row, Luma([luma.round() as u8]));
        }
    }
    out
}

fn bgr_to_rgb(bgr: &[u8], width: u32, roi: Roi) -> RgbImage {
    let w = roi.width() as u32;
    let h = roi.height() as u32;
    let mut out = RgbImage::new(w, h);
    let stride = width as usize * 3;
    for row in 0..h {
        let src_y = roi.top as usize + row as usize;
        let row_start = src_y * stride;
        for col in 0..w {
            let src_x = roi.left as usize + col as usize;
            let idx = row_start + src_x * 3;
            let (b, g, r) = (bgr[idx], bgr[idx + 1], bgr[idx + 2]);
            out.put_pixel(col, row, Rgb([r, g, b]));
        }
    }
    out
}

/// One color channel of an RGB image as its own grayscale plane, so each
/// channel can be handed to `imageproc`'s single-channel NCC separately.
fn channel_plane(rgb: &RgbImage, channel: usize) -> GrayImage {
    let (w, h) = rgb.dimensions();
    let mut out = GrayImage::new(w, h);
    for (x, y, px) in rgb.enumerate_pixels() {
        out.put_pixel(x, y, Luma([px.0[channel]]));
    }
    out
}

/// Per-channel NCC score maps, averaged into a single map. Color-sensitive
/// matching: a red and a green patch of identical luma score differently
/// here, unlike single-channel luma matching.
fn match_template_color(crop: &RgbImage, template: &RgbImage) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    let crop_planes = [channel_plane(crop, 0), channel_plane(crop, 1), channel_plane(crop, 2)];
    let template_planes = [
        channel_plane(template, 0),
        channel_plane(template, 1),
        channel_plane(template, 2),
    ];

    let maps: Vec<_> = (0..3)
        .map(|c| match_template(&crop_planes[c], &template_planes[c], MatchTemplateMethod::CrossCorrelationNormalized))
        .collect();

    let (w, h) = maps[0].dimensions();
    let mut combined = ImageBuffer::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let sum: f32 = maps.iter().map(|m| m.get_pixel(x, y)[0]).sum();
            combined.put_pixel(x, y, Luma([sum / 3.0]));
        }
    }
    combined
}

/// Builds an RGB template image from a decoded template's cached pixels,
/// expanding a grayscale-decoded template to equal-valued channels if its
/// cached form does not match the requested color mode.
fn template_as_rgb(template: &DecodedTemplate) -> RgbImage {
    if template.grayscale {
        RgbImage::from_fn(template.width, template.height, |x, y| {
            let idx = (y * template.width + x) as usize;
            let v = template.pixels[idx];
            Rgb([v, v, v])
        })
    } else {
        RgbImage::from_raw(template.width, template.height, template.pixels.to_vec())
            .expect("template buffer matches its own declared dimensions")
    }
}

/// Runs normalized cross-correlation over one or more candidate templates
/// against a captured frame, returning the single best hit at or above
/// `threshold`.
pub struct Matcher {
    ema_call_ms: Mutex<f64>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher {
    pub fn new() -> Self {
        Self {
            ema_call_ms: Mutex::new(0.0),
        }
    }

    fn heavy_ops_should_be_skipped(&self) -> bool {
        *self.ema_call_ms.lock() > HEAVY_OPS_THRESHOLD_MS
    }

    fn record_call_duration(&self, elapsed_ms: f64) {
        let mut ema = self.ema_call_ms.lock();
        *ema = if *ema == 0.0 {
            elapsed_ms
        } else {
            EMA_ALPHA * elapsed_ms + (1.0 - EMA_ALPHA) * *ema
        };
    }

    /// Four-step algorithm: crop to ROI, convert to grayscale (only when
    /// `grayscale` is set; otherwise stay color-sensitive), score each
    /// template with early/mid-exit, return the best hit above threshold
    /// in frame-absolute coordinates.
    pub fn find_best(
        &self,
        frame_bgr: &[u8],
        frame_width: u32,
        frame_height: u32,
        templates: &[DecodedTemplate],
        roi: Option<Roi>,
        threshold: f32,
        grayscale: bool,
    ) -> Option<MatchHit> {
        let started = Instant::now();
        let skip_heavy = self.heavy_ops_should_be_skipped();

        let effective_roi = match roi {
            Some(r) if !skip_heavy => r.clamp_to(frame_width, frame_height),
            _ => Roi {
                left: 0,
                top: 0,
                right: frame_width as i32,
                bottom: frame_height as i32,
            },
        };
        if !effective_roi.is_positive() {
            self.record_call_duration(started.elapsed().as_secs_f64() * 1000.0);
            return None;
        }

        let gray_crop = if grayscale {
            Some(bgr_to_gray(frame_bgr, frame_width, effective_roi))
        } else {
            None
        };
        let color_crop = if grayscale {
            None
        } else {
            Some(bgr_to_rgb(frame_bgr, frame_width, effective_roi))
        };
        let crop_width = gray_crop.as_ref().map(|c| c.width()).unwrap_or_else(|| color_crop.as_ref().unwrap().width());
        let crop_height = gray_crop.as_ref().map(|c| c.height()).unwrap_or_else(|| color_crop.as_ref().unwrap().height());

        let mut best: Option<MatchHit> = None;
        let total = templates.len();
        for (idx, template) in templates.iter().enumerate() {
            if skip_heavy
                && (template.width > HEAVY_TEMPLATE_DIM_PX || template.height > HEAVY_TEMPLATE_DIM_PX)
            {
                continue;
            }
            if template.width > crop_width || template.height > crop_height {
                continue;
            }

            let extremes = if let Some(gray_crop) = gray_crop.as_ref() {
                let template_gray = GrayImage::from_raw(template.width, template.height, {
                    if template.grayscale {
                        template.pixels.to_vec()
                    } else {
                        rgb_to_gray_bytes(&template.pixels)
                    }
                })
                .expect("template buffer matches its own declared dimensions");
                let result = match_template(gray_crop, &template_gray, MatchTemplateMethod::CrossCorrelationNormalized);
                find_extremes(&result)
            } else {
                let color_crop = color_crop.as_ref().expect("color crop built when grayscale is false");
                let template_rgb = template_as_rgb(template);
                let result = match_template_color(color_crop, &template_rgb);
                find_extremes(&result)
            };
            let score = extremes.max_value;

            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(MatchHit {
                    score,
                    x: effective_roi.left + extremes.max_value_location.0 as i32,
                    y: effective_roi.top + extremes.max_value_location.1 as i32,
                    template_w: template.width,
                    template_h: template.height,
                    timestamp_ms: now_ms(),
                    capture_mode: CaptureMode::Window,
                });
            }

            if score >= EARLY_EXIT_SCORE {
                break;
            }
            if idx + 1 == total / 2
                && total >= 2
                && best.as_ref().map(|b| b.score).unwrap_or(0.0) < MID_EXIT_SCORE
            {
                break;
            }
        }

        self.record_call_duration(started.elapsed().as_secs_f64() * 1000.0);
        best.filter(|hit| hit.score >= threshold)
    }

    /// Convenience wrapper over [`Matcher::find_best`] taking a capture
    /// [`Frame`] directly instead of raw buffer parts.
    pub fn find_best_in_frame(
        &self,
        frame: &Frame,
        templates: &[DecodedTemplate],
        roi: Option<Roi>,
        threshold: f32,
        grayscale: bool,
    ) -> Option<MatchHit> {
        self.find_best(
            &frame.bgr,
            frame.width(),
            frame.height(),
            templates,
            roi,
            threshold,
            grayscale,
        )
    }
}

fn rgb_to_gray_bytes(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|px| {
            let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
            luma.round() as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // A non-constant gradient frame: NCC is undefined over a zero-variance
    // (flat) patch, so tests embed a real gradient rather than solid color.
    fn gradient_bgr_frame(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 7 + y * 13) % 256) as u8;
                out.push(v);
                out.push(v.wrapping_add(40));
                out.push(v.wrapping_add(80));
            }
        }
        out
    }

    fn extract_template_from_frame(
        frame: &[u8],
        frame_width: u32,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> DecodedTemplate {
        let stride = frame_width as usize * 3;
        let mut gray = Vec::with_capacity((width * height) as usize);
        for row in 0..height {
            let src_y = (top + row) as usize;
            for col in 0..width {
                let src_x = (left + col) as usize;
                let idx = src_y * stride + src_x * 3;
                let (b, g, r) = (frame[idx] as f32, frame[idx + 1] as f32, frame[idx + 2] as f32);
                gray.push((0.299 * r + 0.587 * g + 0.114 * b).round() as u8);
            }
        }
        DecodedTemplate {
            pixels: std::sync::Arc::from(gray),
            width,
            height,
            grayscale: true,
            hash: 1,
            source_ref: "synthetic".to_string(),
            load_time: Instant::now(),
            last_access: Instant::now(),
            access_count: 1,
        }
    }

    #[test]
    fn matches_a_patch_extracted_from_the_frame_itself_with_a_near_perfect_score() {
        let frame = gradient_bgr_frame(20, 20);
        let template = extract_template_from_frame(&frame, 20, 8, 8, 4, 4);
        let matcher = Matcher::new();
        let hit = matcher.find_best(&frame, 20, 20, &[template], None, 0.5, true);
        assert!(hit.is_some());
        let hit = hit.unwrap();
        assert!(hit.score > 0.9);
        assert_eq!((hit.x, hit.y), (8, 8));
    }

    #[test]
    fn roi_fully_outside_the_frame_yields_no_match() {
        let frame = gradient_bgr_frame(20, 20);
        let template = extract_template_from_frame(&frame, 20, 8, 8, 4, 4);
        let matcher = Matcher::new();
        let roi = Roi {
            left: 100,
            top: 100,
            right: 120,
            bottom: 120,
        };
        let hit = matcher.find_best(&frame, 20, 20, &[template], Some(roi), 0.5, true);
        assert!(hit.is_none());
    }

    #[test]
    fn empty_template_list_yields_no_match() {
        let frame = gradient_bgr_frame(20, 20);
        let matcher = Matcher::new();
        let hit = matcher.find_best(&frame, 20, 20, &[], None, 0.5, true);
        assert!(hit.is_none());
    }

    #[test]
    fn below_threshold_match_is_filtered_out() {
        let frame = gradient_bgr_frame(20, 20);
        let matcher = Matcher::new();
        // A template drawn from unrelated noise should score low against
        // a smooth gradient frame.
        let noisy = DecodedTemplate {
            pixels: std::sync::Arc::from(vec![0u8, 255, 0, 255, 0, 255, 0, 255, 0, 255, 0, 255, 0, 255, 0, 255]),
            width: 4,
            height: 4,
            grayscale: true,
            hash: 2,
            source_ref: "synthetic-noise".to_string(),
            load_time: Instant::now(),
            last_access: Instant::now(),
            access_count: 1,
        };
        let hit = matcher.find_best(&frame, 20, 20, &[noisy], None, 0.99, true);
        assert!(hit.is_none());
    }

    #[test]
    fn color_mode_distinguishes_equal_luma_hues() {
        // A red patch and a green patch share the same luma under the
        // BT.601 weights used by `bgr_to_gray`, so grayscale matching alone
        // cannot tell them apart; color matching must.
        let width = 12;
        let height = 12;
        let mut frame = vec![40u8; (width * height * 3) as usize];
        // BGR: pure green square at (2,2)-(6,6).
        for y in 2..6 {
            for x in 2..6 {
                let idx = ((y * width + x) * 3) as usize;
                frame[idx] = 0;
                frame[idx + 1] = 150;
                frame[idx + 2] = 0;
            }
        }
        // BGR: red square at (2,2) of a second, otherwise identical frame.
        let mut red_frame = frame.clone();
        for y in 2..6 {
            for x in 2..6 {
                let idx = ((y * width + x) * 3) as usize;
                red_frame[idx] = 0;
                red_frame[idx + 1] = 0;
                red_frame[idx + 2] = 150;
            }
        }

        let green_template = DecodedTemplate {
            pixels: std::sync::Arc::from(vec![0u8, 150, 0].repeat(16)),
            width: 4,
            height: 4,
            grayscale: false,
            hash: 3,
            source_ref: "green".to_string(),
            load_time: Instant::now(),
            last_access: Instant::now(),
            access_count: 1,
        };

        let matcher = Matcher::new();
        let green_hit = matcher
            .find_best(&frame, width, height, &[green_template.clone()], None, 0.0, false)
            .unwrap();
        let mismatched_hit = matcher
            .find_best(&red_frame, width, height, &[green_template], None, 0.0, false)
            .unwrap();

        assert!(green_hit.score > mismatched_hit.score);
    }
}
