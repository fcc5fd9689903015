//! The immutable frame type produced by a capture session.

use std::sync::Arc;

/// Dimensions of the capture surface's current content, independent of the
/// window's client size. Re-exported from `autoclick-ipc` so callers that
/// only need the size (not the pixels) can depend on the lighter crate.
pub use autoclick_ipc::ContentSize;

/// An immutable BGR frame, 8 bits per channel, packed with no row padding
/// (`width * height * 3` bytes exactly). Frames are conceptually immutable
/// the instant they leave the capture session: the pixel buffer is always
/// wrapped in an `Arc<[u8]>` so every consumer holds a cheap, read-only,
/// shared reference rather than a copy.
#[derive(Clone)]
pub struct Frame {
    pub frame_id: u64,
    pub content_size: ContentSize,
    pub bgr: Arc<[u8]>,
}

impl Frame {
    pub fn new(frame_id: u64, content_size: ContentSize, bgr: Vec<u8>) -> Self {
        debug_assert_eq!(
            bgr.len(),
            content_size.width as usize * content_size.height as usize * 3,
            "packed BGR buffer must be exactly width * height * 3 bytes"
        );
        Self {
            frame_id,
            content_size,
            bgr: Arc::from(bgr),
        }
    }

    pub fn width(&self) -> u32 {
        self.content_size.width
    }

    pub fn height(&self) -> u32 {
        self.content_size.height
    }
}

/// Packs a possibly-strided BGRA buffer (as produced by the Windows Graphics
/// Capture API) into an exact `width * height * 3` BGR buffer, dropping the
/// alpha channel. The source stride may exceed `width * 4`; each row is
/// copied individually rather than assuming `stride == width * channels`.
pub fn pack_bgra_row_strided_to_bgr(src: &[u8], width: u32, height: u32, row_pitch: u32) -> Vec<u8> {
    let width = width as usize;
    let height = height as usize;
    let row_pitch = row_pitch as usize;
    let mut out = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let row_start = row * row_pitch;
        let row_bytes = &src[row_start..row_start + width * 4];
        for px in row_bytes.chunks_exact(4) {
            out.push(px[0]); // B
            out.push(px[1]); // G
            out.push(px[2]); // R
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_strided_bgra_into_exact_bgr() {
        // 2x1 image, row_pitch wider than width*4 (simulates GPU alignment padding).
        let row_pitch = 16u32;
        let mut src = vec![0u8; row_pitch as usize];
        src[0..4].copy_from_slice(&[10, 20, 30, 255]);
        src[4..8].copy_from_slice(&[40, 50, 60, 255]);
        let packed = pack_bgra_row_strided_to_bgr(&src, 2, 1, row_pitch);
        assert_eq!(packed, vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn frame_exposes_width_and_height_from_content_size() {
        let frame = Frame::new(1, ContentSize::new(4, 2), vec![0u8; 4 * 2 * 3]);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
    }
}
