// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The pixel surface an allocator draws onto.

use core::fmt::{Debug, Formatter};
use tiny_skia::{Pixmap, PixmapRef};

/// An RGBA canvas owned by an atlas allocator.
///
/// The allocator is the only writer for the canvas's lifetime; callers
/// read it back through [`pixmap`](Self::pixmap) for GPU upload or via
/// [`encode_png`](Self::encode_png) for inspection.
pub struct Canvas {
    pixmap: Pixmap,
    width: u16,
    height: u16,
}

impl Canvas {
    /// Creates a transparent canvas of the given size.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn new(width: u16, height: u16) -> Self {
        let pixmap = Pixmap::new(u32::from(width), u32::from(height))
            .expect("canvas dimensions must be non-zero");
        Self {
            pixmap,
            width,
            height,
        }
    }

    /// Canvas width in pixels.
    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Canvas height in pixels.
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Read-only view of the canvas pixels.
    #[inline]
    pub fn pixmap(&self) -> PixmapRef<'_> {
        self.pixmap.as_ref()
    }

    /// Copies a `width x height` region of `src` starting at
    /// `(src_x, src_y)` to `(dst_x, dst_y)` on the canvas.
    ///
    /// A straight per-row copy: no scaling, no blending. The region is
    /// clipped against both the source and the canvas; a fully
    /// out-of-range request copies nothing.
    pub fn blit(
        &mut self,
        src: PixmapRef<'_>,
        src_x: u32,
        src_y: u32,
        dst_x: u16,
        dst_y: u16,
        width: u16,
        height: u16,
    ) {
        let src_w = src.width() as usize;
        let src_h = src.height() as usize;
        let dst_w = usize::from(self.width);
        let dst_h = usize::from(self.height);
        let src_x = src_x as usize;
        let src_y = src_y as usize;
        let dst_x = usize::from(dst_x);
        let dst_y = usize::from(dst_y);
        if src_x >= src_w || src_y >= src_h || dst_x >= dst_w || dst_y >= dst_h {
            return;
        }
        let w = usize::from(width)
            .min(src_w - src_x)
            .min(dst_w - dst_x);
        let h = usize::from(height)
            .min(src_h - src_y)
            .min(dst_h - dst_y);
        if w == 0 || h == 0 {
            return;
        }

        let src_data = src.data();
        let dst_data = self.pixmap.data_mut();
        for row in 0..h {
            let s = ((src_y + row) * src_w + src_x) * 4;
            let d = ((dst_y + row) * dst_w + dst_x) * 4;
            dst_data[d..d + w * 4].copy_from_slice(&src_data[s..s + w * 4]);
        }
    }

    /// Encodes the canvas as a PNG blob.
    pub fn encode_png(&self) -> Result<Vec<u8>, png::EncodingError> {
        self.pixmap.encode_png()
    }
}

impl Debug for Canvas {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
