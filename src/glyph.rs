// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rasterized glyph input and placed glyph output records.

use tiny_skia::PixmapRef;

use crate::geom::{BoundingBox, Rect};

/// A glyph bitmap produced by an external rasterizer, ready for placement.
///
/// The atlas only reads the region of `source` covered by `bounds`; the
/// rest of the image (typically padding added by the rasterizer) is
/// ignored. Bearings are carried through to the placement untouched so
/// the renderer can position the bitmap relative to the pen origin.
#[derive(Clone, Copy)]
pub struct RasterizedGlyph<'a> {
    /// The rasterizer's output image.
    pub source: PixmapRef<'a>,
    /// Tight inclusive bounds of the inked pixels within `source`.
    pub bounds: BoundingBox,
    /// Horizontal offset from the pen origin to the left edge, in pixels.
    pub bearing_x: i16,
    /// Vertical offset from the pen origin to the top edge, in pixels.
    pub bearing_y: i16,
}

impl core::fmt::Debug for RasterizedGlyph<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RasterizedGlyph")
            .field("bounds", &self.bounds)
            .field("bearing_x", &self.bearing_x)
            .field("bearing_y", &self.bearing_y)
            .finish_non_exhaustive()
    }
}

/// Location and metrics of a glyph placed on the atlas canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacedGlyph {
    /// Zero-based placement order within the owning allocator.
    ///
    /// Dense: the n-th successful allocation receives index `n - 1`.
    pub index: u32,
    /// X position on the canvas (pixels).
    pub x: u16,
    /// Y position on the canvas (pixels).
    pub y: u16,
    /// Width of the placed bitmap (pixels).
    pub width: u16,
    /// Height of the placed bitmap (pixels).
    pub height: u16,
    /// Horizontal bearing, copied from the rasterized glyph.
    pub bearing_x: i16,
    /// Vertical bearing, copied from the rasterized glyph.
    pub bearing_y: i16,
}

impl PlacedGlyph {
    /// The canvas rectangle occupied by this glyph.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Validates the glyph's bounding box and returns its `(width, height)`.
///
/// An inverted box is a rasterizer bug on the caller's side, not an
/// out-of-space condition, and fails loudly.
pub(crate) fn checked_extent(glyph: &RasterizedGlyph<'_>) -> (u32, u32) {
    let bounds = &glyph.bounds;
    assert!(
        bounds.right >= bounds.left && bounds.bottom >= bounds.top,
        "inverted glyph bounding box: {bounds:?}"
    );
    (bounds.width(), bounds.height())
}
