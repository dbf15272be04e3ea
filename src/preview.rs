// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostic rendering of atlas occupancy.
//!
//! The preview classifies every canvas pixel and paints one colored
//! rectangle per classified region over a grey background, then blends
//! the actual canvas on top at half opacity so the placed bitmaps stay
//! recognizable:
//! - green: used (covered by a placed glyph)
//! - orange: wasted (reserved by the packing but unusable)
//! - yellow: restricted (free, but only usable by a glyph with a
//!   matching narrow side)
//! - blue-grey: slab edge remainders outside the entry grid
//!
//! The numeric side of the same classification is returned as
//! [`UsageStats`], whose `Display` renders the textual report.

use core::fmt::{Display, Formatter};
use tiny_skia::{Color, Paint, Pixmap, PixmapMut, PixmapPaint, PixmapRef, Transform};

use crate::canvas::Canvas;
use crate::geom::Rect;

/// A usage snapshot: the diagnostic image plus its pixel accounting.
pub struct UsagePreview {
    /// The rendered diagnostic image, same size as the canvas.
    pub image: Pixmap,
    /// Pixel accounting backing the image.
    pub stats: UsageStats,
}

impl UsagePreview {
    /// Encodes the diagnostic image as a PNG blob.
    pub fn encode_png(&self) -> Result<Vec<u8>, png::EncodingError> {
        self.image.encode_png()
    }
}

impl core::fmt::Debug for UsagePreview {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UsagePreview")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Fill state of one slab.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlabOccupancy {
    /// Slab origin on the canvas.
    pub x: u16,
    /// Slab origin on the canvas.
    pub y: u16,
    /// Entry width this slab is specialized to.
    pub entry_width: u16,
    /// Entry height this slab is specialized to.
    pub entry_height: u16,
    /// Entries placed so far.
    pub count: u16,
    /// Total entry capacity.
    pub capacity: u16,
}

/// Pixel accounting for an atlas at one point in time.
///
/// The categories partition the canvas together with the derived
/// [`free_pixels`](Self::free_pixels): used + wasted + restricted +
/// free equals the canvas area. Slab edge pixels are reported
/// separately; they start out identical to the restricted count and
/// overlap it, shrinking only as edge strips are consumed.
#[derive(Clone, Debug, Default)]
pub struct UsageStats {
    /// Canvas width in pixels.
    pub canvas_width: u16,
    /// Canvas height in pixels.
    pub canvas_height: u16,
    /// Pixels covered by placed glyphs.
    pub used_pixels: u64,
    /// Pixels reserved by the packing but unusable (row gaps and tails
    /// for the shelf strategy, reserved-tile remainders for slabs).
    pub wasted_pixels: u64,
    /// Free pixels in recycled slab strips, allocatable only by glyphs
    /// with a matching narrow side. Zero for the shelf strategy.
    pub restricted_pixels: u64,
    /// Per-slab remainder outside the integer entry grid.
    pub slab_edge_pixels: u64,
    /// Per-slab fill state. Empty for the shelf strategy.
    pub slabs: Vec<SlabOccupancy>,
}

impl UsageStats {
    /// Total canvas area in pixels.
    #[inline]
    pub fn total_pixels(&self) -> u64 {
        u64::from(self.canvas_width) * u64::from(self.canvas_height)
    }

    /// Pixels not yet spoken for by any other category.
    #[inline]
    pub fn free_pixels(&self) -> u64 {
        self.total_pixels() - self.used_pixels - self.wasted_pixels - self.restricted_pixels
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl Display for UsageStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let total = self.total_pixels();
        writeln!(f, "=== Atlas Usage ===")?;
        writeln!(
            f,
            "canvas:     {}x{} ({total} px)",
            self.canvas_width, self.canvas_height
        )?;
        writeln!(
            f,
            "used:       {} px ({:.1}%)",
            self.used_pixels,
            percent(self.used_pixels, total)
        )?;
        writeln!(
            f,
            "wasted:     {} px ({:.1}%)",
            self.wasted_pixels,
            percent(self.wasted_pixels, total)
        )?;
        writeln!(
            f,
            "restricted: {} px ({:.1}%)",
            self.restricted_pixels,
            percent(self.restricted_pixels, total)
        )?;
        writeln!(
            f,
            "free:       {} px ({:.1}%)",
            self.free_pixels(),
            percent(self.free_pixels(), total)
        )?;
        if !self.slabs.is_empty() {
            writeln!(f, "slab edges: {} px", self.slab_edge_pixels)?;
            writeln!(f, "slabs:      {}", self.slabs.len())?;
            for slab in &self.slabs {
                writeln!(
                    f,
                    "  {}x{} entries at ({}, {}): {}/{}",
                    slab.entry_width, slab.entry_height, slab.x, slab.y, slab.count, slab.capacity
                )?;
            }
        }
        Ok(())
    }
}

/// Category rectangles collected by an allocator for rendering.
#[derive(Default)]
pub(crate) struct PreviewLayers {
    pub slab_edges: Vec<Rect>,
    pub restricted: Vec<Rect>,
    pub used: Vec<Rect>,
    pub wasted: Vec<Rect>,
}

/// Paints the preview image for `canvas` from classified rectangles.
pub(crate) fn render(canvas: &Canvas, layers: &PreviewLayers) -> Pixmap {
    let mut image = Pixmap::new(u32::from(canvas.width()), u32::from(canvas.height()))
        .expect("canvas dimensions are non-zero");
    image.fill(Color::from_rgba8(0x60, 0x60, 0x60, 0xFF));

    let mut painter = PreviewPainter::new(image.as_mut());
    let edge = Color::from_rgba8(0x4A, 0x5A, 0x78, 0xFF);
    let restricted = Color::from_rgba8(0xD8, 0xC8, 0x30, 0xFF);
    let used = Color::from_rgba8(0x30, 0xA8, 0x50, 0xFF);
    let wasted = Color::from_rgba8(0xD8, 0x70, 0x28, 0xFF);
    for rect in &layers.slab_edges {
        painter.fill_rect(*rect, edge);
    }
    for rect in &layers.restricted {
        painter.fill_rect(*rect, restricted);
    }
    for rect in &layers.used {
        painter.fill_rect(*rect, used);
    }
    for rect in &layers.wasted {
        painter.fill_rect(*rect, wasted);
    }
    painter.overlay(canvas.pixmap());
    drop(painter);
    image
}

struct PreviewPainter<'a> {
    pixmap: PixmapMut<'a>,
    paint: Paint<'static>,
}

impl PreviewPainter<'_> {
    fn new(pixmap: PixmapMut<'_>) -> PreviewPainter<'_> {
        PreviewPainter {
            pixmap,
            paint: Paint::default(),
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(rect) = tiny_skia::Rect::from_xywh(
            f32::from(rect.x),
            f32::from(rect.y),
            f32::from(rect.width),
            f32::from(rect.height),
        ) else {
            // Zero-sized category rectangles carry no pixels.
            return;
        };
        self.paint.set_color(color);
        self.pixmap
            .fill_rect(rect, &self.paint, Transform::identity(), None);
    }

    fn overlay(&mut self, canvas: PixmapRef<'_>) {
        let paint = PixmapPaint {
            opacity: 0.5,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, canvas, &paint, Transform::identity(), None);
    }
}
