// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shelf-packing allocation strategy.

use hashbrown::HashMap;

use crate::canvas::Canvas;
use crate::geom::Rect;
use crate::glyph::{self, PlacedGlyph, RasterizedGlyph};
use crate::index::GlyphIndex;
use crate::preview::{self, PreviewLayers, UsagePreview, UsageStats};
use crate::Atlas;

/// The row currently accepting glyphs.
struct Row {
    /// Left cursor: where the next glyph in this row starts.
    x: u16,
    /// Top edge of the row. Wider than a canvas coordinate so a failed
    /// row advance near the bottom edge cannot wrap.
    y: u32,
    /// Accrued height: the tallest glyph placed in this row so far.
    height: u16,
}

/// Glyph atlas that fills the canvas as a stack of horizontal rows.
///
/// Each row grows to the height of its tallest glyph; when a glyph no
/// longer fits horizontally the row is finalized and a new one starts
/// below it. Simple and fast, at the cost of the vertical slack between
/// a row's height and each glyph in it.
pub struct ShelfAtlas {
    canvas: Canvas,
    index: GlyphIndex,
    row: Row,
    next_index: u32,
}

impl ShelfAtlas {
    /// Creates a shelf atlas over a fresh canvas of the given size.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            canvas: Canvas::new(width, height),
            index: GlyphIndex::new(),
            row: Row {
                x: 0,
                y: 0,
                height: 0,
            },
            next_index: 0,
        }
    }
}

impl Atlas for ShelfAtlas {
    fn allocate(
        &mut self,
        chars: &str,
        style_key: u64,
        glyph: &RasterizedGlyph<'_>,
    ) -> Option<PlacedGlyph> {
        let (gw, gh) = glyph::checked_extent(glyph);
        let canvas_w = u32::from(self.canvas.width());
        let canvas_h = u32::from(self.canvas.height());
        if gw > canvas_w {
            return None;
        }
        if gw > canvas_w - u32::from(self.row.x) {
            // Finalize the row. The height of 1 is corrected by the max
            // below before the cursor ever advances again.
            self.row.x = 0;
            self.row.y += u32::from(self.row.height);
            self.row.height = 1;
        }
        if self.row.y + gh > canvas_h {
            return None;
        }

        let (x, y) = (self.row.x, self.row.y as u16);
        let (width, height) = (gw as u16, gh as u16);
        self.canvas.blit(
            glyph.source,
            glyph.bounds.left,
            glyph.bounds.top,
            x,
            y,
            width,
            height,
        );
        let placed = PlacedGlyph {
            index: self.next_index,
            x,
            y,
            width,
            height,
            bearing_x: glyph.bearing_x,
            bearing_y: glyph.bearing_y,
        };
        self.next_index += 1;
        self.row.x += width;
        self.row.height = self.row.height.max(height);
        self.index.insert(chars, style_key, placed);
        Some(placed)
    }

    fn glyphs(&self) -> &GlyphIndex {
        &self.index
    }

    fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    fn usage_preview(&self) -> UsagePreview {
        let canvas_w = self.canvas.width();
        // Rows are reconstructed from the placements: glyphs sharing a
        // top edge share a row.
        let mut rows: HashMap<u16, (u16, u16)> = HashMap::new();
        let mut layers = PreviewLayers::default();
        let mut used = 0_u64;
        for (_, _, placed) in self.index.iter() {
            let (row_height, max_right) = rows.entry(placed.y).or_insert((0, 0));
            *row_height = (*row_height).max(placed.height);
            *max_right = (*max_right).max(placed.x + placed.width);
            layers.used.push(placed.rect());
            used += placed.rect().area();
        }

        let mut wasted = 0_u64;
        for (_, _, placed) in self.index.iter() {
            let row_height = rows[&placed.y].0;
            if row_height > placed.height {
                let gap = Rect::new(
                    placed.x,
                    placed.y + placed.height,
                    placed.width,
                    row_height - placed.height,
                );
                wasted += gap.area();
                layers.wasted.push(gap);
            }
        }
        for (&y, &(row_height, max_right)) in &rows {
            if u32::from(y) != self.row.y && max_right < canvas_w {
                let tail = Rect::new(max_right, y, canvas_w - max_right, row_height);
                wasted += tail.area();
                layers.wasted.push(tail);
            }
        }

        let stats = UsageStats {
            canvas_width: canvas_w,
            canvas_height: self.canvas.height(),
            used_pixels: used,
            wasted_pixels: wasted,
            restricted_pixels: 0,
            slab_edge_pixels: 0,
            slabs: Vec::new(),
        };
        let image = preview::render(&self.canvas, &layers);
        UsagePreview { image, stats }
    }
}

impl core::fmt::Debug for ShelfAtlas {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShelfAtlas")
            .field("canvas", &self.canvas)
            .field("glyphs", &self.index.len())
            .field("cursor", &(self.row.x, self.row.y))
            .finish_non_exhaustive()
    }
}
