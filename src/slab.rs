// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slab-packing allocation strategy.
//!
//! The canvas is divided into a grid of fixed-size slabs. Each slab is
//! specialized, on creation, to the exact bounding-box size of the glyph
//! that triggered it and tiles that entry size in row-major order. The
//! remainder of a slab that the entry grid cannot cover (a narrow strip
//! along the right or bottom edge) is recycled: strips are bucketed by
//! their exact narrow dimension and later carved up for glyphs whose
//! smaller side matches.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::canvas::Canvas;
use crate::geom::Rect;
use crate::glyph::{self, PlacedGlyph, RasterizedGlyph};
use crate::index::GlyphIndex;
use crate::preview::{self, PreviewLayers, SlabOccupancy, UsagePreview, UsageStats};
use crate::Atlas;

/// Options to tweak the slab layout of a [`SlabAtlas`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlabOptions {
    /// Slab width in pixels; derived from `scale_factor` when `None`.
    ///
    /// Clamped to the canvas width.
    pub slab_width: Option<u16>,
    /// Slab height in pixels; defaults to the slab width.
    ///
    /// Clamped to the canvas height.
    pub slab_height: Option<u16>,
    /// Device pixel ratio of the display the atlas renders for.
    ///
    /// Higher ratios rasterize larger glyph bitmaps, so the default
    /// slab side doubles per integral scale step: `64 << (floor - 1)`.
    pub scale_factor: f32,
}

/// Default options: slab size derived from a 1.0 scale factor.
pub const DEFAULT_SLAB_OPTIONS: SlabOptions = SlabOptions {
    slab_width: None,
    slab_height: None,
    scale_factor: 1.0,
};

impl Default for SlabOptions {
    fn default() -> Self {
        DEFAULT_SLAB_OPTIONS
    }
}

fn default_slab_side(scale_factor: f32) -> u32 {
    let scale = scale_factor.floor().clamp(1.0, 8.0) as u32;
    64 << (scale - 1)
}

/// One fixed-size region of the canvas, tiling a single entry size.
struct Slab {
    x: u16,
    y: u16,
    entry_width: u16,
    entry_height: u16,
    /// Entries placed so far, in row-major order.
    count: u16,
}

/// Glyph atlas that groups like-sized glyphs into fixed-size slabs.
///
/// Wastes nothing inside a slab (entries are exact-size) and recycles
/// the slab edges for narrow glyphs, at the cost of fragmenting the
/// canvas when glyph sizes are diverse.
pub struct SlabAtlas {
    canvas: Canvas,
    index: GlyphIndex,
    slab_width: u16,
    slab_height: u16,
    slabs_per_row: u16,
    slabs: Vec<Slab>,
    /// The one slab per entry size that still has room.
    active: HashMap<(u16, u16), usize>,
    /// Vertical edge strips bucketed by their exact width.
    unused_by_width: HashMap<u16, SmallVec<[Rect; 2]>>,
    /// Horizontal edge strips bucketed by their exact height.
    unused_by_height: HashMap<u16, SmallVec<[Rect; 2]>>,
    /// Carve remainders: still free, but no longer allocatable.
    leftovers: Vec<Rect>,
    /// Total area of glyphs placed into recycled strips.
    strip_used_pixels: u64,
    next_index: u32,
}

impl SlabAtlas {
    /// Creates a slab atlas over a fresh canvas with default options.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn new(width: u16, height: u16) -> Self {
        Self::with_options(width, height, SlabOptions::default())
    }

    /// Creates a slab atlas with explicit options.
    ///
    /// # Panics
    ///
    /// Panics if either canvas dimension or an explicit slab dimension
    /// is zero.
    pub fn with_options(width: u16, height: u16, options: SlabOptions) -> Self {
        let side = default_slab_side(options.scale_factor);
        let slab_width = options
            .slab_width
            .map_or(side, u32::from)
            .min(u32::from(width)) as u16;
        let slab_height = options
            .slab_height
            .map_or(side, u32::from)
            .min(u32::from(height)) as u16;
        assert!(
            slab_width > 0 && slab_height > 0,
            "slab dimensions must be non-zero"
        );
        Self {
            canvas: Canvas::new(width, height),
            index: GlyphIndex::new(),
            slab_width,
            slab_height,
            slabs_per_row: width / slab_width,
            slabs: Vec::new(),
            active: HashMap::new(),
            unused_by_width: HashMap::new(),
            unused_by_height: HashMap::new(),
            leftovers: Vec::new(),
            strip_used_pixels: 0,
            next_index: 0,
        }
    }

    /// Entry columns and rows of a slab with the given entry size.
    fn grid(&self, entry_width: u16, entry_height: u16) -> (u16, u16) {
        (
            self.slab_width / entry_width,
            self.slab_height / entry_height,
        )
    }

    /// Takes the next row-major position in a slab with room.
    fn place_in_slab(&mut self, slab_idx: usize) -> (u16, u16) {
        let (per_row, per_col) = self.grid(
            self.slabs[slab_idx].entry_width,
            self.slabs[slab_idx].entry_height,
        );
        let slab = &mut self.slabs[slab_idx];
        let x = slab.x + (slab.count % per_row) * slab.entry_width;
        let y = slab.y + (slab.count / per_row) * slab.entry_height;
        slab.count += 1;
        let entry = (slab.entry_width, slab.entry_height);
        if slab.count == per_row * per_col {
            self.active.remove(&entry);
        }
        (x, y)
    }

    /// Carves a `gw x gh` placement out of a recycled strip, if one with
    /// the matching narrow dimension can hold it.
    fn carve_unused(&mut self, gw: u16, gh: u16) -> Option<(u16, u16)> {
        let mut destination = None;
        let mut leftover = None;
        if gw < gh {
            // Scan the bucket from the end: the most recently added
            // strip is the likely winner and cheap to remove.
            let bucket = self.unused_by_width.get_mut(&gw)?;
            for i in (0..bucket.len()).rev() {
                if bucket[i].width >= gw && bucket[i].height >= gh {
                    let rect = &mut bucket[i];
                    destination = Some((rect.x, rect.y));
                    if rect.width > gw {
                        leftover = Some(Rect::new(rect.x + gw, rect.y, rect.width - gw, gh));
                    }
                    rect.y += gh;
                    rect.height -= gh;
                    if rect.height == 0 {
                        bucket.swap_remove(i);
                    }
                    break;
                }
            }
        } else {
            let bucket = self.unused_by_height.get_mut(&gh)?;
            for i in (0..bucket.len()).rev() {
                if bucket[i].width >= gw && bucket[i].height >= gh {
                    let rect = &mut bucket[i];
                    destination = Some((rect.x, rect.y));
                    if rect.height > gh {
                        leftover = Some(Rect::new(rect.x, rect.y + gh, gw, rect.height - gh));
                    }
                    rect.x += gw;
                    rect.width -= gw;
                    if rect.width == 0 {
                        bucket.swap_remove(i);
                    }
                    break;
                }
            }
        }
        if let Some(leftover) = leftover {
            self.leftovers.push(leftover);
        }
        destination
    }

    /// Creates a slab for the given entry size at the next grid
    /// position, recording its edge strips. `None` when the grid is
    /// exhausted.
    fn new_slab(&mut self, entry_width: u16, entry_height: u16) -> Option<usize> {
        let i = self.slabs.len();
        let col = i % usize::from(self.slabs_per_row);
        let row = i / usize::from(self.slabs_per_row);
        let y = row * usize::from(self.slab_height);
        if y + usize::from(self.slab_height) > usize::from(self.canvas.height()) {
            return None;
        }
        let x = (col * usize::from(self.slab_width)) as u16;
        let y = y as u16;

        let unused_w = self.slab_width % entry_width;
        let unused_h = self.slab_height % entry_height;
        if unused_w > 0 {
            self.unused_by_width.entry(unused_w).or_default().push(Rect::new(
                x + self.slab_width - unused_w,
                y,
                unused_w,
                self.slab_height - unused_h,
            ));
        }
        if unused_h > 0 {
            self.unused_by_height.entry(unused_h).or_default().push(Rect::new(
                x,
                y + self.slab_height - unused_h,
                self.slab_width,
                unused_h,
            ));
        }
        self.active.insert((entry_width, entry_height), i);
        self.slabs.push(Slab {
            x,
            y,
            entry_width,
            entry_height,
            count: 0,
        });
        Some(i)
    }
}

impl Atlas for SlabAtlas {
    fn allocate(
        &mut self,
        chars: &str,
        style_key: u64,
        glyph: &RasterizedGlyph<'_>,
    ) -> Option<PlacedGlyph> {
        let (gw, gh) = glyph::checked_extent(glyph);
        if gw > u32::from(self.canvas.width()) || gh > u32::from(self.canvas.height()) {
            return None;
        }
        let (gw, gh) = (gw as u16, gh as u16);

        let (x, y, in_strip) = if let Some(&slab_idx) = self.active.get(&(gw, gh)) {
            let (x, y) = self.place_in_slab(slab_idx);
            (x, y, false)
        } else if let Some((x, y)) = self.carve_unused(gw, gh) {
            (x, y, true)
        } else {
            if gw > self.slab_width || gh > self.slab_height {
                return None;
            }
            let slab_idx = self.new_slab(gw, gh)?;
            let (x, y) = self.place_in_slab(slab_idx);
            (x, y, false)
        };

        self.canvas.blit(
            glyph.source,
            glyph.bounds.left,
            glyph.bounds.top,
            x,
            y,
            gw,
            gh,
        );
        let placed = PlacedGlyph {
            index: self.next_index,
            x,
            y,
            width: gw,
            height: gh,
            bearing_x: glyph.bearing_x,
            bearing_y: glyph.bearing_y,
        };
        self.next_index += 1;
        if in_strip {
            self.strip_used_pixels += u64::from(gw) * u64::from(gh);
        }
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
        let mut layers = PreviewLayers::default();
        let mut used = 0_u64;
        for (_, _, placed) in self.index.iter() {
            layers.used.push(placed.rect());
            used += placed.rect().area();
        }

        let slab_area = u64::from(self.slab_width) * u64::from(self.slab_height);
        let mut slab_edge = 0_u64;
        let mut reserved = 0_u64;
        let mut occupancy = Vec::with_capacity(self.slabs.len());
        for slab in &self.slabs {
            let (per_row, per_col) = self.grid(slab.entry_width, slab.entry_height);
            let grid_area = u64::from(per_row)
                * u64::from(slab.entry_width)
                * u64::from(per_col)
                * u64::from(slab.entry_height);
            slab_edge += slab_area - grid_area;
            reserved +=
                u64::from(slab.count) * u64::from(slab.entry_width) * u64::from(slab.entry_height);
            occupancy.push(SlabOccupancy {
                x: slab.x,
                y: slab.y,
                entry_width: slab.entry_width,
                entry_height: slab.entry_height,
                count: slab.count,
                capacity: per_row * per_col,
            });

            let unused_w = self.slab_width % slab.entry_width;
            let unused_h = self.slab_height % slab.entry_height;
            if unused_w > 0 {
                layers.slab_edges.push(Rect::new(
                    slab.x + self.slab_width - unused_w,
                    slab.y,
                    unused_w,
                    self.slab_height - unused_h,
                ));
            }
            if unused_h > 0 {
                layers.slab_edges.push(Rect::new(
                    slab.x,
                    slab.y + self.slab_height - unused_h,
                    self.slab_width,
                    unused_h,
                ));
            }
        }

        let mut restricted = 0_u64;
        for bucket in self
            .unused_by_width
            .values()
            .chain(self.unused_by_height.values())
        {
            for rect in bucket {
                restricted += rect.area();
                layers.restricted.push(*rect);
            }
        }
        for rect in &self.leftovers {
            restricted += rect.area();
            layers.restricted.push(*rect);
        }

        // Reserved entry tiles minus the glyphs placed in them.
        let wasted = reserved + self.strip_used_pixels - used;

        let stats = UsageStats {
            canvas_width: self.canvas.width(),
            canvas_height: self.canvas.height(),
            used_pixels: used,
            wasted_pixels: wasted,
            restricted_pixels: restricted,
            slab_edge_pixels: slab_edge,
            slabs: occupancy,
        };
        let image = preview::render(&self.canvas, &layers);
        UsagePreview { image, stats }
    }
}

impl core::fmt::Debug for SlabAtlas {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlabAtlas")
            .field("canvas", &self.canvas)
            .field("glyphs", &self.index.len())
            .field("slab_width", &self.slab_width)
            .field("slab_height", &self.slab_height)
            .field("slabs", &self.slabs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::BoundingBox;
    use tiny_skia::Pixmap;

    fn source() -> Pixmap {
        let mut pixmap = Pixmap::new(64, 64).unwrap();
        pixmap.fill(tiny_skia::Color::from_rgba8(255, 255, 255, 255));
        pixmap
    }

    fn raster(source: &Pixmap, width: u32, height: u32) -> RasterizedGlyph<'_> {
        RasterizedGlyph {
            source: source.as_ref(),
            bounds: BoundingBox::new(0, 0, width - 1, height - 1),
            bearing_x: 0,
            bearing_y: 0,
        }
    }

    #[test]
    fn default_slab_side_scales_with_dpr() {
        assert_eq!(default_slab_side(1.0), 64);
        assert_eq!(default_slab_side(1.5), 64);
        assert_eq!(default_slab_side(2.0), 128);
        assert_eq!(default_slab_side(3.0), 256);
        assert_eq!(default_slab_side(0.5), 64);
    }

    #[test]
    fn first_allocation_creates_a_slab_with_edge_strips() {
        let src = source();
        let mut atlas = SlabAtlas::new(128, 128);
        assert_eq!(atlas.slab_width, 64);
        assert_eq!(atlas.slab_height, 64);

        let placed = atlas.allocate("g", 0, &raster(&src, 10, 10)).unwrap();
        assert_eq!((placed.x, placed.y, placed.width, placed.height), (0, 0, 10, 10));
        assert_eq!(atlas.slabs.len(), 1);
        assert_eq!(atlas.grid(10, 10), (6, 6));
        assert_eq!(
            atlas.unused_by_width[&4].as_slice(),
            [Rect::new(60, 0, 4, 60)]
        );
        assert_eq!(
            atlas.unused_by_height[&4].as_slice(),
            [Rect::new(0, 60, 64, 4)]
        );
    }

    #[test]
    fn narrow_glyph_carves_a_matching_strip() {
        let src = source();
        let mut atlas = SlabAtlas::new(128, 128);
        atlas.allocate("g", 0, &raster(&src, 10, 10)).unwrap();

        // Smaller side is the width (4); it matches the vertical strip.
        let placed = atlas.allocate("n", 0, &raster(&src, 4, 8)).unwrap();
        assert_eq!((placed.x, placed.y, placed.width, placed.height), (60, 0, 4, 8));
        assert_eq!(
            atlas.unused_by_width[&4].as_slice(),
            [Rect::new(60, 8, 4, 52)]
        );
        // No second slab was created.
        assert_eq!(atlas.slabs.len(), 1);
    }

    #[test]
    fn like_sized_glyphs_share_the_active_slab() {
        let src = source();
        let mut atlas = SlabAtlas::new(128, 128);
        let a = atlas.allocate("a", 0, &raster(&src, 10, 10)).unwrap();
        let b = atlas.allocate("b", 0, &raster(&src, 10, 10)).unwrap();
        let c = atlas.allocate("c", 0, &raster(&src, 10, 10)).unwrap();
        assert_eq!((a.x, a.y), (0, 0));
        assert_eq!((b.x, b.y), (10, 0));
        assert_eq!((c.x, c.y), (20, 0));
        assert_eq!(atlas.slabs.len(), 1);
    }

    #[test]
    fn entries_wrap_to_the_next_slab_row() {
        let src = source();
        let options = SlabOptions {
            slab_width: Some(8),
            slab_height: Some(8),
            ..SlabOptions::default()
        };
        let mut atlas = SlabAtlas::with_options(16, 16, options);
        let mut placements = Vec::new();
        for n in 0..4 {
            let placed = atlas
                .allocate(&format!("g{n}"), 0, &raster(&src, 4, 4))
                .unwrap();
            placements.push((placed.x, placed.y));
        }
        assert_eq!(placements, [(0, 0), (4, 0), (0, 4), (4, 4)]);
    }

    #[test]
    fn full_slab_leaves_the_active_map() {
        let src = source();
        let options = SlabOptions {
            slab_width: Some(4),
            slab_height: Some(4),
            ..SlabOptions::default()
        };
        let mut atlas = SlabAtlas::with_options(8, 8, options);
        for n in 0..4 {
            atlas
                .allocate(&format!("g{n}"), 0, &raster(&src, 2, 2))
                .unwrap();
        }
        assert!(atlas.active.is_empty());
        // The next like-sized glyph opens a second slab.
        let placed = atlas.allocate("g4", 0, &raster(&src, 2, 2)).unwrap();
        assert_eq!((placed.x, placed.y), (4, 0));
        assert_eq!(atlas.slabs.len(), 2);
    }

    #[test]
    fn exhausted_grid_returns_none_without_side_effects() {
        let src = source();
        let options = SlabOptions {
            slab_width: Some(4),
            slab_height: Some(4),
            ..SlabOptions::default()
        };
        let mut atlas = SlabAtlas::with_options(4, 4, options);
        atlas.allocate("a", 0, &raster(&src, 4, 4)).unwrap();
        assert!(atlas.allocate("b", 0, &raster(&src, 4, 4)).is_none());
        assert_eq!(atlas.glyphs().len(), 1);
        assert_eq!(atlas.next_index, 1);
    }

    #[test]
    fn larger_than_slab_returns_none() {
        let src = source();
        let options = SlabOptions {
            slab_width: Some(8),
            slab_height: Some(8),
            ..SlabOptions::default()
        };
        let mut atlas = SlabAtlas::with_options(32, 32, options);
        assert!(atlas.allocate("big", 0, &raster(&src, 9, 2)).is_none());
        assert!(atlas.allocate("tall", 0, &raster(&src, 2, 9)).is_none());
        assert!(atlas.glyphs().is_empty());
    }

    #[test]
    fn perfect_tiling_creates_no_strips() {
        let src = source();
        let mut atlas = SlabAtlas::new(64, 64);
        for n in 0..16 {
            atlas
                .allocate(&format!("g{n}"), 0, &raster(&src, 16, 16))
                .unwrap();
        }
        assert!(atlas.unused_by_width.is_empty());
        assert!(atlas.unused_by_height.is_empty());
        // One slab, completely full.
        assert_eq!(atlas.slabs.len(), 1);
        assert_eq!(atlas.slabs[0].count, 16);
        assert!(atlas.allocate("extra", 0, &raster(&src, 16, 16)).is_none());
    }

    #[test]
    fn horizontal_strip_is_consumed_to_exhaustion() {
        let src = source();
        let mut atlas = SlabAtlas::new(64, 64);
        atlas.allocate("g", 0, &raster(&src, 10, 10)).unwrap();
        // The bottom strip is (0, 60, 64, 4).
        let a = atlas.allocate("a", 0, &raster(&src, 10, 4)).unwrap();
        assert_eq!((a.x, a.y), (0, 60));
        assert_eq!(
            atlas.unused_by_height[&4].as_slice(),
            [Rect::new(10, 60, 54, 4)]
        );
        let b = atlas.allocate("b", 0, &raster(&src, 54, 4)).unwrap();
        assert_eq!((b.x, b.y), (10, 60));
        // Fully consumed: the bucket no longer offers the strip.
        assert!(atlas.unused_by_height[&4].is_empty());
    }

    #[test]
    fn strips_only_serve_glyphs_with_the_matching_narrow_side() {
        let src = source();
        let mut atlas = SlabAtlas::new(128, 128);
        atlas.allocate("g", 0, &raster(&src, 10, 10)).unwrap();
        // Narrow side 3 matches no strip bucket (both strips are 4), so
        // a new slab opens even though the strips have room.
        let placed = atlas.allocate("s", 0, &raster(&src, 20, 3)).unwrap();
        assert_eq!((placed.x, placed.y), (64, 0));
        assert_eq!(atlas.slabs.len(), 2);
    }

    #[test]
    fn recycled_strips_stay_inside_their_slab_and_off_glyphs() {
        let src = source();
        let mut atlas = SlabAtlas::new(128, 128);
        let sizes = [(10, 10), (4, 8), (7, 7), (12, 5), (10, 10)];
        for (n, &(w, h)) in sizes.iter().enumerate() {
            atlas
                .allocate(&format!("g{n}"), 0, &raster(&src, w, h))
                .unwrap();
        }

        let slabs: Vec<Rect> = atlas
            .slabs
            .iter()
            .map(|slab| Rect::new(slab.x, slab.y, atlas.slab_width, atlas.slab_height))
            .collect();
        let placed: Vec<Rect> = atlas.index.iter().map(|(_, _, glyph)| glyph.rect()).collect();
        let strips: Vec<Rect> = atlas
            .unused_by_width
            .values()
            .chain(atlas.unused_by_height.values())
            .flat_map(|bucket| bucket.iter().copied())
            .chain(atlas.leftovers.iter().copied())
            .collect();
        assert!(!strips.is_empty());

        for strip in &strips {
            assert!(
                slabs.iter().any(|slab| slab.contains(strip)),
                "strip {strip:?} escapes every slab"
            );
            for glyph in &placed {
                assert!(!strip.intersects(glyph), "strip {strip:?} overlaps {glyph:?}");
            }
        }
        for (i, a) in strips.iter().enumerate() {
            for b in &strips[i + 1..] {
                assert!(!a.intersects(b), "strips {a:?} and {b:?} overlap");
            }
        }
    }

    #[test]
    fn usage_accounting_matches_the_geometry() {
        let src = source();
        let mut atlas = SlabAtlas::new(128, 128);
        atlas.allocate("g", 0, &raster(&src, 10, 10)).unwrap();

        let stats = atlas.usage_preview().stats;
        assert_eq!(stats.used_pixels, 100);
        assert_eq!(stats.wasted_pixels, 0);
        // Right strip 4x60 plus bottom strip 64x4.
        assert_eq!(stats.restricted_pixels, 240 + 256);
        assert_eq!(stats.slab_edge_pixels, 240 + 256);
        assert_eq!(stats.slabs.len(), 1);
        assert_eq!(stats.slabs[0].capacity, 36);
        assert_eq!(stats.slabs[0].count, 1);

        // Consume part of a strip: restricted shrinks by the glyph area.
        atlas.allocate("n", 0, &raster(&src, 4, 8)).unwrap();
        let stats = atlas.usage_preview().stats;
        assert_eq!(stats.used_pixels, 132);
        assert_eq!(stats.wasted_pixels, 0);
        assert_eq!(stats.restricted_pixels, 496 - 32);
        assert_eq!(
            stats.free_pixels(),
            stats.total_pixels()
                - stats.used_pixels
                - stats.wasted_pixels
                - stats.restricted_pixels
        );
    }
}
