// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Texture atlas allocation for rasterized glyphs.
//!
//! This crate packs glyph bitmaps produced by an external rasterizer
//! onto a fixed-size canvas and remembers where each one landed, so a
//! renderer can reference placements by texel coordinates. Two
//! interchangeable strategies implement the [`Atlas`] trait:
//!
//! - [`ShelfAtlas`] fills the canvas as a stack of horizontal rows.
//!   Simple and fast, but tall neighbors waste the vertical slack of
//!   short glyphs.
//! - [`SlabAtlas`] groups like-sized glyphs into fixed-size slabs and
//!   recycles the slab edges for glyphs with a matching narrow side.
//!
//! Both are append-only: placements are never moved or evicted. A
//! caller that runs out of space seals the atlas and starts a new one.
//! [`Atlas::usage_preview`] renders a diagnostic image of the packing
//! with a pixel-accounting report for tuning fill efficiency.
//!
//! ```
//! use parley_atlas::tiny_skia::Pixmap;
//! use parley_atlas::{Atlas, BoundingBox, RasterizedGlyph, SlabAtlas};
//!
//! // Normally produced by a rasterizer (e.g. swash).
//! let bitmap = Pixmap::new(16, 16).unwrap();
//! let glyph = RasterizedGlyph {
//!     source: bitmap.as_ref(),
//!     bounds: BoundingBox::new(0, 0, 11, 13),
//!     bearing_x: 1,
//!     bearing_y: -10,
//! };
//!
//! let mut atlas = SlabAtlas::new(512, 512);
//! let placed = atlas.allocate("a", 0, &glyph).expect("atlas has room");
//! assert_eq!(atlas.glyphs().get("a", 0), Some(&placed));
//! assert_eq!((placed.width, placed.height), (12, 14));
//! ```

// LINEBENDER LINT SET - lib.rs - v3
// See https://linebender.org/wiki/canonical-lints/
// These lints shouldn't apply to examples or tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
// These lints shouldn't apply to examples.
#![warn(clippy::print_stdout, clippy::print_stderr)]
// END LINEBENDER LINT SET

pub use tiny_skia;

mod canvas;
mod geom;
mod glyph;
mod index;
mod preview;
mod shelf;
mod slab;

pub use canvas::Canvas;
pub use geom::{BoundingBox, Rect};
pub use glyph::{PlacedGlyph, RasterizedGlyph};
pub use index::GlyphIndex;
pub use preview::{SlabOccupancy, UsagePreview, UsageStats};
pub use shelf::ShelfAtlas;
pub use slab::{SlabAtlas, SlabOptions, DEFAULT_SLAB_OPTIONS};

/// A glyph atlas: placement strategy, canvas, and glyph index.
///
/// The strategies are interchangeable behind `&mut dyn Atlas`;
/// `allocate` runs once per unique glyph, so dynamic dispatch is
/// amortized cheap, and hot rendering paths read the index and canvas
/// directly.
pub trait Atlas {
    /// Places a rasterized glyph on the canvas and indexes it under
    /// `(chars, style_key)`.
    ///
    /// Returns `None` when the glyph fits nowhere on the canvas; in
    /// that case nothing is drawn or recorded. Allocating an already
    /// indexed key places the glyph again and overwrites the index
    /// entry, orphaning the previous placement; callers are expected
    /// to check [`glyphs`](Self::glyphs) first.
    ///
    /// # Panics
    ///
    /// Panics if the glyph's bounding box is inverted.
    fn allocate(
        &mut self,
        chars: &str,
        style_key: u64,
        glyph: &RasterizedGlyph<'_>,
    ) -> Option<PlacedGlyph>;

    /// The index of every placed glyph.
    fn glyphs(&self) -> &GlyphIndex;

    /// The canvas the glyphs were drawn onto.
    fn canvas(&self) -> &Canvas;

    /// Renders the current packing as a diagnostic image with pixel
    /// accounting.
    fn usage_preview(&self) -> UsagePreview;
}
