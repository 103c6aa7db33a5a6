//! Tap-to-mark placement on reference vehicle diagrams
//!
//! Marks are stored normalized to the displayed image's measured layout
//! (`nx = x / width`, `ny = y / height`) so they survive any later rendering
//! size. Each mark remembers the image it was placed on; marks from one
//! image are never drawn on another.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::defect::DefectDetails;

/// One of the three fixed local reference images used during fresh inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKey {
    #[default]
    Vehicle1,
    Vehicle2,
    Vehicle3,
}

impl ImageKey {
    pub const ALL: [ImageKey; 3] = [ImageKey::Vehicle1, ImageKey::Vehicle2, ImageKey::Vehicle3];

    fn position(&self) -> usize {
        match self {
            ImageKey::Vehicle1 => 0,
            ImageKey::Vehicle2 => 1,
            ImageKey::Vehicle3 => 2,
        }
    }

    pub fn next(&self) -> ImageKey {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn previous(&self) -> ImageKey {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKey::Vehicle1 => "vehicle1",
            ImageKey::Vehicle2 => "vehicle2",
            ImageKey::Vehicle3 => "vehicle3",
        }
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Measured pixel size of the displayed image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutSize {
    pub width: f64,
    pub height: f64,
}

impl LayoutSize {
    /// `None` for zero, negative or non-finite dimensions
    pub fn new(width: f64, height: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        (valid(width) && valid(height)).then_some(Self { width, height })
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x.is_finite() && y.is_finite() && (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }
}

/// Converts normalized coordinates back to pixels for a given layout
pub fn denormalize(nx: f64, ny: f64, size: LayoutSize) -> (f64, f64) {
    (nx * size.width, ny * size.height)
}

pub fn is_normalized(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

/// A defect location on a reference image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub nx: f64,
    pub ny: f64,
    pub image: ImageKey,
}

impl Mark {
    pub fn to_pixels(&self, size: LayoutSize) -> (f64, f64) {
        denormalize(self.nx, self.ny, size)
    }

    pub fn is_valid(&self) -> bool {
        is_normalized(self.nx) && is_normalized(self.ny)
    }
}

/// Viewer state for the reference-image carousel.
///
/// Taps are only accepted once the currently displayed image has been
/// measured; switching images drops the measurement until the next layout pass.
#[derive(Debug, Clone, Default)]
pub struct MarkCanvas {
    current: ImageKey,
    measured: Option<LayoutSize>,
}

impl MarkCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the canvas on the image a defect was last marked on
    pub fn for_details(details: &DefectDetails) -> Self {
        Self {
            current: details.selected_image.unwrap_or_default(),
            measured: None,
        }
    }

    pub fn current_image(&self) -> ImageKey {
        self.current
    }

    pub fn measured(&self) -> Option<LayoutSize> {
        self.measured
    }

    pub fn next_image(&mut self) -> ImageKey {
        self.show(self.current.next())
    }

    pub fn previous_image(&mut self) -> ImageKey {
        self.show(self.current.previous())
    }

    pub fn show(&mut self, image: ImageKey) -> ImageKey {
        if image != self.current {
            self.current = image;
            self.measured = None;
        }
        self.current
    }

    /// Records the layout of the displayed image; invalid sizes leave the canvas unmeasured
    pub fn measure(&mut self, width: f64, height: f64) {
        self.measured = LayoutSize::new(width, height);
    }

    /// Converts a tap into a mark on the current image.
    /// Returns `None` before measurement or when the tap misses the image.
    pub fn tap(&self, x: f64, y: f64) -> Option<Mark> {
        let size = self.measured?;
        if !size.contains(x, y) {
            return None;
        }
        Some(Mark {
            nx: x / size.width,
            ny: y / size.height,
            image: self.current,
        })
    }

    /// Taps and, on success, appends the mark to `details` and points
    /// `selected_image` at the current image
    pub fn place(&self, details: &mut DefectDetails, x: f64, y: f64) -> Option<Mark> {
        let mark = self.tap(x, y)?;
        details.selected_image = Some(self.current);
        details.marks.push(mark);
        Some(mark)
    }

    /// Marks to draw on the currently displayed image
    pub fn visible_marks<'a>(&self, details: &'a DefectDetails) -> Vec<&'a Mark> {
        details.marks.iter().filter(|m| m.image == self.current).collect()
    }
}
