//! UI elements - the normalized rectangles a session accumulates.

use serde::{Deserialize, Serialize};

use crate::{RaterError, RaterResult};

/// Pixel size of the annotated surface at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CanvasDocument")]
pub struct Canvas {
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
struct CanvasDocument {
    width: f64,
    height: f64,
}

impl TryFrom<CanvasDocument> for Canvas {
    type Error = RaterError;

    fn try_from(doc: CanvasDocument) -> Result<Self, Self::Error> {
        Self::new(doc.width, doc.height)
    }
}

impl Canvas {
    /// Create a canvas descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidCanvas`] unless both dimensions are finite
    /// and strictly positive.
    pub fn new(width: f64, height: f64) -> RaterResult<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(width) && valid(height) {
            Ok(Self { width, height })
        } else {
            Err(RaterError::InvalidCanvas { width, height })
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }
}

/// A point in canvas pixel coordinates, as reported by the gesture source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X position (pixels from left).
    pub x: f64,
    /// Y position (pixels from top).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A normalized axis-aligned rectangle identifying a region of interest.
///
/// All four geometric fields are fractions of the canvas dimensions and lie in
/// `[0, 1]`. Identity is geometric: two elements with the same bounds compare
/// equal regardless of their annotation, which is what lets the session find
/// and replace an element by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ElementDocument")]
pub struct UIElement {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotation: Option<String>,
}

#[derive(Deserialize)]
struct ElementDocument {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    #[serde(default)]
    annotation: Option<String>,
}

impl TryFrom<ElementDocument> for UIElement {
    type Error = RaterError;

    fn try_from(doc: ElementDocument) -> Result<Self, Self::Error> {
        let element = Self::new(doc.x, doc.y, doc.width, doc.height)?;
        Ok(match doc.annotation {
            Some(text) => element.with_annotation(text),
            None => element,
        })
    }
}

fn check_unit(name: &str, value: f64) -> RaterResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RaterError::InvalidGeometry(format!(
            "{name}={value} outside [0, 1]"
        )))
    }
}

impl UIElement {
    /// Create an unannotated element.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidGeometry`] if any field is outside `[0, 1]`
    /// (NaN included). Values are never clamped.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> RaterResult<Self> {
        check_unit("x", x)?;
        check_unit("y", y)?;
        check_unit("width", width)?;
        check_unit("height", height)?;
        Ok(Self {
            x,
            y,
            width,
            height,
            annotation: None,
        })
    }

    /// Build an element from the two corners of a completed drag, in canvas
    /// pixels. Corner order does not matter.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidGeometry`] if either corner lies outside
    /// the canvas.
    pub fn from_corners(a: Point, b: Point, canvas: &Canvas) -> RaterResult<Self> {
        let left = a.x.min(b.x);
        let top = a.y.min(b.y);
        let width = (a.x - b.x).abs();
        let height = (a.y - b.y).abs();
        Self::new(
            left / canvas.width(),
            top / canvas.height(),
            width / canvas.width(),
            height / canvas.height(),
        )
    }

    /// Return a copy carrying the given annotation.
    #[must_use]
    pub fn with_annotation(mut self, text: impl Into<String>) -> Self {
        self.annotation = Some(text.into());
        self
    }

    /// Relative x position.
    #[must_use]
    pub const fn x(&self) -> f64 {
        self.x
    }

    /// Relative y position.
    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// Normalized width.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Normalized height.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Free-text annotation, if any.
    #[must_use]
    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    /// Check if a normalized point lies within this element.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// Absolute x coordinate on `canvas`.
    #[must_use]
    pub fn absolute_x(&self, canvas: &Canvas) -> f64 {
        self.x * canvas.width()
    }

    /// Absolute y coordinate on `canvas`.
    #[must_use]
    pub fn absolute_y(&self, canvas: &Canvas) -> f64 {
        self.y * canvas.height()
    }

    /// Absolute width on `canvas`.
    #[must_use]
    pub fn absolute_width(&self, canvas: &Canvas) -> f64 {
        self.width * canvas.width()
    }

    /// Absolute height on `canvas`.
    #[must_use]
    pub fn absolute_height(&self, canvas: &Canvas) -> f64 {
        self.height * canvas.height()
    }

    /// Absolute midpoint on `canvas`.
    #[must_use]
    pub fn midpoint(&self, canvas: &Canvas) -> Point {
        Point::new(
            self.absolute_x(canvas) + self.absolute_width(canvas) / 2.0,
            self.absolute_y(canvas) + self.absolute_height(canvas) / 2.0,
        )
    }

    /// Absolute area on `canvas`.
    #[must_use]
    pub fn area(&self, canvas: &Canvas) -> f64 {
        self.absolute_width(canvas) * self.absolute_height(canvas)
    }
}

impl PartialEq for UIElement {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
    }
}

impl std::fmt::Display for UIElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.3}, {:.3}, {:.3}x{:.3})",
            self.x, self.y, self.width, self.height
        )
    }
}
