//! Geometry primitives and conversions between the three coordinate spaces:
//! displayed pixels (the scaled preview), logical pixels (the original image)
//! and percentages (the focal point).

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Dimensions of the full original image in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
}

impl ImageBounds {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

impl fmt::Display for ImageBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A crop rectangle in logical image pixels, corners `(x1, y1)` and `(x2, y2)`.
///
/// Rectangles produced by dragging only guarantee `x1 <= x2` and `y1 <= y2`;
/// a submitted rectangle must be strictly ordered, which
/// [`parse_and_validate`](crate::constraint::parse_and_validate) enforces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Rectangle {
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// The rectangle covering the whole image.
    pub const fn full(bounds: ImageBounds) -> Self {
        Self::new(0, 0, bounds.width, bounds.height)
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// Inclusive on all four sides.
    pub fn contains(&self, point: Point) -> bool {
        f64::from(self.x1) <= point.x
            && point.x <= f64::from(self.x2)
            && f64::from(self.y1) <= point.y
            && point.y <= f64::from(self.y2)
    }

    pub fn to_field(self) -> String {
        self.to_string()
    }

    /// Reads four comma separated coordinates without checking ordering or
    /// bounds. Used to draw whatever the field currently holds.
    pub fn parse(serialized: &str) -> Option<Self> {
        let mut parts = serialized.split(',').map(|p| p.trim().parse::<u32>().ok());
        let rect = Self::new(
            parts.next()??,
            parts.next()??,
            parts.next()??,
            parts.next()??,
        );
        parts.next().is_none().then_some(rect)
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Serializes an optional rectangle into the field format, where the empty
/// string means "no rectangle".
pub fn rectangle_to_field(rectangle: Option<Rectangle>) -> String {
    rectangle.map(Rectangle::to_field).unwrap_or_default()
}

/// Focal point as percentages (0-100) of the image width and height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FocalPoint {
    pub x: f64,
    pub y: f64,
}

impl FocalPoint {
    pub const CENTER: Self = Self { x: 50.0, y: 50.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Parses `"fx,fy"` with both values in `0..=100`. Returns `None` for
    /// anything else.
    pub fn parse(serialized: &str) -> Option<Self> {
        let (x, y) = serialized.trim().split_once(',')?;
        let x = x.trim().parse::<f64>().ok()?;
        let y = y.trim().parse::<f64>().ok()?;
        let percentage = |value: f64| (0.0..=100.0).contains(&value);
        (percentage(x) && percentage(y)).then_some(Self { x, y })
    }

    pub fn to_logical(self, bounds: ImageBounds) -> Point {
        Point::new(
            self.x * f64::from(bounds.width) / 100.0,
            self.y * f64::from(bounds.height) / 100.0,
        )
    }

    /// Inverse of [`FocalPoint::to_logical`], rounded to whole percentages the
    /// way the focal point field stores them.
    pub fn from_logical(point: Point, bounds: ImageBounds) -> Self {
        let pct = |value: f64, extent: u32| {
            if extent == 0 {
                0.0
            } else {
                (value / f64::from(extent) * 100.0).round().clamp(0.0, 100.0)
            }
        };
        Self::new(pct(point.x, bounds.width), pct(point.y, bounds.height))
    }

    pub fn to_field(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FocalPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// A rectangle overlay positioned in displayed (preview) pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayedRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Pure conversions between displayed and logical coordinates.
///
/// Calling either conversion with a zero-sized viewport is a caller bug.
pub struct CoordinateMapper;

impl CoordinateMapper {
    pub fn to_logical(displayed: Point, displayed_size: Size, logical_size: Size) -> Point {
        debug_assert!(
            displayed_size.width > 0.0 && displayed_size.height > 0.0,
            "zero-sized viewport"
        );
        Point::new(
            displayed.x / displayed_size.width * logical_size.width,
            displayed.y / displayed_size.height * logical_size.height,
        )
    }

    pub fn to_displayed(logical: Point, displayed_size: Size, logical_size: Size) -> Point {
        debug_assert!(
            logical_size.width > 0.0 && logical_size.height > 0.0,
            "zero-sized image"
        );
        Point::new(
            logical.x / logical_size.width * displayed_size.width,
            logical.y / logical_size.height * displayed_size.height,
        )
    }

    /// Positions the overlay for `rectangle`, or the whole viewport when there
    /// is no rectangle. Inverted corners are drawn as the box they span.
    pub fn rect_to_displayed(
        rectangle: Option<Rectangle>,
        displayed_size: Size,
        bounds: ImageBounds,
    ) -> DisplayedRect {
        let Some(rect) = rectangle else {
            return DisplayedRect {
                left: 0.0,
                top: 0.0,
                width: displayed_size.width,
                height: displayed_size.height,
            };
        };
        let logical_size = bounds.as_size();
        let min = Self::to_displayed(
            Point::new(f64::from(rect.x1), f64::from(rect.y1)),
            displayed_size,
            logical_size,
        );
        let max = Self::to_displayed(
            Point::new(f64::from(rect.x2), f64::from(rect.y2)),
            displayed_size,
            logical_size,
        );
        DisplayedRect {
            left: min.x.min(max.x),
            top: min.y.min(max.y),
            width: (max.x - min.x).abs(),
            height: (max.y - min.y).abs(),
        }
    }
}
