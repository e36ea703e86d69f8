//! Rules that keep a crop rectangle well formed: clamping during interactive
//! drags and validation of submitted rectangles.

use std::num::IntErrorKind;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ValidationError, ValidationErrors};
use crate::geometry::{FocalPoint, ImageBounds, Point, Rectangle};

static RECT_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+,\d+,\d+,\d+$").expect("rectangle format regex"));

/// Builds the rectangle spanned by dragging `delta` away from `start`.
///
/// A positive delta makes the anchor the lower coordinate on that axis, a
/// negative one makes it the higher, so any drag direction yields ordered
/// corners. Values past an image edge saturate at that edge.
pub fn normalize_drag(start: Point, delta: Point, bounds: ImageBounds) -> Rectangle {
    let (x1, x2) = span(start.x, delta.x);
    let (y1, y2) = span(start.y, delta.y);

    let width = f64::from(bounds.width);
    let height = f64::from(bounds.height);

    Rectangle::new(
        to_pixel(x1, width),
        to_pixel(y1, height),
        to_pixel(x2, width),
        to_pixel(y2, height),
    )
}

fn span(anchor: f64, delta: f64) -> (f64, f64) {
    if delta > 0.0 {
        (anchor, anchor + delta)
    } else {
        (anchor + delta, anchor)
    }
}

fn to_pixel(value: f64, max: f64) -> u32 {
    // clamped into [0, max] and max fits u32
    value.clamp(0.0, max).round() as u32
}

/// Validates a serialized `"x1,y1,x2,y2"` rectangle.
///
/// `Ok(None)` means the field is empty and no rectangle is set. On failure,
/// every violated rule is reported, not only the first.
pub fn parse_and_validate(
    serialized: &str,
    bounds: ImageBounds,
    focal_point: Option<FocalPoint>,
) -> Result<Option<Rectangle>, ValidationErrors> {
    if serialized.is_empty() {
        return Ok(None);
    }

    let mut errors = Vec::new();
    if !RECT_FORMAT.is_match(serialized) {
        errors.push(ValidationError::Format);
    }

    // Keep checking whatever can still be read as four numbers so the editor
    // sees every problem at once.
    let Some([x1, y1, x2, y2]) = parse_coords(serialized) else {
        return Err(ValidationErrors::single(ValidationError::Format));
    };

    if x1 >= x2 || y1 >= y2 {
        errors.push(ValidationError::Ordering);
    }

    let width = i64::from(bounds.width);
    let height = i64::from(bounds.height);
    if x1 > width || y1 > height || x2 > width || y2 > height {
        errors.push(ValidationError::Bounds);
    }

    if let Some(focal) = focal_point {
        let real = focal.to_logical(bounds);
        if (x1 as f64) > real.x
            || (y1 as f64) > real.y
            || (x2 as f64) < real.x
            || (y2 as f64) < real.y
        {
            errors.push(ValidationError::FocalPointOutside);
        }
    }

    if let Some(errors) = ValidationErrors::from_vec(errors) {
        return Err(errors);
    }

    match (
        u32::try_from(x1),
        u32::try_from(y1),
        u32::try_from(x2),
        u32::try_from(y2),
    ) {
        (Ok(x1), Ok(y1), Ok(x2), Ok(y2)) => Ok(Some(Rectangle::new(x1, y1, x2, y2))),
        _ => Err(ValidationErrors::single(ValidationError::Bounds)),
    }
}

fn parse_coords(serialized: &str) -> Option<[i64; 4]> {
    let mut parts = serialized.split(',').map(parse_coord);
    let coords = [
        parts.next()??,
        parts.next()??,
        parts.next()??,
        parts.next()??,
    ];
    parts.next().is_none().then_some(coords)
}

// Digit runs too long for i64 are past any image edge.
fn parse_coord(part: &str) -> Option<i64> {
    match part.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(i64::MAX),
        Err(_) => None,
    }
}

/// Validates both editor fields together: the rectangle as in
/// [`parse_and_validate`] and the focal point as `"fx,fy"` percentages.
///
/// An unreadable focal point is reported alongside any rectangle errors and
/// skips the containment check.
pub fn validate_fields(
    rect_field: &str,
    focal_field: &str,
    bounds: ImageBounds,
) -> Result<(Option<Rectangle>, FocalPoint), ValidationErrors> {
    let focal = FocalPoint::parse(focal_field);
    match (parse_and_validate(rect_field, bounds, focal), focal) {
        (Ok(rectangle), Some(focal)) => Ok((rectangle, focal)),
        (Ok(_), None) => Err(ValidationErrors::single(ValidationError::FocalPointFormat)),
        (Err(errors), None) => Err(errors.with(ValidationError::FocalPointFormat)),
        (Err(errors), Some(_)) => Err(errors),
    }
}
