//! Interactive editing of the crop rectangle.
//!
//! The session owns the two form values (rectangle and focal point), turns
//! pointer events into rectangles and tells a [`RectangleView`] where to draw
//! the overlay. It is single threaded: each event runs to completion before
//! the next one is delivered.

use tracing::debug;

use crate::config::SessionConfig;
use crate::constraint::{normalize_drag, validate_fields};
use crate::error::ValidationErrors;
use crate::geometry::{
    CoordinateMapper, DisplayedRect, FocalPoint, ImageBounds, Point, Rectangle, Size,
};

/// Events an editing session reacts to. Positions and deltas are in logical
/// image pixels.
pub trait CropEventHandler {
    /// Records the anchor of the next drag.
    fn on_drag_start(&mut self, pointer: Point);

    /// `delta` is the total pointer movement since the drag started.
    fn on_drag_move(&mut self, delta: Point);

    /// The backing rectangle field changed, by the user or programmatically.
    fn on_field_change(&mut self, serialized: &str);
}

/// Rendering collaborator for the overlay.
pub trait RectangleView {
    fn draw_rect(&mut self, rect: DisplayedRect);
    fn set_field_visible(&mut self, visible: bool);
}

pub struct InteractiveCropSession<V> {
    bounds: ImageBounds,
    viewport: Size,
    field: String,
    focal_field: String,
    rectangle: Option<Rectangle>,
    anchor: Option<Point>,
    field_visible: bool,
    view: V,
}

impl<V: RectangleView> InteractiveCropSession<V> {
    /// Starts a session once the image is loaded and laid out at `viewport`.
    ///
    /// The raw field starts hidden unless it carries a validation error.
    pub fn setup(
        config: SessionConfig,
        viewport: Size,
        field: impl Into<String>,
        focal_field: impl Into<String>,
        field_has_error: bool,
        view: V,
    ) -> Self {
        let field = field.into();
        let mut session = Self {
            bounds: config.bounds(),
            viewport,
            rectangle: Rectangle::parse(&field),
            field,
            focal_field: focal_field.into(),
            anchor: None,
            field_visible: field_has_error,
            view,
        };
        session.view.set_field_visible(session.field_visible);
        session.render();
        session
    }

    pub fn bounds(&self) -> ImageBounds {
        self.bounds
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Current serialized rectangle; empty when none has been set.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn focal_field(&self) -> &str {
        &self.focal_field
    }

    pub fn focal_point(&self) -> Option<FocalPoint> {
        FocalPoint::parse(&self.focal_field)
    }

    pub fn rectangle(&self) -> Option<Rectangle> {
        self.rectangle
    }

    pub fn is_field_visible(&self) -> bool {
        self.field_visible
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Converts a pointer position inside the viewport to image pixels.
    pub fn pointer_to_logical(&self, displayed: Point) -> Point {
        CoordinateMapper::to_logical(displayed, self.viewport, self.bounds.as_size())
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.render();
        }
    }

    /// Programmatic focal point change, e.g. from the focal point indicator.
    pub fn set_focal_point(&mut self, serialized: impl Into<String>) {
        self.focal_field = serialized.into();
        let field = self.field.clone();
        self.on_field_change(&field);
    }

    /// Shows or hides the raw rectangle field. Leaves the rectangle alone.
    pub fn toggle_field_visibility(&mut self) {
        self.field_visible = !self.field_visible;
        self.view.set_field_visible(self.field_visible);
    }

    /// Checks the current field against the image bounds and focal point,
    /// with the same rules a save applies.
    pub fn validate(&self) -> Result<Option<Rectangle>, ValidationErrors> {
        validate_fields(&self.field, &self.focal_field, self.bounds)
            .map(|(rectangle, _)| rectangle)
    }

    fn render(&mut self) {
        let rect = CoordinateMapper::rect_to_displayed(self.rectangle, self.viewport, self.bounds);
        self.view.draw_rect(rect);
    }
}

impl<V: RectangleView> CropEventHandler for InteractiveCropSession<V> {
    fn on_drag_start(&mut self, pointer: Point) {
        self.anchor = Some(pointer);
    }

    fn on_drag_move(&mut self, delta: Point) {
        let Some(anchor) = self.anchor else {
            debug!("drag move without drag start ignored");
            return;
        };
        let rect = normalize_drag(anchor, delta, self.bounds);
        debug!(rect = %rect, "crop rectangle dragged");
        self.on_field_change(&rect.to_field());
    }

    fn on_field_change(&mut self, serialized: &str) {
        if self.field != serialized {
            self.field = serialized.to_string();
        }
        self.rectangle = Rectangle::parse(&self.field);
        self.render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[derive(Default)]
    struct RecordingView {
        drawn: Vec<DisplayedRect>,
        visible: Option<bool>,
    }

    impl RectangleView for RecordingView {
        fn draw_rect(&mut self, rect: DisplayedRect) {
            self.drawn.push(rect);
        }

        fn set_field_visible(&mut self, visible: bool) {
            self.visible = Some(visible);
        }
    }

    fn session(field: &str) -> InteractiveCropSession<RecordingView> {
        InteractiveCropSession::setup(
            SessionConfig::from_image(800, 600),
            Size::new(400.0, 300.0),
            field,
            "50,50",
            false,
            RecordingView::default(),
        )
    }

    fn last_drawn(session: &InteractiveCropSession<RecordingView>) -> DisplayedRect {
        *session.view().drawn.last().unwrap()
    }

    #[test]
    fn empty_field_draws_full_image_but_stays_empty() {
        let session = session("");
        assert_eq!(session.field(), "");
        assert_eq!(session.rectangle(), None);
        assert_eq!(
            last_drawn(&session),
            DisplayedRect {
                left: 0.0,
                top: 0.0,
                width: 400.0,
                height: 300.0
            }
        );
        assert_eq!(session.view().visible, Some(false));
    }

    #[test]
    fn stored_rectangle_is_drawn_scaled() {
        let session = session("100,100,500,500");
        let rect = last_drawn(&session);
        assert_eq!((rect.left, rect.top, rect.width, rect.height), (50.0, 50.0, 200.0, 200.0));
    }

    #[test]
    fn dragging_updates_field_and_overlay() {
        let mut session = session("");
        let start = session.pointer_to_logical(Point::new(100.0, 75.0));
        assert_eq!(start, Point::new(200.0, 150.0));

        session.on_drag_start(start);
        assert_eq!(session.field(), "");

        session.on_drag_move(Point::new(-50.4, 100.6));
        assert_eq!(session.field(), "150,150,200,251");
        assert_eq!(session.rectangle(), Some(Rectangle::new(150, 150, 200, 251)));
        let rect = last_drawn(&session);
        assert_eq!((rect.left, rect.top), (75.0, 75.0));
    }

    #[test]
    fn drag_moves_are_idempotent_for_the_same_delta() {
        let mut session = session("");
        session.on_drag_start(Point::new(700.0, 500.0));
        session.on_drag_move(Point::new(300.0, 300.0));
        let first = session.field().to_string();
        session.on_drag_move(Point::new(300.0, 300.0));
        assert_eq!(session.field(), first);
        assert_eq!(first, "700,500,800,600");
    }

    #[test]
    fn new_drag_start_replaces_anchor() {
        let mut session = session("");
        session.on_drag_start(Point::new(10.0, 10.0));
        session.on_drag_start(Point::new(100.0, 100.0));
        session.on_drag_move(Point::new(10.0, 10.0));
        assert_eq!(session.field(), "100,100,110,110");
    }

    #[test]
    fn drag_move_without_start_is_ignored() {
        let mut session = session("1,2,3,4");
        session.on_drag_move(Point::new(10.0, 10.0));
        assert_eq!(session.field(), "1,2,3,4");
    }

    #[test]
    fn toggling_visibility_keeps_rectangle() {
        let mut session = session("100,100,500,500");
        let drawn = session.view().drawn.len();
        session.toggle_field_visibility();
        assert!(session.is_field_visible());
        assert_eq!(session.view().visible, Some(true));
        assert_eq!(session.rectangle(), Some(Rectangle::new(100, 100, 500, 500)));
        assert_eq!(session.view().drawn.len(), drawn);
        session.toggle_field_visibility();
        assert!(!session.is_field_visible());
    }

    #[test]
    fn field_with_error_starts_visible() {
        let session = InteractiveCropSession::setup(
            SessionConfig::from_image(800, 600),
            Size::new(400.0, 300.0),
            "10,10,5,5",
            "50,50",
            true,
            RecordingView::default(),
        );
        assert!(session.is_field_visible());
    }

    #[test]
    fn validates_against_focal_point() {
        let mut session = session("");
        assert_eq!(session.validate(), Ok(None));

        session.on_field_change("0,0,100,100");
        let errors = session.validate().unwrap_err();
        assert_eq!(errors.errors(), &[ValidationError::FocalPointOutside]);

        session.set_focal_point("5,5");
        assert_eq!(session.validate(), Ok(Some(Rectangle::new(0, 0, 100, 100))));
    }

    #[test]
    fn unreadable_focal_point_fails_validation() {
        let mut session = session("100,100,500,500");
        session.set_focal_point("garbage");
        assert_eq!(session.focal_point(), None);
        let errors = session.validate().unwrap_err();
        assert_eq!(errors.errors(), &[ValidationError::FocalPointFormat]);

        session.set_focal_point("150,-20");
        assert!(session.validate().unwrap_err().contains(&ValidationError::FocalPointFormat));
    }

    #[test]
    fn inverted_field_is_drawn_with_positive_size() {
        let mut session = session("");
        session.on_field_change("10,10,5,5");
        let rect = last_drawn(&session);
        assert!(rect.width > 0.0 && rect.height > 0.0);
        assert_eq!((rect.left, rect.top), (2.5, 2.5));
    }

    #[test]
    fn focal_point_change_redraws() {
        let mut session = session("100,100,500,500");
        let drawn = session.view().drawn.len();
        session.set_focal_point("30,30");
        assert_eq!(session.view().drawn.len(), drawn + 1);
        assert_eq!(session.focal_point(), Some(FocalPoint::new(30.0, 30.0)));
    }

    #[test]
    fn viewport_change_redraws_in_new_scale() {
        let mut session = session("100,100,500,500");
        session.set_viewport(Size::new(800.0, 600.0));
        assert_eq!(session.viewport(), Size::new(800.0, 600.0));
        let rect = last_drawn(&session);
        assert_eq!((rect.left, rect.width), (100.0, 400.0));
    }
}
