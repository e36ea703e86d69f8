use focal_crop::{
    CropEventHandler, CropStage, CropStore, DisplayedRect, EffectConfig, FocusAwarePipeline,
    ImageBounds, ImageHandle, InteractiveCropSession, JsonCropStore, PipelineError,
    PipelineState, Point, RasterImage, RectangleView, SessionConfig, Size, ValidationError,
    load_fields, parse_and_validate, save_fields,
};
use image::{DynamicImage, Rgba, RgbaImage};

struct NullView;

impl RectangleView for NullView {
    fn draw_rect(&mut self, _rect: DisplayedRect) {}
    fn set_field_visible(&mut self, _visible: bool) {}
}

const SOURCE: &str = "public://field/photo.png";

fn photo(width: u32, height: u32) -> ImageHandle {
    let buffer = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
    });
    ImageHandle::from_image(DynamicImage::ImageRgba8(buffer), SOURCE)
}

#[test]
fn edit_save_and_apply() {
    let bounds = ImageBounds::new(800, 600);
    let config = EffectConfig::new(200, 200, "focal_point");
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonCropStore::open(dir.path().join("crops.json")).unwrap();

    // nothing stored yet: empty rectangle, centred focal point
    assert_eq!(load_fields(&store, SOURCE, &config.crop_type, bounds), None);

    let mut session = InteractiveCropSession::setup(
        SessionConfig::from_image(800, 600),
        Size::new(400.0, 300.0),
        "",
        "50,50",
        false,
        NullView,
    );
    // drag from (250,200) up and left by (-200,-150) on a half-size preview
    session.on_drag_start(session.pointer_to_logical(Point::new(250.0, 200.0)));
    session.on_drag_move(session.pointer_to_logical(Point::new(-200.0, -150.0)));
    assert_eq!(session.field(), "100,100,500,400");
    assert!(session.validate().is_ok());

    save_fields(
        &mut store,
        SOURCE,
        &config,
        session.bounds(),
        session.field(),
        session.focal_field(),
    )
    .unwrap();

    let mut image = photo(800, 600);
    let pipeline = FocusAwarePipeline::new(&store, config);
    let outcome = pipeline.apply_effect(&mut image).unwrap();

    assert_eq!(outcome.crop.offset(), (300, 200));
    assert_eq!(image.bounds(), ImageBounds::new(200, 200));
    assert_eq!(outcome.history.last(), Some(&PipelineState::Done));
}

#[test]
fn stored_rectangle_scenario() {
    let bounds = ImageBounds::new(800, 600);
    let focal = focal_crop::FocalPoint::parse("50,50");
    assert!(parse_and_validate("100,100,500,500", bounds, focal).is_ok());

    let mut store = JsonCropStore::in_memory();
    let crop = store
        .create_crop("focal_point", 400, 300, 200, 200)
        .with_rectangle(Some(focal_crop::Rectangle::new(100, 100, 500, 500)));
    store.save_crop(SOURCE, crop).unwrap();

    let mut image = photo(800, 600);
    let pipeline = FocusAwarePipeline::new(&store, EffectConfig::new(200, 200, "focal_point"));
    let outcome = pipeline.apply_effect(&mut image).unwrap();

    assert!(outcome.history.contains(&PipelineState::PreCropped));
    assert_eq!(outcome.crop.offset(), (300, 200));
    assert_eq!(image.bounds(), ImageBounds::new(200, 200));
}

#[test]
fn rectangle_outside_the_image_fails_pre_crop() {
    // stored without validation, e.g. for a since-replaced smaller file
    let mut store = JsonCropStore::in_memory();
    let crop = store
        .create_crop("focal_point", 50, 50, 200, 200)
        .with_rectangle(Some(focal_crop::Rectangle::new(100, 100, 500, 500)));
    store.save_crop(SOURCE, crop).unwrap();

    let mut image = photo(300, 300);
    let pipeline = FocusAwarePipeline::new(&store, EffectConfig::default());
    let failure = pipeline.apply_effect(&mut image).unwrap_err();

    let PipelineError::RasterPrimitive { stage, toolkit, .. } = failure.error;
    assert_eq!(stage, CropStage::PreCrop);
    assert_eq!(toolkit, ImageHandle::TOOLKIT);
    assert_eq!(failure.crop.offset(), (50, 50));
    assert_eq!(image.bounds(), ImageBounds::new(300, 300));
}

#[test]
fn invalid_submission_reports_all_errors() {
    let errors = parse_and_validate("10,10,5,5", ImageBounds::new(100, 100), None).unwrap_err();
    assert_eq!(errors.errors(), &[ValidationError::Ordering]);

    let errors =
        parse_and_validate("10,10,200,50", ImageBounds::new(100, 100), None).unwrap_err();
    assert_eq!(errors.errors(), &[ValidationError::Bounds]);
}
