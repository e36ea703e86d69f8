#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use std::path::{Path, PathBuf};

use eframe::egui;
use focal_crop::{
    CoordinateMapper, CropEventHandler, DisplayedRect, EffectConfig, FocalPoint,
    FocusAwarePipeline, ImageHandle, InteractiveCropSession, JsonCropStore, Point, RectangleView,
    SaveError, SessionConfig, Size, load_fields, save_fields,
};
use image::DynamicImage;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];
const INDICATOR_RADIUS: f32 = 8.0;

/// Overlay state written by the session and painted every frame.
#[derive(Default)]
struct EguiOverlay {
    rect: Option<DisplayedRect>,
    field_visible: bool,
}

impl RectangleView for EguiOverlay {
    fn draw_rect(&mut self, rect: DisplayedRect) {
        self.rect = Some(rect);
    }

    fn set_field_visible(&mut self, visible: bool) {
        self.field_visible = visible;
    }
}

enum Status {
    Info(String),
    Errors(Vec<String>),
}

struct LoadedImage {
    path: PathBuf,
    width: u32,
    height: u32,
    texture: egui::TextureHandle,
    // field values waiting for the first layout of the image
    pending_fields: Option<(String, String)>,
}

struct FocalCropEditor {
    config: EffectConfig,
    store: JsonCropStore,
    loaded: Option<LoadedImage>,
    session: Option<InteractiveCropSession<EguiOverlay>>,
    drag_origin: Option<egui::Pos2>,
    status: Option<Status>,
}

fn source_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl FocalCropEditor {
    fn new(_cc: &eframe::CreationContext<'_>, config: EffectConfig, store: JsonCropStore) -> Self {
        Self {
            config,
            store,
            loaded: None,
            session: None,
            drag_origin: None,
            status: None,
        }
    }

    fn open_image(&mut self, ctx: &egui::Context, path: &Path) {
        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to open image");
                self.status = Some(Status::Errors(vec![format!("Failed to open image: {e}")]));
                return;
            }
        };
        let texture = Self::load_texture(ctx, &image);
        let bounds = SessionConfig::from_image(image.width(), image.height()).bounds();
        let fields = load_fields(&self.store, &source_key(path), &self.config.crop_type, bounds)
            .unwrap_or_else(|| (String::new(), FocalPoint::CENTER.to_field()));

        info!(path = %path.display(), dimensions = %bounds, "image opened");
        self.loaded = Some(LoadedImage {
            path: path.to_path_buf(),
            width: image.width(),
            height: image.height(),
            texture,
            pending_fields: Some(fields),
        });
        self.session = None;
        self.drag_origin = None;
        self.status = None;
    }

    fn load_texture(ctx: &egui::Context, image: &DynamicImage) -> egui::TextureHandle {
        let size = [image.width() as _, image.height() as _];
        let image_buffer = image.to_rgba8();
        let pixels = image_buffer.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
        ctx.load_texture("image", color_image, egui::TextureOptions::LINEAR)
    }

    fn save_crop(&mut self) {
        let (Some(loaded), Some(session)) = (&self.loaded, &mut self.session) else {
            return;
        };
        let result = save_fields(
            &mut self.store,
            &source_key(&loaded.path),
            &self.config,
            session.bounds(),
            session.field(),
            session.focal_field(),
        );
        self.status = Some(match result {
            Ok(crop) => Status::Info(format!(
                "Saved crop {} with focal offset {:?}",
                focal_crop::rectangle_to_field(crop.rectangle()),
                crop.offset()
            )),
            Err(SaveError::Invalid(errors)) => {
                // reveal the raw field so the errors can be corrected
                if !session.is_field_visible() {
                    session.toggle_field_visibility();
                }
                Status::Errors(errors.iter().map(ToString::to_string).collect())
            }
            Err(e) => {
                error!(error = %e, "failed to save crop");
                Status::Errors(vec![e.to_string()])
            }
        });
    }

    fn export(&mut self) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let mut handle = match ImageHandle::open(&loaded.path) {
            Ok(handle) => handle,
            Err(e) => {
                self.status = Some(Status::Errors(vec![e.to_string()]));
                return;
            }
        };

        let pipeline = FocusAwarePipeline::new(&self.store, self.config.clone());
        if let Err(failure) = pipeline.apply_effect(&mut handle) {
            self.status = Some(Status::Errors(vec![failure.to_string()]));
            return;
        }

        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", IMAGE_EXTENSIONS)
            .save_file()
        {
            self.status = Some(match handle.save(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "exported image");
                    Status::Info(format!("Exported {}", path.display()))
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to save image");
                    Status::Errors(vec![format!("Failed to save image: {e}")])
                }
            });
        }
    }

    fn show_fields(&mut self, ui: &mut egui::Ui) {
        let Some(session) = &mut self.session else {
            return;
        };
        if !session.view().field_visible {
            return;
        }
        ui.horizontal(|ui| {
            ui.label("Crop rectangle:");
            let mut rect = session.field().to_string();
            if ui.text_edit_singleline(&mut rect).changed() {
                session.on_field_change(&rect);
            }
            ui.label("Focal point:");
            let mut focal = session.focal_field().to_string();
            if ui.text_edit_singleline(&mut focal).changed() {
                session.set_focal_point(focal);
            }
        });
        ui.small("Coordinates of the crop rectangle \"x1,y1,x2,y2\".");
    }

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let Some(loaded) = &mut self.loaded else {
            return;
        };

        const PADDING: f32 = 20.0;
        let available_size = ui.available_size();
        let max_size = available_size - egui::vec2(PADDING * 2.0, PADDING * 2.0);
        let image_size = loaded.texture.size_vec2();

        // Calculate size to fit within available space while maintaining aspect ratio
        let scale = (max_size.x / image_size.x).min(max_size.y / image_size.y);
        let display_size = image_size * scale;
        if !(display_size.x > 0.0 && display_size.y > 0.0) {
            return;
        }

        let total_display_size = display_size + egui::vec2(PADDING * 2.0, PADDING * 2.0);

        // Manual centering
        let x_offset = (available_size.x - total_display_size.x) / 2.0;
        let y_offset = (available_size.y - total_display_size.y) / 2.0;
        let start_pos = ui.cursor().min + egui::vec2(x_offset.max(0.0), y_offset.max(0.0));

        let target_rect = egui::Rect::from_min_size(start_pos, total_display_size);

        let response = ui.allocate_rect(target_rect, egui::Sense::click_and_drag());
        let painter = ui.painter_at(target_rect);

        let image_rect = egui::Rect::from_min_size(
            target_rect.min + egui::vec2(PADDING, PADDING),
            display_size,
        );

        painter.image(
            loaded.texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        // The session only starts once the image has a size on screen.
        let viewport = Size::new(f64::from(display_size.x), f64::from(display_size.y));
        if self.session.is_none() {
            let (rect, focal) = loaded.pending_fields.take().unwrap_or_default();
            self.session = Some(InteractiveCropSession::setup(
                SessionConfig::from_image(loaded.width, loaded.height),
                viewport,
                rect,
                focal,
                false,
                EguiOverlay::default(),
            ));
        }
        let Some(session) = &mut self.session else {
            return;
        };
        session.set_viewport(viewport);

        let bounds = session.bounds();
        let local = |pos: egui::Pos2| {
            Point::new(
                f64::from(pos.x - image_rect.min.x),
                f64::from(pos.y - image_rect.min.y),
            )
        };
        let to_screen = |p: Point| image_rect.min + egui::vec2(p.x as f32, p.y as f32);
        let indicator = session.focal_point().map(|focal| {
            to_screen(CoordinateMapper::to_displayed(
                focal.to_logical(bounds),
                viewport,
                bounds.as_size(),
            ))
        });

        // Handle Input
        if response.double_clicked() {
            if let (Some(pos), Some(indicator)) = (response.interact_pointer_pos(), indicator) {
                if pos.distance(indicator) < INDICATOR_RADIUS * 2.0 {
                    session.toggle_field_visibility();
                }
            }
        }

        if response.secondary_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let pos = pos.clamp(image_rect.min, image_rect.max);
                let logical = session.pointer_to_logical(local(pos));
                session.set_focal_point(FocalPoint::from_logical(logical, bounds).to_field());
            }
        }

        if response.drag_started_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                self.drag_origin = Some(pos);
                session.on_drag_start(session.pointer_to_logical(local(pos)));
            }
        }

        if response.dragged_by(egui::PointerButton::Primary) {
            if let (Some(origin), Some(pos)) = (self.drag_origin, response.interact_pointer_pos())
            {
                let delta = pos - origin;
                let delta = Point::new(f64::from(delta.x), f64::from(delta.y));
                session.on_drag_move(session.pointer_to_logical(delta));
            }
        }

        if response.drag_stopped() {
            self.drag_origin = None;
        }

        let Some(rect) = session.view().rect else {
            return;
        };
        let screen_crop_rect = egui::Rect::from_min_size(
            to_screen(Point::new(rect.left, rect.top)),
            egui::vec2(rect.width as f32, rect.height as f32),
        );

        // Draw overlay (dimmed area outside crop)
        let overlay_color = egui::Color32::from_black_alpha(150);
        let dimmed = [
            egui::Rect::from_min_max(
                image_rect.min,
                egui::pos2(image_rect.max.x, screen_crop_rect.min.y),
            ),
            egui::Rect::from_min_max(
                egui::pos2(image_rect.min.x, screen_crop_rect.max.y),
                image_rect.max,
            ),
            egui::Rect::from_min_max(
                egui::pos2(image_rect.min.x, screen_crop_rect.min.y),
                egui::pos2(screen_crop_rect.min.x, screen_crop_rect.max.y),
            ),
            egui::Rect::from_min_max(
                egui::pos2(screen_crop_rect.max.x, screen_crop_rect.min.y),
                egui::pos2(image_rect.max.x, screen_crop_rect.max.y),
            ),
        ];
        for area in dimmed {
            painter.rect_filled(area, 0.0, overlay_color);
        }

        painter.rect_stroke(
            screen_crop_rect,
            0.0,
            egui::Stroke::new(1.0, egui::Color32::WHITE),
        );

        // Focal point indicator
        if let Some(center) = indicator {
            let stroke = egui::Stroke::new(1.5, egui::Color32::WHITE);
            painter.circle(
                center,
                INDICATOR_RADIUS,
                egui::Color32::from_black_alpha(80),
                stroke,
            );
            let arm = egui::vec2(INDICATOR_RADIUS * 1.5, 0.0);
            painter.line_segment([center - arm, center + arm], stroke);
            let arm = egui::vec2(0.0, INDICATOR_RADIUS * 1.5);
            painter.line_segment([center - arm, center + arm], stroke);
        }
    }
}

impl eframe::App for FocalCropEditor {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle dropped files
        if !ctx.input(|i| i.raw.dropped_files.is_empty()) {
            let dropped_files = ctx.input(|i| i.raw.dropped_files.clone());
            if let Some(path) = dropped_files.first().and_then(|file| file.path.clone()) {
                self.open_image(ctx, &path);
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open Image").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Image", IMAGE_EXTENSIONS)
                        .pick_file()
                    {
                        self.open_image(ctx, &path);
                    }
                }

                if self.loaded.is_some() {
                    ui.label("Target:");
                    ui.add(egui::DragValue::new(&mut self.config.width).range(1..=8192));
                    ui.label("x");
                    ui.add(egui::DragValue::new(&mut self.config.height).range(1..=8192));

                    if ui.button("Save Crop").clicked() {
                        self.save_crop();
                    }
                    if ui.button("Export").clicked() {
                        self.export();
                    }
                }
            });

            match &self.status {
                Some(Status::Info(message)) => {
                    ui.label(message);
                }
                Some(Status::Errors(messages)) => {
                    for message in messages {
                        ui.colored_label(egui::Color32::LIGHT_RED, message);
                    }
                }
                None => {}
            }

            self.show_fields(ui);
            ui.separator();
            self.show_canvas(ui);
        });
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("focal_crop=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

fn main() -> eframe::Result {
    init_tracing();

    let config = EffectConfig::from_env().unwrap_or_else(|e| {
        warn!(error = %e, "invalid effect configuration, using defaults");
        EffectConfig::default()
    });
    let store_path =
        std::env::var("FOCAL_CROP_STORE").unwrap_or_else(|_| "focal_crop.json".to_string());
    let store = JsonCropStore::open(&store_path).unwrap_or_else(|e| {
        error!(error = %e, "failed to open crop store, keeping crops in memory");
        JsonCropStore::in_memory()
    });
    info!(?config, store = %store_path, "starting focal crop editor");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([800.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Focal Crop",
        options,
        Box::new(|cc| Ok(Box::new(FocalCropEditor::new(cc, config, store)))),
    )
}
