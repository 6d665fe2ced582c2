use eframe::egui;
use leafscan::config_file::{default_config_path, ClientConfigJson, ConfigFile};
use leafscan::{Alert, ImageRef, OverlapPolicy, PayloadKind, Screen, DEFAULT_ENDPOINT};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

#[path = "worker.rs"]
mod worker;
use worker::Worker;

/// Alerts waiting to be shown, oldest first
pub(crate) type AlertQueue = Arc<Mutex<VecDeque<Alert>>>;

pub struct LeafscanApp {
    // Service settings
    endpoint: String,
    payload: PayloadKind,
    overlap: OverlapPolicy,

    // Shared with the capture worker
    screen: Screen,
    alerts: AlertQueue,
    worker: Option<Worker>,

    // Rendering state
    preview: Option<(ImageRef, egui::TextureHandle)>,
    current_alert: Option<Alert>,
    error_message: String,
}

impl LeafscanApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let config = Self::load_config();

        let mut app = Self {
            endpoint: config.endpoint_or_default().to_string(),
            payload: match config.payload.as_deref() {
                Some("blob") => PayloadKind::Blob,
                Some("uri") => PayloadKind::Uri,
                _ => PayloadKind::detect(),
            },
            overlap: match config.overlap.as_deref() {
                Some("supersede") => OverlapPolicy::Supersede,
                _ => OverlapPolicy::Race,
            },
            screen: Screen::new(),
            alerts: Arc::new(Mutex::new(VecDeque::new())),
            worker: None,
            preview: None,
            current_alert: None,
            error_message: String::new(),
        };

        app.start_worker(&cc.egui_ctx);
        app
    }

    fn load_config() -> ClientConfigJson {
        let Some(path) = default_config_path() else {
            return ClientConfigJson::default();
        };
        if !path.exists() {
            return ClientConfigJson::default();
        }

        match ConfigFile::load(&path) {
            Ok(file) => file.config,
            Err(e) => {
                log::warn!("Ignoring config file: {:#}", e);
                ClientConfigJson::default()
            }
        }
    }

    fn save_config(&self) -> anyhow::Result<()> {
        let Some(path) = default_config_path() else {
            return Ok(());
        };

        let file = ConfigFile {
            name: Some("leafscan-gui".to_string()),
            last_modified: None,
            config: ClientConfigJson {
                endpoint: Some(self.endpoint.clone()),
                payload: Some(self.get_payload_name().to_lowercase()),
                overlap: Some(self.get_overlap_name().to_lowercase()),
                ..Default::default()
            },
        };
        file.save(&path)
    }

    /// (Re)start the capture worker with the current settings
    fn start_worker(&mut self, ctx: &egui::Context) {
        self.error_message.clear();
        self.worker = None;

        match Worker::spawn(
            ctx.clone(),
            &self.endpoint,
            self.payload,
            self.overlap,
            self.screen.clone(),
            self.alerts.clone(),
        ) {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => self.error_message = format!("{:#}", e),
        }
    }

    fn render_settings(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Prediction service")
            .default_open(false)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Endpoint:");
                    ui.text_edit_singleline(&mut self.endpoint);
                    if ui.button("Default").clicked() {
                        self.endpoint = DEFAULT_ENDPOINT.to_string();
                    }
                });

                ui.horizontal(|ui| {
                    ui.label("Payload:");
                    egui::ComboBox::from_id_salt("payload")
                        .selected_text(self.get_payload_name())
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut self.payload, PayloadKind::Uri, "Uri");
                            ui.selectable_value(&mut self.payload, PayloadKind::Blob, "Blob");
                        });
                });

                ui.horizontal(|ui| {
                    ui.label("Overlapping captures:");
                    egui::ComboBox::from_id_salt("overlap")
                        .selected_text(self.get_overlap_name())
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut self.overlap, OverlapPolicy::Race, "Race");
                            ui.selectable_value(
                                &mut self.overlap,
                                OverlapPolicy::Supersede,
                                "Supersede",
                            );
                        });
                });

                if ui.button("Apply").clicked() {
                    if let Err(e) = self.save_config() {
                        log::warn!("Could not save settings: {:#}", e);
                    }
                    self.start_worker(ui.ctx());
                }
            });

        if !self.error_message.is_empty() {
            ui.colored_label(egui::Color32::RED, &self.error_message);
        }

        ui.add_space(10.0);
    }

    fn render_capture(&mut self, ui: &mut egui::Ui) {
        let state = self.screen.snapshot();

        if let Some(image) = &state.image {
            self.refresh_preview(ui.ctx(), image);
            if let Some((_, texture)) = &self.preview {
                ui.add(
                    egui::Image::new(texture)
                        .max_size(egui::vec2(300.0, 400.0))
                        .corner_radius(10.0),
                );
            }
            ui.add_space(20.0);
        }

        let button = egui::Button::new("📸 Take a photo").min_size(egui::vec2(200.0, 40.0));
        if ui.add_enabled(self.worker.is_some(), button).clicked() {
            if let Some(worker) = &self.worker {
                worker.capture();
            }
        }

        if state.loading {
            ui.add_space(20.0);
            ui.add(egui::Spinner::new().size(32.0).color(egui::Color32::GREEN));
        }

        if let Some(prediction) = &state.prediction {
            ui.add_space(20.0);
            ui.label(egui::RichText::new(format!("Result: {}", prediction)).size(20.0));
        }
    }

    /// Decode the captured image into a texture when it changes
    fn refresh_preview(&mut self, ctx: &egui::Context, image: &ImageRef) {
        if matches!(&self.preview, Some((shown, _)) if shown == image) {
            return;
        }
        self.preview = None;

        let Some(path) = image.to_file_path() else {
            return;
        };
        match image::open(&path) {
            Ok(decoded) => {
                let rgba = decoded.thumbnail(600, 800).to_rgba8();
                let size = [rgba.width() as usize, rgba.height() as usize];
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
                let texture = ctx.load_texture("capture", color_image, egui::TextureOptions::LINEAR);
                self.preview = Some((image.clone(), texture));
            }
            Err(e) => log::warn!("Cannot preview {}: {}", path.display(), e),
        }
    }

    fn render_alert(&mut self, ctx: &egui::Context) {
        if self.current_alert.is_none() {
            self.current_alert = self
                .alerts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
        }

        let Some(alert) = &self.current_alert else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new(&alert.title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&alert.message);
                ui.add_space(10.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });

        if dismissed {
            self.current_alert = None;
        }
    }

    fn get_payload_name(&self) -> &str {
        match self.payload {
            PayloadKind::Blob => "Blob",
            PayloadKind::Uri => "Uri",
        }
    }

    fn get_overlap_name(&self) -> &str {
        match self.overlap {
            OverlapPolicy::Race => "Race",
            OverlapPolicy::Supersede => "Supersede",
        }
    }
}

impl eframe::App for LeafscanApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(egui::Color32::from_rgb(0x25, 0x29, 0x2e)).inner_margin(20.0))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_settings(ui);
                    ui.vertical_centered(|ui| {
                        self.render_capture(ui);
                    });
                });
            });

        self.render_alert(ctx);

        // Keep the spinner moving while a request is out
        if self.screen.snapshot().loading {
            ctx.request_repaint();
        }
    }
}
