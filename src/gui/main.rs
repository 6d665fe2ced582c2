// GUI entry point for leafscan
// This binary provides a graphical interface for capture and classification

use eframe::egui;

mod app;
use app::LeafscanApp;

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 720.0])
            .with_min_inner_size([360.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Leafscan",
        options,
        Box::new(|cc| Ok(Box::new(LeafscanApp::new(cc)))),
    )
}
