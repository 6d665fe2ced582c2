use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use leafscan::cli::{Args, CameraSource};
use leafscan::json_output::{JsonMessage, JsonNotifier};
use leafscan::utils::{
    create_spinner, format_duration, validate_inputs, verbose_println, ConsoleNotifier,
};
use leafscan::{
    Camera, CaptureAndClassify, CaptureFlow, FileCamera, HttpPredictor, Notifier, ScreenState,
    UploadOutcome,
};

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn build_camera(args: &Args) -> Result<Arc<dyn Camera>> {
    match args.camera {
        CameraSource::File => Ok(Arc::new(FileCamera::new(args.images.clone()))),
        #[cfg(feature = "v4l2")]
        CameraSource::V4l2 => {
            use leafscan::camera::{V4l2Camera, V4l2Config};
            let config = V4l2Config::default().with_device(args.device.clone());
            let camera = V4l2Camera::new(config).context("Failed to prepare V4L2 camera")?;
            Ok(Arc::new(camera))
        }
        #[cfg(not(feature = "v4l2"))]
        CameraSource::V4l2 => Err(anyhow::anyhow!(
            "V4L2 capture is not available. Rebuild with --features v4l2"
        )),
    }
}

/// Mirror the screen state on the terminal until the controller goes away
async fn render(mut screen: watch::Receiver<ScreenState>, json: bool) {
    let mut spinner: Option<ProgressBar> = None;

    while screen.changed().await.is_ok() {
        let state = screen.borrow_and_update().clone();

        if json {
            JsonMessage::state(&state).emit();
            continue;
        }

        spinner = match (state.loading, spinner.take()) {
            (true, None) => Some(create_spinner("Classifying...")),
            (true, running) => running,
            (false, Some(pb)) => {
                pb.finish_and_clear();
                None
            }
            (false, None) => None,
        };
    }

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();
    let mut args = Args::parse();
    args.load_and_merge_config()?;
    init_logging(args.verbose);

    if !args.json {
        println!("{}", style("Leafscan - capture and classify").bold().green());
        println!();
    }

    validate_inputs(&args)?;

    let endpoint = args.parse_endpoint()?;
    let payload = args.payload_kind();
    let policy = args.overlap_policy();

    if !args.json && args.verbose {
        println!("{}", style("Configuration:").bold());
        println!("  Endpoint: {}", endpoint);
        println!("  Camera: {:?}", args.camera);
        if args.camera == CameraSource::V4l2 {
            println!("    Device: {}", args.device);
        }
        println!("  Payload: {:?}", payload);
        println!("  Overlap policy: {:?}", policy);
        println!();
    }

    let camera = build_camera(&args)?;
    let predictor = HttpPredictor::new(endpoint, payload).context("Failed to create HTTP client")?;
    let notifier: Arc<dyn Notifier> = if args.json {
        Arc::new(JsonNotifier)
    } else {
        Arc::new(ConsoleNotifier)
    };

    let controller =
        CaptureAndClassify::new(camera, Arc::new(predictor), notifier).with_policy(policy);
    let renderer = tokio::spawn(render(controller.screen().subscribe(), args.json));

    let captures = match args.camera {
        CameraSource::File => args.images.len(),
        CameraSource::V4l2 => 1,
    };
    verbose_println(
        args.verbose && !args.json,
        &format!("Starting {} capture(s)", captures),
    );

    // All captures start together, like quick repeated taps on the shutter
    let flows =
        futures::future::join_all((0..captures).map(|_| controller.capture_photo())).await;

    let final_state = controller.screen().snapshot();
    drop(controller);
    renderer.await.context("Renderer task failed")?;

    let predicted = flows
        .iter()
        .filter(|flow| matches!(flow, CaptureFlow::Uploaded(UploadOutcome::Predicted(_))))
        .count();
    let failed = flows.iter().filter(|flow| flow.is_failure()).count();
    let total_time = start_time.elapsed();

    if args.json {
        JsonMessage::summary(captures, predicted, failed, total_time.as_secs_f64());
    } else {
        if let Some(image) = &final_state.image {
            println!("  Image: {}", style(image).dim());
        }
        match &final_state.prediction {
            Some(label) => println!("  Result: {}", style(label).bold().green()),
            None => println!("  Result: {}", style("none").dim()),
        }

        println!();
        println!("{}", style("Summary:").bold().blue());
        println!("  Captures: {}", captures);
        println!("  Predicted: {}", style(predicted).bold().green());
        if failed > 0 {
            println!("  Failed: {}", style(failed).bold().red());
        }
        let cancelled = flows
            .iter()
            .filter(|flow| matches!(flow, CaptureFlow::Cancelled))
            .count();
        if cancelled > 0 {
            println!("  Cancelled: {}", style(cancelled).yellow());
        }
        println!("  Total time: {}", style(format_duration(total_time)).bold());
    }

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
