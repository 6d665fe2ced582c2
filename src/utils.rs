use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::{Args, CameraSource};
use crate::controller::{Alert, Notifier};

/// Create a styled spinner shown while an upload is in flight
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments
pub fn validate_inputs(args: &Args) -> Result<()> {
    args.parse_endpoint()?;

    match args.camera {
        CameraSource::File => {
            if args.images.is_empty() {
                return Err(anyhow::anyhow!(
                    "No image given. Use -i/--image <FILE> or --camera v4l2"
                ));
            }
            for image in &args.images {
                if !image.is_file() {
                    return Err(anyhow::anyhow!(
                        "Image does not exist or is not a file: {}",
                        image.display()
                    ));
                }
            }
        }
        CameraSource::V4l2 => {
            #[cfg(not(feature = "v4l2"))]
            {
                return Err(anyhow::anyhow!(
                    "V4L2 capture is not available. Rebuild with --features v4l2"
                ));
            }
            #[cfg(feature = "v4l2")]
            {
                if !args.images.is_empty() {
                    warn_println("--image is ignored with --camera v4l2");
                }
            }
        }
    }

    Ok(())
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

/// Alerts as styled terminal output
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, alert: Alert) {
        error_println(&format!("{}: {}", style(&alert.title).bold(), alert.message));
    }
}
