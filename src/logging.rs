// src/logging.rs

use color_eyre::eyre::{Result, WrapErr};
use directories::ProjectDirs;
use lazy_static::lazy_static;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

lazy_static! {
    /// Upper-cased crate name; prefix of every environment variable we read.
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase();
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", *PROJECT_NAME);
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

/// Platform data directory, or `./.data` when the platform has none.
pub fn get_data_dir() -> PathBuf {
    ProjectDirs::from("com", "linkscanner", env!("CARGO_PKG_NAME"))
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".").join(".data"))
}

pub fn log_path() -> PathBuf {
    get_data_dir().join(LOG_FILE.as_str())
}

/// `RUST_LOG`, then `LINKSCANNER_LOGLEVEL`, then `linkscanner=info`.
fn filter_directive() -> String {
    std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV.as_str()))
        .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")))
}

/// Installs the global subscriber: an appending log file, plus stderr when
/// `mirror_to_stderr` is set. stdout stays clean for JSON output.
pub fn initialize_logging(mirror_to_stderr: bool) -> Result<()> {
    let path = log_path();
    if let Some(directory) = path.parent() {
        std::fs::create_dir_all(directory)
            .wrap_err_with(|| format!("creating log directory {}", directory.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .wrap_err_with(|| format!("opening log file {}", path.display()))?;

    let directive = filter_directive();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new(&directive));

    let stderr_layer = mirror_to_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .with_filter(EnvFilter::new(&directive))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(ErrorLayer::default())
        .init();

    Ok(())
}
