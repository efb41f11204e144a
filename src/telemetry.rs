//! tracing subscriber setup
//!
//! `RUST_LOG` overrides the default `info` filter in every mode.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log lines go
#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr { json: bool },
    /// Append to a file; used while the terminal is in the alternate screen
    File(PathBuf),
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(target: LogTarget) {
    let registry = tracing_subscriber::registry().with(filter());
    let _ = match target {
        LogTarget::Stderr { json: true } => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        LogTarget::Stderr { json: false } => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init(),
        LogTarget::File(path) => match open_log(&path) {
            Ok(file) => registry
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init(),
            Err(_) => registry
                .with(tracing_subscriber::fmt::layer().with_writer(io::sink))
                .try_init(),
        },
    };
}

fn open_log(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Default log file for the terminal viewer
pub fn viewer_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("globewatch")
        .join("globe.log")
}
