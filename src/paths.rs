use std::path::PathBuf;
use std::sync::OnceLock;

static APP_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the application directory (next to the executable).
///
/// Landmark images and the settings tree resolve relative to this so the same
/// layout works both from `cargo run` and from a packaged executable.
pub fn app_dir() -> &'static PathBuf {
    APP_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the main configuration file path: `<app_dir>/macro_config.json`
pub fn config_path() -> PathBuf {
    app_dir().join("macro_config.json")
}

/// Resolves a landmark asset path, e.g. `buttons/Areas.png`.
pub fn landmark_path(relative: &str) -> PathBuf {
    app_dir().join(relative)
}

/// Returns the placement settings tree root: `<app_dir>/Settings/`
pub fn placements_dir() -> PathBuf {
    app_dir().join("Settings")
}

/// Returns the logs directory: `<app_dir>/logs/`
pub fn logs_dir() -> PathBuf {
    app_dir().join("logs")
}

/// Ensures writable output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(logs_dir())?;
    std::fs::create_dir_all(placements_dir())?;
    Ok(())
}
