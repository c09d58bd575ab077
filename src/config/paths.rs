//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (`settings.toml`):
//!   Windows: %APPDATA%\audio-work\
//!   macOS:   ~/Library/Application Support/audio-work/
//!   Linux:   ~/.config/audio-work/
//!
//! Output dir (default destination for encoded clips written by the CLI):
//!   Windows: %LOCALAPPDATA%\audio-work\clips\
//!   macOS:   ~/Library/Application Support/audio-work/clips/
//!   Linux:   ~/.local/share/audio-work/clips/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default directory for encoded clips.
    pub output_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "audio-work";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            output_dir: data_dir.join("clips"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
