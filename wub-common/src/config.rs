//! Configuration file discovery and assets folder resolution

use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "WUB_CONFIG";

/// Environment variable naming the assets folder
pub const ASSETS_FOLDER_ENV_VAR: &str = "WUB_ASSETS_FOLDER";

/// Locate the TOML configuration file.
///
/// Priority order:
/// 1. Command-line argument (returned even if the file is missing, so the
///    loader can warn about it)
/// 2. `WUB_CONFIG` environment variable
/// 3. Per-user config directory (`~/.config/wub/config.toml` on Linux)
/// 4. `/etc/wub/config.toml` (Linux only)
///
/// Returns `None` when no configuration file exists; callers fall back to
/// built-in defaults.
pub fn locate_config_file(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("wub").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/wub/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    debug!("No configuration file found");
    None
}

/// Resolve the folder holding the audio assets (tones and narrations).
///
/// Priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file value
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_assets_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_value: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = config_value {
        return path.to_path_buf();
    }

    default_assets_folder()
}

/// OS-dependent default assets folder
pub fn default_assets_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/wub/assets
        dirs::data_local_dir()
            .map(|d| d.join("wub").join("assets"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/wub/assets"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/wub/assets
        dirs::data_dir()
            .map(|d| d.join("wub").join("assets"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/wub/assets"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\wub\assets
        dirs::data_local_dir()
            .map(|d| d.join("wub").join("assets"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\wub\\assets"))
    } else {
        PathBuf::from("./wub_data/assets")
    }
}

/// Resolve an asset reference against the assets folder.
///
/// Absolute references are returned unchanged.
pub fn resolve_asset(assets_folder: &Path, reference: &Path) -> PathBuf {
    if reference.is_absolute() {
        reference.to_path_buf()
    } else {
        assets_folder.join(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_asset_relative() {
        let folder = Path::new("/srv/wub/assets");
        assert_eq!(
            resolve_asset(folder, Path::new("ElevenLabs.mp3")),
            PathBuf::from("/srv/wub/assets/ElevenLabs.mp3")
        );
    }

    #[test]
    fn test_resolve_asset_absolute_unchanged() {
        let folder = Path::new("/srv/wub/assets");
        let absolute = if cfg!(windows) { "C:\\tones\\bowl.mp3" } else { "/tones/bowl.mp3" };
        assert_eq!(resolve_asset(folder, Path::new(absolute)), PathBuf::from(absolute));
    }

    #[test]
    fn test_cli_config_path_wins() {
        let cli = Path::new("/tmp/does-not-need-to-exist.toml");
        assert_eq!(locate_config_file(Some(cli)), Some(cli.to_path_buf()));
    }

    #[test]
    fn test_default_assets_folder_not_empty() {
        assert!(!default_assets_folder().as_os_str().is_empty());
    }
}
