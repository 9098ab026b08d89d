//! Application configuration for lessonctx.
//!
//! User config lives at `~/.lessonctx/lessonctx.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LessonCtxError, Result};
use crate::keys::BookType;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lessonctx.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lessonctx";

// ---------------------------------------------------------------------------
// Config structs (matching lessonctx.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Curriculum/textbook database.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Audio/video media lookup.
    #[serde(default)]
    pub media: MediaSettings,

    /// Context resolution defaults.
    #[serde(default)]
    pub resolution: ResolutionConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file. `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.lessonctx/lessonctx.db".into()
}

/// How audio locators are turned into playable media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaMode {
    /// Look up files under the configured roots.
    #[default]
    Local,
    /// Redirect to an object-storage base URL.
    Redirect,
}

/// `[media]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    #[serde(default)]
    pub mode: MediaMode,

    /// Local roots searched in order.
    #[serde(default = "default_media_roots")]
    pub roots: Vec<String>,

    /// File extensions tried in order for every root.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Object-storage base URL for redirect mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            mode: MediaMode::default(),
            roots: default_media_roots(),
            extensions: default_extensions(),
            base_url: None,
        }
    }
}

fn default_media_roots() -> Vec<String> {
    vec!["audio".into(), "public/audio".into(), "~/.lessonctx/audio".into()]
}
fn default_extensions() -> Vec<String> {
    vec!["mp3".into(), "wav".into(), "m4a".into()]
}

/// `[resolution]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Memoize store lookups for the lifetime of the process.
    #[serde(default = "default_true")]
    pub cache: bool,

    /// Book codes used when a request does not narrow the sources itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_books: Option<Vec<String>>,

    /// Fall back to the lesson type's usual books when neither the request
    /// nor `default_books` names any.
    #[serde(default)]
    pub type_default_books: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            cache: true,
            default_books: None,
            type_default_books: false,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Media config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime media configuration with paths expanded and URLs parsed.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub mode: MediaMode,
    pub roots: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub base_url: Option<Url>,
}

impl TryFrom<&AppConfig> for MediaConfig {
    type Error = LessonCtxError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let media = &config.media;
        let base_url = media
            .base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| LessonCtxError::config(format!("invalid media.base_url {raw:?}: {e}")))
            })
            .transpose()?;

        Ok(Self {
            mode: media.mode,
            roots: media.roots.iter().map(|r| expand_home(r)).collect(),
            extensions: media
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            base_url,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lessonctx/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LessonCtxError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lessonctx/lessonctx.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LessonCtxError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LessonCtxError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LessonCtxError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LessonCtxError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LessonCtxError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configurations that would only fail later, mid-request.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.media.mode == MediaMode::Redirect && config.media.base_url.is_none() {
        return Err(LessonCtxError::config(
            "media.mode = \"redirect\" requires media.base_url",
        ));
    }

    if let Some(books) = &config.resolution.default_books {
        if books.is_empty() {
            return Err(LessonCtxError::config(
                "resolution.default_books must list at least one book code (omit it to use all books)",
            ));
        }
        for code in books {
            code.parse::<BookType>().map_err(|_| {
                LessonCtxError::config(format!("resolution.default_books: unknown book code {code:?}"))
            })?;
        }
    }

    MediaConfig::try_from(config)?;
    Ok(())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("db_path"));
        assert!(toml_str.contains("mode = \"local\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.storage.db_path, "~/.lessonctx/lessonctx.db");
        assert_eq!(parsed.media.extensions, vec!["mp3", "wav", "m4a"]);
        assert!(parsed.resolution.cache);
    }

    #[test]
    fn config_with_redirect_media() {
        let toml_str = r#"
[media]
mode = "redirect"
base_url = "https://cdn.example.com/media/"

[resolution]
default_books = ["LB", "ab"]
type_default_books = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        validate_config(&config).expect("valid");
        assert!(config.resolution.type_default_books);
        let media = MediaConfig::try_from(&config).unwrap();
        assert_eq!(media.mode, MediaMode::Redirect);
        assert_eq!(
            media.base_url.unwrap().as_str(),
            "https://cdn.example.com/media/"
        );
    }

    #[test]
    fn redirect_without_base_url_is_rejected() {
        let mut config = AppConfig::default();
        config.media.mode = MediaMode::Redirect;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn empty_default_books_is_rejected() {
        let mut config = AppConfig::default();
        config.resolution.default_books = Some(vec![]);
        assert!(validate_config(&config).is_err());

        config.resolution.default_books = Some(vec!["QQ".into()]);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("QQ"));
    }

    #[test]
    fn extensions_are_stripped_of_dots() {
        let mut config = AppConfig::default();
        config.media.extensions = vec![".mp3".into()];
        let media = MediaConfig::try_from(&config).unwrap();
        assert_eq!(media.extensions, vec!["mp3"]);
    }

    #[test]
    fn expand_home_leaves_relative_paths() {
        assert_eq!(expand_home("audio"), PathBuf::from("audio"));
        assert_ne!(expand_home("~/x"), PathBuf::from("~/x"));
    }
}
