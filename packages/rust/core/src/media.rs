//! Media sources for audio locators produced by the classifier.
//!
//! A locator is a relative, extension-less path such as
//! `Grade_2_English_Tracks/GE2_Track_70`. [`LocalMediaSource`] looks it up under
//! configured roots; [`RedirectMediaSource`] maps it onto a base URL.

use std::future::Future;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument};
use url::Url;

use lessonctx_shared::{LessonCtxError, MediaConfig, MediaMode, Result};

/// Where a locator's media can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaHandle {
    File(PathBuf),
    Redirect(Url),
}

pub trait MediaSource: Send + Sync {
    /// Resolve a locator. `Ok(None)` means the media is not available.
    fn open(&self, locator: &str) -> impl Future<Output = Result<Option<MediaHandle>>> + Send;
}

/// Reject locators that could escape a media root.
pub fn check_locator(locator: &str) -> Result<()> {
    if locator.trim().is_empty() {
        return Err(LessonCtxError::validation("empty media locator"));
    }
    let path = Path::new(locator);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes || locator.contains('\\') {
        return Err(LessonCtxError::validation(format!(
            "media locator {locator:?} must be a relative path without `..`"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LocalMediaSource {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl LocalMediaSource {
    pub fn new(roots: Vec<PathBuf>, extensions: Vec<String>) -> Self {
        Self { roots, extensions }
    }

    /// Candidate files in lookup order: every extension under the first root,
    /// then the next root.
    pub fn candidates(&self, locator: &str) -> Vec<PathBuf> {
        self.roots
            .iter()
            .flat_map(|root| {
                self.extensions
                    .iter()
                    .map(move |ext| root.join(format!("{locator}.{ext}")))
            })
            .collect()
    }
}

impl MediaSource for LocalMediaSource {
    #[instrument(skip(self))]
    async fn open(&self, locator: &str) -> Result<Option<MediaHandle>> {
        check_locator(locator)?;
        for candidate in self.candidates(locator) {
            let exists = tokio::fs::try_exists(&candidate)
                .await
                .map_err(|e| LessonCtxError::io(&candidate, e))?;
            if exists {
                debug!(path = %candidate.display(), "media file found");
                return Ok(Some(MediaHandle::File(candidate)));
            }
        }
        debug!("media file not found under any root");
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Redirect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RedirectMediaSource {
    base_url: Url,
    extension: String,
}

impl RedirectMediaSource {
    pub fn new(mut base_url: Url, extension: impl Into<String>) -> Self {
        // `Url::join` replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            extension: extension.into(),
        }
    }
}

impl MediaSource for RedirectMediaSource {
    async fn open(&self, locator: &str) -> Result<Option<MediaHandle>> {
        check_locator(locator)?;
        let url = self
            .base_url
            .join(&format!("{locator}.{}", self.extension))
            .map_err(|e| LessonCtxError::validation(format!("bad media locator {locator:?}: {e}")))?;
        Ok(Some(MediaHandle::Redirect(url)))
    }
}

// ---------------------------------------------------------------------------
// Config-selected source
// ---------------------------------------------------------------------------

/// The media source selected by `[media] mode`.
#[derive(Debug, Clone)]
pub enum ConfiguredMedia {
    Local(LocalMediaSource),
    Redirect(RedirectMediaSource),
}

impl ConfiguredMedia {
    pub fn from_config(config: &MediaConfig) -> Result<Self> {
        match config.mode {
            MediaMode::Local => Ok(Self::Local(LocalMediaSource::new(
                config.roots.clone(),
                config.extensions.clone(),
            ))),
            MediaMode::Redirect => {
                let base = config.base_url.clone().ok_or_else(|| {
                    LessonCtxError::config("media.mode = \"redirect\" requires media.base_url")
                })?;
                let ext = config
                    .extensions
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "mp3".to_string());
                Ok(Self::Redirect(RedirectMediaSource::new(base, ext)))
            }
        }
    }
}

impl MediaSource for ConfiguredMedia {
    async fn open(&self, locator: &str) -> Result<Option<MediaHandle>> {
        match self {
            Self::Local(source) => source.open(locator).await,
            Self::Redirect(source) => source.open(locator).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCATOR: &str = "Grade_2_English_Tracks/GE2_Track_70";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lessonctx-media-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn locator_must_stay_relative() {
        assert!(check_locator(LOCATOR).is_ok());
        assert!(check_locator("../secret").is_err());
        assert!(check_locator("Grade_2/../../etc/passwd").is_err());
        assert!(check_locator("/etc/passwd").is_err());
        assert!(check_locator("a\\b").is_err());
        assert!(check_locator("").is_err());
    }

    #[tokio::test]
    async fn local_source_checks_roots_in_order() {
        let first = temp_dir();
        let second = temp_dir();
        let track_dir = second.join("Grade_2_English_Tracks");
        std::fs::create_dir_all(&track_dir).unwrap();
        std::fs::write(track_dir.join("GE2_Track_70.wav"), b"RIFF").unwrap();

        let source = LocalMediaSource::new(
            vec![first.clone(), second.clone()],
            vec!["mp3".into(), "wav".into()],
        );
        assert_eq!(source.candidates(LOCATOR).len(), 4);

        let handle = source.open(LOCATOR).await.unwrap();
        assert_eq!(
            handle,
            Some(MediaHandle::File(track_dir.join("GE2_Track_70.wav")))
        );
        assert_eq!(source.open("Grade_2_English_Tracks/GE2_Track_99").await.unwrap(), None);
        assert!(source.open("../GE2_Track_70").await.is_err());

        let _ = std::fs::remove_dir_all(&first);
        let _ = std::fs::remove_dir_all(&second);
    }

    #[tokio::test]
    async fn redirect_source_joins_base_url() {
        let base = Url::parse("https://cdn.example.com/audio").unwrap();
        let source = RedirectMediaSource::new(base, "mp3");
        let handle = source.open(LOCATOR).await.unwrap();
        assert_eq!(
            handle,
            Some(MediaHandle::Redirect(
                Url::parse("https://cdn.example.com/audio/Grade_2_English_Tracks/GE2_Track_70.mp3")
                    .unwrap()
            ))
        );
    }

    #[test]
    fn redirect_mode_requires_base_url() {
        let config = MediaConfig {
            mode: MediaMode::Redirect,
            roots: vec![],
            extensions: vec!["mp3".into()],
            base_url: None,
        };
        assert!(matches!(
            ConfiguredMedia::from_config(&config).unwrap_err(),
            LessonCtxError::Config { .. }
        ));
    }
}
