//! Resource classifier: normalize a node's external resources.
//!
//! Videos become canonical embeddable URLs, audio references become a
//! media-store locator. Anything that cannot be resolved stays in the output
//! with the reason attached.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;
use url::Url;

use lessonctx_shared::{ExternalResource, Grade, Subject};

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id regex"));

/// `"70"`, `"Track 70"`, `"track no. 7"`, `"Track #07"`.
static TRACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:track\s*(?:no\.?|number|#)?\s*)?(\d{1,4})\s*$").expect("track regex")
});

const EMBED_BASE: &str = "https://www.youtube.com/embed/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Video,
    Audio,
    Other,
}

impl ResourceKind {
    fn of(resource_type: &str) -> Self {
        match resource_type.trim().to_ascii_lowercase().as_str() {
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Video { video_id: String, embed_url: String },
    Audio { track: u32, locator: String },
    Unresolvable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedResource {
    pub title: String,
    pub kind: ResourceKind,
    /// The reference exactly as stored.
    pub reference: String,
    #[serde(flatten)]
    pub resolution: Resolution,
}

impl ResolvedResource {
    pub fn is_resolved(&self) -> bool {
        !matches!(self.resolution, Resolution::Unresolvable { .. })
    }
}

/// Classify every resource of a node, preserving order.
pub fn classify(
    resources: &[ExternalResource],
    subject: Subject,
    grade: Grade,
) -> Vec<ResolvedResource> {
    resources
        .iter()
        .map(|r| classify_one(r, subject, grade))
        .collect()
}

pub fn classify_one(resource: &ExternalResource, subject: Subject, grade: Grade) -> ResolvedResource {
    let kind = ResourceKind::of(&resource.resource_type);
    let resolution = match kind {
        ResourceKind::Video => match extract_video_id(&resource.reference) {
            Some(video_id) => Resolution::Video {
                embed_url: format!("{EMBED_BASE}{video_id}"),
                video_id,
            },
            None => Resolution::Unresolvable {
                reason: "reference is not a recognized video URL".into(),
            },
        },
        ResourceKind::Audio => match parse_track_number(&resource.reference) {
            Some(track) => Resolution::Audio {
                track,
                locator: audio_locator(subject, grade, track),
            },
            None => Resolution::Unresolvable {
                reason: "reference carries no track number".into(),
            },
        },
        ResourceKind::Other => Resolution::Unresolvable {
            reason: format!("unsupported resource type {:?}", resource.resource_type),
        },
    };

    if let Resolution::Unresolvable { reason } = &resolution {
        warn!(title = %resource.title, reference = %resource.reference, %reason, "unresolvable resource");
    }

    ResolvedResource {
        title: resource.title.clone(),
        kind,
        reference: resource.reference.clone(),
        resolution,
    }
}

/// Extract the 11-character video id from the supported URL shapes:
/// `youtube.com/watch?v=ID`, `youtu.be/ID` and `youtube.com/embed/ID`.
pub fn extract_video_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let url = Url::parse(raw)
        .or_else(|_| Url::parse(&format!("https://{raw}")))
        .ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = match host {
        "youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next()? {
                "watch" => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned())?,
                "embed" | "shorts" | "v" => segments.next()?.to_string(),
                _ => return None,
            }
        }
        "youtu.be" => url.path_segments()?.next()?.to_string(),
        _ => return None,
    };

    VIDEO_ID_RE.is_match(&candidate).then_some(candidate)
}

/// Parse the track number out of an audio reference.
pub fn parse_track_number(raw: &str) -> Option<u32> {
    TRACK_RE.captures(raw)?[1].parse().ok()
}

/// Media-store locator for an audio track, without extension:
/// `Grade_2_English_Tracks/GE2_Track_70`.
pub fn audio_locator(subject: Subject, grade: Grade, track: u32) -> String {
    let g = grade.number();
    format!(
        "Grade_{g}_{subject}_Tracks/{initials}{g}_Track_{track:02}",
        subject = subject.as_str(),
        initials = subject.track_initials(),
    )
}
