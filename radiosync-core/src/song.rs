//! Song records as served by the backend and the views derived from them.

use serde::{Deserialize, Deserializer, Serialize};

/// Label shown when there is no current or next song
pub const UNKNOWN_TITLE: &str = "unknown";

/// Duration label shown when the length is not known
pub const UNKNOWN_DURATION: &str = "-:--";

/// Rating label for a song nobody has voted on (en dash)
pub const NO_VOTES: &str = "\u{2013}";

/// Song record exactly as the REST backend serializes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub preview_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub upvotes: Option<i64>,
    #[serde(default)]
    pub downvotes: Option<i64>,
}

/// Decimal durations arrive either as JSON numbers or as strings.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Number(f64),
        Text(String),
    }

    match Option::<RawDuration>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDuration::Number(n)) => Ok(Some(n)),
        Some(RawDuration::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Display-ready song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongView {
    pub title: String,
    pub duration_seconds: Option<f64>,
    pub external_id: String,
    pub preview_url: String,
    /// Who queued the song; only present for authenticated reads
    pub attribution_user: Option<String>,
    pub upvotes: Option<i64>,
    pub downvotes: Option<i64>,
}

impl From<SongRecord> for SongView {
    fn from(record: SongRecord) -> Self {
        Self {
            title: record.title,
            duration_seconds: record.duration,
            external_id: record.external_id,
            preview_url: record.preview_url,
            attribution_user: record.username,
            upvotes: record.upvotes,
            downvotes: record.downvotes,
        }
    }
}

impl SongView {
    #[must_use]
    pub fn duration_label(&self) -> String {
        format_duration(self.duration_seconds)
    }

    #[must_use]
    pub fn rating_label(&self) -> Option<String> {
        format_rating(Some(self))
    }
}

/// Raw body of `GET /api/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusRecord {
    #[serde(default)]
    pub current_song: Option<SongRecord>,
    #[serde(default)]
    pub next_song: Option<SongRecord>,
}

/// Full replacement of the displayed status, never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub current_song: Option<SongView>,
    pub next_song: Option<SongView>,
}

impl From<StatusRecord> for StatusSnapshot {
    fn from(record: StatusRecord) -> Self {
        Self {
            current_song: record.current_song.map(SongView::from),
            next_song: record.next_song.map(SongView::from),
        }
    }
}

impl StatusSnapshot {
    #[must_use]
    pub fn current_title(&self) -> &str {
        song_title(self.current_song.as_ref())
    }

    #[must_use]
    pub fn next_title(&self) -> &str {
        song_title(self.next_song.as_ref())
    }
}

/// Title of a song, or [`UNKNOWN_TITLE`] when there is none or it is blank.
#[must_use]
pub fn song_title(song: Option<&SongView>) -> &str {
    match song {
        Some(song) if !song.title.is_empty() => &song.title,
        _ => UNKNOWN_TITLE,
    }
}

/// Format a duration in seconds as `m:ss`.
///
/// Fractional seconds are truncated. Unknown or non-finite durations render as
/// [`UNKNOWN_DURATION`].
#[must_use]
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite()) else {
        return UNKNOWN_DURATION.to_string();
    };

    // Clamped to non-negative and truncated; song lengths fit in u64
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.max(0.0).trunc() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Net rating of a song: `+n`, `-n`, `0`, or [`NO_VOTES`] when nobody voted.
///
/// Returns `None` when the song or its vote counts are missing.
#[must_use]
pub fn format_rating(song: Option<&SongView>) -> Option<String> {
    let song = song?;
    let (upvotes, downvotes) = (song.upvotes?, song.downvotes?);

    if upvotes == 0 && downvotes == 0 {
        return Some(NO_VOTES.to_string());
    }

    let rating = upvotes - downvotes;
    Some(if rating > 0 {
        format!("+{rating}")
    } else {
        rating.to_string()
    })
}
