use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_MUSIC_VOLUME: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicTrack {
    Upbeat,
    Chill,
    Cinematic,
    Inspiring,
    Lofi,
}

impl MusicTrack {
    pub const ALL: [MusicTrack; 5] = [
        MusicTrack::Upbeat,
        MusicTrack::Chill,
        MusicTrack::Cinematic,
        MusicTrack::Inspiring,
        MusicTrack::Lofi,
    ];

    pub fn id(self) -> &'static str {
        match self {
            MusicTrack::Upbeat => "upbeat",
            MusicTrack::Chill => "chill",
            MusicTrack::Cinematic => "cinematic",
            MusicTrack::Inspiring => "inspiring",
            MusicTrack::Lofi => "lofi",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MusicTrack::Upbeat => "Upbeat Energy",
            MusicTrack::Chill => "Chill Vibes",
            MusicTrack::Cinematic => "Cinematic Epic",
            MusicTrack::Inspiring => "Inspiring Journey",
            MusicTrack::Lofi => "Lo-Fi Beats",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            MusicTrack::Upbeat => "Energetic",
            MusicTrack::Chill | MusicTrack::Lofi => "Chill",
            MusicTrack::Cinematic => "Cinematic",
            MusicTrack::Inspiring => "Inspirational",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.mp3", self.id())
    }

    /// Unknown or empty ids mean "no music".
    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Self::ALL.iter().copied().find(|track| track.id() == id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MusicTrackInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub file: String,
    pub category: &'static str,
    pub duration: &'static str,
    pub available: bool,
    pub preview_url: String,
}

/// Bundled background tracks, resolved against the music asset directory.
#[derive(Debug, Clone)]
pub struct MusicLibrary {
    dir: PathBuf,
}

impl MusicLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, track: MusicTrack) -> PathBuf {
        self.dir.join(track.file_name())
    }

    /// The asset path, only when the file is actually present.
    pub async fn asset(&self, track: MusicTrack) -> Option<PathBuf> {
        let path = self.path(track);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    pub async fn list(&self) -> Vec<MusicTrackInfo> {
        let mut tracks = Vec::with_capacity(MusicTrack::ALL.len());
        for track in MusicTrack::ALL {
            let file = track.file_name();
            tracks.push(MusicTrackInfo {
                id: track.id(),
                name: track.name(),
                available: self.asset(track).await.is_some(),
                preview_url: format!("/static/music/{}", file),
                file,
                category: track.category(),
                duration: "30s",
            });
        }
        tracks
    }
}
