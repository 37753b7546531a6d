use serde::{Deserialize, Serialize};

pub const MIN_TRANSITION_SECONDS: f64 = 0.3;
pub const MAX_TRANSITION_SECONDS: f64 = 1.5;
pub const DEFAULT_TRANSITION_SECONDS: f64 = 0.5;

/// Old transition keys still sent by saved client presets.
const LEGACY_ALIASES: &[(&str, &str)] = &[("slide", "slideleft"), ("zoom", "zoomin")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    Fade,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    ZoomIn,
    ZoomOut,
    WipeLeft,
    WipeRight,
    WipeUp,
    WipeDown,
    Dissolve,
    Pixelize,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 13] = [
        TransitionKind::Fade,
        TransitionKind::SlideLeft,
        TransitionKind::SlideRight,
        TransitionKind::SlideUp,
        TransitionKind::SlideDown,
        TransitionKind::ZoomIn,
        TransitionKind::ZoomOut,
        TransitionKind::WipeLeft,
        TransitionKind::WipeRight,
        TransitionKind::WipeUp,
        TransitionKind::WipeDown,
        TransitionKind::Dissolve,
        TransitionKind::Pixelize,
    ];

    pub fn key(self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::SlideLeft => "slideleft",
            TransitionKind::SlideRight => "slideright",
            TransitionKind::SlideUp => "slideup",
            TransitionKind::SlideDown => "slidedown",
            TransitionKind::ZoomIn => "zoomin",
            TransitionKind::ZoomOut => "zoomout",
            TransitionKind::WipeLeft => "wipeleft",
            TransitionKind::WipeRight => "wiperight",
            TransitionKind::WipeUp => "wipeup",
            TransitionKind::WipeDown => "wipedown",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::Pixelize => "pixelize",
        }
    }

    /// Name of the `xfade` transition implementing this style.
    pub fn xfade(self) -> &'static str {
        match self {
            TransitionKind::ZoomIn => "circleopen",
            TransitionKind::ZoomOut => "circleclose",
            other => other.key(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TransitionKind::Fade => "Fade",
            TransitionKind::SlideLeft => "Slide Left",
            TransitionKind::SlideRight => "Slide Right",
            TransitionKind::SlideUp => "Slide Up",
            TransitionKind::SlideDown => "Slide Down",
            TransitionKind::ZoomIn => "Zoom In",
            TransitionKind::ZoomOut => "Zoom Out",
            TransitionKind::WipeLeft => "Wipe Left",
            TransitionKind::WipeRight => "Wipe Right",
            TransitionKind::WipeUp => "Wipe Up",
            TransitionKind::WipeDown => "Wipe Down",
            TransitionKind::Dissolve => "Dissolve",
            TransitionKind::Pixelize => "Pixelize",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            TransitionKind::Fade => "✨",
            TransitionKind::SlideLeft => "⬅️",
            TransitionKind::SlideRight => "➡️",
            TransitionKind::SlideUp => "⬆️",
            TransitionKind::SlideDown => "⬇️",
            TransitionKind::ZoomIn => "🔍",
            TransitionKind::ZoomOut => "🔎",
            TransitionKind::WipeLeft => "🌊",
            TransitionKind::WipeRight => "🌀",
            TransitionKind::WipeUp => "🔼",
            TransitionKind::WipeDown => "🔽",
            TransitionKind::Dissolve => "💫",
            TransitionKind::Pixelize => "🟩",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            TransitionKind::Fade => "Classic",
            TransitionKind::SlideLeft
            | TransitionKind::SlideRight
            | TransitionKind::SlideUp
            | TransitionKind::SlideDown => "Slide",
            TransitionKind::ZoomIn | TransitionKind::ZoomOut => "Zoom",
            TransitionKind::WipeLeft
            | TransitionKind::WipeRight
            | TransitionKind::WipeUp
            | TransitionKind::WipeDown => "Wipe",
            TransitionKind::Dissolve | TransitionKind::Pixelize => "Effect",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TransitionKind::Fade => "Smooth cross-dissolve",
            TransitionKind::SlideLeft => "Slide from right to left",
            TransitionKind::SlideRight => "Slide from left to right",
            TransitionKind::SlideUp => "Slide from bottom to top",
            TransitionKind::SlideDown => "Slide from top to bottom",
            TransitionKind::ZoomIn => "Circle expanding from center",
            TransitionKind::ZoomOut => "Circle collapsing to center",
            TransitionKind::WipeLeft => "Horizontal wipe effect",
            TransitionKind::WipeRight => "Reverse horizontal wipe",
            TransitionKind::WipeUp => "Vertical wipe effect",
            TransitionKind::WipeDown => "Reverse vertical wipe",
            TransitionKind::Dissolve => "Pixel dissolve effect",
            TransitionKind::Pixelize => "Pixelated mosaic transition",
        }
    }

    /// Exact catalog lookup, no aliasing.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.key() == key)
    }

    /// Maps legacy names first, then falls back to `Fade` for anything unknown.
    pub fn resolve(key: &str) -> Self {
        let key = key.trim();
        let key = LEGACY_ALIASES
            .iter()
            .find(|(legacy, _)| *legacy == key)
            .map(|(_, current)| *current)
            .unwrap_or(key);
        Self::from_key(key).unwrap_or_default()
    }
}

pub fn clamp_duration(seconds: f64) -> f64 {
    if seconds.is_nan() {
        return DEFAULT_TRANSITION_SECONDS;
    }
    seconds.clamp(MIN_TRANSITION_SECONDS, MAX_TRANSITION_SECONDS)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionSpec {
    pub kind: TransitionKind,
    pub duration: f64,
}

impl TransitionSpec {
    pub fn new(key: &str, duration: f64) -> Self {
        TransitionSpec {
            kind: TransitionKind::resolve(key),
            duration: clamp_duration(duration),
        }
    }
}

impl Default for TransitionSpec {
    fn default() -> Self {
        TransitionSpec {
            kind: TransitionKind::Fade,
            duration: DEFAULT_TRANSITION_SECONDS,
        }
    }
}

/// Catalog entry as listed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub category: &'static str,
    pub desc: &'static str,
}

pub fn catalog() -> Vec<TransitionInfo> {
    TransitionKind::ALL
        .iter()
        .map(|kind| TransitionInfo {
            id: kind.key(),
            label: kind.label(),
            icon: kind.icon(),
            category: kind.category(),
            desc: kind.description(),
        })
        .collect()
}
