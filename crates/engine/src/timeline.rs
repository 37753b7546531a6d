use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::transitions::clamp_duration;

pub const DEFAULT_FPS: u32 = 30;

/// Per-image duration used when neither an explicit value nor a narration length is known.
pub const DEFAULT_IMAGE_SECONDS: f64 = 3.0;

/// Floor for audio-driven durations so long narrations over many images never
/// degenerate into near-zero frames.
pub const MIN_AUDIO_DRIVEN_SECONDS: f64 = 1.5;

/// Every frame stays visible this long beyond its outgoing transition.
pub const TRANSITION_PADDING_SECONDS: f64 = 0.5;

pub const ZOOM_START: f64 = 1.0;
pub const ZOOM_END: f64 = 1.08;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("No images provided")]
    NoImages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }

    /// Working canvas for pan/zoom: twice the output size so cropping never upsamples.
    pub fn headroom(&self) -> Resolution {
        Resolution::new(self.width * 2, self.height * 2)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    /// Unknown ratios fall back to vertical 9:16.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "16:9" => AspectRatio::Landscape,
            "1:1" => AspectRatio::Square,
            _ => AspectRatio::Portrait,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
        }
    }

    pub fn resolution(self) -> Resolution {
        match self {
            AspectRatio::Portrait => Resolution::new(1080, 1920),
            AspectRatio::Landscape => Resolution::new(1920, 1080),
            AspectRatio::Square => Resolution::new(1080, 1080),
        }
    }
}

/// Ken Burns motion applied to a still image. Assigned cyclically by image index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanZoom {
    ZoomInCenter,
    PanRight,
    ZoomOutCenter,
    PanDown,
}

impl PanZoom {
    pub fn for_index(index: usize) -> Self {
        match index % 4 {
            0 => PanZoom::ZoomInCenter,
            1 => PanZoom::PanRight,
            2 => PanZoom::ZoomOutCenter,
            _ => PanZoom::PanDown,
        }
    }

    /// (zoom at first frame, zoom at last frame)
    pub fn zoom_range(self) -> (f64, f64) {
        match self {
            PanZoom::ZoomOutCenter => (ZOOM_END, ZOOM_START),
            _ => (ZOOM_START, ZOOM_END),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub path: PathBuf,
    pub index: usize,
    /// Position on the global timeline where this frame first becomes visible.
    pub start: f64,
    pub duration: f64,
    pub motion: PanZoom,
    /// Offset of the crossfade from the previous frame into this one. `None` for the first frame.
    pub crossfade_offset: Option<f64>,
}

impl ImageFrame {
    /// Rendered length in frames at `fps`; the zoom trajectory is parameterized over this count.
    pub fn frame_count(&self, fps: u32) -> u32 {
        ((self.duration * fps as f64) as u32).max(1)
    }
}

#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub image_paths: &'a [PathBuf],
    pub duration_per_image: Option<f64>,
    pub audio_duration: Option<f64>,
    pub transition_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePlan {
    pub frames: Vec<ImageFrame>,
    pub image_duration: f64,
    pub transition_duration: f64,
}

impl TimelinePlan {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.frames.len() == 1
    }

    /// Length of the composed video: every frame minus the overlap of each crossfade.
    pub fn total_duration(&self) -> f64 {
        let n = self.frames.len() as f64;
        if n == 0.0 {
            return 0.0;
        }
        n * self.image_duration - (n - 1.0) * self.transition_duration
    }

    pub fn crossfade_offsets(&self) -> Vec<f64> {
        self.frames.iter().filter_map(|f| f.crossfade_offset).collect()
    }
}

/// Per-image duration before the transition floor is known to be satisfied.
pub fn image_duration(
    num_images: usize,
    duration_per_image: Option<f64>,
    audio_duration: Option<f64>,
    transition_duration: f64,
) -> f64 {
    let audio_duration = audio_duration.filter(|d| d.is_finite() && *d > 0.0);
    let computed = match (duration_per_image, audio_duration) {
        (Some(explicit), _) => explicit,
        (None, Some(audio)) if num_images > 0 => {
            (audio / num_images as f64).max(MIN_AUDIO_DRIVEN_SECONDS)
        }
        _ => DEFAULT_IMAGE_SECONDS,
    };
    computed.max(transition_duration + TRANSITION_PADDING_SECONDS)
}

/// Start of transition `index` (1-based, between frames `index - 1` and `index`).
/// The lower bound keeps a transition from reaching back past the previous one.
pub fn crossfade_offset(index: usize, image_duration: f64, transition_duration: f64) -> f64 {
    let i = index as f64;
    let natural = i * image_duration - i * transition_duration;
    let floor = (i - 1.0) * TRANSITION_PADDING_SECONDS + TRANSITION_PADDING_SECONDS;
    natural.max(floor)
}

pub fn plan_timeline(request: &PlanRequest<'_>) -> Result<TimelinePlan, PlanError> {
    if request.image_paths.is_empty() {
        return Err(PlanError::NoImages);
    }

    let transition_duration = clamp_duration(request.transition_duration);
    let duration = image_duration(
        request.image_paths.len(),
        request.duration_per_image,
        request.audio_duration,
        transition_duration,
    );
    let single = request.image_paths.len() == 1;

    let frames = request
        .image_paths
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let crossfade_offset = if index == 0 || single {
                None
            } else {
                Some(crossfade_offset(index, duration, transition_duration))
            };
            ImageFrame {
                path: path.clone(),
                index,
                start: crossfade_offset.unwrap_or(0.0),
                duration,
                motion: PanZoom::for_index(index),
                crossfade_offset,
            }
        })
        .collect();

    Ok(TimelinePlan {
        frames,
        image_duration: duration,
        transition_duration,
    })
}
