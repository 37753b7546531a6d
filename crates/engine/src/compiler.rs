use crate::timeline::*;
use crate::transitions::TransitionKind;
use std::fmt;

/// One link of a filter graph: labelled inputs, a comma-separated filter chain, labelled outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub inputs: Vec<String>,
    pub filters: Vec<String>,
    pub outputs: Vec<String>,
}

impl FilterChain {
    pub fn new(inputs: &[&str], filters: Vec<String>, outputs: &[&str]) -> Self {
        FilterChain {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            filters,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        write!(f, "{}", self.filters.join(","))?;
        for output in &self.outputs {
            write!(f, "[{}]", output)?;
        }
        Ok(())
    }
}

/// Directed graph of named streams, rendered in `-filter_complex` syntax.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    pub chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    /// Labels produced by some chain and consumed by none.
    pub fn sinks(&self) -> Vec<&str> {
        let consumed: Vec<&str> = self
            .chains
            .iter()
            .flat_map(|c| c.inputs.iter().map(String::as_str))
            .collect();
        self.chains
            .iter()
            .flat_map(|c| c.outputs.iter().map(String::as_str))
            .filter(|label| !consumed.contains(label))
            .collect()
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.chains.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

pub const VIDEO_OUT: &str = "outv";

/// Compiled slideshow graph plus how its result pairs with the audio input.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGraph {
    pub graph: FilterGraph,
    pub video_out: String,
    /// Input index of the narration/mix track, when there is one. Mapped with `-shortest`.
    pub audio_input: Option<usize>,
}

fn zoompan_filter(frame: &ImageFrame, resolution: Resolution, fps: u32) -> String {
    let frames = frame.frame_count(fps);
    let (from, to) = frame.motion.zoom_range();
    let zoom = if from <= to {
        format!("{}+({}-{})*on/{}", from, to, from, frames)
    } else {
        format!("{}-({}-{})*on/{}", from, from, to, frames)
    };
    let center_x = "iw/2-(iw/zoom/2)".to_string();
    let center_y = "ih/2-(ih/zoom/2)".to_string();
    let (x, y) = match frame.motion {
        PanZoom::ZoomInCenter | PanZoom::ZoomOutCenter => (center_x, center_y),
        PanZoom::PanRight => (format!("(iw-iw/zoom)*on/{}", frames), center_y),
        PanZoom::PanDown => (center_x, format!("(ih-ih/zoom)*on/{}", frames)),
    };
    format!(
        "zoompan=z='{}':x='{}':y='{}':d={}:s={}:fps={}",
        zoom, x, y, frames, resolution, fps
    )
}

/// Scale to 2x canvas, crop exactly, then pan/zoom down to the output size.
fn image_chain(frame: &ImageFrame, resolution: Resolution, fps: u32) -> FilterChain {
    let canvas = resolution.headroom();
    let input = format!("{}:v", frame.index);
    let output = format!("v{}", frame.index);
    FilterChain::new(
        &[&input],
        vec![
            format!(
                "scale={}:{}:force_original_aspect_ratio=increase",
                canvas.width, canvas.height
            ),
            format!("crop={}:{}", canvas.width, canvas.height),
            zoompan_filter(frame, resolution, fps),
            "setsar=1".to_string(),
            "format=yuva420p".to_string(),
        ],
        &[&output],
    )
}

/// Builds the Ken Burns + crossfade graph for a planned timeline.
///
/// Inputs `0..n` are the looped images; input `n` is the audio track when `has_audio`.
/// Each pair of streams is folded through one `xfade` at the later frame's offset,
/// so the chain of intermediate labels `cf1 .. cf{n-2}` ends in [`VIDEO_OUT`].
pub fn compile_slideshow(
    plan: &TimelinePlan,
    transition: TransitionKind,
    resolution: Resolution,
    fps: u32,
    has_audio: bool,
) -> CompiledGraph {
    let mut graph = FilterGraph::default();
    for frame in &plan.frames {
        graph.push(image_chain(frame, resolution, fps));
    }

    if plan.len() <= 1 {
        graph.push(FilterChain::new(
            &["v0"],
            vec!["format=yuv420p".to_string()],
            &[VIDEO_OUT],
        ));
    } else {
        let last = plan.len() - 1;
        let mut previous = "v0".to_string();
        for frame in plan.frames.iter().skip(1) {
            let offset = frame.crossfade_offset.unwrap_or(frame.start);
            let current = format!("v{}", frame.index);
            let output = if frame.index == last {
                VIDEO_OUT.to_string()
            } else {
                format!("cf{}", frame.index)
            };
            graph.push(FilterChain::new(
                &[&previous, &current],
                vec![
                    format!(
                        "xfade=transition={}:duration={}:offset={:.2}",
                        transition.xfade(),
                        plan.transition_duration,
                        offset
                    ),
                    "format=yuv420p".to_string(),
                ],
                &[&output],
            ));
            previous = output;
        }
    }

    CompiledGraph {
        graph,
        video_out: VIDEO_OUT.to_string(),
        audio_input: has_audio.then_some(plan.len()),
    }
}

fn concat_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/").replace('\'', "'\\''")
}

/// Concat-demuxer script for the hard-cut fallback. The last image is listed twice
/// because the demuxer ignores the final entry's duration.
pub fn concat_list(plan: &TimelinePlan) -> String {
    let mut script = String::new();
    for frame in &plan.frames {
        script.push_str(&format!(
            "file '{}'\nduration {}\n",
            concat_path(&frame.path),
            plan.image_duration
        ));
    }
    if let Some(last) = plan.frames.last() {
        script.push_str(&format!("file '{}'\n", concat_path(&last.path)));
    }
    script
}

/// Fit inside the frame and pad the rest with black.
pub fn letterbox_filter(resolution: Resolution) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black",
        w = resolution.width,
        h = resolution.height
    )
}

pub fn fallback_filter(resolution: Resolution) -> String {
    format!("{},format=yuv420p", letterbox_filter(resolution))
}

pub const TITLE_VISIBLE_SECONDS: f64 = 4.0;
pub const TITLE_FADE_SECONDS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitlePosition {
    #[default]
    Top,
    Center,
    Bottom,
}

impl TitlePosition {
    /// Unknown positions render at the top.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "center" => TitlePosition::Center,
            "bottom" => TitlePosition::Bottom,
            _ => TitlePosition::Top,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            TitlePosition::Top => "top",
            TitlePosition::Center => "center",
            TitlePosition::Bottom => "bottom",
        }
    }

    /// (x, y) drawtext expressions.
    pub fn coordinates(self) -> (&'static str, &'static str) {
        match self {
            TitlePosition::Top => ("(w-text_w)/2", "80"),
            TitlePosition::Center => ("(w-text_w)/2", "(h-text_h)/2"),
            TitlePosition::Bottom => ("(w-text_w)/2", "h-text_h-80"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleOverlay {
    pub text: String,
    pub position: TitlePosition,
}

pub fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

pub fn title_font_size(resolution: Resolution) -> u32 {
    ((resolution.width as f64 * 0.04) as u32).max(32)
}

impl TitleOverlay {
    pub fn new(text: &str, position: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(TitleOverlay {
            text: text.to_string(),
            position: TitlePosition::parse(position),
        })
    }

    pub fn drawtext_filter(&self, resolution: Resolution) -> String {
        let (x, y) = self.position.coordinates();
        let end = TITLE_VISIBLE_SECONDS;
        let fade = TITLE_FADE_SECONDS;
        format!(
            "drawtext=text='{text}':fontsize={size}:fontcolor=white:borderw=3:bordercolor=black@0.6\
             :x={x}:y={y}:enable='between(t,0,{end})'\
             :alpha='if(lt(t,{fade}),t/{fade},if(gt(t,{fade_out}),({end}-t)/{fade},1))'",
            text = escape_drawtext(&self.text),
            size = title_font_size(resolution),
            x = x,
            y = y,
            end = end,
            fade = fade,
            fade_out = end - fade,
        )
    }
}

pub const MUSIC_FADE_SECONDS: f64 = 2.0;

pub fn clamp_music_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

/// Loops the music bed (input 1) to the narration length (input 0), ducks and fades it,
/// then mixes both into `[out]`.
pub fn music_bed_graph(narration_duration: f64, music_volume: f64) -> FilterGraph {
    let fade_start = (narration_duration - MUSIC_FADE_SECONDS).max(0.0);
    let mut graph = FilterGraph::default();
    graph.push(FilterChain::new(
        &["1:a"],
        vec![
            "aloop=loop=-1:size=2e+09".to_string(),
            format!("atrim=0:{}", narration_duration),
            format!("volume={}", clamp_music_volume(music_volume)),
            format!("afade=t=out:st={:.1}:d={:.1}", fade_start, MUSIC_FADE_SECONDS),
        ],
        &["music"],
    ));
    graph.push(FilterChain::new(
        &["0:a", "music"],
        vec!["amix=inputs=2:duration=first:dropout_transition=2".to_string()],
        &["out"],
    ));
    graph
}
