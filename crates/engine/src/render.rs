use crate::compiler::{
    fallback_filter, letterbox_filter, music_bed_graph, CompiledGraph, TitleOverlay,
};
use crate::timeline::{Resolution, TimelinePlan};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub struct RenderCommand {
    pub ffmpeg_args: Vec<String>,
    pub output_path: PathBuf,
    pub concat_list_path: PathBuf, // Only set for the concat-demuxer fallback
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// H.264/AAC delivery settings shared by the composition passes.
fn delivery_args() -> Vec<String> {
    strings(&[
        "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a", "192k",
        "-pix_fmt", "yuv420p", "-movflags", "+faststart",
    ])
}

/// Full Ken Burns + crossfade render. Each image is looped for exactly its planned duration.
pub fn composition_command(
    plan: &TimelinePlan,
    compiled: &CompiledGraph,
    audio_path: Option<&Path>,
    output_path: PathBuf,
) -> RenderCommand {
    let mut args = strings(&["-y"]);
    for frame in &plan.frames {
        args.extend(strings(&["-loop", "1", "-t"]));
        args.push(frame.duration.to_string());
        args.push("-i".to_string());
        args.push(path_arg(&frame.path));
    }

    let audio_input = match (audio_path, compiled.audio_input) {
        (Some(audio), Some(index)) => {
            args.push("-i".to_string());
            args.push(path_arg(audio));
            Some(index)
        }
        _ => None,
    };

    args.push("-filter_complex".to_string());
    args.push(compiled.graph.to_string());
    args.push("-map".to_string());
    args.push(format!("[{}]", compiled.video_out));
    if let Some(index) = audio_input {
        args.push("-map".to_string());
        args.push(format!("{}:a", index));
        args.push("-shortest".to_string());
    }
    args.extend(delivery_args());
    args.push(path_arg(&output_path));

    RenderCommand {
        ffmpeg_args: args,
        output_path,
        concat_list_path: PathBuf::new(),
    }
}

/// Hard cuts through the concat demuxer with letterboxed scaling. No pan/zoom, no crossfades.
/// The caller writes [`crate::compiler::concat_list`] to `concat_list_path` before running.
pub fn fallback_command(
    audio_path: Option<&Path>,
    resolution: Resolution,
    concat_list_path: PathBuf,
    output_path: PathBuf,
) -> RenderCommand {
    let mut args = strings(&["-y", "-f", "concat", "-safe", "0", "-i"]);
    args.push(path_arg(&concat_list_path));
    if let Some(audio) = audio_path {
        args.push("-i".to_string());
        args.push(path_arg(audio));
    }
    args.push("-vf".to_string());
    args.push(fallback_filter(resolution));
    args.extend(strings(&[
        "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a", "192k",
    ]));
    if audio_path.is_some() {
        args.push("-shortest".to_string());
    }
    args.extend(strings(&["-pix_fmt", "yuv420p", "-movflags", "+faststart"]));
    args.push(path_arg(&output_path));

    RenderCommand {
        ffmpeg_args: args,
        output_path,
        concat_list_path,
    }
}

/// Second pass burning the title into an already composed video. Audio is copied untouched.
pub fn title_overlay_command(
    input_path: &Path,
    overlay: &TitleOverlay,
    resolution: Resolution,
    output_path: PathBuf,
) -> RenderCommand {
    let mut args = strings(&["-y", "-i"]);
    args.push(path_arg(input_path));
    args.push("-vf".to_string());
    args.push(overlay.drawtext_filter(resolution));
    args.extend(strings(&[
        "-c:v", "libx264", "-preset", "fast", "-crf", "23", "-c:a", "copy", "-movflags",
        "+faststart",
    ]));
    args.push(path_arg(&output_path));

    RenderCommand {
        ffmpeg_args: args,
        output_path,
        concat_list_path: PathBuf::new(),
    }
}

pub const THUMBNAIL_OFFSET: &str = "00:00:01";

pub fn thumbnail_command(video_path: &Path, output_path: PathBuf) -> RenderCommand {
    let mut args = strings(&["-y", "-i"]);
    args.push(path_arg(video_path));
    args.extend(strings(&["-ss", THUMBNAIL_OFFSET, "-vframes", "1", "-q:v", "2"]));
    args.push(path_arg(&output_path));

    RenderCommand {
        ffmpeg_args: args,
        output_path,
        concat_list_path: PathBuf::new(),
    }
}

/// Narration (input 0) mixed over a looped music bed (input 1), encoded as MP3.
pub fn mix_command(
    narration_path: &Path,
    music_path: &Path,
    narration_duration: f64,
    music_volume: f64,
    output_path: PathBuf,
) -> RenderCommand {
    let mut args = strings(&["-y", "-i"]);
    args.push(path_arg(narration_path));
    args.push("-i".to_string());
    args.push(path_arg(music_path));
    args.push("-filter_complex".to_string());
    args.push(music_bed_graph(narration_duration, music_volume).to_string());
    args.extend(strings(&["-map", "[out]", "-c:a", "libmp3lame", "-b:a", "192k"]));
    args.push(path_arg(&output_path));

    RenderCommand {
        ffmpeg_args: args,
        output_path,
        concat_list_path: PathBuf::new(),
    }
}

/// ffprobe arguments printing only the container duration in seconds.
pub fn probe_duration_args(media_path: &Path) -> Vec<String> {
    let mut args = strings(&[
        "-v",
        "quiet",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]);
    args.push(path_arg(media_path));
    args
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportPlatform {
    Instagram,
    TikTok,
    YouTube,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProfile {
    pub resolution: Resolution,
    pub max_duration_secs: u32,
    pub label: &'static str,
}

#[derive(Debug, Error, PartialEq)]
#[error("Unknown platform. Supported: {}", ExportPlatform::supported())]
pub struct UnknownPlatform(pub String);

impl ExportPlatform {
    pub const ALL: [ExportPlatform; 3] = [
        ExportPlatform::Instagram,
        ExportPlatform::TikTok,
        ExportPlatform::YouTube,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ExportPlatform::Instagram => "instagram",
            ExportPlatform::TikTok => "tiktok",
            ExportPlatform::YouTube => "youtube",
        }
    }

    pub fn parse(name: &str) -> Result<Self, UnknownPlatform> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.key() == name)
            .ok_or_else(|| UnknownPlatform(name.to_string()))
    }

    pub fn supported() -> String {
        Self::ALL.iter().map(|p| p.key()).collect::<Vec<_>>().join(", ")
    }

    pub fn profile(self) -> ExportProfile {
        match self {
            ExportPlatform::Instagram => ExportProfile {
                resolution: Resolution::new(1080, 1920),
                max_duration_secs: 90,
                label: "Instagram Reels",
            },
            ExportPlatform::TikTok => ExportProfile {
                resolution: Resolution::new(1080, 1920),
                max_duration_secs: 180,
                label: "TikTok",
            },
            ExportPlatform::YouTube => ExportProfile {
                resolution: Resolution::new(1920, 1080),
                max_duration_secs: 60,
                label: "YouTube Shorts",
            },
        }
    }
}

pub fn export_command(
    source_path: &Path,
    platform: ExportPlatform,
    output_path: PathBuf,
) -> RenderCommand {
    let profile = platform.profile();
    let mut args = strings(&["-y", "-i"]);
    args.push(path_arg(source_path));
    args.push("-vf".to_string());
    args.push(letterbox_filter(profile.resolution));
    args.extend(strings(&[
        "-c:v", "libx264", "-preset", "fast", "-crf", "23", "-c:a", "aac", "-b:a", "128k", "-t",
    ]));
    args.push(profile.max_duration_secs.to_string());
    args.extend(strings(&["-movflags", "+faststart"]));
    args.push(path_arg(&output_path));

    RenderCommand {
        ffmpeg_args: args,
        output_path,
        concat_list_path: PathBuf::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_slideshow;
    use crate::timeline::{plan_timeline, PlanRequest};
    use crate::transitions::TransitionKind;

    fn two_image_plan() -> TimelinePlan {
        let images = vec![PathBuf::from("/w/img_000.jpg"), PathBuf::from("/w/img_001.png")];
        plan_timeline(&PlanRequest {
            image_paths: &images,
            duration_per_image: Some(3.0),
            audio_duration: None,
            transition_duration: 0.5,
        })
        .unwrap()
    }

    fn position(args: &[String], needle: &str) -> usize {
        args.iter().position(|a| a == needle).unwrap()
    }

    #[test]
    fn composition_loops_images_and_maps_audio_shortest() {
        let plan = two_image_plan();
        let res = Resolution::new(1080, 1920);
        let compiled = compile_slideshow(&plan, TransitionKind::Fade, res, 30, true);
        let cmd = composition_command(
            &plan,
            &compiled,
            Some(Path::new("/w/narration.mp3")),
            PathBuf::from("/w/reel.mp4"),
        );
        let args = &cmd.ffmpeg_args;
        assert_eq!(&args[..7], &strings(&["-y", "-loop", "1", "-t", "3", "-i", "/w/img_000.jpg"])[..]);
        assert_eq!(args[position(args, "/w/narration.mp3") - 1], "-i");
        let map = position(args, "[outv]");
        assert_eq!(&args[map + 1..map + 4], &strings(&["-map", "2:a", "-shortest"])[..]);
        assert_eq!(args.last().unwrap(), "/w/reel.mp4");
        assert!(args[position(args, "-filter_complex") + 1].contains("xfade=transition=fade"));
    }

    #[test]
    fn composition_without_audio_has_no_audio_map() {
        let plan = two_image_plan();
        let compiled = compile_slideshow(&plan, TransitionKind::Fade, Resolution::new(1080, 1080), 30, false);
        let cmd = composition_command(&plan, &compiled, None, PathBuf::from("/w/reel.mp4"));
        assert!(!cmd.ffmpeg_args.contains(&"-shortest".to_string()));
        assert!(!cmd.ffmpeg_args.contains(&"2:a".to_string()));
    }

    #[test]
    fn fallback_uses_concat_demuxer_and_letterbox() {
        let cmd = fallback_command(
            Some(Path::new("/w/narration.mp3")),
            Resolution::new(1920, 1080),
            PathBuf::from("/w/reel_concat.txt"),
            PathBuf::from("/w/reel.mp4"),
        );
        let args = &cmd.ffmpeg_args;
        assert_eq!(&args[..7], &strings(&["-y", "-f", "concat", "-safe", "0", "-i", "/w/reel_concat.txt"])[..]);
        assert!(args[position(args, "-vf") + 1].starts_with("scale=1920:1080:force_original_aspect_ratio=decrease,pad="));
        assert!(args.contains(&"-shortest".to_string()));
        assert!(!args.iter().any(|a| a.contains("zoompan") || a.contains("xfade")));
        assert_eq!(cmd.concat_list_path, PathBuf::from("/w/reel_concat.txt"));
    }

    #[test]
    fn thumbnail_grabs_one_frame_at_one_second() {
        let cmd = thumbnail_command(Path::new("/w/reel.mp4"), PathBuf::from("/w/thumbnail.jpg"));
        assert_eq!(
            cmd.ffmpeg_args,
            strings(&["-y", "-i", "/w/reel.mp4", "-ss", "00:00:01", "-vframes", "1", "-q:v", "2", "/w/thumbnail.jpg"])
        );
    }

    #[test]
    fn title_pass_copies_audio() {
        let overlay = TitleOverlay::new("Hello", "bottom").unwrap();
        let cmd = title_overlay_command(
            Path::new("/w/reel.mp4"),
            &overlay,
            Resolution::new(1080, 1920),
            PathBuf::from("/w/reel_titled.mp4"),
        );
        let args = &cmd.ffmpeg_args;
        assert!(args[position(args, "-vf") + 1].contains("y=h-text_h-80"));
        assert_eq!(args[position(args, "-c:a") + 1], "copy");
    }

    #[test]
    fn export_profiles_cap_duration() {
        let cmd = export_command(Path::new("/w/reel.mp4"), ExportPlatform::YouTube, PathBuf::from("/w/reel_youtube.mp4"));
        let args = &cmd.ffmpeg_args;
        assert_eq!(args[position(args, "-t") + 1], "60");
        assert!(args[position(args, "-vf") + 1].starts_with("scale=1920:1080"));
        assert_eq!(ExportPlatform::TikTok.profile().max_duration_secs, 180);
        assert_eq!(ExportPlatform::Instagram.profile().label, "Instagram Reels");
    }

    #[test]
    fn unknown_platform_lists_choices() {
        assert_eq!(ExportPlatform::parse("tiktok"), Ok(ExportPlatform::TikTok));
        let err = ExportPlatform::parse("myspace").unwrap_err();
        assert_eq!(err.to_string(), "Unknown platform. Supported: instagram, tiktok, youtube");
    }

    #[test]
    fn mix_command_maps_mixed_output() {
        let cmd = mix_command(
            Path::new("/w/narration.mp3"),
            Path::new("/music/lofi.mp3"),
            8.0,
            0.2,
            PathBuf::from("/w/mixed_audio.mp3"),
        );
        let args = &cmd.ffmpeg_args;
        assert_eq!(args[position(args, "-map") + 1], "[out]");
        assert!(args[position(args, "-filter_complex") + 1].contains("atrim=0:8,volume=0.2"));
        assert_eq!(args[position(args, "-c:a") + 1], "libmp3lame");
    }

    #[test]
    fn probe_prints_bare_duration() {
        let args = probe_duration_args(Path::new("/w/narration.mp3"));
        assert_eq!(args.last().unwrap(), "/w/narration.mp3");
        assert!(args.contains(&"format=duration".to_string()));
    }
}
