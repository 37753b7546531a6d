use engine::render::ExportPlatform;
use std::path::{Path, PathBuf};

use super::JobId;

/// File layout of a single job's directory under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(output_dir: &Path, id: &JobId) -> Self {
        Self {
            root: output_dir.join(id.as_str()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn create(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn image(&self, index: usize, extension: &str) -> PathBuf {
        self.root.join(format!("img_{:03}.{}", index, extension))
    }

    pub fn narration(&self) -> PathBuf {
        self.root.join("narration.mp3")
    }

    pub fn mixed_audio(&self) -> PathBuf {
        self.root.join("mixed_audio.mp3")
    }

    pub fn reel(&self) -> PathBuf {
        self.root.join("reel.mp4")
    }

    pub fn titled_reel(&self) -> PathBuf {
        self.root.join("reel_titled.mp4")
    }

    pub fn concat_list(&self) -> PathBuf {
        self.root.join("reel_concat.txt")
    }

    pub fn thumbnail(&self) -> PathBuf {
        self.root.join("thumbnail.jpg")
    }

    pub fn export(&self, platform: ExportPlatform) -> PathBuf {
        self.root.join(format!("reel_{}.mp4", platform.key()))
    }

    /// Scratch target for an in-flight export; renamed over [`Workspace::export`] on success.
    pub fn export_partial(&self, platform: ExportPlatform) -> PathBuf {
        self.root.join(format!(
            "reel_{}.{}.partial.mp4",
            platform.key(),
            uuid::Uuid::new_v4().simple()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names() {
        let id = JobId::parse("20240101_120000_deadbeef").unwrap();
        let ws = Workspace::new(Path::new("/out"), &id);
        assert_eq!(ws.root(), Path::new("/out/20240101_120000_deadbeef"));
        assert_eq!(ws.image(7, "png"), ws.root().join("img_007.png"));
        assert_eq!(ws.reel(), ws.root().join("reel.mp4"));
        assert_eq!(ws.export(ExportPlatform::TikTok), ws.root().join("reel_tiktok.mp4"));

        let partial = ws.export_partial(ExportPlatform::YouTube);
        let name = partial.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("reel_youtube.") && name.ends_with(".partial.mp4"));
        assert_ne!(partial, ws.export_partial(ExportPlatform::YouTube));
    }
}
