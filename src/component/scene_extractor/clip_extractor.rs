use super::artifact::{Artifact, ExtractionTask, clip_crf};
use super::engine::{ExtractionEngine, run_and_verify};
use crate::config::{ArtifactKind, ClipFormat};
use crate::error::ExtractionError;
use crate::tools::{Invocation, ProcessRunner};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ClipExtractorConfig {
    pub format: ClipFormat,
    /// 1-10，越高越好
    pub quality: u8,
    pub hardware_acceleration: bool,
}

impl Default for ClipExtractorConfig {
    fn default() -> Self {
        Self {
            format: ClipFormat::Mp4,
            quality: 8,
            hardware_acceleration: false,
        }
    }
}

/// 將片段 [start, end) 重新編碼成獨立的影片檔
pub struct ClipExtractor {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg: PathBuf,
    config: ClipExtractorConfig,
}

impl ClipExtractor {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ffmpeg: impl Into<PathBuf>,
        config: ClipExtractorConfig,
    ) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            config,
        }
    }

    fn build_invocation(&self, task: &ExtractionTask) -> Invocation {
        let segment = &task.segment;

        let mut invocation =
            Invocation::new(&self.ffmpeg).args(["-hide_banner", "-nostdin", "-loglevel", "error"]);

        if self.config.hardware_acceleration {
            invocation = invocation.args(["-hwaccel", "auto"]);
        }

        let container = match self.config.format {
            ClipFormat::Mp4 => "mp4",
            ClipFormat::Mkv => "matroska",
        };

        invocation
            .arg("-ss")
            .arg(format!("{:.3}", segment.start_time))
            .arg("-i")
            .arg(&task.source_path)
            .arg("-t")
            .arg(format!("{:.3}", segment.duration))
            .args(["-map", "0:v:0", "-map", "0:a:0?", "-sn", "-dn"])
            .args(["-c:v", "libx264", "-preset", "fast", "-pix_fmt", "yuv420p"])
            .arg("-crf")
            .arg(clip_crf(self.config.quality).to_string())
            .args(["-c:a", "aac", "-avoid_negative_ts", "make_zero", "-f", container])
            .arg("-y")
            .arg(&task.output_path)
    }
}

impl ExtractionEngine for ClipExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Clip
    }

    fn extract(&self, task: &ExtractionTask) -> Result<Artifact, ExtractionError> {
        let segment = &task.segment;
        debug!(
            "擷取片段 {}: {:.3}s - {:.3}s",
            task.original_index, segment.start_time, segment.end_time
        );

        let invocation = self.build_invocation(task);
        let file_size = run_and_verify(self.runner.as_ref(), &invocation, &task.output_path)?;

        Ok(Artifact {
            path: task.output_path.clone(),
            filename: task
                .output_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            segment_index: segment.index,
            time_seconds: segment.start_time,
            frame: task.frame_time.map(|_| segment.in_frame),
            file_size,
            format: self.config.format.extension().to_string(),
            quality: self.config.quality,
        })
    }
}
