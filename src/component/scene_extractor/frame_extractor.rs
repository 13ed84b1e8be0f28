use super::artifact::{Artifact, ExtractionTask, image_quality_args, midpoint};
use super::engine::{ExtractionEngine, run_and_verify, split_seek};
use crate::config::{ArtifactKind, ImageFormat};
use crate::error::ExtractionError;
use crate::tools::{Invocation, ProcessRunner};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

/// 兩段式 seek 的前置緩衝時間（秒）
const SEEK_MARGIN: f64 = 2.0;

/// 畫面擷取設定
#[derive(Debug, Clone)]
pub struct FrameExtractorConfig {
    pub format: ImageFormat,
    /// 1-10，越高越好
    pub quality: u8,
    pub hardware_acceleration: bool,
}

impl Default for FrameExtractorConfig {
    fn default() -> Self {
        Self {
            format: ImageFormat::Jpg,
            quality: 8,
            hardware_acceleration: false,
        }
    }
}

/// 擷取每個片段中間的一張畫面
pub struct FrameExtractor {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg: PathBuf,
    config: FrameExtractorConfig,
}

impl FrameExtractor {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ffmpeg: impl Into<PathBuf>,
        config: FrameExtractorConfig,
    ) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            config,
        }
    }

    /// 建立擷取命令（使用兩段式 seek 加速）
    ///
    /// 1. `-ss` 在 `-i` 前：快速跳轉到最近的關鍵幀
    /// 2. `-ss` 在 `-i` 後：精準解碼到目標時間點
    fn build_invocation(&self, task: &ExtractionTask, timestamp: f64) -> Invocation {
        let (t0, delta) = split_seek(timestamp, SEEK_MARGIN);

        let mut invocation =
            Invocation::new(&self.ffmpeg).args(["-hide_banner", "-nostdin", "-loglevel", "error"]);

        if self.config.hardware_acceleration {
            invocation = invocation.args(["-hwaccel", "auto"]);
        }

        // 第一個 -ss（在 -i 前）：快速跳轉
        if t0 > 0.0 {
            invocation = invocation.arg("-ss").arg(format!("{t0:.3}"));
        }

        invocation = invocation.arg("-i").arg(&task.source_path);

        // 第二個 -ss（在 -i 後）：精準定位
        if delta > 0.0 {
            invocation = invocation.arg("-ss").arg(format!("{delta:.3}"));
        }

        invocation
            .args(["-frames:v", "1", "-an", "-sn", "-dn"])
            .args(image_quality_args(self.config.format, self.config.quality))
            .arg("-y")
            .arg(&task.output_path)
    }
}

impl ExtractionEngine for FrameExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Frame
    }

    fn extract(&self, task: &ExtractionTask) -> Result<Artifact, ExtractionError> {
        let (timestamp, frame) = midpoint(&task.segment, task.frame_time);

        debug!(
            "擷取畫面 {}: timestamp={:.3}s, frame={:?}",
            task.original_index, timestamp, frame
        );

        let invocation = self.build_invocation(task, timestamp);
        let file_size = run_and_verify(self.runner.as_ref(), &invocation, &task.output_path)?;

        Ok(Artifact {
            path: task.output_path.clone(),
            filename: task
                .output_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            segment_index: task.segment.index,
            time_seconds: timestamp,
            frame,
            file_size,
            format: self.config.format.extension().to_string(),
            quality: self.config.quality,
        })
    }
}
