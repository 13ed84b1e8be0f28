use super::artifact::Artifact;
use super::cut_point_refiner::Segment;
use super::task_scheduler::TaskFailure;
use crate::config::ArtifactKind;
use crate::error::Result;
use crate::tools::VideoInfo;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// 一次處理的結果
///
/// `artifacts` 與片段一一對應，失敗或取消的位置為 `None`。
#[derive(Debug)]
pub struct ExtractionReport {
    pub run_id: Uuid,
    pub source_video: PathBuf,
    pub output_dir: PathBuf,
    pub extracted_at: DateTime<Utc>,
    pub kind: ArtifactKind,
    pub video: VideoInfo,
    pub scene_cuts: usize,
    pub segments: Vec<Segment>,
    pub rejected_segments: usize,
    pub used_fallback: bool,
    pub artifacts: Vec<Option<Artifact>>,
    pub failures: Vec<TaskFailure>,
    pub cancelled: usize,
    pub import_failures: usize,
    pub metadata_path: Option<PathBuf>,
}

impl ExtractionReport {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.artifacts.iter().filter(|a| a.is_some()).count()
    }

    /// 失敗數（不含取消）
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len() - self.cancelled
    }

    pub fn completed_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().flatten()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.import_failures == 0
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.completed_artifacts().map(|a| a.file_size).sum()
    }

    /// 中繼資料檔的內容
    #[must_use]
    pub fn sidecar(&self) -> MetadataSidecar<'_> {
        MetadataSidecar {
            source_video: self.source_video.to_string_lossy().to_string(),
            extracted_at: self.extracted_at,
            run_id: self.run_id.to_string(),
            kind: self.kind.label(),
            video: VideoSummary::from(&self.video),
            segment_count: self.segments.len(),
            used_fallback: self.used_fallback,
            artifacts: self
                .completed_artifacts()
                .map(|artifact| SidecarArtifact {
                    index: artifact.segment_index,
                    time_seconds: artifact.time_seconds,
                    frame: artifact.frame,
                    file_size: artifact.file_size,
                    filename: &artifact.filename,
                })
                .collect(),
            failure_count: self.failures.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: String,
    pub fps: f64,
    pub total_frames: u64,
    pub codec: String,
    pub bitrate: Option<u64>,
}

impl From<&VideoInfo> for VideoSummary {
    fn from(info: &VideoInfo) -> Self {
        Self {
            duration_seconds: info.duration_seconds,
            width: info.width,
            height: info.height,
            frame_rate: info.frame_rate.to_string(),
            fps: info.fps,
            total_frames: info.total_frames,
            codec: info.codec.clone(),
            bitrate: info.bitrate,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarArtifact<'a> {
    pub index: usize,
    pub time_seconds: f64,
    pub frame: Option<u64>,
    pub file_size: u64,
    pub filename: &'a str,
}

/// `{base}_metadata.json` 的格式
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSidecar<'a> {
    pub source_video: String,
    pub extracted_at: DateTime<Utc>,
    pub run_id: String,
    pub kind: &'static str,
    pub video: VideoSummary,
    pub segment_count: usize,
    pub used_fallback: bool,
    pub artifacts: Vec<SidecarArtifact<'a>>,
    pub failure_count: usize,
}

#[must_use]
pub fn sidecar_path(output_dir: &Path, base_name: &str) -> PathBuf {
    output_dir.join(format!("{base_name}_metadata.json"))
}

/// 寫出中繼資料檔，回傳檔案路徑
pub fn write_sidecar(report: &ExtractionReport, base_name: &str) -> Result<PathBuf> {
    let path = sidecar_path(&report.output_dir, base_name);
    let json = serde_json::to_string_pretty(&report.sidecar())?;
    fs::write(&path, json)?;
    info!("已寫入中繼資料: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::tools::FrameRate;
    use tempfile::TempDir;

    fn report(output_dir: &Path) -> ExtractionReport {
        let video = VideoInfo::new(
            20.0,
            1920,
            1080,
            FrameRate::new(25, 1).unwrap(),
            "h264".to_string(),
            Some(4_000_000),
        );
        let segment = |index: usize, in_frame: u64, out_frame: u64| Segment {
            index,
            start_time: in_frame as f64 * 0.04,
            end_time: (out_frame + 1) as f64 * 0.04,
            duration: (out_frame + 1 - in_frame) as f64 * 0.04,
            in_frame,
            out_frame,
            frame_count: out_frame - in_frame + 1,
        };
        let artifact = |index: usize, frame: u64| Artifact {
            path: output_dir.join(format!("clip01_frame_{index:03}.jpg")),
            filename: format!("clip01_frame_{index:03}.jpg"),
            segment_index: index,
            time_seconds: frame as f64 * 0.04,
            frame: Some(frame),
            file_size: 100,
            format: "jpg".to_string(),
            quality: 8,
        };

        ExtractionReport {
            run_id: Uuid::new_v4(),
            source_video: PathBuf::from("/videos/clip01.mp4"),
            output_dir: output_dir.to_path_buf(),
            extracted_at: Utc::now(),
            kind: ArtifactKind::Frame,
            video,
            scene_cuts: 2,
            segments: vec![segment(0, 0, 121), segment(1, 128, 296), segment(2, 303, 499)],
            rejected_segments: 0,
            used_fallback: false,
            artifacts: vec![Some(artifact(0, 61)), None, Some(artifact(2, 401))],
            failures: vec![TaskFailure {
                index: 1,
                error: ExtractionError::OutputMissing(output_dir.join("clip01_frame_001.jpg")),
            }],
            cancelled: 0,
            import_failures: 0,
            metadata_path: None,
        }
    }

    #[test]
    fn test_counts() {
        let dir = TempDir::new().unwrap();
        let report = report(dir.path());
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.total_size(), 200);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_write_sidecar() {
        let dir = TempDir::new().unwrap();
        let report = report(dir.path());

        let path = write_sidecar(&report, "clip01").unwrap();
        assert_eq!(path, dir.path().join("clip01_metadata.json"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["sourceVideo"], "/videos/clip01.mp4");
        assert_eq!(json["runId"], report.run_id.to_string());
        assert_eq!(json["kind"], "frame");
        assert_eq!(json["segmentCount"], 3);
        assert_eq!(json["failureCount"], 1);
        assert_eq!(json["video"]["frameRate"], "25/1");
        assert_eq!(json["video"]["totalFrames"], 500);
        assert!(json["extractedAt"].is_string());

        let artifacts = json["artifacts"].as_array().unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[1]["index"], 2);
        assert_eq!(artifacts[1]["frame"], 401);
        assert_eq!(artifacts[1]["filename"], "clip01_frame_002.jpg");
        assert_eq!(artifacts[1]["fileSize"], 100);
    }
}
