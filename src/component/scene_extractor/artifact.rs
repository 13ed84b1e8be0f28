use super::cut_point_refiner::Segment;
use crate::config::{ArtifactKind, ExtractionSettings, ImageFormat, NamingMode};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// 單一片段的擷取任務
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    pub segment: Segment,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    /// 有值時以幀為單位計算中點
    pub frame_time: Option<f64>,
    /// 決定結果在輸出陣列中的位置
    pub original_index: usize,
}

/// 成功擷取的產出物，建立後不再變動
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub path: PathBuf,
    pub filename: String,
    pub segment_index: usize,
    pub time_seconds: f64,
    pub frame: Option<u64>,
    pub file_size: u64,
    pub format: String,
    pub quality: u8,
}

/// 檔名規則所需的資訊
#[derive(Debug, Clone)]
pub struct NamingScheme {
    pub base_name: String,
    pub kind: ArtifactKind,
    pub mode: NamingMode,
    pub extension: String,
    pub total_duration: f64,
    pub pad_width: usize,
}

impl NamingScheme {
    #[must_use]
    pub fn new(
        base_name: impl Into<String>,
        settings: &ExtractionSettings,
        total_duration: f64,
        segment_count: usize,
    ) -> Self {
        Self {
            base_name: base_name.into(),
            kind: settings.kind,
            mode: settings.naming,
            extension: settings.extension().to_string(),
            total_duration,
            pad_width: pad_width(segment_count),
        }
    }

    /// `{base}_{kind}_{index}.{ext}` 或 `{base}_{kind}_{time/duration}.{ext}`
    #[must_use]
    pub fn filename(&self, index: usize, time_seconds: f64) -> String {
        format!("{}.{}", self.stem(index, time_seconds), self.extension)
    }

    /// 依序產生整批檔名
    ///
    /// 比例模式在長影片上可能四捨五入成同一個值，重複的檔名會加上片段序號。
    #[must_use]
    pub fn unique_filenames(&self, entries: &[(usize, f64)]) -> Vec<String> {
        let mut taken = HashSet::with_capacity(entries.len());
        entries
            .iter()
            .map(|&(index, time_seconds)| {
                let mut name = self.filename(index, time_seconds);
                if taken.contains(&name) {
                    name = format!(
                        "{}_{:0width$}.{}",
                        self.stem(index, time_seconds),
                        index,
                        self.extension,
                        width = self.pad_width
                    );
                }
                taken.insert(name.clone());
                name
            })
            .collect()
    }

    fn stem(&self, index: usize, time_seconds: f64) -> String {
        match self.mode {
            NamingMode::Sequence => format!(
                "{}_{}_{:0width$}",
                self.base_name,
                self.kind.label(),
                index,
                width = self.pad_width
            ),
            NamingMode::Ratio => {
                let ratio = if self.total_duration > 0.0 {
                    (time_seconds / self.total_duration).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                format!("{}_{}_{ratio:.4}", self.base_name, self.kind.label())
            }
        }
    }
}

/// 至少 3 位數，片段數更多時加寬
#[must_use]
pub fn pad_width(count: usize) -> usize {
    let digits = count.saturating_sub(1).max(1).to_string().len();
    digits.max(3)
}

/// 影片檔名（不含副檔名）
#[must_use]
pub fn video_base_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string())
}

/// 取得片段代表畫面的時間與幀號
///
/// 有逐幀資訊時取 round((in + out) / 2) 再換回時間，否則取 start + duration / 2。
#[must_use]
pub fn midpoint(segment: &Segment, frame_time: Option<f64>) -> (f64, Option<u64>) {
    match frame_time {
        Some(frame_time) if frame_time > 0.0 && segment.out_frame >= segment.in_frame => {
            let frame = (segment.in_frame + segment.out_frame).div_ceil(2);
            (frame as f64 * frame_time, Some(frame))
        }
        _ => (segment.start_time + segment.duration / 2.0, None),
    }
}

/// 品質 (1-10，越高越好) 轉成 ffmpeg 參數
#[must_use]
pub fn image_quality_args(format: ImageFormat, quality: u8) -> Vec<String> {
    let quality = quality.clamp(1, 10);
    match format {
        // mjpeg 的 q:v 範圍 2-31，數字越小品質越高
        ImageFormat::Jpg => {
            let q = 2 + (u32::from(10 - quality) * 29 + 4) / 9;
            vec!["-q:v".to_string(), q.to_string()]
        }
        // PNG 無損，只影響壓縮力度 0-9
        ImageFormat::Png => {
            let level = 10 - quality;
            vec!["-compression_level".to_string(), level.min(9).to_string()]
        }
        ImageFormat::Webp => {
            let q = u32::from(quality) * 10;
            vec![
                "-c:v".to_string(),
                "libwebp".to_string(),
                "-quality".to_string(),
                q.to_string(),
            ]
        }
    }
}

/// 品質轉成 libx264 CRF（18-41，數字越小品質越高）
#[must_use]
pub fn clip_crf(quality: u8) -> u32 {
    let quality = quality.clamp(1, 10);
    18 + (u32::from(10 - quality) * 23 + 4) / 9
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionSettings;

    fn segment(in_frame: u64, out_frame: u64, frame_time: f64) -> Segment {
        let start_time = in_frame as f64 * frame_time;
        let end_time = (out_frame + 1) as f64 * frame_time;
        Segment {
            index: 0,
            start_time,
            end_time,
            duration: end_time - start_time,
            in_frame,
            out_frame,
            frame_count: out_frame - in_frame + 1,
        }
    }

    fn scheme(mode: NamingMode, kind: ArtifactKind, format: ImageFormat) -> NamingScheme {
        let settings = ExtractionSettings {
            kind,
            naming: mode,
            image_format: format,
            ..ExtractionSettings::default()
        };
        NamingScheme::new("clip01", &settings, 100.0, 12)
    }

    #[test]
    fn test_sequence_filename() {
        let scheme = scheme(NamingMode::Sequence, ArtifactKind::Frame, ImageFormat::Png);
        assert_eq!(scheme.filename(7, 3.0), "clip01_frame_007.png");
    }

    #[test]
    fn test_clip_filename() {
        let scheme = scheme(NamingMode::Sequence, ArtifactKind::Clip, ImageFormat::Png);
        assert_eq!(scheme.filename(0, 3.0), "clip01_clip_000.mp4");
    }

    #[test]
    fn test_ratio_filename() {
        let scheme = scheme(NamingMode::Ratio, ArtifactKind::Frame, ImageFormat::Jpg);
        assert_eq!(scheme.filename(3, 25.0), "clip01_frame_0.2500.jpg");
        assert_eq!(scheme.filename(4, 33.33333), "clip01_frame_0.3333.jpg");
    }

    #[test]
    fn test_ratio_collisions_get_index_suffix() {
        let settings = ExtractionSettings {
            naming: NamingMode::Ratio,
            image_format: ImageFormat::Jpg,
            ..ExtractionSettings::default()
        };
        let scheme = NamingScheme::new("movie", &settings, 20_000.0, 4000);

        assert_eq!(scheme.filename(10, 10_000.0), scheme.filename(11, 10_001.0));

        let names = scheme.unique_filenames(&[(10, 10_000.0), (11, 10_001.0), (12, 12_000.0)]);
        assert_eq!(
            names,
            vec![
                "movie_frame_0.5000.jpg".to_string(),
                "movie_frame_0.5000_0011.jpg".to_string(),
                "movie_frame_0.6000.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_unique_filenames_leave_sequence_names_alone() {
        let scheme = scheme(NamingMode::Sequence, ArtifactKind::Frame, ImageFormat::Png);
        let names = scheme.unique_filenames(&[(0, 1.0), (1, 1.0)]);
        assert_eq!(names, vec!["clip01_frame_000.png", "clip01_frame_001.png"]);
    }

    #[test]
    fn test_pad_width_grows_with_count() {
        assert_eq!(pad_width(0), 3);
        assert_eq!(pad_width(12), 3);
        assert_eq!(pad_width(1000), 3);
        assert_eq!(pad_width(1001), 4);
        assert_eq!(pad_width(25_000), 5);
    }

    #[test]
    fn test_video_base_name() {
        assert_eq!(video_base_name(Path::new("/v/clip01.mp4")), "clip01");
        assert_eq!(video_base_name(Path::new("/v/a.b.c.mkv")), "a.b.c");
    }

    #[test]
    fn test_midpoint_with_frames() {
        let segment = segment(128, 296, 0.04);
        let (time, frame) = midpoint(&segment, Some(0.04));
        assert_eq!(frame, Some(212));
        assert!((time - 8.48).abs() < 1e-9);

        // (10 + 13) / 2 = 11.5 -> 12
        let segment = self::segment(10, 13, 0.04);
        let (_, frame) = midpoint(&segment, Some(0.04));
        assert_eq!(frame, Some(12));
    }

    #[test]
    fn test_midpoint_without_frames() {
        let segment = segment(128, 296, 0.04);
        let (time, frame) = midpoint(&segment, None);
        assert_eq!(frame, None);
        assert!((time - (5.12 + 6.76 / 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_jpeg_quality_is_inverted() {
        assert_eq!(image_quality_args(ImageFormat::Jpg, 10), vec!["-q:v", "2"]);
        assert_eq!(image_quality_args(ImageFormat::Jpg, 1), vec!["-q:v", "31"]);
        assert_eq!(image_quality_args(ImageFormat::Jpg, 0), vec!["-q:v", "31"]);
    }

    #[test]
    fn test_png_compression_level() {
        assert_eq!(
            image_quality_args(ImageFormat::Png, 10),
            vec!["-compression_level", "0"]
        );
        assert_eq!(
            image_quality_args(ImageFormat::Png, 1),
            vec!["-compression_level", "9"]
        );
    }

    #[test]
    fn test_clip_crf_range() {
        assert_eq!(clip_crf(10), 18);
        assert_eq!(clip_crf(1), 41);
        assert!(clip_crf(5) > clip_crf(6));
    }
}
