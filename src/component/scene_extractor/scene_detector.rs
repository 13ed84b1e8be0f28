use crate::error::{PipelineError, Result};
use crate::tools::{Invocation, ProcessRunner, VideoInfo};
use log::{debug, warn};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 偵測階段回報的進度上限，保留給下一階段開始
const MAX_ANALYZE_PROGRESS: f64 = 0.99;

pub const MIN_SENSITIVITY: f64 = 0.1;
pub const MAX_SENSITIVITY: f64 = 0.7;

/// 場景偵測設定
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDetectorConfig {
    /// 場景分數閾值 (0.1-0.7)，越低越敏感
    pub sensitivity: f64,
    /// 相鄰切點的最小間隔（秒）
    pub min_gap_seconds: f64,
    /// 縮放到的寬度（加速分析），0 表示不縮放
    pub scale_width: u32,
}

impl Default for SceneDetectorConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.3,
            min_gap_seconds: 1.0,
            scale_width: 320,
        }
    }
}

/// 使用 ffmpeg select+showinfo 濾鏡偵測場景變換
pub struct SceneChangeDetector {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg: PathBuf,
    config: SceneDetectorConfig,
}

impl SceneChangeDetector {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ffmpeg: impl Into<PathBuf>,
        config: SceneDetectorConfig,
    ) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SceneDetectorConfig {
        &self.config
    }

    fn effective_sensitivity(&self) -> f64 {
        let sensitivity = self.config.sensitivity;
        let clamped = sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
        if (clamped - sensitivity).abs() > f64::EPSILON {
            warn!("場景閾值 {sensitivity} 超出範圍，改用 {clamped}");
        }
        clamped
    }

    /// 建立偵測用的 ffmpeg 命令
    fn build_invocation(&self, path: &Path) -> Invocation {
        let sensitivity = self.effective_sensitivity();
        let mut filters = Vec::new();
        if self.config.scale_width > 0 {
            filters.push(format!("scale={}:-2", self.config.scale_width));
        }
        filters.push(format!("select='gt(scene\\,{sensitivity:.3})'"));
        filters.push("showinfo".to_string());

        Invocation::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-i"])
            .arg(path)
            .args(["-an", "-sn", "-dn", "-vf"])
            .arg(filters.join(","))
            .args(["-f", "null", "-"])
    }

    /// 偵測場景變換時間點，回傳遞增且間隔不小於 `min_gap_seconds` 的列表
    ///
    /// `on_progress` 收到 [0, 0.99] 的本階段進度。
    pub fn detect(
        &self,
        path: &Path,
        video_info: &VideoInfo,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<Vec<f64>> {
        debug!(
            "場景偵測設定: sensitivity={}, min_gap={}, scale_width={}",
            self.config.sensitivity, self.config.min_gap_seconds, self.config.scale_width
        );

        let parser = SceneOutputParser::new()
            .map_err(|e| PipelineError::Detection(format!("無法建立解析器: {e}")))?;
        let invocation = self.build_invocation(path);
        let duration = video_info.duration_seconds;

        let mut raw_timestamps = Vec::new();
        let output = self
            .runner
            .run(&invocation, &mut |line| {
                if let Some(timestamp) = parser.pts_time(line) {
                    if let Some(frame) = parser.frame_number(line) {
                        debug!("場景變換: n={frame}, pts_time={timestamp:.3}");
                    }
                    raw_timestamps.push(timestamp);
                } else if let Some(elapsed) = parser.progress_time(line) {
                    on_progress(progress_fraction(elapsed, duration));
                }
            })
            .map_err(|e| {
                PipelineError::Detection(format!("無法執行 ffmpeg 場景偵測 ({}): {e}", path.display()))
            })?;

        if !output.success {
            if output.stderr.trim().is_empty() {
                return Err(PipelineError::Detection(format!(
                    "ffmpeg 異常結束且沒有任何輸出 (結束碼 {:?})",
                    output.exit_code
                )));
            }
            if raw_timestamps.is_empty() {
                warn!(
                    "場景偵測結束碼 {:?} 且沒有切點，改用預設切割: {}",
                    output.exit_code,
                    path.display()
                );
            } else {
                warn!(
                    "場景偵測結束碼 {:?}，保留已取得的 {} 個切點",
                    output.exit_code,
                    raw_timestamps.len()
                );
            }
        }

        let timestamps =
            normalize_timestamps(raw_timestamps, duration, self.config.min_gap_seconds);
        debug!("偵測到 {} 個場景變換點", timestamps.len());

        Ok(timestamps)
    }
}

/// 逐行解析 showinfo 與進度輸出
struct SceneOutputParser {
    pts_time: Regex,
    frame: Regex,
    progress: Regex,
}

impl SceneOutputParser {
    fn new() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            pts_time: Regex::new(r"pts_time:\s*(-?[0-9]+(?:\.[0-9]+)?)")?,
            frame: Regex::new(r"\bn:\s*([0-9]+)")?,
            progress: Regex::new(r"time=(-?[0-9]+):([0-9]{2}):([0-9]{2}(?:\.[0-9]+)?)")?,
        })
    }

    fn pts_time(&self, line: &str) -> Option<f64> {
        self.pts_time
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }

    fn frame_number(&self, line: &str) -> Option<u64> {
        self.frame
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
    }

    /// 解析 `time=HH:MM:SS.ms`，回傳秒數
    fn progress_time(&self, line: &str) -> Option<f64> {
        let caps = self.progress.captures(line)?;
        let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
        let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
        let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
        let total = hours * 3600.0 + minutes * 60.0 + seconds;
        (total >= 0.0).then_some(total)
    }
}

fn progress_fraction(elapsed: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    (elapsed / duration).clamp(0.0, MAX_ANALYZE_PROGRESS)
}

/// 過濾超出範圍的時間點，去重、排序，再以最小間隔合併相近切點（保留最早的）
#[must_use]
pub fn normalize_timestamps(mut timestamps: Vec<f64>, duration: f64, min_gap: f64) -> Vec<f64> {
    timestamps.retain(|t| t.is_finite() && *t > 0.0 && *t < duration);
    timestamps.sort_by(f64::total_cmp);
    timestamps.dedup();

    let mut kept: Vec<f64> = Vec::with_capacity(timestamps.len());
    for timestamp in timestamps {
        match kept.last() {
            Some(&last) if timestamp - last < min_gap => {}
            _ => kept.push(timestamp),
        }
    }
    kept
}
