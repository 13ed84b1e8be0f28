use crate::error::{PipelineError, Result};
use crate::tools::process_runner::{Invocation, ProcessRunner};
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 約分後的有理數幀率
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u64,
    pub den: u64,
}

impl FrameRate {
    /// 建立並約分，分子或分母為 0 時回傳 `None`
    #[must_use]
    pub fn new(num: u64, den: u64) -> Option<Self> {
        if num == 0 || den == 0 {
            return None;
        }
        let divisor = gcd(num, den);
        Some(Self {
            num: num / divisor,
            den: den / divisor,
        })
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// 解析 ffprobe 的幀率字串（例如 "30/1"、"30000/1001" 或 "29.97"）
    ///
    /// 只做明確的整數解析，不對字串做任何求值。
    #[must_use]
    pub fn parse(rate: &str) -> Option<Self> {
        let rate = rate.trim();
        if let Some((num_str, den_str)) = rate.split_once('/') {
            let num: u64 = num_str.trim().parse().ok()?;
            let den: u64 = den_str.trim().parse().ok()?;
            return Self::new(num, den);
        }
        Self::from_decimal(rate)
    }

    /// 十進位字串轉成分數，最多保留小數點後 6 位
    fn from_decimal(rate: &str) -> Option<Self> {
        let (int_part, frac_part) = rate.split_once('.').unwrap_or((rate, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let frac_part = &frac_part[..frac_part.len().min(6)];
        let den = 10u64.pow(u32::try_from(frac_part.len()).ok()?);
        let int_value: u64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        let frac_value: u64 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().ok()?
        };
        Self::new(int_value.checked_mul(den)?.checked_add(frac_value)?, den)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub fps: f64,
    /// 1 / fps
    pub frame_time: f64,
    /// floor(duration * fps)
    pub total_frames: u64,
    pub codec: String,
    pub bitrate: Option<u64>,
}

impl VideoInfo {
    #[must_use]
    pub fn new(
        duration_seconds: f64,
        width: u32,
        height: u32,
        frame_rate: FrameRate,
        codec: impl Into<String>,
        bitrate: Option<u64>,
    ) -> Self {
        let fps = frame_rate.as_f64();
        Self {
            duration_seconds,
            width,
            height,
            frame_rate,
            fps,
            frame_time: frame_rate.den as f64 / frame_rate.num as f64,
            total_frames: (duration_seconds * fps).floor() as u64,
            codec: codec.into(),
            bitrate,
        }
    }
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// 使用 ffprobe 取得影片資訊
pub struct VideoInfoProbe {
    runner: Arc<dyn ProcessRunner>,
    ffprobe: PathBuf,
}

impl VideoInfoProbe {
    pub fn new(runner: Arc<dyn ProcessRunner>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            ffprobe: ffprobe.into(),
        }
    }

    pub fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let invocation = Invocation::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path);

        let output = self
            .runner
            .run(&invocation, &mut |_| {})
            .map_err(|e| PipelineError::Probe(format!("無法執行 ffprobe: {e}")))?;

        if !output.success {
            return Err(PipelineError::Probe(format!(
                "ffprobe 執行失敗 ({}): {}",
                path.display(),
                output.stderr.trim()
            )));
        }

        let info = parse_probe_output(&output.stdout).map_err(|e| match e {
            PipelineError::Probe(message) => {
                PipelineError::Probe(format!("{message} ({})", path.display()))
            }
            other => other,
        })?;

        debug!(
            "影片資訊: {:.2}s, {}x{}, {} fps ({}), codec={}",
            info.duration_seconds,
            info.width,
            info.height,
            info.fps,
            info.frame_rate,
            info.codec
        );

        Ok(info)
    }
}

/// 解析 ffprobe 的 JSON 輸出
pub fn parse_probe_output(json: &str) -> Result<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| PipelineError::Probe(format!("無法解析 ffprobe 輸出: {e}")))?;

    // 找到第一個視訊串流
    let video_stream = probe
        .streams
        .as_ref()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("video"))
        })
        .ok_or_else(|| probe_error("找不到視訊串流"))?;

    let width = video_stream.width.ok_or_else(|| probe_error("無法取得影片寬度"))?;
    let height = video_stream.height.ok_or_else(|| probe_error("無法取得影片高度"))?;

    // 取得影片長度（優先從 format，其次從 stream）
    let duration_seconds = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            video_stream
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
        })
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| probe_error("無法取得影片長度"))?;

    let frame_rate = video_stream
        .r_frame_rate
        .as_deref()
        .and_then(FrameRate::parse)
        .or_else(|| {
            video_stream
                .avg_frame_rate
                .as_deref()
                .and_then(FrameRate::parse)
        })
        .ok_or_else(|| probe_error("無法解析影片幀率"))?;

    let bitrate = probe
        .format
        .as_ref()
        .and_then(|f| f.bit_rate.as_deref())
        .and_then(|b| b.parse::<u64>().ok());

    let codec = video_stream
        .codec_name
        .clone()
        .unwrap_or_else(|| "unknown".to_string());

    Ok(VideoInfo::new(
        duration_seconds,
        width,
        height,
        frame_rate,
        codec,
        bitrate,
    ))
}

fn probe_error(message: &str) -> PipelineError {
    PipelineError::Probe(message.to_string())
}
