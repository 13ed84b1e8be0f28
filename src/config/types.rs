use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 產出物類型：單張畫面或片段影片
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    #[default]
    Frame,
    Clip,
}

impl ArtifactKind {
    /// 用於檔名中的類型字串
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Clip => "clip",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame => write!(f, "場景畫面"),
            Self::Clip => write!(f, "場景片段"),
        }
    }
}

/// 畫面輸出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpg,
    Png,
    Webp,
}

impl ImageFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

/// 片段輸出容器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClipFormat {
    #[default]
    Mp4,
    Mkv,
}

impl ClipFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
        }
    }
}

/// 檔名命名方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    /// `{base}_{kind}_{index}.{ext}`
    #[default]
    Sequence,
    /// `{base}_{kind}_{time/duration}.{ext}`
    Ratio,
}

/// 擷取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// 每個片段一個 ffmpeg 程序，由排程器控制並行數
    #[default]
    PerTask,
    /// 片段分組，組與組平行、組內依序
    Chunked,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// 單邊緩衝的上限（幀）
pub const MAX_HANDLE_FRAMES: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneSettings {
    /// 場景變換閾值 (0.1-0.7)，越低切點越多
    pub sensitivity: f64,
    /// 相鄰切點的最小間隔（秒）
    pub min_gap_seconds: f64,
    pub in_handle_frames: u64,
    pub out_handle_frames: u64,
    /// 沒有切點時的預設切割間隔（秒）
    pub fallback_interval_seconds: f64,
    /// 分析前縮放到的寬度，0 表示不縮放
    pub analyze_width: u32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            sensitivity: 0.3,
            min_gap_seconds: 1.0,
            in_handle_frames: 2,
            out_handle_frames: 2,
            fallback_interval_seconds: 10.0,
            analyze_width: 320,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionSettings {
    pub kind: ArtifactKind,
    pub image_format: ImageFormat,
    pub clip_format: ClipFormat,
    /// 品質 1-10，越高越好
    pub quality: u8,
    pub naming: NamingMode,
    pub strategy: ExtractionStrategy,
    pub chunk_size: usize,
    /// 覆寫依 CPU 核心數計算的並行數
    pub max_concurrency: Option<usize>,
    pub hardware_acceleration: bool,
    /// 取消時是否終止執行中的 ffmpeg
    pub kill_on_cancel: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            kind: ArtifactKind::Frame,
            image_format: ImageFormat::Jpg,
            clip_format: ClipFormat::Mp4,
            quality: 8,
            naming: NamingMode::Sequence,
            strategy: ExtractionStrategy::PerTask,
            chunk_size: 8,
            max_concurrency: None,
            hardware_acceleration: false,
            kill_on_cancel: false,
        }
    }
}

impl ExtractionSettings {
    /// 目前類型對應的副檔名
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self.kind {
            ArtifactKind::Frame => self.image_format.extension(),
            ArtifactKind::Clip => self.clip_format.extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// 輸出根目錄，未設定時放在影片所在資料夾
    pub root: Option<PathBuf>,
    pub write_metadata: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root: None,
            write_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct UserSettings {
    pub tools: ToolPaths,
    pub scene: SceneSettings,
    pub extraction: ExtractionSettings,
    pub output: OutputSettings,
}

impl UserSettings {
    /// 在任何任務派發前檢查設定
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.tools.ffmpeg.as_os_str().is_empty() {
            return Err(PipelineError::Configuration("未設定 ffmpeg 路徑".to_string()));
        }
        if self.tools.ffprobe.as_os_str().is_empty() {
            return Err(PipelineError::Configuration("未設定 ffprobe 路徑".to_string()));
        }
        if !(1..=10).contains(&self.extraction.quality) {
            return Err(PipelineError::Configuration(format!(
                "品質必須介於 1-10: {}",
                self.extraction.quality
            )));
        }
        if self.extraction.chunk_size == 0 {
            return Err(PipelineError::Configuration("chunk_size 不可為 0".to_string()));
        }
        if self.extraction.max_concurrency == Some(0) {
            return Err(PipelineError::Configuration(
                "max_concurrency 不可為 0".to_string(),
            ));
        }
        if self.scene.fallback_interval_seconds.is_nan()
            || self.scene.fallback_interval_seconds <= 0.0
        {
            return Err(PipelineError::Configuration(format!(
                "預設切割間隔必須大於 0: {}",
                self.scene.fallback_interval_seconds
            )));
        }
        for (name, frames) in [
            ("in_handle_frames", self.scene.in_handle_frames),
            ("out_handle_frames", self.scene.out_handle_frames),
        ] {
            if frames > MAX_HANDLE_FRAMES {
                return Err(PipelineError::Configuration(format!(
                    "{name} 不可超過 {MAX_HANDLE_FRAMES} 幀: {frames}"
                )));
            }
        }
        if self.scene.min_gap_seconds.is_nan() || self.scene.min_gap_seconds < 0.0 {
            return Err(PipelineError::Configuration(format!(
                "最小切點間隔不可為負: {}",
                self.scene.min_gap_seconds
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: UserSettings,
}
