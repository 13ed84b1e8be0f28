use std::path::PathBuf;
use thiserror::Error;

/// 整個流程層級的錯誤，發生時中止該影片的處理
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("設定錯誤: {0}")]
    Configuration(String),

    #[error("無法取得來源影片: {0}")]
    Source(String),

    #[error("影片資訊探測失敗: {0}")]
    Probe(String),

    #[error("場景偵測失敗: {0}")]
    Detection(String),

    #[error("影片過短，無法切出任何片段 (長度 {duration:.2}s)")]
    NoSegments { duration: f64 },

    #[error("無法寫入中繼資料: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("IO 錯誤: {0}")]
    Io(#[from] std::io::Error),
}

/// 單一擷取任務的錯誤，只記錄在報告中，不會中止整批任務
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("無法啟動 ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffmpeg 結束碼 {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("輸出檔案未建立: {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("任務已取消")]
    Cancelled,

    #[error("任務執行緒異常結束: {0}")]
    Panicked(String),
}

impl ExtractionError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// 被捨棄的候選片段（非致命，只用於紀錄與觸發預設切割）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("片段過短被捨棄: 幀 {in_frame}..{out_frame} 共 {frame_count} 幀，最少需要 {required} 幀")]
pub struct SegmentRejected {
    pub in_frame: i64,
    pub out_frame: i64,
    pub frame_count: i64,
    pub required: u64,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
